// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::Router;
use parking_lot::Mutex;
use serial_test::serial;

use crate::config::MATERIALS_COUNT;
use crate::lock::ShipClass;
use crate::notify::Notify;
use crate::session::GameSession;
use crate::test_support::{test_deps, test_state};

use super::*;

const ORIGIN: &str = "100";
const DEST: &str = "200";
const ISLAND: &str = "7";

/// Minimal stateful game: two cities, one fleet.
struct FakeWorld {
    free_ships: AtomicI64,
    origin_stock: Mutex<[i64; MATERIALS_COUNT]>,
    dest_stock: Mutex<[i64; MATERIALS_COUNT]>,
    dest_capacity: i64,
    /// Answer the next N transport posts with "fleet busy".
    busy_remaining: AtomicI64,
    /// Accept transports without consuming ships.
    phantom_dispatch: bool,
    /// Answer transports with garbage instead of a feedback array.
    garbage_responses: bool,
    transport_hits: AtomicUsize,
}

impl Default for FakeWorld {
    fn default() -> Self {
        Self {
            free_ships: AtomicI64::new(5),
            origin_stock: Mutex::new([1000, 0, 0, 0, 0]),
            dest_stock: Mutex::new([0; MATERIALS_COUNT]),
            dest_capacity: 8000,
            busy_remaining: AtomicI64::new(0),
            phantom_dispatch: false,
            garbage_responses: false,
            transport_hits: AtomicUsize::new(0),
        }
    }
}

fn city_page(id: &str, stock: [i64; MATERIALS_COUNT], capacity: i64) -> String {
    format!(
        concat!(
            r#"["updateBackgroundData", {{"id":{id},"name":"c{id}","islandId":"{island}","#,
            r#""islandXCoord":"1","islandYCoord":"2"}}],["updateTemplateData",{{}}]"#,
            "\n",
            r#"currentResources: JSON.parse('{{\"resource\":{w},\"2\":{m},\"1\":{wi},\"4\":{s},\"3\":{c}}}');"#,
            "\n",
            r#"maxResources: JSON.parse('{{\"resource\":{cap},\"2\":{cap}}}');"#,
        ),
        id = id,
        island = ISLAND,
        w = stock[0],
        wi = stock[1],
        m = stock[2],
        c = stock[3],
        s = stock[4],
        cap = capacity,
    )
}

fn global_page(world: &FakeWorld) -> String {
    format!(
        r#"<script>var d = {{"actionRequest":"tok-live"}}; currentCityId: {ORIGIN},
        GlobalMenu_freeTransporters">{ships}< GlobalMenu_freeFreighters">0<</script>"#,
        ships = world.free_ships.load(Ordering::SeqCst).max(0),
    )
}

fn feedback(kind: i64) -> String {
    format!(r#"[["a"],["b"],["c"],["d",[{{"type":{kind}}}]]]"#)
}

async fn handle_get(
    State(world): State<Arc<FakeWorld>>,
    Query(q): Query<HashMap<String, String>>,
) -> String {
    match (q.get("view").map(String::as_str), q.get("cityId")) {
        (Some("city"), Some(id)) if id == ORIGIN => {
            city_page(ORIGIN, *world.origin_stock.lock(), 100_000)
        }
        (Some("city"), Some(id)) if id == DEST => {
            city_page(DEST, *world.dest_stock.lock(), world.dest_capacity)
        }
        _ => global_page(&world),
    }
}

async fn handle_post(
    State(world): State<Arc<FakeWorld>>,
    Query(q): Query<HashMap<String, String>>,
) -> String {
    match (q.get("view").map(String::as_str), q.get("function").map(String::as_str)) {
        (Some("merchantNavy"), _) => {
            r#"{"singleTransporterCapacity":200,"singleFreighterCapacity":600}"#.to_owned()
        }
        (Some(view), _) if view.starts_with("militaryAdvisor") => serde_json::json!([
            ["server", {"time": 100}],
            ["advisor", ["a", "b", {"viewScriptParams": {"militaryAndFleetMovements": [
                {"isOwnArmyOrFleet": true, "eventTime": 101},
            ]}}]]
        ])
        .to_string(),
        (_, Some("changeCurrentCity")) => "[]".to_owned(),
        (_, Some("loadTransportersWithFreight")) => {
            world.transport_hits.fetch_add(1, Ordering::SeqCst);
            if world.garbage_responses {
                return "<html>maintenance page of some kind</html>".to_owned();
            }
            if world.busy_remaining.fetch_sub(1, Ordering::SeqCst) > 0 {
                return feedback(11);
            }
            let ships: i64 = q.get("transporters").and_then(|v| v.parse().ok()).unwrap_or(0);
            if !world.phantom_dispatch {
                world.free_ships.fetch_sub(ships, Ordering::SeqCst);
                let mut origin = world.origin_stock.lock();
                let mut dest = world.dest_stock.lock();
                for (i, slot) in origin.iter_mut().enumerate() {
                    let key = if i == 0 {
                        "cargo_resource".to_owned()
                    } else {
                        format!("cargo_tradegood{i}")
                    };
                    let amount: i64 = q.get(&key).and_then(|v| v.parse().ok()).unwrap_or(0);
                    *slot -= amount;
                    dest[i] += amount;
                }
            }
            feedback(10)
        }
        _ => "[]".to_owned(),
    }
}

async fn spawn_world(world: Arc<FakeWorld>) -> anyhow::Result<String> {
    let router = Router::new()
        .route("/index.php", get(handle_get).post(handle_post))
        .with_state(world);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok(format!("http://{addr}"))
}

async fn session_for(world: Arc<FakeWorld>) -> anyhow::Result<Arc<GameSession>> {
    let base = spawn_world(world).await?;
    let mut state = test_state(&base);
    state.csrf_token = "tok-seed".to_owned();
    state.current_city_id = ORIGIN.to_owned();
    Ok(GameSession::restore(state, test_deps(&base))?)
}

#[derive(Default)]
struct CaptureNotifier(Mutex<Vec<String>>);

#[async_trait]
impl Notify for CaptureNotifier {
    async fn send(&self, message: &str, _photo: Option<&Path>) -> anyhow::Result<()> {
        self.0.lock().push(message.to_owned());
        Ok(())
    }
}

fn plan(cargo: CargoVector) -> Plan {
    Plan {
        routes: vec![Route {
            origin: ORIGIN.to_owned(),
            destination: DEST.to_owned(),
            destination_island: ISLAND.to_owned(),
            cargo,
        }],
        ship_class: ShipClass::Merchant,
    }
}

#[tokio::test]
#[serial]
async fn single_leg_delivery() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::env::set_var("ARGOSY_STATE_DIR", dir.path());

    let world = Arc::new(FakeWorld::default());
    let session = session_for(Arc::clone(&world)).await?;
    let notifier = CaptureNotifier::default();

    let report = TransportEngine::new(&session, &notifier)
        .execute(&plan([500, 0, 0, 0, 0]))
        .await?;

    assert!(report.all_delivered());
    assert_eq!(report.delivered_totals(), [500, 0, 0, 0, 0]);
    // 500 cargo over 200-capacity ships.
    assert_eq!(report.routes[0].ships_used, 3);
    assert_eq!(world.transport_hits.load(Ordering::SeqCst), 1);
    assert_eq!(world.dest_stock.lock()[0], 500);
    // The lock was released on the way out.
    assert!(std::fs::read_dir(dir.path())?.next().is_none());

    std::env::remove_var("ARGOSY_STATE_DIR");
    Ok(())
}

#[tokio::test]
#[serial]
async fn exhausted_origin_drops_the_remainder() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::env::set_var("ARGOSY_STATE_DIR", dir.path());

    let world = Arc::new(FakeWorld::default());
    *world.origin_stock.lock() = [300, 0, 0, 0, 0];
    let session = session_for(Arc::clone(&world)).await?;
    let notifier = CaptureNotifier::default();

    let report = TransportEngine::new(&session, &notifier)
        .execute(&plan([500, 0, 0, 0, 0]))
        .await?;

    let route = &report.routes[0];
    assert_eq!(route.status, RouteStatus::WaitBudgetExhausted);
    // Conservation: delivered + dropped equals the plan.
    assert_eq!(route.delivered, [300, 0, 0, 0, 0]);
    assert_eq!(route.dropped, [200, 0, 0, 0, 0]);

    std::env::remove_var("ARGOSY_STATE_DIR");
    Ok(())
}

#[tokio::test]
#[serial]
async fn busy_fleet_waits_and_retries() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::env::set_var("ARGOSY_STATE_DIR", dir.path());

    let world = Arc::new(FakeWorld { busy_remaining: AtomicI64::new(1), ..Default::default() });
    let session = session_for(Arc::clone(&world)).await?;
    let notifier = CaptureNotifier::default();

    let report = TransportEngine::new(&session, &notifier)
        .execute(&plan([100, 0, 0, 0, 0]))
        .await?;

    assert!(report.all_delivered());
    assert_eq!(world.transport_hits.load(Ordering::SeqCst), 2);

    std::env::remove_var("ARGOSY_STATE_DIR");
    Ok(())
}

#[tokio::test]
#[serial]
async fn phantom_dispatch_is_a_consumption_failure() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::env::set_var("ARGOSY_STATE_DIR", dir.path());

    let world = Arc::new(FakeWorld { phantom_dispatch: true, ..Default::default() });
    let session = session_for(Arc::clone(&world)).await?;
    let notifier = CaptureNotifier::default();

    let report = TransportEngine::new(&session, &notifier)
        .execute(&plan([100, 0, 0, 0, 0]))
        .await?;

    let route = &report.routes[0];
    assert!(matches!(route.status, RouteStatus::Failed(_)), "got: {:?}", route.status);
    assert_eq!(route.dropped, [100, 0, 0, 0, 0]);
    let messages = notifier.0.lock().clone();
    assert!(messages.iter().any(|m| m.contains("SHIPMENT FAILED")), "messages: {messages:?}");

    std::env::remove_var("ARGOSY_STATE_DIR");
    Ok(())
}

#[tokio::test]
#[serial]
async fn garbage_responses_exhaust_the_retry_budget() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::env::set_var("ARGOSY_STATE_DIR", dir.path());

    let world = Arc::new(FakeWorld { garbage_responses: true, ..Default::default() });
    let session = session_for(Arc::clone(&world)).await?;
    let notifier = CaptureNotifier::default();

    let report = TransportEngine::new(&session, &notifier)
        .execute(&plan([100, 0, 0, 0, 0]))
        .await?;

    let route = &report.routes[0];
    assert!(matches!(route.status, RouteStatus::Failed(_)));
    // Test tunables allow three send attempts.
    assert_eq!(world.transport_hits.load(Ordering::SeqCst), 3);

    std::env::remove_var("ARGOSY_STATE_DIR");
    Ok(())
}

#[tokio::test]
#[serial]
async fn saturated_destination_times_out_without_sending() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::env::set_var("ARGOSY_STATE_DIR", dir.path());

    let world = Arc::new(FakeWorld::default());
    // Destination completely full.
    *world.dest_stock.lock() = [8000, 0, 0, 0, 0];
    let session = session_for(Arc::clone(&world)).await?;
    let notifier = CaptureNotifier::default();

    let report = TransportEngine::new(&session, &notifier)
        .execute(&plan([100, 0, 0, 0, 0]))
        .await?;

    let route = &report.routes[0];
    assert_eq!(route.status, RouteStatus::WaitBudgetExhausted);
    assert_eq!(route.delivered, [0; MATERIALS_COUNT]);
    assert_eq!(world.transport_hits.load(Ordering::SeqCst), 0);

    std::env::remove_var("ARGOSY_STATE_DIR");
    Ok(())
}

#[tokio::test]
#[serial]
async fn held_lock_aborts_the_batch() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::env::set_var("ARGOSY_STATE_DIR", dir.path());

    let world = Arc::new(FakeWorld::default());
    let session = session_for(Arc::clone(&world)).await?;

    // Another live process holds the merchant lock.
    let mut foreign = crate::lock::FleetLock::new(
        &session.world.to_string(),
        &session.player,
        ShipClass::Merchant,
        session.tunables(),
    );
    foreign.acquire(std::time::Duration::from_secs(1)).await?;

    let notifier = CaptureNotifier::default();
    let err = TransportEngine::new(&session, &notifier)
        .execute(&plan([100, 0, 0, 0, 0]))
        .await;
    assert!(matches!(err, Err(crate::error::GameError::LockTimeout(_))), "got: {err:?}");
    assert_eq!(world.transport_hits.load(Ordering::SeqCst), 0);

    std::env::remove_var("ARGOSY_STATE_DIR");
    Ok(())
}

#[test]
fn cargo_description_formats_thousands() {
    assert_eq!(describe_cargo(&[1500, 0, 200, 0, 0]), "1,500 Wood, 200 Marble");
    assert_eq!(describe_cargo(&[0; MATERIALS_COUNT]), "nothing");
}
