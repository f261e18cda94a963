// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn extracts_token_and_city() {
    let cache = TokenCache::new();
    cache.try_extract(
        r#"<script>var x = {"actionRequest":"d41d8cd98f00b204e9800998ecf8427e"};
           currentCityId: 51023,</script>"#,
    );
    assert_eq!(cache.csrf().as_deref(), Some("d41d8cd98f00b204e9800998ecf8427e"));
    assert_eq!(cache.current_city().as_deref(), Some("51023"));
}

#[test]
fn unquoted_key_variant_matches() {
    let cache = TokenCache::new();
    cache.try_extract(r#"actionRequest: "abc123def""#);
    assert_eq!(cache.csrf().as_deref(), Some("abc123def"));
}

#[test]
fn missing_fields_leave_cache_untouched() {
    let cache = TokenCache::new();
    cache.seed("old-token", "42");
    cache.try_extract("<html>nothing relevant here</html>");
    assert_eq!(cache.csrf().as_deref(), Some("old-token"));
    assert_eq!(cache.current_city().as_deref(), Some("42"));
}

#[test]
fn partial_update_only_touches_matching_field() {
    let cache = TokenCache::new();
    cache.seed("old-token", "42");
    cache.try_extract("currentCityId: 77");
    assert_eq!(cache.csrf().as_deref(), Some("old-token"));
    assert_eq!(cache.current_city().as_deref(), Some("77"));
}

#[test]
fn invalidate_clears_only_the_token() {
    let cache = TokenCache::new();
    cache.seed("tok", "9");
    cache.invalidate_csrf();
    assert_eq!(cache.csrf(), None);
    assert_eq!(cache.current_city().as_deref(), Some("9"));
}

#[test]
fn empty_cache_reports_none() {
    let cache = TokenCache::new();
    assert_eq!(cache.csrf(), None);
    assert_eq!(cache.current_city(), None);
}

#[test]
fn newest_token_wins() {
    let cache = TokenCache::new();
    cache.try_extract(r#"actionRequest":"first""#);
    cache.try_extract(r#"actionRequest":"second""#);
    assert_eq!(cache.csrf().as_deref(), Some("second"));
}
