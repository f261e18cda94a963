// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::error;

use argosy::config::Config;

#[derive(Parser)]
#[command(name = "argosy", version, about = "Autonomous trade-fleet agent for a browser strategy game.")]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    subcommand: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Detached worker entry point (spawned by the parent, not by hand).
    #[command(hide = true)]
    Worker(argosy::worker::WorkerArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = cli.config.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }

    match cli.subcommand {
        Some(Commands::Worker(args)) => {
            if let Err(e) = argosy::logging::init_worker(&cli.config) {
                eprintln!("error: could not open worker log: {e}");
                std::process::exit(1);
            }
            if let Err(e) = argosy::worker::run(args, &cli.config).await {
                error!("worker fatal: {e:#}");
                std::process::exit(1);
            }
        }
        None => {
            argosy::logging::init_parent(&cli.config);
            match argosy::shell::run(&cli.config).await {
                Ok(()) => std::process::exit(0),
                Err(e) => {
                    error!("fatal: {e:#}");
                    std::process::exit(1);
                }
            }
        }
    }
}
