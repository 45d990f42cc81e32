//! Strictly Drinks - Unified CLI
//!
//! Runs the HTTP adapter or one-shot ledger commands against the configured
//! storage.

#![warn(missing_docs)]

mod cli;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use serde::Serialize;
use strictly_dice::RandomRoller;
use strictly_drinks::{
    AppConfig, AppState, DrinkService, InMemoryStorage, SessionAggregator, SqliteStorage, Storage,
    serve,
};
use tracing::{info, instrument};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = AppConfig::load_or_default(&cli.config)?.with_env()?;
    if let Some(database) = cli.database {
        config = config.with_database_path(database);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_filter())),
        )
        .init();

    let storage = open_storage(&config)?;
    let service = DrinkService::new(storage.clone(), Arc::new(RandomRoller));
    let sessions = SessionAggregator::new(storage);

    match cli.command {
        Command::Serve { port, host } => {
            let host = host.unwrap_or_else(|| config.host().clone());
            let port = port.unwrap_or(*config.port());
            run_http_server(&format!("{host}:{port}"), service).await
        }
        Command::NewSession {
            channel,
            created_by,
        } => print_json(&sessions.start_new_session(&channel, &created_by)?),
        Command::Leaderboard { channel } => print_json(&sessions.leaderboard(&channel)?),
        Command::Debts { player } => print_json(&service.list_debts(&player)?),
        Command::Pay { player } => print_json(&service.pay_debt(&player)?),
        Command::Abandon { game } => print_json(&service.abandon_game(&game)?),
    }
}

/// Opens the configured backend.
#[instrument(skip(config), fields(database = %config.database_path()))]
fn open_storage(config: &AppConfig) -> Result<Arc<dyn Storage>> {
    if config.is_in_memory() {
        info!("Using in-memory storage");
        Ok(Arc::new(InMemoryStorage::new()))
    } else {
        Ok(Arc::new(SqliteStorage::open(config.database_path())?))
    }
}

/// Run the HTTP game server
async fn run_http_server(address: &str, service: DrinkService) -> Result<()> {
    info!(address, "Starting Strictly Drinks HTTP server");
    serve(address, AppState::new(service)).await?;
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
