use anyhow::{Context, Result};
use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod models;
mod parsers;
mod pipeline;
mod scrapers;
mod storage;
mod telegram;
mod utils;

use crate::config::{Config, SeenStoreConfig};
use crate::pipeline::Pipeline;
use crate::scrapers::{HttpFetcher, ListingExtractor};
use crate::storage::{SeenStore, SqliteStore, UpstashStore};
use crate::telegram::TelegramNotifier;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::from_default_env().add_directive("olx_watcher=info".parse()?);
    if std::env::var("LOG_FORMAT").is_ok_and(|format| format == "json") {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Starting OLX Watcher");

    let config = Config::load().context("Failed to load configuration")?;

    // One client shared by the fetcher, the store and the notifier
    let client = utils::http::create_client(&config.http)?;

    let store: Arc<dyn SeenStore> = match &config.seen_store {
        SeenStoreConfig::Upstash { url, token } => {
            info!("Using Upstash seen-set store");
            Arc::new(UpstashStore::new(client.clone(), url.clone(), token.clone()))
        }
        SeenStoreConfig::Sqlite { path } => {
            info!("Using SQLite seen-set store at {}", path);
            Arc::new(SqliteStore::open(path).context("Failed to open SQLite database")?)
        }
    };

    let pipeline = Pipeline::new(
        Arc::new(HttpFetcher::new(client.clone())),
        store,
        Arc::new(TelegramNotifier::new(client, &config.telegram)),
        ListingExtractor::new(config.site_origin.clone()),
        config.channels.clone(),
    );

    // Runs never overlap: the next tick is only awaited after the previous run
    // completes, and a slow run delays the schedule instead of bursting.
    let mut interval = interval(Duration::from_secs(config.check_interval_seconds));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        info!(
            "--- Starting new check cycle at {} ---",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );

        let summary = pipeline.run().await;

        info!(
            "Check cycle completed: {} notifications sent, waiting {} seconds",
            summary.notified(),
            config.check_interval_seconds
        );
    }
}
