//! Polling service command implementation.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::info;

use feedrelay::build_info;
use feedrelay::config::Config;
use feedrelay::cycle::CycleCoordinator;
use feedrelay::engine::SyncEngine;
use feedrelay::notify::DiscordNotifier;
use feedrelay::scheduler::{Cadence, Scheduler};
use feedrelay::source::HttpSource;
use feedrelay::store::SubscriptionStore;
use feedrelay::store::file::FileSubscriptionStore;
use feedrelay::subscription::SubscriptionService;

pub async fn run(config_path: &str) -> Result<()> {
    let config = Config::load(config_path)
        .await
        .with_context(|| format!("failed to load {config_path}"))?;
    config.validate()?;

    let timezone = config.timezone()?;
    let cadence = Cadence::every_minutes(config.polling.interval_minutes)?;
    let bot_token = config
        .discord
        .as_ref()
        .map(|d| d.bot_token.as_str())
        .context("discord.bot_token is required")?;

    let subscriptions_dir = config.subscriptions_dir(Path::new(config_path));
    let store: Arc<dyn SubscriptionStore> =
        Arc::new(FileSubscriptionStore::new(&subscriptions_dir));
    let source = Arc::new(HttpSource::from_config(&config.source)?);
    let notifier = Arc::new(DiscordNotifier::new(bot_token));

    let engine = SyncEngine::new(source, config.page_delay());
    let coordinator = CycleCoordinator::new(store.clone(), engine, notifier, timezone);
    let scheduler = Scheduler::new(cadence, Arc::new(coordinator));

    info!(
        version = %build_info::version_string(),
        data_dir = %subscriptions_dir.display(),
        interval_minutes = config.polling.interval_minutes,
        timezone = %timezone,
        "Starting feedrelay"
    );

    for subscription in store.list(None).await? {
        info!("{}", SubscriptionService::describe(&subscription));
    }
    scheduler.start(store.as_ref()).await?;

    signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    scheduler.shutdown().await;
    Ok(())
}
