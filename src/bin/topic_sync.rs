//! Runs one sync pass: fetch events, diff against the store, apply.
//!
//! Configuration comes from `$TOPIC_SYNC_CONFIG` (or the default config
//! path) plus environment overrides; see [`topic_sync::config`]. Set
//! `FULL_WIPE=1` to retract every published topic instead.
//!
//! All diagnostic output goes to stderr.

use std::sync::Arc;

use anyhow::Context;
use topic_sync::publish::{DiscourseClient, RetryExecutor};
use topic_sync::source::ZenkitSource;
use topic_sync::{GENERATOR_VERSION, JsonFileStore, Orchestrator, PublishOptions, SyncConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("topic_sync=info")),
        )
        .init();

    let config_path = SyncConfig::default_config_path();
    let config = SyncConfig::load(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;
    config.validate()?;

    let client = Arc::new(DiscourseClient::new(config.discourse_client()));
    let orchestrator = Orchestrator::new(
        RetryExecutor::new(client, config.retry_policy()),
        PublishOptions {
            // Only read when posting, which a full wipe never does.
            category_id: config.discourse.category_id.unwrap_or_default(),
            generator_version: GENERATOR_VERSION,
            reset_bump: config.discourse.reset_bump,
            retract_orphaned_duplicates: config.discourse.retract_orphaned_duplicates,
        },
    );
    let source = ZenkitSource::new(config.zenkit.clone());
    let mut store = JsonFileStore::open(&config.store.path)?;

    tracing::info!(
        store = %store.path().display(),
        full_wipe = config.full_wipe,
        generator_version = GENERATOR_VERSION,
        "topic-sync starting"
    );

    let report = orchestrator
        .sync(&source, &mut store, chrono::Utc::now(), config.full_wipe)
        .await
        .map_err(|e| {
            tracing::error!(code = e.code(), error = %e, "sync aborted");
            anyhow::anyhow!("topic-sync failed: {e}")
        })?;

    tracing::info!(%report, "sync complete");
    Ok(())
}
