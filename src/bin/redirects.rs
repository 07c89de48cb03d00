//! Writes the static redirect file from the correlation store.

use anyhow::Context;
use topic_sync::redirect::write_redirects;
use topic_sync::{CorrelationStore, JsonFileStore, SyncConfig};

fn main() -> anyhow::Result<()> {
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
    let store = JsonFileStore::open(&config.store.path)?;

    let redirects = &config.redirects;
    let count = write_redirects(
        store.records(),
        &redirects.public_url,
        &redirects.prefix,
        &redirects.path,
    )
    .with_context(|| format!("writing {}", redirects.path.display()))?;

    tracing::info!(rules = count, path = %redirects.path.display(), "redirects written");
    Ok(())
}
