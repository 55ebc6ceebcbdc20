//! Journal janitor and replay binary.
//!
//! Discards journalled tasks older than the configured max age, then
//! re-delivers everything still pending.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use tattler_common::ClientConfig;
use tattler_journal::StoreRegistry;
use tattler_notifier::{Replayer, TattlerClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tattler_notifier=info,tattler_journal=info".into()),
        )
        .json()
        .init();

    tracing::info!("Tattler replay starting...");

    // Load configuration
    let config = ClientConfig::from_env()?;
    let max_age = config.journal_max_age;

    let registry = Arc::new(StoreRegistry::new());
    let client = TattlerClient::new(config, registry)?;

    let Some(journal) = client.journal() else {
        tracing::warn!("TATTLER_PERSISTENCY_DIR not set; nothing to replay");
        return Ok(());
    };

    let expired = journal.expire(max_age)?;
    tracing::info!(expired, max_age_secs = max_age.as_secs(), "Expired journal records discarded");

    let summary = Replayer::new(&client).replay_pending().await?;
    tracing::info!(
        delivered = summary.delivered,
        failed = summary.failed,
        orphaned = summary.orphaned,
        "Replay complete"
    );

    Ok(())
}
