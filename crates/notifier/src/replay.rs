//! Replay of journalled delivery attempts.
//!
//! Tasks left in the journal by failed deliveries (or by a crash between
//! journalling and sending) are re-sent in creation order. A task is cleared
//! only when the server accepts it; anything else leaves it for the next run.

use tattler_common::AppError;

use crate::client::TattlerClient;

/// Outcome of one replay sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub delivered: usize,
    pub failed: usize,
    /// Tasks with only one of their two records; never sent.
    pub orphaned: usize,
}

/// Re-delivers pending tasks through a client.
pub struct Replayer<'a> {
    client: &'a TattlerClient,
}

impl<'a> Replayer<'a> {
    pub fn new(client: &'a TattlerClient) -> Self {
        Self { client }
    }

    /// Send every complete pending task once.
    ///
    /// Individual delivery failures are counted, not returned; only a journal
    /// that cannot be read aborts the sweep.
    pub async fn replay_pending(&self) -> Result<ReplaySummary, AppError> {
        let journal = self.client.journal().ok_or_else(|| {
            AppError::Config("no persistency directory configured; nothing to replay".to_string())
        })?;

        let mut summary = ReplaySummary {
            orphaned: journal.orphans()?.len(),
            ..Default::default()
        };
        if summary.orphaned > 0 {
            tracing::warn!(
                orphaned = summary.orphaned,
                dir = %journal.dir(),
                "Journal holds incomplete tasks; they will expire with the janitor"
            );
        }

        let pending = journal.pending()?;
        tracing::info!(pending = pending.len(), dir = %journal.dir(), "Replaying journalled tasks");

        for task in pending {
            match self.client.deliver(&task.url, task.body, Some(&task.id)).await {
                Ok(()) => summary.delivered += 1,
                Err(e) => {
                    tracing::warn!(task_id = %task.id, error = %e, "Replay attempt failed");
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }
}
