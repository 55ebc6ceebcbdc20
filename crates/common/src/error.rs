use thiserror::Error;

use tattler_journal::JournalError;

/// Common error types used by the notification client.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The server answered with a non-success status.
    #[error("Delivery to {url} failed with {status}{}", retained_note(.persisted))]
    Delivery {
        status: reqwest::StatusCode,
        url: String,
        persisted: bool,
    },
}

fn retained_note(persisted: &bool) -> &'static str {
    if *persisted {
        " (keeping persistent task)"
    } else {
        ""
    }
}

impl AppError {
    /// Whether the failed request was journalled and can be replayed later.
    pub fn is_retained(&self) -> bool {
        matches!(self, AppError::Delivery { persisted: true, .. })
    }
}
