use std::time::Duration;

use reqwest::Url;

use crate::error::AppError;
use crate::types::NotificationMode;

/// Timeout used when none (or zero) is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Age after which journalled tasks are swept by the janitor (7 days).
pub const DEFAULT_JOURNAL_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Notification client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the notification server, e.g. `http://localhost:11503`
    pub endpoint: String,

    /// Scope to present to the server
    pub scope: String,

    /// Delivery mode (default: debug)
    pub mode: NotificationMode,

    /// Per-request timeout (default: 5s)
    pub timeout: Duration,

    /// Directory to journal delivery attempts in; `None` disables journalling
    pub persistency_dir: Option<String>,

    /// Journalled tasks older than this are discarded by the janitor
    pub journal_max_age: Duration,
}

impl ClientConfig {
    /// Configuration with defaults for everything but endpoint and scope.
    pub fn new(endpoint: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            scope: scope.into(),
            mode: NotificationMode::default(),
            timeout: DEFAULT_TIMEOUT,
            persistency_dir: None,
            journal_max_age: DEFAULT_JOURNAL_MAX_AGE,
        }
    }

    pub fn with_mode(mut self, mode: NotificationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_persistency_dir(mut self, dir: impl Into<String>) -> Self {
        self.persistency_dir = Some(dir.into());
        self
    }

    /// Load configuration from environment variables (and `.env`, if present).
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mode = match lookup("TATTLER_MODE") {
            Some(raw) => raw
                .parse::<NotificationMode>()
                .map_err(|e| anyhow::anyhow!("TATTLER_MODE: {}", e))?,
            None => NotificationMode::default(),
        };

        Ok(Self {
            endpoint: lookup("TATTLER_ENDPOINT")
                .ok_or_else(|| anyhow::anyhow!("TATTLER_ENDPOINT environment variable is required"))?,
            scope: lookup("TATTLER_SCOPE")
                .ok_or_else(|| anyhow::anyhow!("TATTLER_SCOPE environment variable is required"))?,
            mode,
            timeout: Duration::from_millis(
                lookup("TATTLER_TIMEOUT_MS")
                    .unwrap_or_else(|| "5000".to_string())
                    .parse()
                    .map_err(|_| anyhow::anyhow!("TATTLER_TIMEOUT_MS must be a valid u64"))?,
            ),
            persistency_dir: lookup("TATTLER_PERSISTENCY_DIR"),
            journal_max_age: Duration::from_secs(
                lookup("TATTLER_JOURNAL_MAX_AGE_SECS")
                    .unwrap_or_else(|| DEFAULT_JOURNAL_MAX_AGE.as_secs().to_string())
                    .parse()
                    .map_err(|_| {
                        anyhow::anyhow!("TATTLER_JOURNAL_MAX_AGE_SECS must be a valid u64")
                    })?,
            ),
        })
    }

    /// Normalize and check the configuration.
    ///
    /// Trims whitespace (and trailing `/` from the endpoint), applies the
    /// default timeout when it is zero, and turns an empty persistency
    /// directory into `None`.
    pub fn validate(mut self) -> Result<Self, AppError> {
        self.endpoint = self.endpoint.trim().trim_end_matches('/').to_string();
        self.scope = self.scope.trim().to_string();

        if self.endpoint.is_empty() {
            return Err(AppError::Config(format!(
                "invalid server endpoint; want http://foo.com:1234/path, have '{}'",
                self.endpoint
            )));
        }
        let parsed = Url::parse(&self.endpoint).map_err(|_| {
            AppError::Config(format!(
                "server endpoint is not a valid URL, have '{}'",
                self.endpoint
            ))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(AppError::Config(format!(
                "server endpoint must be an http(s) URL, have '{}'",
                self.endpoint
            )));
        }

        if self.scope.is_empty() {
            return Err(AppError::Config("invalid scope; must not be empty".to_string()));
        }

        if self.timeout.is_zero() {
            self.timeout = DEFAULT_TIMEOUT;
        }

        self.persistency_dir = self
            .persistency_dir
            .map(|dir| dir.trim().to_string())
            .filter(|dir| !dir.is_empty());

        Ok(self)
    }
}
