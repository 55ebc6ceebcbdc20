//! HTTP client for the notification server.
//!
//! A notification is delivered as a `POST` to
//! `{endpoint}/notification/{scope}/{event}/?mode=..&user=..` with the event
//! context as a JSON object body. When a persistency directory is configured
//! the request is journalled before it is sent and cleared once the server
//! answers `200 OK`; on any failure the journal entry stays behind for replay.

use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tattler_common::{AppError, ClientConfig};
use tattler_journal::StoreRegistry;

use crate::task::{TaskId, TaskJournal};

/// What to notify, and to whom.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationRequest {
    /// Recipient identifier as known to the server
    pub recipient: String,
    /// Name of the event to notify about
    pub event_name: String,
    /// Template context, sent as the JSON body
    pub context: BTreeMap<String, String>,
    /// Vectors (e.g. `email`, `sms`) to restrict delivery to; empty means all
    pub vectors: Vec<String>,
    /// Correlation id passed through to the server; generated when absent
    pub correlation_id: Option<String>,
}

impl NotificationRequest {
    pub fn new(recipient: impl Into<String>, event_name: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            event_name: event_name.into(),
            ..Default::default()
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_vectors<I, S>(mut self, vectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.vectors = vectors.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

/// A request ready to be sent.
#[derive(Debug, Clone)]
pub struct PreparedNotification {
    pub url: Url,
    pub body: Vec<u8>,
    /// Journal entry for this attempt, if it was persisted.
    pub task: Option<TaskId>,
}

/// Notification client.
pub struct TattlerClient {
    config: ClientConfig,
    http: reqwest::Client,
    journal: Option<TaskJournal>,
}

impl TattlerClient {
    /// Validate `config` and build a client. Journal stores are resolved
    /// through `registry`.
    pub fn new(config: ClientConfig, registry: Arc<StoreRegistry>) -> Result<Self, AppError> {
        let config = config.validate()?;
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        let journal = config
            .persistency_dir
            .clone()
            .map(|dir| TaskJournal::new(registry, dir));

        Ok(Self {
            config,
            http,
            journal,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Task journal, when a persistency directory is configured.
    pub fn journal(&self) -> Option<&TaskJournal> {
        self.journal.as_ref()
    }

    /// Build URL and body for a notification, journalling it when enabled.
    ///
    /// A journalling failure is logged and otherwise ignored: the returned
    /// notification simply carries no task id.
    pub fn prepare_notification(
        &self,
        request: &NotificationRequest,
    ) -> Result<PreparedNotification, AppError> {
        let recipient = request.recipient.trim();
        let event_name = request.event_name.trim();
        if recipient.is_empty() || event_name.is_empty() {
            return Err(AppError::Validation(format!(
                "empty recipient or event name (recipient='{}', event='{}')",
                recipient, event_name
            )));
        }

        let url = self.request_url(recipient, event_name, request)?;
        tracing::debug!(url = %url, "Prepared notification URL");

        let body = serde_json::to_vec(&request.context)?;
        tracing::debug!(bytes = body.len(), "Prepared notification body");

        let task = self.journal.as_ref().and_then(|journal| {
            match journal.persist(url.as_str(), &body) {
                Ok(task) => Some(task),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to persist task (ignoring)");
                    None
                }
            }
        });

        Ok(PreparedNotification { url, body, task })
    }

    fn request_url(
        &self,
        recipient: &str,
        event_name: &str,
        request: &NotificationRequest,
    ) -> Result<Url, AppError> {
        let mut url = Url::parse(&self.config.endpoint)
            .map_err(|e| AppError::Config(format!("invalid server endpoint: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| AppError::Config("server endpoint cannot be a base URL".to_string()))?
            .pop_if_empty()
            .extend(["notification", self.config.scope.as_str(), event_name, ""]);

        let vectors: Vec<String> = request
            .vectors
            .iter()
            .filter_map(|v| match normalize_vector(v) {
                Some(v) => Some(v),
                None => {
                    tracing::warn!(
                        event = %event_name,
                        recipient = %recipient,
                        vector = %v,
                        "Ignoring invalid vector"
                    );
                    None
                }
            })
            .collect();

        let correlation_id = request
            .correlation_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("mode", &self.config.mode.to_string())
                .append_pair("user", recipient);
            if !vectors.is_empty() {
                query.append_pair("vector", &vectors.join(","));
            }
            query.append_pair("correlationId", &correlation_id);
        }

        Ok(url)
    }

    /// Prepare and deliver a notification.
    pub async fn send_notification(&self, request: &NotificationRequest) -> Result<(), AppError> {
        let prepared = self.prepare_notification(request)?;
        self.deliver(prepared.url.as_str(), prepared.body, prepared.task.as_ref())
            .await
    }

    /// Send an already prepared request. `task` is cleared from the journal
    /// only if the server accepts the notification.
    pub async fn deliver(
        &self,
        url: &str,
        body: Vec<u8>,
        task: Option<&TaskId>,
    ) -> Result<(), AppError> {
        let response = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/json; charset=UTF-8")
            .header(ACCEPT, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(
                    url = %url,
                    error = %e,
                    retained = task.is_some(),
                    "Notification request failed"
                );
                AppError::Http(e)
            })?;

        let status = response.status();
        let response_body = response.bytes().await.unwrap_or_default();
        self.process_response(status, url, &response_body, task)
    }

    fn process_response(
        &self,
        status: StatusCode,
        url: &str,
        response_body: &[u8],
        task: Option<&TaskId>,
    ) -> Result<(), AppError> {
        if status != StatusCode::OK {
            tracing::warn!(
                url = %url,
                status = %status,
                retained = task.is_some(),
                "Notification rejected by server"
            );
            return Err(AppError::Delivery {
                status,
                url: url.to_string(),
                persisted: task.is_some(),
            });
        }

        if let (Some(task), Some(journal)) = (task, self.journal.as_ref()) {
            if let Err(e) = journal.clear(task) {
                tracing::error!(task_id = %task, error = %e, "Failed to clear delivered task");
            }
        }

        tracing::info!(
            url = %url,
            status = %status,
            response = %String::from_utf8_lossy(response_body),
            "Notification sent"
        );
        Ok(())
    }
}

/// Lower-case and trim a vector name; `None` if it is not `[a-z0-9_-]+`.
fn normalize_vector(name: &str) -> Option<String> {
    let normalized = name.trim().to_lowercase();
    let valid = !normalized.is_empty()
        && normalized
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-');
    valid.then_some(normalized)
}
