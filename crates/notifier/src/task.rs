//! Journal of in-flight delivery attempts.
//!
//! Each attempt is stored as two records sharing a task id:
//! - `{task_id}_url` holds the request URL
//! - `{task_id}_body` holds the JSON body
//!
//! A task id is `{unix_timestamp}_{random_hex}`. The timestamp only groups
//! tasks roughly by creation time; the random suffix keeps concurrent attempts
//! apart.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use tattler_journal::{JournalError, PersistentStore, RecordStore, StoreRegistry};

/// Identifier shared by the records of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(String);

/// Which half of a task a record holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPart {
    Url,
    Body,
}

impl TaskPart {
    fn suffix(self) -> &'static str {
        match self {
            TaskPart::Url => "_url",
            TaskPart::Body => "_body",
        }
    }
}

impl TaskId {
    /// New id from the current time and a random suffix.
    pub fn generate() -> Self {
        Self(format!("{}_{:x}", Utc::now().timestamp(), rand::random::<u32>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Unix timestamp the id was generated at.
    pub fn timestamp(&self) -> i64 {
        self.0
            .split_once('_')
            .and_then(|(ts, _)| ts.parse().ok())
            .unwrap_or_default()
    }

    pub fn key(&self, part: TaskPart) -> String {
        format!("{}{}", self.0, part.suffix())
    }

    pub fn url_key(&self) -> String {
        self.key(TaskPart::Url)
    }

    pub fn body_key(&self) -> String {
        self.key(TaskPart::Body)
    }

    /// Split a record key into its task id and part, if it is a task record.
    pub fn split_key(key: &str) -> Option<(TaskId, TaskPart)> {
        [TaskPart::Url, TaskPart::Body].into_iter().find_map(|part| {
            key.strip_suffix(part.suffix())
                .and_then(|id| id.parse().ok())
                .map(|id| (id, part))
        })
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ts, suffix) = s
            .split_once('_')
            .ok_or_else(|| format!("task id '{}' lacks '_' separator", s))?;
        let ts_ok = !ts.is_empty() && ts.bytes().all(|b| b.is_ascii_digit());
        let suffix_ok = !suffix.is_empty()
            && suffix
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if ts_ok && suffix_ok {
            Ok(Self(s.to_string()))
        } else {
            Err(format!("malformed task id '{}'", s))
        }
    }
}

/// A journalled delivery attempt with both parts loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTask {
    pub id: TaskId,
    pub url: String,
    pub body: Vec<u8>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Parts {
    url: bool,
    body: bool,
}

/// Task journal bound to one persistency directory.
///
/// The store is resolved through the registry on every call, so a directory
/// that is missing at startup is picked up once it appears.
#[derive(Debug, Clone)]
pub struct TaskJournal {
    registry: Arc<StoreRegistry>,
    dir: String,
}

impl TaskJournal {
    pub fn new(registry: Arc<StoreRegistry>, dir: impl Into<String>) -> Self {
        Self {
            registry,
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &str {
        &self.dir
    }

    fn store(&self) -> Result<Arc<PersistentStore>, JournalError> {
        self.registry.get_instance(&self.dir)
    }

    /// Journal a request before it is sent.
    pub fn persist(&self, url: &str, body: &[u8]) -> Result<TaskId, JournalError> {
        let store = self.store()?;
        let task = TaskId::generate();

        store.set(&task.url_key(), Some(url.as_bytes()))?;
        if let Err(e) = store.set(&task.body_key(), Some(body)) {
            store.unset(&task.url_key());
            return Err(e);
        }

        tracing::info!(task_id = %task, "Task journalled");
        Ok(task)
    }

    /// Remove both records of a task. Returns whether anything was removed.
    pub fn clear(&self, task: &TaskId) -> Result<bool, JournalError> {
        let store = self.store()?;
        let url_removed = store.unset(&task.url_key());
        let body_removed = store.unset(&task.body_key());
        let removed = url_removed || body_removed;

        if removed {
            tracing::info!(task_id = %task, "Task cleared from journal");
        } else {
            tracing::debug!(task_id = %task, "Task already absent from journal");
        }
        Ok(removed)
    }

    /// Load a task if both of its records are present.
    pub fn load(&self, task: &TaskId) -> Result<Option<PendingTask>, JournalError> {
        let store = self.store()?;
        Ok(load_from(&*store, task))
    }

    /// All complete tasks, oldest first.
    pub fn pending(&self) -> Result<Vec<PendingTask>, JournalError> {
        let store = self.store()?;
        let index = index_tasks(&*store)?;

        let mut tasks: Vec<PendingTask> = index
            .into_iter()
            .filter(|(_, parts)| parts.url && parts.body)
            .filter_map(|(id, _)| load_from(&*store, &id))
            .collect();
        tasks.sort_by(|a, b| {
            (a.id.timestamp(), a.id.as_str()).cmp(&(b.id.timestamp(), b.id.as_str()))
        });
        Ok(tasks)
    }

    /// Tasks with only one of their two records present.
    pub fn orphans(&self) -> Result<Vec<TaskId>, JournalError> {
        let store = self.store()?;
        Ok(index_tasks(&*store)?
            .into_iter()
            .filter(|(_, parts)| parts.url != parts.body)
            .map(|(id, _)| id)
            .collect())
    }

    /// Discard journal records older than `max_age`.
    pub fn expire(&self, max_age: Duration) -> Result<usize, JournalError> {
        self.store()?.clear_expired(max_age)
    }
}

fn index_tasks(store: &dyn RecordStore) -> Result<BTreeMap<TaskId, Parts>, JournalError> {
    let mut index: BTreeMap<TaskId, Parts> = BTreeMap::new();
    for key in store.list()? {
        let Some((id, part)) = TaskId::split_key(&key) else {
            continue;
        };
        let parts = index.entry(id).or_default();
        match part {
            TaskPart::Url => parts.url = true,
            TaskPart::Body => parts.body = true,
        }
    }
    Ok(index)
}

fn load_from(store: &dyn RecordStore, task: &TaskId) -> Option<PendingTask> {
    let url = store.get(&task.url_key())?;
    let body = store.get(&task.body_key())?;
    match String::from_utf8(url) {
        Ok(url) => Some(PendingTask {
            id: task.clone(),
            url,
            body,
        }),
        Err(_) => {
            tracing::warn!(task_id = %task, "Journalled URL is not valid UTF-8; skipping");
            None
        }
    }
}
