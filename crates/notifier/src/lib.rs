//! Notification delivery client with a durable retry journal.
//!
//! Requests are journalled (see [`task`]) before they are sent and cleared
//! once the server accepts them, so attempts made while the server is down
//! can be replayed later (see [`replay`]).

pub mod client;
pub mod replay;
pub mod task;

pub use client::{NotificationRequest, PreparedNotification, TattlerClient};
pub use replay::{ReplaySummary, Replayer};
pub use task::{PendingTask, TaskId, TaskJournal, TaskPart};
