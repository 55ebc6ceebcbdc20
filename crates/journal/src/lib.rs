//! Durable, path-keyed record storage used to journal notification attempts.
//!
//! - [`PersistentStore`] keeps one file per record under a root directory,
//!   written atomically and aged by modification time.
//! - [`StoreRegistry`] hands out a single shared store per path.

pub mod error;
pub mod registry;
pub mod store;

pub use error::{JournalError, Result};
pub use registry::StoreRegistry;
pub use store::{PersistentStore, RecordStore};
