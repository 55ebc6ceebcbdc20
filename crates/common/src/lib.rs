pub mod config;
pub mod error;
pub mod types;

pub use config::ClientConfig;
pub use error::AppError;
pub use types::NotificationMode;
