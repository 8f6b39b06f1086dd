pub mod config;
pub mod core;
pub mod error;
pub mod observability;
pub mod source;

pub use error::BackupError;
