// Core modules
pub mod api;
pub mod config;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod logging;
pub mod models;
pub mod strategy;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use api::*;
pub use config::Settings;
pub use models::*;

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
