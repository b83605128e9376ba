use thiserror::Error;

/// Errors reported by the exchange, chain and notification backends
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Binance error {code}: {msg}")]
    Binance { code: i64, msg: String },

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Telegram error: {0}")]
    Telegram(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Startup configuration failures, always fatal
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Failed to load config: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid config: {0}")]
    Invalid(String),
}
