use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

pub const DEFAULT_LOG_DIR: &str = "logs";
pub const LOG_FILE_NAME: &str = "bot.log";

/// `--log-filter` wins over `RUST_LOG`, which wins over `stakebot=info`
pub fn env_filter(filter: Option<&str>) -> EnvFilter {
    match filter {
        Some(filter) => EnvFilter::new(filter),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("stakebot=info")),
    }
}

/// Open `<dir>/bot.log` for appending, creating the directory if needed
pub fn open_log_file(dir: &Path) -> std::io::Result<File> {
    fs::create_dir_all(dir)?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(LOG_FILE_NAME))
}

/// Stdout plus a plain-text copy in `file`
pub fn subscriber(filter: EnvFilter, file: File) -> impl tracing::Subscriber + Send + Sync {
    Registry::default()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(Arc::new(file)))
}

pub fn init(filter: Option<&str>, dir: &Path) -> crate::Result<()> {
    let file = open_log_file(dir)?;
    tracing::subscriber::set_global_default(subscriber(env_filter(filter), file))?;
    Ok(())
}
