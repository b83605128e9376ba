// Buy signal evaluation
pub mod signals;

pub use signals::{SignalConfig, SignalEvaluator};
