use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// OHLCV candlestick for one time bucket of one trading pair
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Chronologically ordered candles for one symbol/interval pair
#[derive(Debug, Clone)]
pub struct PriceSeries {
    pub symbol: String,
    pub interval: String,
    pub candles: Vec<Candle>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, interval: impl Into<String>, candles: Vec<Candle>) -> Self {
        Self {
            symbol: symbol.into(),
            interval: interval.into(),
            candles,
        }
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    /// Arithmetic mean of all close prices, `None` for an empty series
    pub fn mean_close(&self) -> Option<f64> {
        if self.is_empty() {
            return None;
        }
        crate::indicators::calculate_sma(&self.closes(), self.len())
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }
}

/// Buy decision together with the signals that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub should_buy: bool,
    pub current_price: f64,
    pub average_price: f64,
    pub rsi: f64,
}

impl Decision {
    /// Fail-closed decision used when the signals could not be computed
    pub fn no_buy() -> Self {
        Self {
            should_buy: false,
            current_price: 0.0,
            average_price: 0.0,
            rsi: 0.0,
        }
    }
}

/// Exchange order state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    PendingCancel,
    Rejected,
    Expired,
    ExpiredInMatch,
    #[serde(other)]
    Unknown,
}

/// Result of a market buy
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub order_id: u64,
    pub client_order_id: String,
    pub symbol: String,
    pub status: OrderStatus,
    /// Base asset quantity actually bought
    pub executed_qty: Decimal,
    /// Quote asset amount actually spent
    pub quote_qty: Decimal,
}

impl Order {
    pub fn is_filled(&self) -> bool {
        self.status == OrderStatus::Filled
    }
}

/// Exchange-side identifier of an accepted withdrawal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalHandle(pub String);

impl std::fmt::Display for WithdrawalHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transaction hash of a submitted stake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakeReceipt {
    pub tx_hash: String,
}
