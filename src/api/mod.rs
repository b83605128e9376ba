// External collaborators: exchange, chain and operator notifications
#![allow(async_fn_in_trait)]

pub mod binance;
pub mod ronin;
pub mod telegram;

pub use binance::BinanceClient;
pub use ronin::RoninClient;
pub use telegram::TelegramNotifier;

use crate::models::{Candle, Order, StakeReceipt, WithdrawalHandle};
use crate::Result;
use rust_decimal::Decimal;

/// Centralized exchange used for market data, buying and withdrawing
pub trait MarketClient {
    /// Free balance of `asset`
    async fn balance(&self, asset: &str) -> Result<Decimal>;

    /// Most recent `limit` candles, oldest first
    async fn candles(&self, pair: &str, interval: &str, limit: u16) -> Result<Vec<Candle>>;

    async fn current_price(&self, pair: &str) -> Result<f64>;

    /// Market buy spending `quote_amount` of the quote asset
    async fn place_market_buy(&self, pair: &str, quote_amount: Decimal) -> Result<Option<Order>>;

    async fn withdraw(
        &self,
        asset: &str,
        address: &str,
        amount: Decimal,
        network: &str,
    ) -> Result<Option<WithdrawalHandle>>;
}

/// Wallet-side staking
pub trait ChainClient {
    async fn stake(&self, amount: Decimal) -> Result<Option<StakeReceipt>>;
}

/// Best-effort operator channel. Implementations swallow their own errors.
pub trait Notifier {
    async fn send(&self, text: &str);
}

/// A disabled channel is simply `None`
impl<N: Notifier> Notifier for Option<N> {
    async fn send(&self, text: &str) {
        if let Some(notifier) = self {
            notifier.send(text).await;
        }
    }
}
