//! Scripted collaborators for unit tests

use crate::api::{ChainClient, MarketClient, Notifier};
use crate::models::{Candle, Order, OrderStatus, StakeReceipt, WithdrawalHandle};
use crate::Result;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

/// Hourly candles whose closes are `closes`, oldest first
pub fn closes_to_candles(closes: &[f64]) -> Vec<Candle> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open_time = start + ChronoDuration::hours(i as i64);
            Candle {
                open_time,
                close_time: open_time + ChronoDuration::minutes(59),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

/// Shared, ordered record of every collaborator call
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<(String, Instant)>>>);

impl CallLog {
    pub fn push(&self, call: impl Into<String>) {
        self.0.lock().unwrap().push((call.into(), Instant::now()));
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
    }

    /// Calls starting with `prefix`, with the (virtual) time they happened
    pub fn timed(&self, prefix: &str) -> Vec<(String, Instant)> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| c.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.timed(prefix).len()
    }

    pub fn notifications(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| c.strip_prefix("notify:").map(str::to_string))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub enum BuyBehavior {
    Fill { executed_qty: Decimal },
    Status(OrderStatus),
    NoOrder,
    Error(String),
}

#[derive(Debug, Clone)]
pub enum WithdrawBehavior {
    Accept(String),
    NoId,
    Error(String),
}

#[derive(Debug, Clone)]
pub enum StakeBehavior {
    Accept(String),
    NoHash,
    Error(String),
}

pub struct MockMarket {
    log: CallLog,
    candles: HashMap<u16, Vec<Candle>>,
    fail_candles: bool,
    price: f64,
    balance: Decimal,
    scripted_balances: Mutex<VecDeque<std::result::Result<Decimal, String>>>,
    buy: BuyBehavior,
    withdraw: WithdrawBehavior,
}

impl Default for MockMarket {
    fn default() -> Self {
        Self {
            log: CallLog::default(),
            candles: HashMap::new(),
            fail_candles: false,
            price: 0.0,
            balance: Decimal::ZERO,
            scripted_balances: Mutex::new(VecDeque::new()),
            buy: BuyBehavior::Fill {
                executed_qty: Decimal::new(163, 1),
            },
            withdraw: WithdrawBehavior::Accept("wd-1".to_string()),
        }
    }
}

impl MockMarket {
    /// Market showing a 6% dip below a flat 100 average with RSI 0
    pub fn dip() -> Self {
        let falling: Vec<f64> = (0..15).map(|i| 108.0 - i as f64).collect();
        Self::default()
            .with_candles(24, closes_to_candles(&[100.0; 24]))
            .with_candles(15, closes_to_candles(&falling))
            .with_price(94.0)
    }

    /// Market sitting right at its average: no signal
    pub fn flat() -> Self {
        Self::default()
            .with_candles(24, closes_to_candles(&[100.0; 24]))
            .with_candles(15, closes_to_candles(&[100.0; 15]))
            .with_price(100.0)
    }

    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    pub fn with_candles(mut self, limit: u16, candles: Vec<Candle>) -> Self {
        self.candles.insert(limit, candles);
        self
    }

    pub fn failing_candles(mut self) -> Self {
        self.fail_candles = true;
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = price;
        self
    }

    pub fn with_balance(mut self, balance: Decimal) -> Self {
        self.balance = balance;
        self
    }

    /// Balances returned by the first calls, before falling back to `with_balance`
    pub fn with_balance_script(
        self,
        script: Vec<std::result::Result<Decimal, String>>,
    ) -> Self {
        *self.scripted_balances.lock().unwrap() = script.into();
        self
    }

    pub fn with_buy(mut self, buy: BuyBehavior) -> Self {
        self.buy = buy;
        self
    }

    pub fn with_withdraw(mut self, withdraw: WithdrawBehavior) -> Self {
        self.withdraw = withdraw;
        self
    }
}

impl MarketClient for MockMarket {
    async fn balance(&self, asset: &str) -> Result<Decimal> {
        self.log.push(format!("balance:{}", asset));
        match self.scripted_balances.lock().unwrap().pop_front() {
            Some(Ok(balance)) => Ok(balance),
            Some(Err(e)) => Err(e.into()),
            None => Ok(self.balance),
        }
    }

    async fn candles(&self, _pair: &str, _interval: &str, limit: u16) -> Result<Vec<Candle>> {
        self.log.push(format!("candles:{}", limit));
        if self.fail_candles {
            return Err("candles unavailable".into());
        }
        Ok(self.candles.get(&limit).cloned().unwrap_or_default())
    }

    async fn current_price(&self, _pair: &str) -> Result<f64> {
        self.log.push("price");
        Ok(self.price)
    }

    async fn place_market_buy(&self, pair: &str, quote_amount: Decimal) -> Result<Option<Order>> {
        self.log.push(format!("buy:{}", quote_amount));
        let order = |status: OrderStatus, executed_qty: Decimal| Order {
            order_id: 1,
            client_order_id: "stakebot-test".to_string(),
            symbol: pair.to_string(),
            status,
            executed_qty,
            quote_qty: quote_amount,
        };

        match &self.buy {
            BuyBehavior::Fill { executed_qty } => Ok(Some(order(OrderStatus::Filled, *executed_qty))),
            BuyBehavior::Status(status) => Ok(Some(order(status.clone(), Decimal::ZERO))),
            BuyBehavior::NoOrder => Ok(None),
            BuyBehavior::Error(e) => Err(e.clone().into()),
        }
    }

    async fn withdraw(
        &self,
        asset: &str,
        address: &str,
        amount: Decimal,
        network: &str,
    ) -> Result<Option<WithdrawalHandle>> {
        self.log
            .push(format!("withdraw:{}:{}:{}:{}", asset, amount, network, address));
        match &self.withdraw {
            WithdrawBehavior::Accept(id) => Ok(Some(WithdrawalHandle(id.clone()))),
            WithdrawBehavior::NoId => Ok(None),
            WithdrawBehavior::Error(e) => Err(e.clone().into()),
        }
    }
}

pub struct MockChain {
    log: CallLog,
    behavior: StakeBehavior,
}

impl MockChain {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            behavior: StakeBehavior::Accept("0xstake".to_string()),
        }
    }

    pub fn with_behavior(mut self, behavior: StakeBehavior) -> Self {
        self.behavior = behavior;
        self
    }
}

impl ChainClient for MockChain {
    async fn stake(&self, amount: Decimal) -> Result<Option<StakeReceipt>> {
        self.log.push(format!("stake:{}", amount));
        match &self.behavior {
            StakeBehavior::Accept(hash) => Ok(Some(StakeReceipt {
                tx_hash: hash.clone(),
            })),
            StakeBehavior::NoHash => Ok(None),
            StakeBehavior::Error(e) => Err(e.clone().into()),
        }
    }
}

pub struct RecordingNotifier {
    log: CallLog,
}

impl RecordingNotifier {
    pub fn new(log: CallLog) -> Self {
        Self { log }
    }
}

impl Notifier for RecordingNotifier {
    async fn send(&self, text: &str) {
        self.log.push(format!("notify:{}", text));
    }
}
