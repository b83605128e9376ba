use crate::api::{ChainClient, MarketClient, Notifier};
use crate::config::Settings;
use crate::models::{Order, StakeReceipt, WithdrawalHandle};
use rust_decimal::Decimal;
use std::time::Duration;

/// Assets, destination and waits of one buy → withdraw → stake run
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub symbol: String,
    pub base_asset: String,
    pub quote_asset: String,
    pub wallet_address: String,
    pub network: String,
    /// Wait between a filled buy and the withdrawal request
    pub settlement_delay: Duration,
    /// Wait for the withdrawal to land on chain before staking
    pub bridge_delay: Duration,
}

impl PipelineSettings {
    pub fn from_settings(settings: &Settings) -> Self {
        let bot = &settings.bot_settings;
        Self {
            symbol: bot.symbol.clone(),
            base_asset: bot.base_asset.clone(),
            quote_asset: bot.quote_asset.clone(),
            wallet_address: settings.ronin.wallet_address.clone(),
            network: bot.withdraw_network.clone(),
            settlement_delay: Duration::from_secs(bot.settlement_delay),
            bridge_delay: Duration::from_secs(bot.bridge_delay),
        }
    }
}

/// How far a run got. Each stage only starts when the previous one succeeded.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    BuyFailed,
    WithdrawFailed {
        order: Order,
    },
    StakeFailed {
        order: Order,
        withdrawal: WithdrawalHandle,
    },
    Staked {
        order: Order,
        withdrawal: WithdrawalHandle,
        receipt: StakeReceipt,
    },
}

impl PipelineOutcome {
    pub fn is_staked(&self) -> bool {
        matches!(self, PipelineOutcome::Staked { .. })
    }
}

/// One buy → withdraw → stake run. Stage failures are logged and reported to
/// the operator, never propagated.
pub struct StakePipeline<'a, M, C, N> {
    market: &'a M,
    chain: &'a C,
    notifier: &'a N,
    settings: &'a PipelineSettings,
}

impl<'a, M, C, N> StakePipeline<'a, M, C, N>
where
    M: MarketClient,
    C: ChainClient,
    N: Notifier,
{
    pub fn new(market: &'a M, chain: &'a C, notifier: &'a N, settings: &'a PipelineSettings) -> Self {
        Self {
            market,
            chain,
            notifier,
            settings,
        }
    }

    pub async fn run(&self, quote_amount: Decimal) -> PipelineOutcome {
        let Some(order) = self.buy(quote_amount).await else {
            return PipelineOutcome::BuyFailed;
        };

        tokio::time::sleep(self.settings.settlement_delay).await;

        // The executed quantity, not the requested amount, flows downstream
        let amount = order.executed_qty;
        let Some(withdrawal) = self.withdraw(amount).await else {
            return PipelineOutcome::WithdrawFailed { order };
        };

        tracing::info!(
            "Waiting {:?} for withdrawal {} to arrive",
            self.settings.bridge_delay,
            withdrawal
        );
        tokio::time::sleep(self.settings.bridge_delay).await;

        match self.stake(amount).await {
            Some(receipt) => PipelineOutcome::Staked {
                order,
                withdrawal,
                receipt,
            },
            None => PipelineOutcome::StakeFailed { order, withdrawal },
        }
    }

    /// Market buy; only a FILLED order counts
    pub async fn buy(&self, quote_amount: Decimal) -> Option<Order> {
        let s = self.settings;
        let failure = match self.market.place_market_buy(&s.symbol, quote_amount).await {
            Ok(Some(order)) if order.is_filled() => {
                let message = format!(
                    "Bought {} {} for {} {}",
                    order.executed_qty, s.base_asset, order.quote_qty, s.quote_asset
                );
                tracing::info!(order_id = order.order_id, "{}", message);
                self.notifier.send(&message).await;
                return Some(order);
            }
            Ok(Some(order)) => format!(
                "order {} not filled (status {:?})",
                order.order_id, order.status
            ),
            Ok(None) => "no order returned".to_string(),
            Err(e) => e.to_string(),
        };

        tracing::error!("Buy attempt failed: {}", failure);
        self.notifier
            .send(&format!("Buy attempt failed: {}", failure))
            .await;
        None
    }

    pub async fn withdraw(&self, amount: Decimal) -> Option<WithdrawalHandle> {
        let s = self.settings;
        let result = self
            .market
            .withdraw(&s.base_asset, &s.wallet_address, amount, &s.network)
            .await;

        let failure = match result {
            Ok(Some(handle)) => {
                let message = format!(
                    "Withdrawal to Ronin initiated: {} {} (id {})",
                    amount, s.base_asset, handle
                );
                tracing::info!("{}", message);
                self.notifier.send(&message).await;
                return Some(handle);
            }
            Ok(None) => "no withdrawal id returned".to_string(),
            Err(e) => e.to_string(),
        };

        tracing::error!("Withdrawal failed: {}", failure);
        self.notifier
            .send(&format!("Withdrawal failed: {}", failure))
            .await;
        None
    }

    pub async fn stake(&self, amount: Decimal) -> Option<StakeReceipt> {
        let failure = match self.chain.stake(amount).await {
            Ok(Some(receipt)) => {
                let message = format!(
                    "Staking successful: {} {} (tx {})",
                    amount, self.settings.base_asset, receipt.tx_hash
                );
                tracing::info!("{}", message);
                self.notifier.send(&message).await;
                return Some(receipt);
            }
            Ok(None) => "no transaction hash returned".to_string(),
            Err(e) => e.to_string(),
        };

        tracing::error!("Staking failed: {}", failure);
        self.notifier
            .send(&format!("Staking failed: {}", failure))
            .await;
        None
    }
}
