use crate::api::MarketClient;
use crate::indicators::calculate_rsi;
use crate::models::{Decision, PriceSeries};

/// Configuration for the dip-buy signal
#[derive(Debug, Clone)]
pub struct SignalConfig {
    pub symbol: String,
    pub interval: String,
    /// Candles averaged for the reference price (24 x 1h = one day)
    pub average_window: u16,
    pub rsi_period: u16,
    /// Buy only below `average * discount_factor` (0.95 = at least 5% under)
    pub discount_factor: f64,
    pub rsi_oversold: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            symbol: "AXSUSDT".to_string(),
            interval: "1h".to_string(),
            average_window: 24,
            rsi_period: 14,
            discount_factor: 0.95,
            rsi_oversold: 30.0,
        }
    }
}

impl SignalConfig {
    pub fn for_symbol(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Default::default()
        }
    }
}

impl Decision {
    /// Buy iff the price is sufficiently below the average AND RSI is oversold
    pub fn from_signals(
        current_price: f64,
        average_price: f64,
        rsi: f64,
        config: &SignalConfig,
    ) -> Self {
        let price_condition = current_price < average_price * config.discount_factor;
        let rsi_condition = rsi < config.rsi_oversold;

        Self {
            should_buy: price_condition && rsi_condition,
            current_price,
            average_price,
            rsi,
        }
    }
}

/// Derives the buy decision from live market data
#[derive(Debug, Clone, Default)]
pub struct SignalEvaluator {
    config: SignalConfig,
}

impl SignalEvaluator {
    pub fn new(config: SignalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    /// Fail-closed evaluation: any fetch or arithmetic error is logged and
    /// reported as "don't buy"
    pub async fn evaluate<M: MarketClient>(&self, market: &M) -> Decision {
        match self.try_evaluate(market).await {
            Ok(decision) => {
                if decision.should_buy {
                    tracing::info!(
                        price = decision.current_price,
                        average = decision.average_price,
                        rsi = decision.rsi,
                        "Buy conditions met"
                    );
                } else {
                    tracing::debug!(
                        price = decision.current_price,
                        average = decision.average_price,
                        rsi = decision.rsi,
                        "Buy conditions not met"
                    );
                }
                decision
            }
            Err(e) => {
                tracing::error!("Price analysis failed: {:#}", e);
                Decision::no_buy()
            }
        }
    }

    /// Same as [`evaluate`](Self::evaluate) but keeps evaluation errors apart
    /// from a negative decision
    pub async fn try_evaluate<M: MarketClient>(&self, market: &M) -> anyhow::Result<Decision> {
        let cfg = &self.config;

        let candles = market
            .candles(&cfg.symbol, &cfg.interval, cfg.average_window)
            .await
            .map_err(|e| anyhow::anyhow!("failed to fetch candles: {}", e))?;
        let series = PriceSeries::new(cfg.symbol.as_str(), cfg.interval.as_str(), candles);

        let current_price = market
            .current_price(&cfg.symbol)
            .await
            .map_err(|e| anyhow::anyhow!("failed to fetch current price: {}", e))?;
        if !current_price.is_finite() || current_price <= 0.0 {
            anyhow::bail!("invalid current price {}", current_price);
        }

        let Some(average_price) = series.mean_close() else {
            anyhow::bail!("no candles returned for {}", cfg.symbol);
        };

        let rsi = self.rsi(market).await?;

        Ok(Decision::from_signals(current_price, average_price, rsi, cfg))
    }

    /// RSI over `period + 1` candles of the configured interval
    async fn rsi<M: MarketClient>(&self, market: &M) -> anyhow::Result<f64> {
        let cfg = &self.config;
        let period = cfg.rsi_period as usize;

        let candles = market
            .candles(&cfg.symbol, &cfg.interval, cfg.rsi_period + 1)
            .await
            .map_err(|e| anyhow::anyhow!("failed to fetch RSI candles: {}", e))?;
        let closes = PriceSeries::new(cfg.symbol.as_str(), cfg.interval.as_str(), candles).closes();

        calculate_rsi(&closes, period).ok_or_else(|| {
            anyhow::anyhow!(
                "not enough data for RSI({}): got {} candles",
                period,
                closes.len()
            )
        })
    }
}
