use crate::api::{ChainClient, MarketClient, Notifier};
use crate::config::Settings;
use crate::execution::pipeline::{PipelineOutcome, PipelineSettings, StakePipeline};
use crate::models::Decision;
use crate::strategy::{SignalConfig, SignalEvaluator};
use crate::Result;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Quote amount spent per buy
    pub quote_amount: Decimal,
    pub poll_interval: Duration,
    /// Pause after a failed iteration before trying again
    pub error_cooldown: Duration,
    pub signal: SignalConfig,
    pub pipeline: PipelineSettings,
}

impl ControllerSettings {
    pub fn from_settings(settings: &Settings) -> Self {
        let bot = &settings.bot_settings;
        Self {
            quote_amount: bot.usdt_amount,
            poll_interval: bot.poll_interval(),
            error_cooldown: Duration::from_secs(bot.error_cooldown),
            signal: SignalConfig::for_symbol(bot.symbol.as_str()),
            pipeline: PipelineSettings::from_settings(settings),
        }
    }
}

/// What a single iteration did
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    InsufficientBalance { balance: Decimal },
    NoSignal(Decision),
    Pipeline(PipelineOutcome),
}

/// Polls the market and runs the stake pipeline whenever the buy signal fires
pub struct WorkflowController<M, C, N> {
    market: M,
    chain: C,
    notifier: N,
    evaluator: SignalEvaluator,
    settings: ControllerSettings,
    running: AtomicBool,
    in_pipeline: AtomicBool,
    wake: Notify,
}

impl<M, C, N> WorkflowController<M, C, N>
where
    M: MarketClient,
    C: ChainClient,
    N: Notifier,
{
    pub fn new(market: M, chain: C, notifier: N, settings: ControllerSettings) -> Self {
        Self {
            market,
            chain,
            notifier,
            evaluator: SignalEvaluator::new(settings.signal.clone()),
            settings,
            running: AtomicBool::new(false),
            in_pipeline: AtomicBool::new(false),
            wake: Notify::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// True between the buy and the end of the stake stage
    pub fn pipeline_in_flight(&self) -> bool {
        self.in_pipeline.load(Ordering::SeqCst)
    }

    /// Loop until [`stop`](Self::stop). No iteration error escapes: it is
    /// reported and retried after the cooldown.
    pub async fn run(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("Controller already running");
            return;
        }

        tracing::info!(
            "Bot started: {} {} per buy, checking every {:?}",
            self.settings.quote_amount,
            self.settings.pipeline.quote_asset,
            self.settings.poll_interval
        );
        self.notifier.send("Bot started").await;

        while self.is_running() {
            match self.tick().await {
                Ok(outcome) => {
                    tracing::debug!(?outcome, "Iteration finished");
                    self.idle(self.settings.poll_interval).await;
                }
                Err(e) => {
                    tracing::error!("Error in main loop: {}", e);
                    self.notifier.send(&format!("Error occurred: {}", e)).await;
                    self.idle(self.settings.error_cooldown).await;
                }
            }
        }

        tracing::info!("Main loop exited");
    }

    /// Request shutdown. Only the first call after a start reports it.
    /// A pipeline already in flight is allowed to finish its current stage
    /// chain; only idle waits are cut short.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.wake.notify_waiters();

        tracing::info!("Bot stopped");
        self.notifier.send("Bot stopped").await;
    }

    /// One iteration: balance check, signal, and the pipeline if it fires
    pub async fn tick(&self) -> Result<TickOutcome> {
        let quote_asset = &self.settings.pipeline.quote_asset;
        let balance = self.market.balance(quote_asset).await?;

        if balance < self.settings.quote_amount {
            tracing::debug!(
                "Insufficient {} balance: {} < {}",
                quote_asset,
                balance,
                self.settings.quote_amount
            );
            return Ok(TickOutcome::InsufficientBalance { balance });
        }

        let decision = self.evaluator.evaluate(&self.market).await;
        if !decision.should_buy {
            return Ok(TickOutcome::NoSignal(decision));
        }

        let pipeline = StakePipeline::new(
            &self.market,
            &self.chain,
            &self.notifier,
            &self.settings.pipeline,
        );
        self.in_pipeline.store(true, Ordering::SeqCst);
        let outcome = pipeline.run(self.settings.quote_amount).await;
        self.in_pipeline.store(false, Ordering::SeqCst);

        Ok(TickOutcome::Pipeline(outcome))
    }

    /// Sleep for `duration` unless stopped first
    async fn idle(&self, duration: Duration) {
        // Registered before the flag check so a concurrent stop() is never missed
        let stopped = self.wake.notified();
        if !self.is_running() {
            return;
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = stopped => {}
        }
    }
}
