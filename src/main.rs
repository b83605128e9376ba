use clap::Parser;
use stakebot::api::{BinanceClient, MarketClient, RoninClient, TelegramNotifier};
use stakebot::config::{Settings, DEFAULT_CONFIG_PATH};
use stakebot::execution::{ControllerSettings, WorkflowController};
use stakebot::logging::{self, DEFAULT_LOG_DIR};
use stakebot::strategy::SignalEvaluator;
use stakebot::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "stakebot",
    version,
    about = "Buys AXS on dips, withdraws it to Ronin and stakes it"
)]
struct Cli {
    /// INI configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Evaluate the buy signal once, print it and exit without trading
    #[arg(long)]
    evaluate_only: bool,

    /// Tracing filter, overrides RUST_LOG
    #[arg(long)]
    log_filter: Option<String>,

    /// Directory holding bot.log
    #[arg(long, default_value = DEFAULT_LOG_DIR)]
    log_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging::init(cli.log_filter.as_deref(), &cli.log_dir)?;

    tracing::info!("🚀 StakeBot starting with {}", cli.config.display());

    let settings = Settings::load(&cli.config)?;
    let timeout = settings.bot_settings.request_timeout();
    let controller_settings = ControllerSettings::from_settings(&settings);

    let market = BinanceClient::from_settings(&settings.binance, timeout)?;
    let chain = RoninClient::from_settings(&settings.ronin, timeout)?;
    tracing::info!("Ronin wallet {}", chain.wallet_address());

    if cli.evaluate_only {
        return evaluate_once(&market, &chain, &controller_settings).await;
    }

    let notifier = TelegramNotifier::from_settings(&settings.telegram, timeout)?;
    if notifier.is_none() {
        tracing::info!("Telegram notifications disabled");
    }

    let controller = WorkflowController::new(market, chain, notifier, controller_settings);

    let mut signals = ShutdownSignals::install()?;
    let run = controller.run();
    tokio::pin!(run);

    tokio::select! {
        _ = &mut run => {}
        name = signals.recv() => {
            tracing::info!("⚠️  Received {}, shutting down...", name);
            controller.stop().await;
            if controller.pipeline_in_flight() {
                tracing::info!("Waiting for the in-flight pipeline, send the signal again to force exit");
            }

            tokio::select! {
                _ = &mut run => {}
                name = signals.recv() => {
                    tracing::warn!(
                        "Received {} again, forcing exit. A pipeline may be left mid-stage; check the exchange and the Ronin wallet",
                        name
                    );
                    std::process::exit(130);
                }
            }
        }
    }

    tracing::info!("👋 StakeBot stopped");
    Ok(())
}

async fn evaluate_once(
    market: &BinanceClient,
    chain: &RoninClient,
    settings: &ControllerSettings,
) -> Result<()> {
    let evaluator = SignalEvaluator::new(settings.signal.clone());
    let signal = evaluator.config();
    let decision = evaluator.try_evaluate(market).await?;
    let quote_balance = market.balance(&settings.pipeline.quote_asset).await?;
    let wallet_balance = chain.token_balance().await?;

    println!("Symbol:          {}", signal.symbol);
    println!("Current price:   {:.4}", decision.current_price);
    println!("24h average:     {:.4}", decision.average_price);
    println!("RSI({}):         {:.2}", signal.rsi_period, decision.rsi);
    println!("Should buy:      {}", decision.should_buy);
    println!(
        "{} balance:    {} (need {})",
        settings.pipeline.quote_asset, quote_balance, settings.quote_amount
    );
    println!(
        "Wallet {}:     {}",
        settings.pipeline.base_asset, wallet_balance
    );
    Ok(())
}

/// SIGINT and SIGTERM streams, installed once so a repeated signal is seen
#[cfg(unix)]
struct ShutdownSignals {
    sigint: tokio::signal::unix::Signal,
    sigterm: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
        })
    }

    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.sigint.recv() => "SIGINT",
            _ = self.sigterm.recv() => "SIGTERM",
        }
    }
}

#[cfg(not(unix))]
struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
    fn install() -> std::io::Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> &'static str {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        "Ctrl+C"
    }
}
