use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.ini";
const ENV_PREFIX: &str = "STAKEBOT";

// Ronin mainnet
const AXS_CONTRACT: &str = "0x97a9107C1793BC407d6F527b77e7fff4D812bece";
const STAKING_CONTRACT: &str = "0x05b0bb3c1c320b280501b86706c3551995bc8571";

/// Static bot configuration, loaded once at startup
///
/// Sources, later ones win:
/// 1. INI file (`config/config.ini` by default)
/// 2. Environment variables such as `STAKEBOT_BINANCE__API_SECRET`
#[derive(Clone, Deserialize)]
pub struct Settings {
    pub binance: BinanceSettings,
    pub ronin: RoninSettings,
    #[serde(default)]
    pub telegram: TelegramSettings,
    pub bot_settings: BotSettings,
}

#[derive(Clone, Deserialize)]
pub struct BinanceSettings {
    pub api_key: String,
    pub api_secret: String,
    #[serde(default = "default_binance_url")]
    pub base_url: String,
    #[serde(default = "default_recv_window")]
    pub recv_window: u64,
}

#[derive(Clone, Deserialize)]
pub struct RoninSettings {
    pub private_key: String,
    pub wallet_address: String,
    #[serde(default = "default_ronin_rpc")]
    pub rpc_url: String,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    #[serde(default = "default_token_contract")]
    pub token_contract: String,
    #[serde(default = "default_staking_contract")]
    pub staking_contract: String,
    #[serde(default = "default_abi_dir")]
    pub abi_dir: String,
    #[serde(default = "default_approve_gas")]
    pub approve_gas_limit: u64,
    #[serde(default = "default_stake_gas")]
    pub stake_gas_limit: u64,
}

#[derive(Clone, Default, Deserialize)]
pub struct TelegramSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub bot_token: Option<String>,
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default = "default_telegram_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotSettings {
    /// Quote amount spent per buy
    pub usdt_amount: Decimal,
    /// Poll interval in seconds
    pub check_interval: u64,
    #[serde(default = "default_symbol")]
    pub symbol: String,
    #[serde(default = "default_base_asset")]
    pub base_asset: String,
    #[serde(default = "default_quote_asset")]
    pub quote_asset: String,
    #[serde(default = "default_network")]
    pub withdraw_network: String,
    #[serde(default = "default_settlement_delay")]
    pub settlement_delay: u64,
    #[serde(default = "default_bridge_delay")]
    pub bridge_delay: u64,
    #[serde(default = "default_error_cooldown")]
    pub error_cooldown: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

impl Settings {
    /// Load from an INI file plus `STAKEBOT_*` environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let builder = Config::builder()
            .add_source(File::from(path).format(FileFormat::Ini).required(true))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            );

        Self::build(builder)
    }

    /// Parse INI text without consulting the environment
    pub fn from_ini_str(text: &str) -> Result<Self, ConfigError> {
        Self::build(Config::builder().add_source(File::from_str(text, FileFormat::Ini)))
    }

    fn build(
        builder: ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let bot = &self.bot_settings;
        if bot.usdt_amount <= Decimal::ZERO {
            return Err(ConfigError::Invalid(format!(
                "bot_settings.usdt_amount must be positive, got {}",
                bot.usdt_amount
            )));
        }
        if bot.check_interval == 0 {
            return Err(ConfigError::Invalid(
                "bot_settings.check_interval must be at least 1 second".to_string(),
            ));
        }
        if self.binance.api_key.is_empty() || self.binance.api_secret.is_empty() {
            return Err(ConfigError::Invalid(
                "binance.api_key and binance.api_secret are required".to_string(),
            ));
        }
        if self.ronin.private_key.is_empty() || self.ronin.wallet_address.is_empty() {
            return Err(ConfigError::Invalid(
                "ronin.private_key and ronin.wallet_address are required".to_string(),
            ));
        }
        if self.telegram.enabled && self.telegram.credentials().is_none() {
            return Err(ConfigError::Invalid(
                "telegram.bot_token and telegram.chat_id are required when telegram is enabled"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

impl TelegramSettings {
    /// Bot token and chat id, if both are set and non-empty
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let token = self.bot_token.as_deref().filter(|t| !t.is_empty())?;
        let chat_id = self.chat_id.as_deref().filter(|c| !c.is_empty())?;
        Some((token, chat_id))
    }
}

impl BotSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

fn default_binance_url() -> String {
    "https://api.binance.com".to_string()
}

fn default_recv_window() -> u64 {
    5000
}

fn default_ronin_rpc() -> String {
    "https://api.roninchain.com/rpc".to_string()
}

fn default_chain_id() -> u64 {
    2020
}

fn default_token_contract() -> String {
    AXS_CONTRACT.to_string()
}

fn default_staking_contract() -> String {
    STAKING_CONTRACT.to_string()
}

fn default_abi_dir() -> String {
    "config/abi".to_string()
}

fn default_approve_gas() -> u64 {
    100_000
}

fn default_stake_gas() -> u64 {
    300_000
}

fn default_telegram_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_symbol() -> String {
    "AXSUSDT".to_string()
}

fn default_base_asset() -> String {
    "AXS".to_string()
}

fn default_quote_asset() -> String {
    "USDT".to_string()
}

fn default_network() -> String {
    "RON".to_string()
}

fn default_settlement_delay() -> u64 {
    10
}

fn default_bridge_delay() -> u64 {
    900
}

fn default_error_cooldown() -> u64 {
    60
}

fn default_request_timeout() -> u64 {
    30
}
