pub mod abi;
pub mod tx;

use super::ChainClient;
use crate::config::RoninSettings;
use crate::error::ApiError;
use crate::models::StakeReceipt;
use crate::Result;
use abi::{decode_uint, encode_call, ContractAbi, Token};
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tx::{format_address, parse_address, LegacyTransaction, Wallet};

const TOKEN_ABI_FILE: &str = "axs_token_abi.json";
const STAKING_ABI_FILE: &str = "staking_contract_abi.json";
const TOKEN_DECIMALS: u32 = 18;

/// Client for the staking contract on Ronin, signing locally with the wallet key
pub struct RoninClient {
    client: Client,
    rpc_url: String,
    chain_id: u64,
    wallet: Wallet,
    token: [u8; 20],
    staking: [u8; 20],
    token_abi: ContractAbi,
    staking_abi: ContractAbi,
    approve_gas_limit: u64,
    stake_gas_limit: u64,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// Raw `uint256` to a token amount with 18 decimals
fn from_base_units(value: u128) -> Result<Decimal> {
    let value = i128::try_from(value).map_err(|_| "token amount out of range")?;
    Ok(Decimal::try_from_i128_with_scale(value, TOKEN_DECIMALS)?)
}

/// Token amount to raw units, truncating anything below 1e-18
fn to_base_units(amount: Decimal) -> Result<u128> {
    let scale = Decimal::from(10u64.pow(TOKEN_DECIMALS));
    amount
        .checked_mul(scale)
        .and_then(|raw| raw.trunc().to_u128())
        .ok_or_else(|| format!("cannot convert {} to token base units", amount).into())
}

fn parse_quantity(quantity: &str) -> Result<u128> {
    let digits = quantity.trim_start_matches("0x");
    if digits.is_empty() {
        return Ok(0);
    }
    Ok(u128::from_str_radix(digits, 16)?)
}

impl RoninClient {
    /// Build from settings, loading ABIs from `abi_dir`
    ///
    /// Fails if an ABI file is missing, a required function is absent, or the
    /// private key does not belong to the configured wallet address.
    pub fn from_settings(settings: &RoninSettings, timeout: Duration) -> Result<Self> {
        let abi_dir = Path::new(&settings.abi_dir);
        let token_abi = ContractAbi::load(&abi_dir.join(TOKEN_ABI_FILE))?;
        let staking_abi = ContractAbi::load(&abi_dir.join(STAKING_ABI_FILE))?;

        let client = Client::builder().timeout(timeout).build()?;
        let mut ronin = Self::new(
            client,
            &settings.rpc_url,
            settings.chain_id,
            &settings.private_key,
            &settings.wallet_address,
            &settings.token_contract,
            &settings.staking_contract,
            token_abi,
            staking_abi,
        )?;
        ronin.approve_gas_limit = settings.approve_gas_limit;
        ronin.stake_gas_limit = settings.stake_gas_limit;
        Ok(ronin)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: Client,
        rpc_url: &str,
        chain_id: u64,
        private_key: &str,
        wallet_address: &str,
        token_contract: &str,
        staking_contract: &str,
        token_abi: ContractAbi,
        staking_abi: ContractAbi,
    ) -> Result<Self> {
        let wallet = Wallet::from_private_key(private_key)?;
        let configured = parse_address(wallet_address)?;
        if configured != wallet.address() {
            return Err(format!(
                "private key belongs to {}, not to configured wallet {}",
                wallet.address_hex(),
                wallet_address
            )
            .into());
        }

        // Every function we call must exist in the loaded ABIs
        for function in ["balanceOf", "allowance", "approve"] {
            token_abi.selector(function)?;
        }
        staking_abi.selector("stake")?;

        Ok(Self {
            client,
            rpc_url: rpc_url.to_string(),
            chain_id,
            wallet,
            token: parse_address(token_contract)?,
            staking: parse_address(staking_contract)?,
            token_abi,
            staking_abi,
            approve_gas_limit: 100_000,
            stake_gas_limit: 300_000,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn wallet_address(&self) -> String {
        self.wallet.address_hex()
    }

    async fn rpc<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response: RpcResponse<T> = self
            .client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(err) = response.error {
            return Err(ApiError::Rpc {
                code: err.code,
                message: err.message,
            }
            .into());
        }

        response
            .result
            .ok_or_else(|| ApiError::InvalidResponse(format!("{} returned no result", method)).into())
    }

    async fn eth_call(&self, to: &[u8; 20], data: Vec<u8>) -> Result<String> {
        self.rpc(
            "eth_call",
            json!([
                { "to": format_address(to), "data": format!("0x{}", hex::encode(data)) },
                "latest"
            ]),
        )
        .await
    }

    async fn pending_nonce(&self) -> Result<u64> {
        let nonce: String = self
            .rpc(
                "eth_getTransactionCount",
                json!([self.wallet.address_hex(), "pending"]),
            )
            .await?;
        Ok(u64::try_from(parse_quantity(&nonce)?)?)
    }

    async fn gas_price(&self) -> Result<u128> {
        let price: String = self.rpc("eth_gasPrice", json!([])).await?;
        parse_quantity(&price)
    }

    async fn send_transaction(&self, tx: &LegacyTransaction) -> Result<String> {
        let raw = tx.sign(&self.wallet)?;
        self.rpc(
            "eth_sendRawTransaction",
            json!([format!("0x{}", hex::encode(raw))]),
        )
        .await
    }

    /// Token balance of the wallet
    pub async fn token_balance(&self) -> Result<Decimal> {
        let data = encode_call(
            self.token_abi.selector("balanceOf")?,
            &[Token::Address(self.wallet.address())],
        );
        let result = self.eth_call(&self.token, data).await?;
        from_base_units(decode_uint(&result)?)
    }

    /// How much the staking contract may pull from the wallet
    pub async fn allowance(&self) -> Result<u128> {
        let data = encode_call(
            self.token_abi.selector("allowance")?,
            &[Token::Address(self.wallet.address()), Token::Address(self.staking)],
        );
        let result = self.eth_call(&self.token, data).await?;
        decode_uint(&result)
    }
}

impl ChainClient for RoninClient {
    /// Approve (when the allowance is short) and stake in nonce order, so the
    /// stake executes after the approval without waiting for a receipt
    async fn stake(&self, amount: Decimal) -> Result<Option<StakeReceipt>> {
        let raw_amount = to_base_units(amount)?;
        if raw_amount == 0 {
            return Err(format!("stake amount {} rounds to zero", amount).into());
        }

        let allowance = self.allowance().await?;
        let gas_price = self.gas_price().await?;
        let mut nonce = self.pending_nonce().await?;

        if allowance < raw_amount {
            let approve = LegacyTransaction {
                nonce,
                gas_price,
                gas_limit: self.approve_gas_limit,
                to: self.token,
                value: 0,
                data: encode_call(
                    self.token_abi.selector("approve")?,
                    &[Token::Address(self.staking), Token::Uint(raw_amount)],
                ),
                chain_id: self.chain_id,
            };
            let approve_hash = self.send_transaction(&approve).await?;
            tracing::info!(tx = %approve_hash, %amount, "Submitted staking approval");
            nonce += 1;
        }

        let stake = LegacyTransaction {
            nonce,
            gas_price,
            gas_limit: self.stake_gas_limit,
            to: self.staking,
            value: 0,
            data: encode_call(self.staking_abi.selector("stake")?, &[Token::Uint(raw_amount)]),
            chain_id: self.chain_id,
        };
        let tx_hash = self.send_transaction(&stake).await?;

        if tx_hash.is_empty() {
            return Ok(None);
        }
        Ok(Some(StakeReceipt { tx_hash }))
    }
}
