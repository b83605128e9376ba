use super::MarketClient;
use crate::config::BinanceSettings;
use crate::error::ApiError;
use crate::models::{Candle, Order, OrderStatus, WithdrawalHandle};
use crate::Result;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, Response, Url};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use std::time::Duration;

// Binance Spot REST API
// Docs: https://developers.binance.com/docs/binance-spot-api-docs/rest-api
const BINANCE_API_BASE: &str = "https://api.binance.com";
const DEFAULT_RECV_WINDOW: u64 = 5000;
const API_KEY_HEADER: &str = "X-MBX-APIKEY";

type HmacSha256 = Hmac<Sha256>;

/// Client for the Binance spot and wallet APIs
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    recv_window: u64,
}

// ============== Response Types ==============

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: i64,
    msg: String,
}

#[derive(Debug, Deserialize)]
struct TickerPrice {
    price: String,
}

#[derive(Debug, Deserialize)]
struct AccountInfo {
    balances: Vec<AssetBalance>,
}

#[derive(Debug, Deserialize)]
struct AssetBalance {
    asset: String,
    free: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    symbol: String,
    order_id: u64,
    client_order_id: String,
    status: OrderStatus,
    executed_qty: Decimal,
    cummulative_quote_qty: Decimal,
}

#[derive(Debug, Deserialize)]
struct WithdrawResponse {
    #[serde(default)]
    id: Option<String>,
}

impl From<OrderResponse> for Order {
    fn from(raw: OrderResponse) -> Self {
        Order {
            order_id: raw.order_id,
            client_order_id: raw.client_order_id,
            symbol: raw.symbol,
            status: raw.status,
            executed_qty: raw.executed_qty,
            quote_qty: raw.cummulative_quote_qty,
        }
    }
}

impl BinanceClient {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: BINANCE_API_BASE.to_string(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            recv_window: DEFAULT_RECV_WINDOW,
        }
    }

    pub fn from_settings(settings: &BinanceSettings, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            api_secret: settings.api_secret.clone(),
            recv_window: settings.recv_window,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// HMAC-SHA256 of the exact query string, hex encoded
    fn sign(&self, query: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(query.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn url(&self, path: &str, params: &[(&str, String)]) -> Result<Url> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path))?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn get_public<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let url = self.url(path, params)?;
        let response = self.client.get(url).send().await?;
        Self::decode(response).await
    }

    /// Send a USER_DATA / TRADE request: timestamp and recvWindow are appended,
    /// then the signature over the resulting query string
    async fn send_signed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let mut params = params.to_vec();
        params.push(("recvWindow", self.recv_window.to_string()));
        params.push(("timestamp", Utc::now().timestamp_millis().to_string()));

        let mut url = self.url(path, &params)?;
        let signature = self.sign(url.query().unwrap_or_default());
        url.query_pairs_mut().append_pair("signature", &signature);

        let response = self
            .client
            .request(method, url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorBody>(&body) {
            Ok(err) => Err(ApiError::Binance {
                code: err.code,
                msg: err.msg,
            }
            .into()),
            Err(_) => Err(ApiError::InvalidResponse(format!("HTTP {}: {}", status, body)).into()),
        }
    }
}

/// Kline rows are positional arrays:
/// `[openTime, open, high, low, close, volume, closeTime, ...]`
fn parse_kline(row: &[Value]) -> Result<Candle> {
    if row.len() < 7 {
        return Err(ApiError::InvalidResponse(format!("kline row too short: {:?}", row)).into());
    }

    let time = |idx: usize| -> Result<DateTime<Utc>> {
        row[idx]
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .ok_or_else(|| ApiError::InvalidResponse(format!("bad kline time: {}", row[idx])).into())
    };
    let number = |idx: usize| -> Result<f64> {
        match &row[idx] {
            Value::String(s) => Ok(s.parse::<f64>()?),
            Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| ApiError::InvalidResponse(format!("bad kline value: {}", n)).into()),
            other => Err(ApiError::InvalidResponse(format!("bad kline value: {}", other)).into()),
        }
    };

    Ok(Candle {
        open_time: time(0)?,
        open: number(1)?,
        high: number(2)?,
        low: number(3)?,
        close: number(4)?,
        volume: number(5)?,
        close_time: time(6)?,
    })
}

impl MarketClient for BinanceClient {
    async fn balance(&self, asset: &str) -> Result<Decimal> {
        let account: AccountInfo = self
            .send_signed(Method::GET, "/api/v3/account", &[("omitZeroBalances", "true".to_string())])
            .await?;

        Ok(account
            .balances
            .into_iter()
            .find(|b| b.asset == asset)
            .map(|b| b.free)
            .unwrap_or(Decimal::ZERO))
    }

    async fn candles(&self, pair: &str, interval: &str, limit: u16) -> Result<Vec<Candle>> {
        let rows: Vec<Vec<Value>> = self
            .get_public(
                "/api/v3/klines",
                &[
                    ("symbol", pair.to_string()),
                    ("interval", interval.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        rows.iter().map(|row| parse_kline(row)).collect()
    }

    async fn current_price(&self, pair: &str) -> Result<f64> {
        let ticker: TickerPrice = self
            .get_public("/api/v3/ticker/price", &[("symbol", pair.to_string())])
            .await?;
        Ok(ticker.price.parse()?)
    }

    async fn place_market_buy(&self, pair: &str, quote_amount: Decimal) -> Result<Option<Order>> {
        let client_order_id = format!("stakebot-{}", uuid::Uuid::new_v4().simple());
        tracing::debug!(%pair, %quote_amount, %client_order_id, "Placing market buy");

        let response: OrderResponse = self
            .send_signed(
                Method::POST,
                "/api/v3/order",
                &[
                    ("symbol", pair.to_string()),
                    ("side", "BUY".to_string()),
                    ("type", "MARKET".to_string()),
                    ("quoteOrderQty", quote_amount.normalize().to_string()),
                    ("newClientOrderId", client_order_id),
                    ("newOrderRespType", "RESULT".to_string()),
                ],
            )
            .await?;

        Ok(Some(response.into()))
    }

    async fn withdraw(
        &self,
        asset: &str,
        address: &str,
        amount: Decimal,
        network: &str,
    ) -> Result<Option<WithdrawalHandle>> {
        let response: WithdrawResponse = self
            .send_signed(
                Method::POST,
                "/sapi/v1/capital/withdraw/apply",
                &[
                    ("coin", asset.to_string()),
                    ("address", address.to_string()),
                    ("amount", amount.normalize().to_string()),
                    ("network", network.to_string()),
                ],
            )
            .await?;

        Ok(response
            .id
            .filter(|id| !id.is_empty())
            .map(WithdrawalHandle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client(server: &mockito::ServerGuard) -> BinanceClient {
        BinanceClient::new("test-key", "test-secret").with_base_url(server.url())
    }

    #[test]
    fn test_signature_matches_documented_example() {
        let client = BinanceClient::new(
            "vmPUZE6mv9SD5VNHk4HlWFsOr6aKE2zvsw0MuIgwCIPy6utIco14y7Ju91duEh8A",
            "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j",
        );
        let query = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";

        assert_eq!(
            client.sign(query),
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[tokio::test]
    async fn test_current_price() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v3/ticker/price")
            .match_query(Matcher::UrlEncoded("symbol".into(), "AXSUSDT".into()))
            .with_header("content-type", "application/json")
            .with_body(r#"{"symbol":"AXSUSDT","price":"6.12000000"}"#)
            .create_async()
            .await;

        let price = client(&server).current_price("AXSUSDT").await.unwrap();

        mock.assert_async().await;
        assert_eq!(price, 6.12);
    }

    #[tokio::test]
    async fn test_candles_decoding() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v3/klines")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("symbol".into(), "AXSUSDT".into()),
                Matcher::UrlEncoded("interval".into(), "1h".into()),
                Matcher::UrlEncoded("limit".into(), "2".into()),
            ]))
            .with_body(
                r#"[
                    [1700000000000,"6.10","6.30","6.00","6.20","1500.5",1700003599999,"9300.1",120,"700.0","4340.0","0"],
                    [1700003600000,"6.20","6.25","5.90","5.95","2100.0",1700007199999,"12600.0",150,"900.0","5400.0","0"]
                ]"#,
            )
            .create_async()
            .await;

        let candles = client(&server).candles("AXSUSDT", "1h", 2).await.unwrap();

        mock.assert_async().await;
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].close, 6.20);
        assert_eq!(candles[1].low, 5.90);
        assert_eq!(candles[1].volume, 2100.0);
        assert_eq!(candles[0].open_time.timestamp_millis(), 1_700_000_000_000);
        assert!(candles[0].close_time < candles[1].open_time);
    }

    #[test]
    fn test_short_kline_row_is_rejected() {
        let row: Vec<Value> = serde_json::from_str(r#"[1700000000000,"6.10"]"#).unwrap();
        assert!(parse_kline(&row).is_err());
    }

    #[tokio::test]
    async fn test_balance_is_signed() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v3/account")
            .match_header("X-MBX-APIKEY", "test-key")
            .match_query(Matcher::AllOf(vec![
                Matcher::Regex("timestamp=\\d+".into()),
                Matcher::Regex("recvWindow=5000".into()),
                Matcher::Regex("signature=[0-9a-f]{64}$".into()),
            ]))
            .with_body(
                r#"{"balances":[
                    {"asset":"USDT","free":"150.50000000","locked":"0.00000000"},
                    {"asset":"AXS","free":"2.00000000","locked":"0.00000000"}
                ]}"#,
            )
            .expect(2)
            .create_async()
            .await;

        let client = client(&server);
        let usdt = client.balance("USDT").await.unwrap();
        let bnb = client.balance("BNB").await.unwrap();

        mock.assert_async().await;
        assert_eq!(usdt, Decimal::new(1505, 1));
        assert_eq!(bnb, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_market_buy() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v3/order")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("symbol".into(), "AXSUSDT".into()),
                Matcher::UrlEncoded("side".into(), "BUY".into()),
                Matcher::UrlEncoded("type".into(), "MARKET".into()),
                Matcher::UrlEncoded("quoteOrderQty".into(), "100".into()),
                Matcher::Regex("newClientOrderId=stakebot-[0-9a-f]{32}".into()),
            ]))
            .with_body(
                r#"{"symbol":"AXSUSDT","orderId":28,"orderListId":-1,
                    "clientOrderId":"stakebot-abc","transactTime":1507725176595,
                    "price":"0.00000000","origQty":"16.30000000","executedQty":"16.30000000",
                    "cummulativeQuoteQty":"99.75600000","status":"FILLED",
                    "timeInForce":"GTC","type":"MARKET","side":"BUY"}"#,
            )
            .create_async()
            .await;

        let order = client(&server)
            .place_market_buy("AXSUSDT", Decimal::new(10000, 2))
            .await
            .unwrap()
            .unwrap();

        mock.assert_async().await;
        assert!(order.is_filled());
        assert_eq!(order.order_id, 28);
        assert_eq!(order.executed_qty, Decimal::new(163, 1));
        assert_eq!(order.quote_qty, Decimal::new(99756, 3));
    }

    #[tokio::test]
    async fn test_api_error_is_decoded() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v3/order")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"code":-2010,"msg":"Account has insufficient balance for requested action."}"#)
            .create_async()
            .await;

        let err = client(&server)
            .place_market_buy("AXSUSDT", Decimal::from(100))
            .await
            .unwrap_err();

        let api_err = err.downcast_ref::<ApiError>().unwrap();
        assert!(matches!(api_err, ApiError::Binance { code: -2010, .. }));
    }

    #[tokio::test]
    async fn test_non_json_error_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v3/ticker/price")
            .match_query(Matcher::Any)
            .with_status(502)
            .with_body("Bad Gateway")
            .create_async()
            .await;

        let err = client(&server).current_price("AXSUSDT").await.unwrap_err();
        assert!(err.to_string().contains("502"));
    }

    #[tokio::test]
    async fn test_withdraw() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/sapi/v1/capital/withdraw/apply")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("coin".into(), "AXS".into()),
                Matcher::UrlEncoded("address".into(), "0xabc".into()),
                Matcher::UrlEncoded("amount".into(), "16.3".into()),
                Matcher::UrlEncoded("network".into(), "RON".into()),
            ]))
            .with_body(r#"{"id":"7213fea8e94b4a5593d507237e5a555b"}"#)
            .create_async()
            .await;

        let handle = client(&server)
            .withdraw("AXS", "0xabc", Decimal::new(16300, 3), "RON")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(
            handle,
            Some(WithdrawalHandle("7213fea8e94b4a5593d507237e5a555b".to_string()))
        );
    }

    #[tokio::test]
    async fn test_withdraw_without_id() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/sapi/v1/capital/withdraw/apply")
            .match_query(Matcher::Any)
            .with_body(r#"{}"#)
            .create_async()
            .await;

        let handle = client(&server)
            .withdraw("AXS", "0xabc", Decimal::from(1), "RON")
            .await
            .unwrap();
        assert!(handle.is_none());
    }
}
