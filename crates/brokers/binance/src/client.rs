use async_trait::async_trait;
use chrono::Utc;
use futdesk_core::*;
use reqwest::Method;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::protocol::*;
use crate::signer::{build_query_string, RequestSigner};

/// Configuration for connecting to Binance USD-M Futures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinanceConfig {
    /// REST base URL, without the `/fapi` prefix.
    pub base_url: String,
    /// recvWindow sent with signed account reads. Not read from the
    /// `[exchange]` table; the binary copies the desk's value in.
    #[serde(skip)]
    pub recv_window_ms: u64,
    /// Per-request transport timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://testnet.binancefuture.com".to_string(),
            recv_window_ms: DEFAULT_RECV_WINDOW_MS,
            timeout_secs: 10,
        }
    }
}

/// Binance futures REST client bound to one API key.
pub struct BinanceFuturesClient {
    config: BinanceConfig,
    http: reqwest::Client,
    api_key: String,
    signer: RequestSigner,
    /// Server time minus local time, applied to signed timestamps.
    time_offset_ms: i64,
}

impl BinanceFuturesClient {
    pub fn new(config: BinanceConfig, credentials: &Credentials) -> Result<Self, ExchangeError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ExchangeError::Transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            config,
            http,
            api_key: credentials.api_key.clone(),
            signer: RequestSigner::new(credentials.api_secret.clone()),
            time_offset_ms: 0,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn timestamp(&self) -> i64 {
        Utc::now().timestamp_millis() + self.time_offset_ms
    }

    async fn get_public<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ExchangeError> {
        let mut url = self.url(path);
        if !query.is_empty() {
            url.push('?');
            url.push_str(&build_query_string(query)?);
        }

        debug!(url = %url, "Sending request");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ExchangeError::Transport(format!("Request failed: {e}")))?;

        let body = read_body(response).await?;
        decode(&body)
    }

    /// Send a `SIGNED` request: append the synchronized timestamp, sign the
    /// exact query, and pass the API key header.
    async fn send_signed(
        &self,
        method: Method,
        path: &str,
        mut params: Vec<(&str, String)>,
    ) -> Result<String, ExchangeError> {
        params.push(("timestamp", self.timestamp().to_string()));
        let query = build_query_string(&params)?;
        let signature = self.signer.sign(&query)?;
        let url = format!("{}?{}&signature={}", self.url(path), query, signature);

        debug!(method = %method, path = %path, "Sending signed request");
        let response = self
            .http
            .request(method, &url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| ExchangeError::Transport(format!("Request failed: {e}")))?;

        read_body(response).await
    }
}

async fn read_body(response: reqwest::Response) -> Result<String, ExchangeError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ExchangeError::Transport(format!("Failed to read response: {e}")))?;

    if status.is_success() {
        Ok(body)
    } else {
        Err(parse_error(status.as_u16(), &body))
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ExchangeError> {
    serde_json::from_str(body)
        .map_err(|e| ExchangeError::Decode(format!("Failed to parse response: {e}")))
}

/// Map a non-2xx response. A `{code, msg}` body is the exchange refusing the
/// request; anything else is a transport problem.
pub fn parse_error(status: u16, body: &str) -> ExchangeError {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(error) => ExchangeError::Rejected {
            code: error.code,
            message: error.msg,
        },
        Err(_) => ExchangeError::Transport(format!("HTTP {status}: {}", body.trim())),
    }
}

#[async_trait]
impl ExchangeClient for BinanceFuturesClient {
    async fn server_time(&self) -> Result<i64, ExchangeError> {
        let time: ServerTime = self.get_public(SERVER_TIME_PATH, &[]).await?;
        Ok(time.server_time)
    }

    async fn list_instruments(&self) -> Result<Vec<String>, ExchangeError> {
        let info: ExchangeInfo = self.get_public(EXCHANGE_INFO_PATH, &[]).await?;
        Ok(info.symbols.into_iter().map(|s| s.symbol).collect())
    }

    async fn price(&self, symbol: &str) -> Result<Decimal, ExchangeError> {
        let ticker: TickerPrice = self
            .get_public(TICKER_PRICE_PATH, &[("symbol", symbol.to_string())])
            .await?;
        Ok(ticker.price)
    }

    async fn balances(&self) -> Result<Vec<AssetBalance>, ExchangeError> {
        let body = self
            .send_signed(
                Method::GET,
                BALANCE_PATH,
                vec![("recvWindow", self.config.recv_window_ms.to_string())],
            )
            .await?;
        let entries: Vec<BalanceEntry> = decode(&body)?;
        Ok(entries
            .into_iter()
            .map(|e| AssetBalance {
                asset: e.asset,
                balance: e.balance,
            })
            .collect())
    }

    async fn submit_order(&self, params: &OrderParams) -> Result<OrderAck, ExchangeError> {
        let body = self
            .send_signed(Method::POST, ORDER_PATH, params.to_query_pairs())
            .await?;
        let ack = OrderAck::from_json(decode(&body)?)?;

        info!(
            exchange = "binance",
            order_id = ack.order_id,
            symbol = %ack.symbol,
            status = %ack.status,
            "Order acknowledged"
        );
        Ok(ack)
    }

    fn set_time_offset(&mut self, offset_ms: i64) {
        self.time_offset_ms = offset_ms;
    }
}

/// Builds Binance clients from operator credentials.
#[derive(Debug, Clone, Default)]
pub struct BinanceConnector {
    config: BinanceConfig,
}

impl BinanceConnector {
    pub fn new(config: BinanceConfig) -> Self {
        Self { config }
    }
}

impl ExchangeConnector for BinanceConnector {
    fn connect(&self, credentials: &Credentials) -> Result<Box<dyn ExchangeClient>, ExchangeError> {
        let client = BinanceFuturesClient::new(self.config.clone(), credentials)?;
        Ok(Box::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const KEY: &str = "test-api-key";
    const SECRET: &str = "test-api-secret";

    fn client(server: &MockServer) -> BinanceFuturesClient {
        let config = BinanceConfig {
            base_url: server.uri(),
            ..Default::default()
        };
        BinanceFuturesClient::new(config, &Credentials::new(KEY, SECRET)).unwrap()
    }

    fn limit_params() -> OrderParams {
        OrderParams::from_intent(
            &OrderIntent {
                symbol: "BTCUSDT".to_string(),
                side: Side::Buy,
                kind: OrderKind::Limit,
                quantity: dec!(0.01),
                price: Some(dec!(60000)),
                stop_price: None,
            },
            5000,
        )
    }

    async fn last_query(server: &MockServer) -> String {
        let requests = server.received_requests().await.unwrap();
        requests
            .last()
            .and_then(|r| r.url.query().map(str::to_string))
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_server_time_and_instruments() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SERVER_TIME_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"serverTime": 1_700_000_000_123i64})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(EXCHANGE_INFO_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "timezone": "UTC",
                "symbols": [{"symbol": "BTCUSDT"}, {"symbol": "ETHUSDT"}]
            })))
            .mount(&server)
            .await;

        let client = client(&server);
        assert_eq!(client.server_time().await.unwrap(), 1_700_000_000_123);
        assert_eq!(client.list_instruments().await.unwrap(), vec!["BTCUSDT", "ETHUSDT"]);
    }

    #[tokio::test]
    async fn test_price() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(TICKER_PRICE_PATH))
            .and(query_param("symbol", "BTCUSDT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "symbol": "BTCUSDT", "price": "64321.10", "time": 1_700_000_000_000i64
            })))
            .mount(&server)
            .await;

        assert_eq!(client(&server).price("BTCUSDT").await.unwrap(), dec!(64321.10));
    }

    #[tokio::test]
    async fn test_symbol_cannot_inject_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(TICKER_PRICE_PATH))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "code": -1121, "msg": "Invalid symbol."
            })))
            .mount(&server)
            .await;

        let err = client(&server).price("BTCUSDT&recvWindow=1").await.unwrap_err();
        assert!(err.is_rejection());

        let requests = server.received_requests().await.unwrap();
        let pairs: Vec<(String, String)> = requests[0]
            .url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![("symbol".to_string(), "BTCUSDT&recvWindow=1".to_string())]
        );
    }

    #[tokio::test]
    async fn test_balances_are_signed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(BALANCE_PATH))
            .and(header(API_KEY_HEADER, KEY))
            .and(query_param("recvWindow", "5000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"asset": "USDT", "balance": "15000.00000000"},
                {"asset": "BNB", "balance": "0.00000000"}
            ])))
            .mount(&server)
            .await;

        let balances = client(&server).balances().await.unwrap();
        assert_eq!(Balance::for_asset(&balances, "USDT"), Balance::Available(dec!(15000)));

        let query = last_query(&server).await;
        let (unsigned, signature) = query.split_once("&signature=").unwrap();
        assert!(unsigned.contains("timestamp="));
        assert_eq!(RequestSigner::new(SECRET).sign(unsigned).unwrap(), signature);
    }

    #[tokio::test]
    async fn test_submit_limit_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ORDER_PATH))
            .and(header(API_KEY_HEADER, KEY))
            .and(query_param("type", "LIMIT"))
            .and(query_param("price", "60000"))
            .and(query_param("timeInForce", "GTC"))
            .and(query_param("recvWindow", "5000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "orderId": 3801,
                "symbol": "BTCUSDT",
                "status": "NEW",
                "origQty": "0.010",
                "executedQty": "0",
                "type": "LIMIT",
                "side": "BUY",
                "timeInForce": "GTC"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ack = client(&server).submit_order(&limit_params()).await.unwrap();
        assert_eq!(ack.order_id, 3801);
        assert_eq!(ack.status, "NEW");
        assert_eq!(ack.raw["timeInForce"], "GTC");
    }

    #[tokio::test]
    async fn test_rejection_carries_exchange_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ORDER_PATH))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "code": -2019, "msg": "Margin is insufficient."
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server).submit_order(&limit_params()).await.unwrap_err();
        assert_eq!(err, ExchangeError::rejected(-2019, "Margin is insufficient."));
    }

    #[tokio::test]
    async fn test_non_json_error_is_transport() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SERVER_TIME_PATH))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
            .mount(&server)
            .await;

        let err = client(&server).server_time().await.unwrap_err();
        assert!(matches!(err, ExchangeError::Transport(ref m) if m.starts_with("HTTP 502")));
    }

    #[tokio::test]
    async fn test_unexpected_order_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ORDER_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"accepted": true})))
            .mount(&server)
            .await;

        let err = client(&server).submit_order(&limit_params()).await.unwrap_err();
        assert!(matches!(err, ExchangeError::Decode(_)));
    }

    #[tokio::test]
    async fn test_time_offset_shifts_timestamp() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(BALANCE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let mut client = client(&server);
        client.set_time_offset(-3_600_000);
        let before = Utc::now().timestamp_millis();
        client.balances().await.unwrap();

        let query = last_query(&server).await;
        let timestamp: i64 = query
            .split('&')
            .find_map(|kv| kv.strip_prefix("timestamp="))
            .unwrap()
            .parse()
            .unwrap();
        assert!(timestamp <= before - 3_500_000);
    }

    #[test]
    fn test_parse_error() {
        assert_eq!(
            parse_error(400, r#"{"code":-1021,"msg":"Timestamp for this request is outside of the recvWindow."}"#),
            ExchangeError::rejected(-1021, "Timestamp for this request is outside of the recvWindow.")
        );
        assert!(matches!(parse_error(503, "busy"), ExchangeError::Transport(_)));
    }
}
