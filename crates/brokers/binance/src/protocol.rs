use rust_decimal::Decimal;
use serde::Deserialize;

pub const SERVER_TIME_PATH: &str = "/fapi/v1/time";
pub const EXCHANGE_INFO_PATH: &str = "/fapi/v1/exchangeInfo";
pub const TICKER_PRICE_PATH: &str = "/fapi/v1/ticker/price";
pub const BALANCE_PATH: &str = "/fapi/v2/balance";
pub const ORDER_PATH: &str = "/fapi/v1/order";

/// Header carrying the API key on authenticated endpoints.
pub const API_KEY_HEADER: &str = "X-MBX-APIKEY";

/// `GET /fapi/v1/time`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerTime {
    pub server_time: i64,
}

/// `GET /fapi/v1/exchangeInfo`, reduced to what the desk reads.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeInfo {
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SymbolInfo {
    pub symbol: String,
}

/// `GET /fapi/v1/ticker/price?symbol=`.
#[derive(Debug, Clone, Deserialize)]
pub struct TickerPrice {
    pub symbol: String,
    pub price: Decimal,
}

/// One element of `GET /fapi/v2/balance`.
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceEntry {
    pub asset: String,
    pub balance: Decimal,
}

/// Error body returned with non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub code: i64,
    pub msg: String,
}
