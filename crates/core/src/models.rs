use chrono::{DateTime, Local};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::traits::ExchangeError;

/// Request-validity window sent with every signed request unless configured otherwise.
pub const DEFAULT_RECV_WINDOW_MS: u64 = 5000;

// ---------------------------------------------------------------------------
// Side & Kind
// ---------------------------------------------------------------------------

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            other => Err(format!("Unknown side: {other}")),
        }
    }
}

/// The kind of order the operator can place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderKind {
    Market,
    Limit,
    /// Stop-limit: a limit order placed once the trigger price is crossed.
    Stop,
}

impl OrderKind {
    pub const ALL: [OrderKind; 3] = [OrderKind::Market, OrderKind::Limit, OrderKind::Stop];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderKind::Market => "MARKET",
            OrderKind::Limit => "LIMIT",
            OrderKind::Stop => "STOP",
        }
    }

    pub fn requires_price(&self) -> bool {
        matches!(self, OrderKind::Limit | OrderKind::Stop)
    }

    pub fn requires_stop_price(&self) -> bool {
        matches!(self, OrderKind::Stop)
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MARKET" => Ok(OrderKind::Market),
            "LIMIT" => Ok(OrderKind::Limit),
            "STOP" => Ok(OrderKind::Stop),
            other => Err(format!("Unknown order type: {other}")),
        }
    }
}

/// How long an order stays working on the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good-til-canceled.
    #[serde(rename = "GTC")]
    Gtc,
}

impl TimeInForce {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeInForce::Gtc => "GTC",
        }
    }
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// Raw order input as the operator entered it, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderTicket {
    pub symbol: String,
    pub side: Side,
    pub kind: OrderKind,
    pub quantity: Decimal,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub stop_price: Option<Decimal>,
}

/// A validated order, normalized so that price fields are present exactly
/// when the kind needs them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub symbol: String,
    pub side: Side,
    pub kind: OrderKind,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
}

/// The parameter set sent to the exchange's order endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderParams {
    pub symbol: String,
    pub side: Side,
    pub kind: OrderKind,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub time_in_force: Option<TimeInForce>,
    pub recv_window_ms: u64,
    pub client_order_id: String,
}

impl OrderParams {
    /// Map a validated intent onto the exchange schema.
    pub fn from_intent(intent: &OrderIntent, recv_window_ms: u64) -> Self {
        let time_in_force = intent.kind.requires_price().then_some(TimeInForce::Gtc);
        Self {
            symbol: intent.symbol.clone(),
            side: intent.side,
            kind: intent.kind,
            quantity: intent.quantity,
            price: intent.price,
            stop_price: intent.stop_price,
            time_in_force,
            recv_window_ms,
            client_order_id: Uuid::new_v4().to_string(),
        }
    }

    /// Query pairs in the order the exchange documents them. The signed
    /// timestamp is appended by the client.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("symbol", self.symbol.clone()),
            ("side", self.side.as_str().to_string()),
            ("type", self.kind.as_str().to_string()),
            ("quantity", self.quantity.normalize().to_string()),
        ];
        if let Some(price) = self.price {
            pairs.push(("price", price.normalize().to_string()));
        }
        if let Some(stop_price) = self.stop_price {
            pairs.push(("stopPrice", stop_price.normalize().to_string()));
        }
        if let Some(tif) = self.time_in_force {
            pairs.push(("timeInForce", tif.as_str().to_string()));
        }
        pairs.push(("newClientOrderId", self.client_order_id.clone()));
        pairs.push(("recvWindow", self.recv_window_ms.to_string()));
        pairs
    }
}

/// Typed view of an exchange order acknowledgment, with the raw body kept
/// for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderAck {
    pub order_id: i64,
    pub symbol: String,
    pub side: String,
    pub order_type: String,
    pub status: String,
    pub orig_qty: String,
    pub raw: serde_json::Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AckFields {
    order_id: i64,
    symbol: String,
    side: String,
    #[serde(rename = "type")]
    order_type: String,
    status: String,
    orig_qty: String,
}

impl OrderAck {
    /// Parse an acknowledgment body, keeping the full JSON alongside.
    pub fn from_json(raw: serde_json::Value) -> Result<Self, ExchangeError> {
        let fields: AckFields = serde_json::from_value(raw.clone())
            .map_err(|e| ExchangeError::Decode(format!("Unexpected order response: {e}")))?;
        Ok(Self {
            order_id: fields.order_id,
            symbol: fields.symbol,
            side: fields.side,
            order_type: fields.order_type,
            status: fields.status,
            orig_qty: fields.orig_qty,
            raw,
        })
    }
}

/// One entry of the session order log. Every field except the timestamp is
/// what the exchange reported, not what was requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub timestamp: DateTime<Local>,
    pub order_id: i64,
    pub symbol: String,
    pub side: String,
    pub kind: String,
    pub status: String,
    pub quantity: String,
}

impl OrderRecord {
    pub fn from_ack(ack: &OrderAck, timestamp: DateTime<Local>) -> Self {
        Self {
            timestamp,
            order_id: ack.order_id,
            symbol: ack.symbol.clone(),
            side: ack.side.clone(),
            kind: ack.order_type.clone(),
            status: ack.status.clone(),
            quantity: ack.orig_qty.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// A single asset balance as reported by the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetBalance {
    pub asset: String,
    pub balance: Decimal,
}

/// Balance shown on the panel. Degrades to `Unavailable` instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "amount")]
pub enum Balance {
    Available(Decimal),
    Unavailable,
}

impl Balance {
    /// Pick `asset` out of a balance list; missing means unavailable.
    pub fn for_asset(balances: &[AssetBalance], asset: &str) -> Self {
        balances
            .iter()
            .find(|b| b.asset == asset)
            .map(|b| Balance::Available(b.balance))
            .unwrap_or(Balance::Unavailable)
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Balance::Available(amount) => write!(f, "{amount}"),
            Balance::Unavailable => f.write_str("N/A"),
        }
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// API credentials, held in memory for the lifetime of a connection only.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.api_secret.trim().is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"***")
            .finish()
    }
}
