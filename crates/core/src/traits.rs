use crate::models::*;
use async_trait::async_trait;
use rust_decimal::Decimal;

// ---------------------------------------------------------------------------
// Exchange Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during exchange operations.
///
/// `Rejected` is the exchange saying no (bad margin, bad price filter, ...);
/// everything else means the request never produced a usable answer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExchangeError {
    #[error("{message}")]
    Rejected { code: i64, message: String },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Signing error: {0}")]
    Signing(String),
}

impl ExchangeError {
    pub fn rejected(code: i64, message: impl Into<String>) -> Self {
        ExchangeError::Rejected {
            code,
            message: message.into(),
        }
    }

    pub fn is_rejection(&self) -> bool {
        matches!(self, ExchangeError::Rejected { .. })
    }
}

// ---------------------------------------------------------------------------
// Exchange Client Trait
// ---------------------------------------------------------------------------

/// The narrow slice of an exchange the order desk needs.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Exchange server time in epoch milliseconds.
    async fn server_time(&self) -> Result<i64, ExchangeError>;

    /// Tradable symbols, in exchange order.
    async fn list_instruments(&self) -> Result<Vec<String>, ExchangeError>;

    /// Last traded price for a symbol.
    async fn price(&self, symbol: &str) -> Result<Decimal, ExchangeError>;

    /// Wallet balances per asset.
    async fn balances(&self) -> Result<Vec<AssetBalance>, ExchangeError>;

    /// Submit one order. Never retried.
    async fn submit_order(&self, params: &OrderParams) -> Result<OrderAck, ExchangeError>;

    /// Shift signed request timestamps by `offset_ms` (server minus local).
    fn set_time_offset(&mut self, _offset_ms: i64) {}
}

/// Builds an authenticated client from operator-supplied credentials.
pub trait ExchangeConnector: Send + Sync {
    fn connect(&self, credentials: &Credentials) -> Result<Box<dyn ExchangeClient>, ExchangeError>;
}
