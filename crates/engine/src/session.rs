use chrono::Utc;
use futdesk_core::*;
use rust_decimal::Decimal;
use tracing::{error, info, warn};

use crate::config::DeskConfig;
use crate::history::OrderHistory;

/// What a successful bootstrap learned about the account. Read-only for the
/// lifetime of the connection.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    pub credentials: Credentials,
    /// Exchange server time minus local time, in milliseconds.
    pub server_time_offset_ms: i64,
    pub instruments: Vec<String>,
    pub balance: Balance,
}

impl ConnectionContext {
    /// `preferred` when the exchange lists it, otherwise the first symbol.
    pub fn default_symbol(&self, preferred: &str) -> Option<&str> {
        default_symbol(&self.instruments, preferred)
    }

    pub fn has_symbol(&self, symbol: &str) -> bool {
        self.instruments.iter().any(|s| s == symbol)
    }
}

pub fn default_symbol<'a>(instruments: &'a [String], preferred: &str) -> Option<&'a str> {
    instruments
        .iter()
        .find(|s| s.as_str() == preferred)
        .or_else(|| instruments.first())
        .map(String::as_str)
}

/// Errors that leave the session without a usable connection.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("Enter Binance Testnet API keys to begin")]
    MissingCredentials,
    #[error(transparent)]
    Exchange(#[from] ExchangeError),
}

/// An authenticated exchange client together with its bootstrap context.
pub struct Connection {
    context: ConnectionContext,
    client: Box<dyn ExchangeClient>,
}

impl Connection {
    pub fn context(&self) -> &ConnectionContext {
        &self.context
    }

    pub fn client(&self) -> &dyn ExchangeClient {
        self.client.as_ref()
    }

    /// Live price for display. Failures degrade to `None`.
    pub async fn live_price(&self, symbol: &str) -> Option<Decimal> {
        match self.client.price(symbol).await {
            Ok(price) => Some(price),
            Err(e) => {
                warn!(symbol = %symbol, "Price fetch failed: {}", e);
                None
            }
        }
    }
}

/// Establish a connection: sync the clock, load symbols, then try the balance.
///
/// Only the balance is allowed to fail.
pub async fn bootstrap(
    connector: &dyn ExchangeConnector,
    credentials: Credentials,
    config: &DeskConfig,
) -> Result<Connection, BootstrapError> {
    if !credentials.is_complete() {
        return Err(BootstrapError::MissingCredentials);
    }

    let result = establish(connector, credentials, config).await;
    if let Err(e) = &result {
        error!("API connection error: {}", e);
    }
    result.map_err(BootstrapError::from)
}

async fn establish(
    connector: &dyn ExchangeConnector,
    credentials: Credentials,
    config: &DeskConfig,
) -> Result<Connection, ExchangeError> {
    let mut client = connector.connect(&credentials)?;

    let server_time = client.server_time().await?;
    let offset = clock_offset(server_time, Utc::now().timestamp_millis())?;
    client.set_time_offset(offset);
    info!(offset_ms = offset, "Server time synchronized");

    let instruments = client.list_instruments().await?;
    info!(count = instruments.len(), "Loaded {} trading symbols", instruments.len());

    let balance = match client.balances().await {
        Ok(balances) => Balance::for_asset(&balances, &config.balance_asset),
        Err(e) => {
            warn!("Balance fetch failed: {}", e);
            Balance::Unavailable
        }
    };

    Ok(Connection {
        context: ConnectionContext {
            credentials,
            server_time_offset_ms: offset,
            instruments,
            balance,
        },
        client,
    })
}

/// Server time minus local time. An out-of-range server time is a bad response.
fn clock_offset(server_time_ms: i64, local_time_ms: i64) -> Result<i64, ExchangeError> {
    server_time_ms
        .checked_sub(local_time_ms)
        .ok_or_else(|| ExchangeError::Decode(format!("Server time out of range: {server_time_ms}")))
}

/// Everything one operator works with: the current connection, if any, and
/// the orders placed since the session started.
pub struct OperatorSession {
    config: DeskConfig,
    connection: Option<Connection>,
    pub(crate) history: OrderHistory,
}

impl OperatorSession {
    pub fn new(config: DeskConfig) -> Self {
        Self {
            config,
            connection: None,
            history: OrderHistory::new(),
        }
    }

    /// Replace the current connection. A failed attempt leaves the session
    /// disconnected.
    pub async fn connect(
        &mut self,
        connector: &dyn ExchangeConnector,
        credentials: Credentials,
    ) -> Result<&ConnectionContext, BootstrapError> {
        self.connection = None;
        let connection = bootstrap(connector, credentials, &self.config).await?;
        info!(
            symbols = connection.context.instruments.len(),
            balance = %connection.context.balance,
            "Connected to exchange"
        );
        Ok(&self.connection.insert(connection).context)
    }

    /// Drop the connection and its credentials. History is kept.
    pub fn disconnect(&mut self) {
        if self.connection.take().is_some() {
            info!("Disconnected, credentials cleared");
        }
    }

    pub fn connection(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn history(&self) -> &OrderHistory {
        &self.history
    }

    pub fn config(&self) -> &DeskConfig {
        &self.config
    }

    /// Default symbol of the current connection.
    pub fn default_symbol(&self) -> Option<&str> {
        self.connection
            .as_ref()
            .and_then(|c| c.context.default_symbol(&self.config.preferred_symbol))
    }
}
