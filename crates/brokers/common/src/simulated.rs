use async_trait::async_trait;
use chrono::Utc;
use futdesk_core::*;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Errors the simulated exchange returns from specific endpoints, every time
/// they are called.
#[derive(Debug, Clone, Default)]
pub struct SimulatedFaults {
    pub server_time: Option<ExchangeError>,
    pub instruments: Option<ExchangeError>,
    pub price: Option<ExchangeError>,
    pub balances: Option<ExchangeError>,
}

/// Configuration for the simulated exchange (paper mode and tests).
#[derive(Debug, Clone)]
pub struct SimulatedExchangeConfig {
    /// Listed symbols, in the order the exchange reports them.
    pub instruments: Vec<String>,
    /// Last price per symbol.
    pub prices: HashMap<String, Decimal>,
    /// Wallet balances.
    pub balances: Vec<AssetBalance>,
    /// How far the simulated server clock runs ahead of the local one.
    pub server_time_skew_ms: i64,
    /// When set, signed endpoints reject any other API key.
    pub accepted_api_key: Option<String>,
    pub faults: SimulatedFaults,
}

impl Default for SimulatedExchangeConfig {
    fn default() -> Self {
        let prices = [
            ("ETHUSDT", Decimal::new(345_025, 2)),
            ("BTCUSDT", Decimal::new(65_000, 0)),
            ("BNBUSDT", Decimal::new(5_851, 1)),
        ];
        Self {
            instruments: prices.iter().map(|(s, _)| s.to_string()).collect(),
            prices: prices.iter().map(|(s, p)| (s.to_string(), *p)).collect(),
            balances: vec![
                AssetBalance {
                    asset: "USDT".to_string(),
                    balance: Decimal::new(15_000, 0),
                },
                AssetBalance {
                    asset: "BNB".to_string(),
                    balance: Decimal::ZERO,
                },
            ],
            server_time_skew_ms: 0,
            accepted_api_key: None,
            faults: SimulatedFaults::default(),
        }
    }
}

#[derive(Debug, Default)]
struct SimulatedState {
    next_order_id: i64,
    submitted: Vec<OrderParams>,
    /// One-shot outcomes consumed by the next submissions, in order.
    scripted: VecDeque<ExchangeError>,
    time_offset_ms: i64,
    server_time_calls: usize,
}

/// An in-memory exchange.
///
/// Clones share state, so a test can keep one handle while the desk owns
/// another behind `Box<dyn ExchangeClient>`. MARKET orders fill at once;
/// LIMIT and STOP orders rest as `NEW`.
#[derive(Debug, Clone)]
pub struct SimulatedExchange {
    config: Arc<SimulatedExchangeConfig>,
    state: Arc<Mutex<SimulatedState>>,
    api_key: Option<String>,
}

impl Default for SimulatedExchange {
    fn default() -> Self {
        Self::new(SimulatedExchangeConfig::default())
    }
}

impl SimulatedExchange {
    pub fn new(config: SimulatedExchangeConfig) -> Self {
        Self {
            config: Arc::new(config),
            state: Arc::new(Mutex::new(SimulatedState {
                next_order_id: 4_000_000,
                ..Default::default()
            })),
            api_key: None,
        }
    }

    fn state(&self) -> MutexGuard<'_, SimulatedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next submission fail with an exchange rejection.
    pub fn reject_next_order(&self, code: i64, message: &str) {
        self.state().scripted.push_back(ExchangeError::rejected(code, message));
    }

    /// Make the next submission fail with an arbitrary error.
    pub fn fail_next_order(&self, error: ExchangeError) {
        self.state().scripted.push_back(error);
    }

    /// Every parameter set that reached `submit_order`, oldest first.
    pub fn submitted(&self) -> Vec<OrderParams> {
        self.state().submitted.clone()
    }

    /// The clock offset last handed over by the desk.
    pub fn time_offset(&self) -> i64 {
        self.state().time_offset_ms
    }

    pub fn server_time_calls(&self) -> usize {
        self.state().server_time_calls
    }

    fn check_signed(&self) -> Result<(), ExchangeError> {
        match (&self.config.accepted_api_key, &self.api_key) {
            (Some(accepted), Some(key)) if accepted == key => Ok(()),
            (Some(_), _) => Err(ExchangeError::rejected(
                -2015,
                "Invalid API-key, IP, or permissions for action.",
            )),
            (None, _) => Ok(()),
        }
    }

    fn fault(fault: &Option<ExchangeError>) -> Result<(), ExchangeError> {
        match fault {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    fn acknowledge(&self, params: &OrderParams, order_id: i64) -> serde_json::Value {
        let (status, executed_qty, avg_price) = match params.kind {
            OrderKind::Market => {
                let fill = self
                    .config
                    .prices
                    .get(&params.symbol)
                    .copied()
                    .unwrap_or(Decimal::ZERO);
                ("FILLED", params.quantity, fill)
            }
            OrderKind::Limit | OrderKind::Stop => ("NEW", Decimal::ZERO, Decimal::ZERO),
        };
        serde_json::json!({
            "orderId": order_id,
            "symbol": params.symbol,
            "status": status,
            "clientOrderId": params.client_order_id,
            "price": params.price.unwrap_or(Decimal::ZERO).to_string(),
            "avgPrice": avg_price.to_string(),
            "origQty": params.quantity.to_string(),
            "executedQty": executed_qty.to_string(),
            "timeInForce": params.time_in_force.map(|t| t.as_str()).unwrap_or("GTC"),
            "type": params.kind.as_str(),
            "side": params.side.as_str(),
            "stopPrice": params.stop_price.unwrap_or(Decimal::ZERO).to_string(),
            "reduceOnly": false,
            "updateTime": Utc::now().timestamp_millis(),
        })
    }
}

#[async_trait]
impl ExchangeClient for SimulatedExchange {
    async fn server_time(&self) -> Result<i64, ExchangeError> {
        self.state().server_time_calls += 1;
        Self::fault(&self.config.faults.server_time)?;
        Ok(Utc::now().timestamp_millis() + self.config.server_time_skew_ms)
    }

    async fn list_instruments(&self) -> Result<Vec<String>, ExchangeError> {
        Self::fault(&self.config.faults.instruments)?;
        Ok(self.config.instruments.clone())
    }

    async fn price(&self, symbol: &str) -> Result<Decimal, ExchangeError> {
        Self::fault(&self.config.faults.price)?;
        self.config
            .prices
            .get(symbol)
            .copied()
            .ok_or_else(|| ExchangeError::rejected(-1121, "Invalid symbol."))
    }

    async fn balances(&self) -> Result<Vec<AssetBalance>, ExchangeError> {
        self.check_signed()?;
        Self::fault(&self.config.faults.balances)?;
        Ok(self.config.balances.clone())
    }

    async fn submit_order(&self, params: &OrderParams) -> Result<OrderAck, ExchangeError> {
        let order_id = {
            let mut state = self.state();
            state.submitted.push(params.clone());
            if let Some(error) = state.scripted.pop_front() {
                return Err(error);
            }
            state.next_order_id += 1;
            state.next_order_id
        };
        self.check_signed()?;
        if !self.config.instruments.contains(&params.symbol) {
            return Err(ExchangeError::rejected(-1121, "Invalid symbol."));
        }

        debug!(order_id, symbol = %params.symbol, "Simulated order accepted");
        OrderAck::from_json(self.acknowledge(params, order_id))
    }

    fn set_time_offset(&mut self, offset_ms: i64) {
        self.state().time_offset_ms = offset_ms;
    }
}

/// Hands out clones of one simulated exchange, bound to the caller's key.
#[derive(Debug, Clone, Default)]
pub struct SimulatedConnector {
    exchange: SimulatedExchange,
}

impl SimulatedConnector {
    pub fn new(exchange: SimulatedExchange) -> Self {
        Self { exchange }
    }
}

impl ExchangeConnector for SimulatedConnector {
    fn connect(&self, credentials: &Credentials) -> Result<Box<dyn ExchangeClient>, ExchangeError> {
        let mut exchange = self.exchange.clone();
        exchange.api_key = Some(credentials.api_key.clone());
        Ok(Box::new(exchange))
    }
}
