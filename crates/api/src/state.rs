use futdesk_core::ExchangeConnector;
use futdesk_engine::{DeskConfig, OperatorSession};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared application state accessible by all route handlers.
///
/// Handlers hold the session lock for the whole action, so operator actions
/// run one at a time, exchange calls included.
pub struct AppState {
    pub connector: Arc<dyn ExchangeConnector>,
    pub session: Mutex<OperatorSession>,
}

impl AppState {
    pub fn new(connector: Arc<dyn ExchangeConnector>, config: DeskConfig) -> Self {
        Self {
            connector,
            session: Mutex::new(OperatorSession::new(config)),
        }
    }
}
