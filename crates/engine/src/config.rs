use futdesk_core::DEFAULT_RECV_WINDOW_MS;
use serde::{Deserialize, Serialize};

/// Order desk behaviour that is not tied to a particular exchange client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeskConfig {
    /// Symbol selected by default when the exchange lists it.
    pub preferred_symbol: String,
    /// Asset whose wallet balance is shown on the panel.
    pub balance_asset: String,
    /// recvWindow sent with every order.
    pub recv_window_ms: u64,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            preferred_symbol: "BTCUSDT".to_string(),
            balance_asset: "USDT".to_string(),
            recv_window_ms: DEFAULT_RECV_WINDOW_MS,
        }
    }
}
