pub mod simulated;

pub use simulated::{SimulatedConnector, SimulatedExchange, SimulatedExchangeConfig};
