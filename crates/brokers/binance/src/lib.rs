//! Binance USD-M Futures broker adapter.
//!
//! Signed REST calls against the futures API. Defaults to the public testnet.

pub mod client;
pub mod protocol;
pub mod signer;

pub use client::{BinanceConfig, BinanceConnector, BinanceFuturesClient};
