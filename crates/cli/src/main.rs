mod config;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use config::AppConfig;
use futdesk_brokers_binance::BinanceConnector;
use futdesk_brokers_common::simulated::{SimulatedConnector, SimulatedExchange};
use futdesk_core::{Credentials, ExchangeConnector, OrderKind, OrderTicket, Side};
use futdesk_engine::{OperatorSession, SubmissionOutcome};
use rust_decimal::Decimal;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "futdesk")]
#[command(about = "Order desk for Binance USD-M Futures testnet")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Log file, appended to (default: futdesk.log)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the order panel and JSON API
    Serve {
        /// Bind address
        #[arg(short, long)]
        bind: Option<String>,

        /// Exchange backend
        #[arg(long, value_enum, default_value_t = ExchangeKind::Binance)]
        exchange: ExchangeKind,
    },

    /// List tradable symbols
    Symbols {
        #[command(flatten)]
        credentials: CredentialArgs,
    },

    /// Show the last traded price of a symbol
    Price {
        #[arg(short, long)]
        symbol: String,

        #[command(flatten)]
        credentials: CredentialArgs,
    },

    /// Validate and submit a single order
    Order {
        #[arg(short, long)]
        symbol: String,

        /// BUY or SELL
        #[arg(long)]
        side: Side,

        /// MARKET, LIMIT or STOP
        #[arg(short, long, default_value = "MARKET")]
        kind: OrderKind,

        #[arg(short, long)]
        quantity: Decimal,

        /// Limit price (LIMIT and STOP)
        #[arg(long)]
        price: Option<Decimal>,

        /// Trigger price (STOP)
        #[arg(long)]
        stop_price: Option<Decimal>,

        #[command(flatten)]
        credentials: CredentialArgs,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ExchangeKind {
    /// Binance Futures testnet REST API
    Binance,
    /// In-process paper exchange
    Simulated,
}

#[derive(Args)]
struct CredentialArgs {
    #[arg(long, env = "BINANCE_API_KEY", hide_env_values = true)]
    api_key: String,

    #[arg(long, env = "BINANCE_API_SECRET", hide_env_values = true)]
    api_secret: String,
}

impl CredentialArgs {
    fn into_credentials(self) -> Credentials {
        Credentials::new(self.api_key, self.api_secret)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    let log_file = cli.log_file.clone().unwrap_or_else(|| config.server.log_file.clone());
    init_tracing(&cli.log_level, &log_file)?;

    match cli.command {
        Commands::Serve { bind, exchange } => {
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            let connector: Arc<dyn ExchangeConnector> = match exchange {
                ExchangeKind::Binance => Arc::new(BinanceConnector::new(config.binance_config())),
                ExchangeKind::Simulated => {
                    tracing::warn!("Using the simulated exchange, no orders leave this process");
                    Arc::new(SimulatedConnector::new(SimulatedExchange::default()))
                }
            };
            let state = futdesk_api::AppState::new(connector, config.desk.clone());
            futdesk_api::start_server(Arc::new(state), &bind).await?;
        }
        Commands::Symbols { credentials } => {
            let session = open_session(&config, credentials).await?;
            let default = session.default_symbol().unwrap_or_default();
            if let Some(connection) = session.connection() {
                for symbol in &connection.context().instruments {
                    let marker = if symbol == default { " *" } else { "" };
                    println!("{symbol}{marker}");
                }
            }
        }
        Commands::Price { symbol, credentials } => {
            let session = open_session(&config, credentials).await?;
            if let Some(connection) = session.connection() {
                match connection.live_price(&symbol).await {
                    Some(price) => println!("{symbol}: {price:.6}"),
                    None => println!("{symbol}: unavailable"),
                }
            }
        }
        Commands::Order {
            symbol,
            side,
            kind,
            quantity,
            price,
            stop_price,
            credentials,
        } => {
            let mut session = open_session(&config, credentials).await?;
            let ticket = OrderTicket {
                symbol: symbol.to_ascii_uppercase(),
                side,
                kind,
                quantity,
                price,
                stop_price,
            };
            match session.submit(&ticket).await {
                SubmissionOutcome::Accepted(ack) => {
                    println!("Order submitted! ID: {}", ack.order_id);
                    println!("{}", serde_json::to_string_pretty(&ack.raw)?);
                }
                SubmissionOutcome::Invalid(errors) => {
                    for error in &errors {
                        eprintln!("{error}");
                    }
                    bail!("Order rejected by validation ({} error(s))", errors.len());
                }
                SubmissionOutcome::Rejected(message) => bail!("Exchange error: {message}"),
                SubmissionOutcome::Failed(detail) => bail!("Unexpected error: {detail}"),
                SubmissionOutcome::NotConnected => bail!("Not connected"),
            }
        }
    }

    Ok(())
}

/// Stderr plus an append-only log file without colour codes.
fn init_tracing(level: &str, log_file: &Path) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("Failed to open log file {}", log_file.display()))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .init();
    Ok(())
}

async fn open_session(config: &AppConfig, credentials: CredentialArgs) -> Result<OperatorSession> {
    let connector = BinanceConnector::new(config.binance_config());
    let mut session = OperatorSession::new(config.desk.clone());
    session
        .connect(&connector, credentials.into_credentials())
        .await
        .context("Connection failed")?;
    Ok(session)
}
