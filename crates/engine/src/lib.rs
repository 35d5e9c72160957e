//! Order desk engine: ticket validation, single-shot submission, connection
//! bootstrap, and the per-session order history.

pub mod config;
pub mod history;
pub mod session;
pub mod submission;
pub mod validator;

pub use config::DeskConfig;
pub use history::OrderHistory;
pub use session::{bootstrap, default_symbol, BootstrapError, Connection, ConnectionContext, OperatorSession};
pub use submission::SubmissionOutcome;
pub use validator::{validate, ValidationErrors};
