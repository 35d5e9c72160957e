use chrono::Local;
use futdesk_core::*;
use tracing::{error, info, warn};

use crate::session::OperatorSession;
use crate::validator::validate;

/// Result of one submit action, as shown to the operator.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    /// The exchange acknowledged the order; it is now in the history.
    Accepted(OrderAck),
    /// The ticket failed validation; nothing was sent.
    Invalid(Vec<String>),
    /// The exchange refused the order with this message.
    Rejected(String),
    /// Transport, signing, or decoding failure.
    Failed(String),
    NotConnected,
}

impl SubmissionOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmissionOutcome::Accepted(_))
    }
}

impl OperatorSession {
    /// Validate a ticket and, if it passes, make exactly one submission attempt.
    pub async fn submit(&mut self, ticket: &OrderTicket) -> SubmissionOutcome {
        let recv_window_ms = self.config().recv_window_ms;
        let Some(connection) = self.connection() else {
            warn!("Order submitted without an active connection");
            return SubmissionOutcome::NotConnected;
        };

        let intent = match validate(ticket, &connection.context().instruments) {
            Ok(intent) => intent,
            Err(errors) => {
                for message in errors.messages() {
                    warn!("Validation error: {}", message);
                }
                return SubmissionOutcome::Invalid(errors.into_messages());
            }
        };

        let params = OrderParams::from_intent(&intent, recv_window_ms);
        info!(
            client_order_id = %params.client_order_id,
            "Order attempt: {} {} {} ({})",
            intent.side, intent.quantity, intent.symbol, intent.kind
        );

        let result = connection.client().submit_order(&params).await;
        match result {
            Ok(ack) => {
                info!(
                    order_id = ack.order_id,
                    status = %ack.status,
                    "Order accepted: {} {} {} {}",
                    ack.side, ack.orig_qty, ack.symbol, ack.order_type
                );
                self.history.append(OrderRecord::from_ack(&ack, Local::now()));
                SubmissionOutcome::Accepted(ack)
            }
            Err(ExchangeError::Rejected { code, message }) => {
                error!(code = code, "{}", message);
                SubmissionOutcome::Rejected(message)
            }
            Err(e) => {
                error!("Order submission failed: {}", e);
                SubmissionOutcome::Failed(e.to_string())
            }
        }
    }
}
