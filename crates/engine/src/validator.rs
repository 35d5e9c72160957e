use futdesk_core::*;
use rust_decimal::Decimal;
use std::fmt;

/// The ordered list of problems found with an order ticket. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(Vec<String>);

impl ValidationErrors {
    pub fn messages(&self) -> &[String] {
        &self.0
    }

    pub fn into_messages(self) -> Vec<String> {
        self.0
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

fn is_positive(value: Option<Decimal>) -> bool {
    value.is_some_and(|v| v > Decimal::ZERO)
}

/// Check a ticket against the order rules and the loaded instrument list.
///
/// Every rule is evaluated; all violations are reported in rule order.
/// MARKET tickets drop any price fields left over from the form.
pub fn validate(ticket: &OrderTicket, instruments: &[String]) -> Result<OrderIntent, ValidationErrors> {
    let mut errors = Vec::new();

    if ticket.quantity <= Decimal::ZERO {
        errors.push("Quantity must be positive".to_string());
    }

    let (price, stop_price) = match ticket.kind {
        OrderKind::Market => (None, None),
        OrderKind::Limit => {
            if !is_positive(ticket.price) {
                errors.push("Valid limit price required".to_string());
            }
            (ticket.price, None)
        }
        OrderKind::Stop => {
            if !is_positive(ticket.price) {
                errors.push("Limit price required".to_string());
            }
            if !is_positive(ticket.stop_price) {
                errors.push("Stop trigger price required".to_string());
            }
            (ticket.price, ticket.stop_price)
        }
    };

    if !instruments.iter().any(|s| s == &ticket.symbol) {
        errors.push(format!("Unknown symbol: {}", ticket.symbol));
    }

    if !errors.is_empty() {
        return Err(ValidationErrors(errors));
    }

    Ok(OrderIntent {
        symbol: ticket.symbol.clone(),
        side: ticket.side,
        kind: ticket.kind,
        quantity: ticket.quantity,
        price,
        stop_price,
    })
}
