use crate::state::AppState;
use crate::view::{Notice, PanelPage, CONNECT_HINT};
use axum::{
    extract::{Query, State},
    response::Html,
    routing::{get, post},
    Form, Router,
};
use futdesk_core::{Credentials, OrderKind, OrderTicket, Side};
use futdesk_engine::{BootstrapError, OperatorSession, SubmissionOutcome};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;

pub fn panel_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(show_panel))
        .route("/connect", post(connect))
        .route("/disconnect", post(disconnect))
        .route("/orders", post(submit_order))
}

#[derive(Debug, Default, Deserialize)]
pub struct PanelQuery {
    pub symbol: Option<String>,
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConnectForm {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
}

/// Raw order form fields, exactly as the browser posts them.
#[derive(Debug, Deserialize)]
pub struct OrderForm {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub side: String,
    #[serde(default)]
    pub quantity: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub stop_price: String,
}

impl OrderForm {
    /// Blank or unparseable prices are absent; an unparseable quantity is zero
    /// so the validator reports it.
    pub fn to_ticket(&self) -> Result<OrderTicket, String> {
        Ok(OrderTicket {
            symbol: self.symbol.trim().to_string(),
            side: self.side.parse::<Side>()?,
            kind: self.kind.parse::<OrderKind>()?,
            quantity: self.quantity.trim().parse().unwrap_or(Decimal::ZERO),
            price: parse_optional(&self.price),
            stop_price: parse_optional(&self.stop_price),
        })
    }
}

fn parse_optional(field: &str) -> Option<Decimal> {
    let field = field.trim();
    if field.is_empty() {
        return None;
    }
    field.parse().ok()
}

fn parse_kind(kind: Option<&str>) -> OrderKind {
    kind.and_then(|k| k.parse().ok()).unwrap_or(OrderKind::Market)
}

/// The requested symbol when the exchange lists it, otherwise the default.
fn resolve_symbol(session: &OperatorSession, requested: Option<&str>) -> Option<String> {
    let connection = session.connection()?;
    match requested {
        Some(symbol) if connection.context().has_symbol(symbol) => Some(symbol.to_string()),
        _ => session.default_symbol().map(str::to_string),
    }
}

async fn render(
    session: &OperatorSession,
    requested: Option<&str>,
    kind: OrderKind,
    notices: &[Notice],
) -> Html<String> {
    let symbol = resolve_symbol(session, requested);
    let price = match (session.connection(), symbol.as_deref()) {
        (Some(connection), Some(symbol)) => connection.live_price(symbol).await,
        _ => None,
    };

    Html(
        PanelPage {
            session,
            symbol: symbol.as_deref(),
            kind,
            price,
            notices,
        }
        .render(),
    )
}

async fn show_panel(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PanelQuery>,
) -> Html<String> {
    let session = state.session.lock().await;
    render(
        &session,
        query.symbol.as_deref(),
        parse_kind(query.kind.as_deref()),
        &[],
    )
    .await
}

async fn connect(State(state): State<Arc<AppState>>, Form(form): Form<ConnectForm>) -> Html<String> {
    let mut session = state.session.lock().await;
    let credentials = Credentials::new(form.api_key.trim(), form.api_secret.trim());

    let notices = match session.connect(state.connector.as_ref(), credentials).await {
        Ok(_) => Vec::new(),
        Err(BootstrapError::MissingCredentials) => vec![Notice::info(CONNECT_HINT)],
        Err(e) => vec![Notice::error(format!("Connection failed: {e}"))],
    };
    render(&session, None, OrderKind::Market, &notices).await
}

async fn disconnect(State(state): State<Arc<AppState>>) -> Html<String> {
    let mut session = state.session.lock().await;
    session.disconnect();
    render(&session, None, OrderKind::Market, &[]).await
}

async fn submit_order(State(state): State<Arc<AppState>>, Form(form): Form<OrderForm>) -> Html<String> {
    let mut session = state.session.lock().await;
    let mut notices = vec![Notice::warning("Please verify order details before execution")];

    match form.to_ticket() {
        Ok(ticket) => notices.extend(outcome_notices(session.submit(&ticket).await)),
        Err(e) => notices.push(Notice::error(e)),
    }

    let kind = parse_kind(Some(&form.kind));
    render(&session, Some(form.symbol.trim()), kind, &notices).await
}

fn outcome_notices(outcome: SubmissionOutcome) -> Vec<Notice> {
    match outcome {
        SubmissionOutcome::Accepted(ack) => {
            let detail = serde_json::to_string_pretty(&ack.raw).unwrap_or_else(|_| ack.raw.to_string());
            vec![Notice::success(format!("Order submitted! ID: {}", ack.order_id)).with_detail(detail)]
        }
        SubmissionOutcome::Invalid(errors) => errors.into_iter().map(Notice::error).collect(),
        SubmissionOutcome::Rejected(message) => vec![Notice::error(format!("Exchange error: {message}"))],
        SubmissionOutcome::Failed(detail) => vec![Notice::error(format!("Unexpected error: {detail}"))],
        SubmissionOutcome::NotConnected => vec![Notice::info(CONNECT_HINT)],
    }
}
