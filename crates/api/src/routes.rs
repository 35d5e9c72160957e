use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futdesk_core::{Credentials, OrderTicket};
use futdesk_engine::{BootstrapError, SubmissionOutcome};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

type ApiResponse = (StatusCode, Json<serde_json::Value>);

pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Health
        .route("/health", get(health_check))
        // Session
        .route("/session", post(open_session).delete(close_session))
        // Market data and account
        .route("/instruments", get(list_instruments))
        .route("/price/{symbol}", get(get_price))
        .route("/account", get(get_account))
        // Orders
        .route("/orders", post(submit_order).get(list_orders))
}

fn not_connected() -> ApiResponse {
    (
        StatusCode::CONFLICT,
        Json(json!({"error": "Not connected. Open a session with API credentials first."})),
    )
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

async fn open_session(
    State(state): State<Arc<AppState>>,
    Json(credentials): Json<Credentials>,
) -> ApiResponse {
    let mut session = state.session.lock().await;
    let preferred = session.config().preferred_symbol.clone();

    match session.connect(state.connector.as_ref(), credentials).await {
        Ok(ctx) => (
            StatusCode::CREATED,
            Json(json!({
                "instruments": ctx.instruments,
                "default_symbol": ctx.default_symbol(&preferred),
                "balance": ctx.balance.to_string(),
                "server_time_offset_ms": ctx.server_time_offset_ms,
            })),
        ),
        Err(e @ BootstrapError::MissingCredentials) => {
            (StatusCode::BAD_REQUEST, Json(json!({"error": e.to_string()})))
        }
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({"error": format!("Connection failed: {e}")})),
        ),
    }
}

async fn close_session(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.session.lock().await.disconnect();
    StatusCode::NO_CONTENT
}

// ---------------------------------------------------------------------------
// Market data and account
// ---------------------------------------------------------------------------

async fn list_instruments(State(state): State<Arc<AppState>>) -> ApiResponse {
    let session = state.session.lock().await;
    let Some(connection) = session.connection() else {
        return not_connected();
    };
    (
        StatusCode::OK,
        Json(json!({
            "instruments": connection.context().instruments,
            "default_symbol": session.default_symbol(),
        })),
    )
}

async fn get_price(State(state): State<Arc<AppState>>, Path(symbol): Path<String>) -> ApiResponse {
    let session = state.session.lock().await;
    let Some(connection) = session.connection() else {
        return not_connected();
    };
    match connection.client().price(&symbol).await {
        Ok(price) => (
            StatusCode::OK,
            Json(json!({"symbol": symbol, "price": price.to_string()})),
        ),
        Err(e) => {
            warn!(symbol = %symbol, "Price fetch failed: {}", e);
            (StatusCode::BAD_GATEWAY, Json(json!({"error": e.to_string()})))
        }
    }
}

async fn get_account(State(state): State<Arc<AppState>>) -> ApiResponse {
    let session = state.session.lock().await;
    let Some(connection) = session.connection() else {
        return not_connected();
    };
    (
        StatusCode::OK,
        Json(json!({
            "asset": session.config().balance_asset,
            "balance": connection.context().balance.to_string(),
        })),
    )
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

async fn submit_order(
    State(state): State<Arc<AppState>>,
    Json(ticket): Json<OrderTicket>,
) -> ApiResponse {
    let mut session = state.session.lock().await;
    match session.submit(&ticket).await {
        SubmissionOutcome::Accepted(ack) => (StatusCode::CREATED, Json(ack.raw)),
        SubmissionOutcome::Invalid(errors) => {
            (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({"errors": errors})))
        }
        SubmissionOutcome::Rejected(message) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({"error": message, "kind": "rejected"})),
        ),
        SubmissionOutcome::Failed(detail) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({"error": detail, "kind": "failed"})),
        ),
        SubmissionOutcome::NotConnected => not_connected(),
    }
}

async fn list_orders(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let session = state.session.lock().await;
    let orders: Vec<_> = session.history().most_recent_first().collect();
    Json(json!(orders))
}

#[cfg(test)]
mod tests {
    use crate::{build_router, AppState};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use futdesk_brokers_common::simulated::{
        SimulatedConnector, SimulatedExchange, SimulatedExchangeConfig,
    };
    use futdesk_core::ExchangeError;
    use futdesk_engine::DeskConfig;
    use serde_json::{json, Value};
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn lines_with(&self, level: &str) -> usize {
            let bytes = self.0.lock().unwrap().clone();
            String::from_utf8_lossy(&bytes)
                .lines()
                .filter(|l| l.contains(level))
                .count()
        }
    }

    fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        (logs, tracing::subscriber::set_default(subscriber))
    }

    fn app(exchange: &SimulatedExchange) -> Router {
        let connector = Arc::new(SimulatedConnector::new(exchange.clone()));
        build_router(Arc::new(AppState::new(connector, DeskConfig::default())))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                request = request.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn connect(app: &Router) {
        let (status, _) = call(
            app,
            "POST",
            "/api/session",
            Some(json!({"api_key": "key", "api_secret": "secret"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = app(&SimulatedExchange::default());
        let (status, body) = call(&app, "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_open_session_summary() {
        let app = app(&SimulatedExchange::default());
        let (status, body) = call(
            &app,
            "POST",
            "/api/session",
            Some(json!({"api_key": "key", "api_secret": "secret"})),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["default_symbol"], "BTCUSDT");
        assert_eq!(body["balance"], "15000");
        assert_eq!(body["instruments"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_blank_credentials_bad_request() {
        let app = app(&SimulatedExchange::default());
        let (status, _) = call(
            &app,
            "POST",
            "/api/session",
            Some(json!({"api_key": "", "api_secret": ""})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_orders_require_session() {
        let app = app(&SimulatedExchange::default());
        let (status, _) = call(
            &app,
            "POST",
            "/api/orders",
            Some(json!({"symbol": "BTCUSDT", "side": "BUY", "kind": "MARKET", "quantity": "0.01"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_submit_and_list_orders() {
        let exchange = SimulatedExchange::default();
        let app = app(&exchange);
        connect(&app).await;

        let (status, ack) = call(
            &app,
            "POST",
            "/api/orders",
            Some(json!({"symbol": "BTCUSDT", "side": "BUY", "kind": "MARKET", "quantity": "0.01"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(ack["status"], "FILLED");

        let (status, _) = call(
            &app,
            "POST",
            "/api/orders",
            Some(json!({"symbol": "ETHUSDT", "side": "SELL", "kind": "LIMIT", "quantity": "1", "price": "3600"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, orders) = call(&app, "GET", "/api/orders", None).await;
        assert_eq!(status, StatusCode::OK);
        let orders = orders.as_array().unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0]["symbol"], "ETHUSDT");
        assert_eq!(orders[1]["symbol"], "BTCUSDT");
    }

    #[tokio::test]
    async fn test_validation_errors_returned_in_order() {
        let exchange = SimulatedExchange::default();
        let app = app(&exchange);
        connect(&app).await;

        let (status, body) = call(
            &app,
            "POST",
            "/api/orders",
            Some(json!({
                "symbol": "BTCUSDT", "side": "BUY", "kind": "STOP",
                "quantity": "0.01", "price": "0", "stop_price": "0"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            body["errors"],
            json!(["Limit price required", "Stop trigger price required"])
        );
        assert!(exchange.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_rejection_is_bad_gateway_and_not_recorded() {
        let exchange = SimulatedExchange::default();
        let app = app(&exchange);
        connect(&app).await;
        exchange.reject_next_order(-2019, "Insufficient margin");

        let (status, body) = call(
            &app,
            "POST",
            "/api/orders",
            Some(json!({"symbol": "BTCUSDT", "side": "BUY", "kind": "MARKET", "quantity": "0.01"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "Insufficient margin");

        let (_, orders) = call(&app, "GET", "/api/orders", None).await;
        assert!(orders.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejection_logs_exactly_one_error() {
        let (logs, _guard) = capture_logs();
        let exchange = SimulatedExchange::default();
        let app = app(&exchange);
        connect(&app).await;
        exchange.reject_next_order(-2019, "Insufficient margin");

        let (status, _) = call(
            &app,
            "POST",
            "/api/orders",
            Some(json!({"symbol": "BTCUSDT", "side": "BUY", "kind": "MARKET", "quantity": "0.01"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(logs.lines_with("ERROR"), 1);
    }

    #[tokio::test]
    async fn test_session_bootstrap_failure_is_bad_gateway() {
        let (logs, _guard) = capture_logs();
        let mut config = SimulatedExchangeConfig::default();
        config.faults.server_time = Some(ExchangeError::Transport("connection refused".into()));
        let app = app(&SimulatedExchange::new(config));

        let (status, body) = call(
            &app,
            "POST",
            "/api/session",
            Some(json!({"api_key": "key", "api_secret": "secret"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(
            body["error"],
            "Connection failed: Transport error: connection refused"
        );
        assert_eq!(logs.lines_with("ERROR"), 1);

        let (status, _) = call(&app, "GET", "/api/instruments", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_price_account_and_disconnect() {
        let app = app(&SimulatedExchange::default());
        connect(&app).await;

        let (status, body) = call(&app, "GET", "/api/price/BTCUSDT", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["price"], "65000");

        let (_, body) = call(&app, "GET", "/api/account", None).await;
        assert_eq!(body["asset"], "USDT");

        let (status, _) = call(&app, "DELETE", "/api/session", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = call(&app, "GET", "/api/instruments", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }
}
