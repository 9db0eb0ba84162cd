use alerter::{run_alerter_service, TelegramAlerter};
use api_client::{ExchangeGateway, MexcClient, SimulatedGateway};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use configuration::{Config, GatewayMode};
use engine::{OrderStore, Reconciler, SwapManager};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, Any, CorsLayer, ExposeHeaders},
    trace::TraceLayer,
};

pub mod error;
pub mod handlers;

/// The shared application state that all handlers can access.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<SwapManager>,
    /// Present only when the simulated gateway backs the service.
    pub simulator: Option<Arc<SimulatedGateway>>,
}

/// Builds the HTTP routes over the swap lifecycle manager.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods(Any)
        .allow_headers(AllowHeaders::any())
        .expose_headers(ExposeHeaders::any());

    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .route("/api/swap/quote", post(handlers::get_quote))
        .route("/api/swap/create", post(handlers::create_swap))
        .route("/api/swap/status/:id", get(handlers::get_order_status))
        .route("/api/swap/monitor-deposits", post(handlers::monitor_deposits))
        .route("/api/swap/execute", post(handlers::execute_swap))
        .route("/api/swap/simulate-deposit", post(handlers::simulate_deposit))
        .route("/api/debug/orders", get(handlers::list_orders))
        .with_state(state)
        .layer(cors)
        // Logs every incoming request.
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(1024 * 64))
}

/// Serves `state` on `addr` until `shutdown` resolves.
pub async fn run_server(
    addr: SocketAddr,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Web server started and listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

/// The exchange gateway selected by `config.gateway.mode`, plus a handle to
/// the simulator when that is the one in use.
pub fn build_gateway(
    config: &Config,
) -> anyhow::Result<(Arc<dyn ExchangeGateway>, Option<Arc<SimulatedGateway>>)> {
    match config.gateway.mode {
        GatewayMode::Mexc => {
            tracing::info!(base_url = %config.gateway.base_url, "Using the MEXC gateway.");
            let gateway: Arc<dyn ExchangeGateway> = Arc::new(MexcClient::new(&config.gateway)?);
            Ok((gateway, None))
        }
        GatewayMode::Simulated => {
            tracing::warn!("Using the simulated gateway. No real funds will move.");
            let simulator = Arc::new(SimulatedGateway::new(&config.simulation));
            let gateway: Arc<dyn ExchangeGateway> = simulator.clone();
            Ok((gateway, Some(simulator)))
        }
    }
}

/// Wires the whole service together and runs it until Ctrl-C.
///
/// Starts the reconciliation loop and, when Telegram is configured, the
/// operator alerter, then serves HTTP. On shutdown the loop is told to stop
/// and awaited.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let (gateway, simulator) = build_gateway(&config)?;
    let store = Arc::new(OrderStore::new());
    let manager = Arc::new(SwapManager::new(store, gateway, &config.swap));

    if let Some(alerter) = TelegramAlerter::new(&config.telegram) {
        tokio::spawn(run_alerter_service(alerter, manager.subscribe()));
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reconciler = Reconciler::new(Arc::clone(&manager), config.swap.reconcile_interval());
    let reconciler_handle = tokio::spawn(reconciler.start(shutdown_rx));

    let state = Arc::new(AppState { manager, simulator });
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C.");
        }
        tracing::info!("Shutdown requested.");
    };
    let served = run_server(config.server.bind_addr, state, ctrl_c).await;

    let _ = shutdown_tx.send(true);
    if let Err(e) = reconciler_handle.await {
        tracing::error!(error = %e, "Reconciliation task ended abnormally.");
    }
    served
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use configuration::{SimulationConfig, SwapSettings};
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use tower::ServiceExt;

    const USDT_ADDRESS: &str = "0x521b7FE4D6C6c21B42336E8F2D73C04B142FD6d7";

    fn state(simulated: bool) -> Arc<AppState> {
        let simulator = Arc::new(SimulatedGateway::new(&SimulationConfig {
            prices: HashMap::from([("BTCUSDT".to_string(), dec!(60000))]),
        }));
        let manager = Arc::new(SwapManager::new(
            Arc::new(OrderStore::new()),
            simulator.clone(),
            &SwapSettings::default(),
        ));
        Arc::new(AppState {
            manager,
            simulator: simulated.then_some(simulator),
        })
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(body) => request.body(Body::from(body.to_string())).unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn health_is_ok() {
        let app = build_router(state(true));
        let response = app
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn quote_returns_fee_adjusted_amount() {
        let app = build_router(state(true));
        let (status, body) = call(
            &app,
            "POST",
            "/api/swap/quote",
            Some(json!({ "fromToken": "BTC", "toToken": "USDT", "amount": 0.001 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["quote"]["destAmount"], "59.82");
    }

    #[tokio::test]
    async fn missing_fields_are_bad_requests() {
        let app = build_router(state(true));
        let (status, body) = call(
            &app,
            "POST",
            "/api/swap/create",
            Some(json!({ "fromToken": "BTC", "toToken": "USDT", "amount": "0.001" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("destinationAddress"));

        let (status, _) = call(
            &app,
            "POST",
            "/api/swap/quote",
            Some(json!({ "fromToken": "BTC", "toToken": "USDT", "amount": "abc" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_market_is_unprocessable() {
        let app = build_router(state(true));
        let (status, _) = call(
            &app,
            "POST",
            "/api/swap/quote",
            Some(json!({ "fromToken": "DOGE", "toToken": "ADA", "amount": "5" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn full_swap_through_simulated_deposit() {
        let app = build_router(state(true));
        let (status, created) = call(
            &app,
            "POST",
            "/api/swap/create",
            Some(json!({
                "fromToken": "BTC",
                "toToken": "USDT",
                "amount": "0.001",
                "destinationAddress": USDT_ADDRESS,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["status"], "pending");
        assert_eq!(created["toAmount"], "59.82");
        let order_id = created["orderId"].as_str().unwrap().to_string();

        let (_, poll) = call(
            &app,
            "POST",
            "/api/swap/monitor-deposits",
            Some(json!({ "orderId": order_id })),
        )
        .await;
        assert_eq!(poll["hasDeposit"], false);

        let (status, _) = call(
            &app,
            "POST",
            "/api/swap/simulate-deposit",
            Some(json!({ "orderId": order_id })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, poll) = call(
            &app,
            "POST",
            "/api/swap/monitor-deposits",
            Some(json!({ "orderId": order_id })),
        )
        .await;
        assert_eq!(poll["hasDeposit"], true);
        assert_eq!(poll["status"], "completed");

        let (status, body) = call(&app, "GET", &format!("/api/swap/status/{}", order_id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["order"]["status"], "completed");

        // Already executed.
        let (status, _) = call(
            &app,
            "POST",
            "/api/swap/execute",
            Some(json!({ "orderId": order_id })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, listing) = call(&app, "GET", "/api/debug/orders", None).await;
        assert_eq!(listing["totalOrders"], 1);
        assert_eq!(listing["stats"]["completed"], 1);
    }

    #[tokio::test]
    async fn execute_before_deposit_does_not_pay_out() {
        let app = build_router(state(true));
        let (_, created) = call(
            &app,
            "POST",
            "/api/swap/create",
            Some(json!({
                "fromToken": "BTC",
                "toToken": "USDT",
                "amount": "0.001",
                "destinationAddress": USDT_ADDRESS,
            })),
        )
        .await;
        let order_id = created["orderId"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            "POST",
            "/api/swap/execute",
            Some(json!({ "orderId": order_id })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);

        let (_, body) = call(&app, "GET", &format!("/api/swap/status/{}", order_id), None).await;
        assert_eq!(body["order"]["status"], "pending");
        assert!(body["order"]["settlementRef"].is_null());

        call(
            &app,
            "POST",
            "/api/swap/simulate-deposit",
            Some(json!({ "orderId": order_id })),
        )
        .await;
        let (status, body) = call(
            &app,
            "POST",
            "/api/swap/execute",
            Some(json!({ "orderId": order_id })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["order"]["status"], "completed");
        assert!(body["order"]["deposit"]["txRef"].is_string());
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let app = build_router(state(true));
        let (status, body) = call(&app, "GET", "/api/swap/status/SWAP_1_deadbeef", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn simulation_is_unavailable_with_a_real_gateway() {
        let app = build_router(state(false));
        let (status, _) = call(
            &app,
            "POST",
            "/api/swap/simulate-deposit",
            Some(json!({ "orderId": "SWAP_1_deadbeef" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
