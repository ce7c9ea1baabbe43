//! Router assembly and the server loop.

use crate::rate_limiter::{create_rate_limiter, gcra_rate_limit};
use crate::{monitoring, stripe};
use axum::routing::{get, post};
use axum::Router;
use membank_kernel::Membank;
use membank_types::error::{MembankError, MembankResult};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

/// State shared by every handler.
pub struct AppState {
    pub membank: Arc<Membank>,
    pub stripe: stripe::StripeLedger,
}

impl AppState {
    pub fn new(membank: Arc<Membank>) -> Self {
        Self {
            membank,
            stripe: stripe::StripeLedger::new(),
        }
    }
}

/// All routes, rate limited per client IP and traced.
pub fn build_router(state: Arc<AppState>) -> Router {
    let limiter = create_rate_limiter(state.membank.config().api.requests_per_minute);
    Router::new()
        .route("/api/stripe/webhook", post(stripe::webhook))
        .route("/api/stripe/health", get(stripe::health))
        .route("/api/stripe/metrics", get(stripe::metrics))
        .route("/api/monitoring/metrics", get(monitoring::metrics))
        .route("/api/monitoring/alerts", get(monitoring::alerts))
        .route("/api/monitoring/dashboard", get(monitoring::dashboard))
        .layer(axum::middleware::from_fn_with_state(limiter, gcra_rate_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `api.listen` and serve until Ctrl-C.
pub async fn run_server(membank: Arc<Membank>) -> MembankResult<()> {
    let listen = membank.config().api.listen.clone();
    let addr: SocketAddr = listen
        .parse()
        .map_err(|e| MembankError::Config(format!("invalid api.listen '{listen}': {e}")))?;
    let app = build_router(Arc::new(AppState::new(membank)));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API server listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use membank_types::config::MembankConfig;
    use tower::ServiceExt;

    fn state(dir: &std::path::Path, config: MembankConfig) -> Arc<AppState> {
        let membank = Membank::boot(config, dir).unwrap();
        Arc::new(AppState::new(Arc::new(membank)))
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn webhook(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/stripe/webhook")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_webhook_dedup_and_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path(), MembankConfig::default());
        let app = build_router(state.clone());
        let event = r#"{"id":"evt_1","type":"payment_intent.succeeded","data":{}}"#;

        let first = app.clone().oneshot(webhook(event)).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(json_body(first).await, serde_json::json!({"received": true}));

        let second = app.clone().oneshot(webhook(event)).await.unwrap();
        assert_eq!(
            json_body(second).await,
            serde_json::json!({"received": true, "duplicate": true})
        );

        let metrics = json_body(app.clone().oneshot(get_req("/api/stripe/metrics")).await.unwrap()).await;
        assert_eq!(metrics["payments_succeeded"], 1);

        let health = json_body(app.oneshot(get_req("/api/stripe/health")).await.unwrap()).await;
        assert_eq!(health["status"], "ok");
        assert_eq!(health["events_processed"], 1);

        let samples = state.membank.monitor().samples();
        assert_eq!(samples.len(), 2);
        assert!(samples.iter().all(|s| s.operation == "stripe.webhook"));
    }

    #[tokio::test]
    async fn test_malformed_event_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path(), MembankConfig::default());
        let app = build_router(state.clone());
        let response = app.oneshot(webhook(r#"{"type":"x"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(!state.membank.monitor().samples()[0].success);
    }

    #[tokio::test]
    async fn test_signed_webhook() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = MembankConfig::default();
        config.api.stripe_webhook_secret = Some("whsec_test".to_string());
        let app = build_router(state(dir.path(), config));
        let body = r#"{"id":"evt_9","type":"invoice.paid"}"#;

        let unsigned = app.clone().oneshot(webhook(body)).await.unwrap();
        assert_eq!(unsigned.status(), StatusCode::BAD_REQUEST);

        let now = chrono::Utc::now().timestamp();
        let sig = stripe::sign_payload("whsec_test", now, body.as_bytes());
        let mut signed = webhook(body);
        signed.headers_mut().insert(
            stripe::SIGNATURE_HEADER,
            format!("t={now},v1={sig}").parse().unwrap(),
        );
        let response = app.oneshot(signed).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_monitoring_routes() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path(), MembankConfig::default());
        state.membank.monitor().record("consult", 5000, true).unwrap();
        let app = build_router(state);

        let dashboard = json_body(app.clone().oneshot(get_req("/api/monitoring/dashboard")).await.unwrap()).await;
        assert_eq!(dashboard["health"], "degraded");

        let alerts = json_body(app.clone().oneshot(get_req("/api/monitoring/alerts?limit=5")).await.unwrap()).await;
        assert_eq!(alerts.as_array().unwrap().len(), 1);

        let metrics = json_body(app.oneshot(get_req("/api/monitoring/metrics")).await.unwrap()).await;
        assert_eq!(metrics["samples"], 1);
    }

    #[tokio::test]
    async fn test_rate_limit_returns_429() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = MembankConfig::default();
        config.api.requests_per_minute = 2;
        let app = build_router(state(dir.path(), config));
        for _ in 0..2 {
            let ok = app.clone().oneshot(get_req("/api/stripe/health")).await.unwrap();
            assert_eq!(ok.status(), StatusCode::OK);
        }
        let limited = app.oneshot(get_req("/api/stripe/health")).await.unwrap();
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(json_body(limited).await["error"], "Rate limit exceeded");
    }
}
