//! Route definitions for the gateway's HTTP surface.

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::{auth, handlers, middleware, state::AppState};

/// Build the full router: `/infer`, `/infer:stream`, `/models`, health and
/// metrics endpoints, wrapped in the shared middleware stack and auth layer.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health_check))
        .route("/healthz", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/readyz", get(handlers::readiness_check))
        .route("/live", get(handlers::liveness_check))
        .route("/livez", get(handlers::liveness_check))
        // Metrics endpoint
        .route("/metrics", get(handlers::metrics_endpoint))
        // Inference
        .route("/infer", post(handlers::infer))
        .route("/infer:stream", post(handlers::infer_stream))
        // Model catalog
        .route("/models", get(handlers::list_models).post(handlers::register_model))
        .route("/models/:id", delete(handlers::delete_model))
        // Apply middleware, innermost first
        .layer(axum::middleware::from_fn_with_state(state.auth.clone(), auth::auth_middleware))
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(axum::middleware::from_fn(middleware::response_time_middleware))
        .layer(axum::middleware::from_fn(middleware::logging_middleware))
        .layer(axum::middleware::from_fn(middleware::security_headers_middleware))
        .layer(middleware::cors_layer())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use gateway_config::GatewayConfig;
    use tower::ServiceExt;

    fn create_test_state() -> AppState {
        AppState::builder().config(GatewayConfig::default()).build()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_router(create_test_state());

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let app = create_router(create_test_state());

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_models_endpoint() {
        let app = create_router(create_test_state());

        let response = app
            .oneshot(Request::builder().uri("/models").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
