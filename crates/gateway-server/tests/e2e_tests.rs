//! End-to-end integration tests for the LLM Inference Gateway.
//!
//! These tests validate the complete gateway functionality including:
//! - HTTP endpoints
//! - Request routing
//! - Response handling
//! - Error handling
//!
//! Tests use the existing gateway server infrastructure with the local
//! in-process provider (`EchoRuntime`), so no network access is required.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use gateway_config::GatewayConfig;
use gateway_core::provider::ModelInfo;
use gateway_core::{ChatMessage, GatewayRequest, GatewayResponse, LLMProvider};
use gateway_providers::{EchoRuntime, LocalConfig, LocalProvider, ProviderRegistry};
use gateway_resilience::{DistributedCache, DistributedCacheConfig};
use gateway_server::routes::create_router;
use gateway_server::AppState;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Test helper to create a registry with one loaded local model.
async fn create_mock_registry() -> Arc<ProviderRegistry> {
    let model = ModelInfo::new("echo-model").with_name("Echo Model");
    let config = LocalConfig::new("local-test").with_model(model, "/dev/null");
    let provider = LocalProvider::new(config, Arc::new(EchoRuntime));
    provider.load("echo-model").await.expect("local model loads");

    let registry = Arc::new(ProviderRegistry::new());
    registry
        .register(Arc::new(provider), 1, 100)
        .expect("register should succeed");
    registry
}

/// Create test application state wired to the mock registry.
async fn create_test_state() -> AppState {
    AppState::builder()
        .config(GatewayConfig::default())
        .registry(create_mock_registry().await)
        .build()
}

#[cfg(test)]
mod health_endpoint_tests {
    use super::*;

    #[tokio::test]
    async fn test_health_endpoint_returns_ok() {
        let app = create_router(create_test_state().await);

        let request = Request::builder()
            .method(Method::GET)
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: Value = serde_json::from_slice(&body).unwrap();

        assert!(json["status"].is_string());
    }

    #[tokio::test]
    async fn test_healthz_endpoint_works() {
        let app = create_router(create_test_state().await);

        let request = Request::builder()
            .method(Method::GET)
            .uri("/healthz")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_readiness_endpoint() {
        let app = create_router(create_test_state().await);

        let request = Request::builder()
            .method(Method::GET)
            .uri("/ready")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_liveness_endpoint() {
        let app = create_router(create_test_state().await);

        let request = Request::builder()
            .method(Method::GET)
            .uri("/live")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[cfg(test)]
mod models_endpoint_tests {
    use super::*;

    #[tokio::test]
    async fn test_models_endpoint_returns_list() {
        let app = create_router(create_test_state().await);

        let request = Request::builder()
            .method(Method::GET)
            .uri("/models")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["object"], "list");
        assert!(json["data"].is_array());
    }

    #[tokio::test]
    async fn test_models_endpoint_contains_registered_model() {
        let app = create_router(create_test_state().await);

        let request = Request::builder()
            .method(Method::GET)
            .uri("/models")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: Value = serde_json::from_slice(&body).unwrap();

        let models = json["data"].as_array().unwrap();
        assert!(!models.is_empty());

        let first_model = &models[0];
        assert_eq!(first_model["id"], "echo-model");
        assert_eq!(first_model["object"], "model");
    }
}

#[cfg(test)]
mod infer_tests {
    use super::*;

    #[tokio::test]
    async fn test_infer_returns_completion() {
        let app = create_router(create_test_state().await);

        let body = json!({
            "model": "echo-model",
            "messages": [{"role": "user", "content": "Hello there friend"}],
            "max_tokens": 16,
            "stream": false
        });

        let request = Request::builder()
            .method(Method::POST)
            .uri("/infer")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: GatewayResponse = serde_json::from_slice(&body).unwrap();

        assert_eq!(parsed.model, "echo-model");
        assert!(!parsed.choices.is_empty());
        assert!(parsed.usage.total_tokens > 0);
    }

    #[tokio::test]
    async fn test_infer_requires_model() {
        let app = create_router(create_test_state().await);

        let body = json!({
            "messages": [{"role": "user", "content": "Hello"}]
        });

        let request = Request::builder()
            .method(Method::POST)
            .uri("/infer")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_infer_with_no_registered_models_returns_not_found() {
        // No candidate in the registry at all (`NoCandidate`, §4.H), as
        // opposed to a bad model hint, which only steers an otherwise
        // non-empty candidate set and falls back rather than failing.
        let state = AppState::builder()
            .config(GatewayConfig::default())
            .registry(Arc::new(ProviderRegistry::new()))
            .build();
        let app = create_router(state);

        let body = json!({
            "model": "does-not-exist",
            "messages": [{"role": "user", "content": "Hello"}]
        });

        let request = Request::builder()
            .method(Method::POST)
            .uri("/infer")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

#[cfg(test)]
mod error_handling_tests {
    use super::*;

    #[tokio::test]
    async fn test_not_found_returns_404() {
        let app = create_router(create_test_state().await);

        let request = Request::builder()
            .method(Method::GET)
            .uri("/nonexistent/endpoint")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_json_returns_error() {
        let app = create_router(create_test_state().await);

        let request = Request::builder()
            .method(Method::POST)
            .uri("/infer")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{invalid json}"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[cfg(test)]
mod metrics_endpoint_tests {
    use super::*;

    #[tokio::test]
    async fn test_metrics_endpoint_available() {
        let app = create_router(create_test_state().await);

        let request = Request::builder()
            .method(Method::GET)
            .uri("/metrics")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[cfg(test)]
mod model_admin_tests {
    use super::*;

    #[tokio::test]
    async fn test_delete_model_requires_admin() {
        let app = create_router(create_test_state().await);

        let request = Request::builder()
            .method(Method::DELETE)
            .uri("/models/echo-model")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        // No principal permissions are attached when auth is disabled, so
        // the anonymous caller is rejected for the admin-only route.
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}

#[cfg(test)]
mod cache_tests {
    use super::*;

    #[tokio::test]
    async fn test_distributed_cache_l1_operations() {
        let config = DistributedCacheConfig {
            enabled: true,
            enable_local_cache: true,
            local_cache_size: 100,
            local_cache_ttl: Duration::from_secs(60),
            ..Default::default()
        };

        let cache = DistributedCache::new(config);

        let request = GatewayRequest::builder()
            .model("echo-model")
            .message(ChatMessage::user("Test distributed cache"))
            .build()
            .unwrap();

        let response = GatewayResponse {
            id: "dist-cache-test".to_string(),
            object: "chat.completion".to_string(),
            model: "echo-model".to_string(),
            choices: vec![],
            usage: gateway_core::response::Usage::new(5, 10),
            created: 1_234_567_890,
            system_fingerprint: None,
            provider: Some("local-test".to_string()),
            cost: None,
            latency_ms: None,
            cached: false,
            fallback_depth: 0,
        };

        cache.put(&request, response.clone()).await;
        let cached = cache.get(&request).await;

        assert!(cached.is_some());
        assert_eq!(cached.unwrap().id, "dist-cache-test");

        let stats = cache.stats().await;
        assert_eq!(stats.l1_hits, 1);
    }
}

#[cfg(test)]
mod request_builder_tests {
    use super::*;

    #[test]
    fn test_request_builder_creates_valid_request() {
        let request = GatewayRequest::builder()
            .model("echo-model")
            .message(ChatMessage::user("Hello"))
            .message(ChatMessage::assistant("Hi there!"))
            .message(ChatMessage::user("How are you?"))
            .temperature(0.8)
            .max_tokens(200u32)
            .top_p(0.95)
            .build();

        assert!(request.is_ok());

        let req = request.unwrap();
        assert_eq!(req.model, "echo-model");
        assert_eq!(req.messages.len(), 3);
        assert_eq!(req.temperature, Some(0.8));
        assert_eq!(req.max_tokens, Some(200));
        assert_eq!(req.top_p, Some(0.95));
    }

    #[test]
    fn test_request_builder_validates_temperature() {
        let result = GatewayRequest::builder()
            .model("echo-model")
            .message(ChatMessage::user("Hello"))
            .temperature(2.5)
            .build();

        assert!(result.is_err());
    }

    #[test]
    fn test_request_builder_requires_model() {
        let result = GatewayRequest::builder()
            .message(ChatMessage::user("Hello"))
            .build();

        assert!(result.is_err());
    }

    #[test]
    fn test_request_builder_requires_messages() {
        let result = GatewayRequest::builder().model("echo-model").build();

        assert!(result.is_err());
    }
}

#[cfg(test)]
mod response_format_tests {
    use super::*;
    use gateway_core::request::MessageRole;
    use gateway_core::response::{Choice, ResponseMessage};
    use gateway_core::FinishReason;

    #[test]
    fn test_response_serialization() {
        let response = GatewayResponse {
            id: "chatcmpl-123456".to_string(),
            object: "chat.completion".to_string(),
            model: "echo-model".to_string(),
            choices: vec![Choice {
                index: 0,
                message: ResponseMessage {
                    role: MessageRole::Assistant,
                    content: Some("Hello!".to_string()),
                    tool_calls: None,
                    function_call: None,
                },
                finish_reason: Some(FinishReason::Stop),
                logprobs: None,
            }],
            usage: gateway_core::response::Usage::new(10, 5),
            created: 1_234_567_890,
            provider: Some("local-test".to_string()),
            system_fingerprint: Some("fp_abc123".to_string()),
            cost: None,
            latency_ms: None,
            cached: false,
            fallback_depth: 0,
        };

        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["id"], "chatcmpl-123456");
        assert_eq!(json["object"], "chat.completion");
        assert_eq!(json["choices"][0]["message"]["content"], "Hello!");
        assert_eq!(json["usage"]["total_tokens"], 15);
    }
}
