//! HTTP handlers for the gateway's thin surface: `/infer`, `/infer:stream`,
//! `/models`, `/health`, `/metrics`.

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use futures::StreamExt;
use gateway_core::provider::{ModelInfo, ProviderType};
use gateway_core::response::{ModelObject, ModelsResponse};
use gateway_core::{GatewayRequest, GatewayResponse};
use gateway_providers::registry::{Capability, ModelFilter, ModelRegistration};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::watch;

use crate::error::ApiError;
use crate::extractors::{is_admin, CallerPrincipal, JsonBody};
use crate::health::ComponentHealth;
use crate::state::AppState;

/// `POST /infer`: run one request through the pipeline and return the
/// completed response.
pub async fn infer(
    State(state): State<AppState>,
    CallerPrincipal(principal): CallerPrincipal,
    JsonBody(request): JsonBody<GatewayRequest>,
) -> Result<Json<GatewayResponse>, ApiError> {
    request.validate()?;
    let response = state.pipeline.execute(&principal, request).await?;
    Ok(Json(response))
}

/// `POST /infer:stream`: same request shape, but the body is a sequence of
/// newline-delimited [`gateway_core::streaming::StreamFrame`] JSON objects,
/// one per generated delta plus a terminal frame. A client disconnecting
/// mid-stream drops the body stream, which cancels the upstream call.
pub async fn infer_stream(
    State(state): State<AppState>,
    CallerPrincipal(principal): CallerPrincipal,
    JsonBody(mut request): JsonBody<GatewayRequest>,
) -> Result<Response, ApiError> {
    request.validate()?;
    request.stream = true;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let frames = state.pipeline.execute_stream(&principal, request, cancel_rx).await?;

    let body_stream = async_stream::stream! {
        let _guard = CancelOnDrop(cancel_tx);
        let mut frames = frames;
        while let Some(frame) = frames.next().await {
            let mut line = serde_json::to_vec(&frame).unwrap_or_default();
            line.push(b'\n');
            yield Ok::<_, std::convert::Infallible>(axum::body::Bytes::from(line));
        }
    };

    let body = axum::body::Body::from_stream(body_stream);
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .body(body)
        .expect("static headers and a streaming body always build a valid response"))
}

/// Sends `true` on the cancellation channel when dropped -- whether the
/// stream ran to completion or the client disconnected mid-stream, since
/// Axum drops the body stream (and everything it captured) in both cases.
struct CancelOnDrop(watch::Sender<bool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        let _ = self.0.send(true);
    }
}

/// Query parameters accepted by `GET /models`.
#[derive(Debug, Default, Deserialize)]
pub struct ModelsQuery {
    /// Restrict to one provider family (`"azure"`, `"bedrock"`, ...).
    pub provider_type: Option<String>,
    /// Restrict to a declared capability (`"streaming"`, `"vision"`, ...).
    pub capability: Option<String>,
    /// Restrict to models whose provider currently reports usable health.
    #[serde(default)]
    pub healthy_only: bool,
}

/// `GET /models`: the model catalog, optionally filtered.
pub async fn list_models(State(state): State<AppState>, Query(query): Query<ModelsQuery>) -> Json<ModelsResponse> {
    let filter = ModelFilter {
        provider_type: query.provider_type.as_deref().and_then(parse_provider_type),
        capability: query.capability.as_deref().and_then(parse_capability),
        healthy_only: query.healthy_only,
    };
    let has_filter = filter.provider_type.is_some() || filter.capability.is_some() || filter.healthy_only;
    let models = state.registry.list(has_filter.then_some(&filter));

    let data = models
        .into_iter()
        .map(|descriptor| ModelObject {
            id: descriptor.info.id,
            object: "model".to_string(),
            created: Utc::now().timestamp(),
            owned_by: descriptor.provider_id,
        })
        .collect();

    Json(ModelsResponse { object: "list".to_string(), data })
}

fn parse_provider_type(s: &str) -> Option<ProviderType> {
    serde_json::from_value(serde_json::Value::String(s.to_string())).ok()
}

fn parse_capability(s: &str) -> Option<Capability> {
    match s {
        "streaming" => Some(Capability::Streaming),
        "function_calling" | "tools" => Some(Capability::FunctionCalling),
        "vision" => Some(Capability::Vision),
        "embeddings" => Some(Capability::Embeddings),
        "json_mode" => Some(Capability::JsonMode),
        "parallel_tool_calls" => Some(Capability::ParallelToolCalls),
        _ => None,
    }
}

/// Body of `POST /models`, mirroring [`ModelRegistration`] with a
/// `Deserialize` impl -- the registry type intentionally omits one, since
/// direct HTTP registration is the only caller that needs it.
#[derive(Debug, Deserialize)]
pub struct RegisterModelBody {
    /// Model id, unique within the registry.
    pub id: String,
    /// Declared format (e.g. `"gguf"`, `"api"`, `"onnx"`).
    pub format: String,
    /// Where the model comes from (a provider id, a path, a URL).
    pub source: String,
    /// Provider instance this model is served by.
    pub provider_id: String,
    /// Declared pricing/context-window info.
    pub info: ModelInfo,
}

/// `POST /models` (admin only): register a model directly, independent of
/// any provider adapter's own declared catalog.
pub async fn register_model(
    State(state): State<AppState>,
    CallerPrincipal(principal): CallerPrincipal,
    JsonBody(body): JsonBody<RegisterModelBody>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    if !is_admin(&principal) {
        return Err(ApiError::forbidden("model registration requires the admin scope"));
    }

    let model_id = body.id.clone();
    state
        .registry
        .register_model(ModelRegistration {
            id: body.id,
            format: body.format,
            source: body.source,
            provider_id: body.provider_id,
            info: body.info,
        })
        .map_err(gateway_core::GatewayError::from)?;

    Ok((StatusCode::CREATED, Json(json!({ "id": model_id, "status": "registered" }))))
}

/// `DELETE /models/{id}` (admin only): unload a model, releasing its
/// runtime resources while leaving its registration record intact.
pub async fn delete_model(
    State(state): State<AppState>,
    CallerPrincipal(principal): CallerPrincipal,
    Path(model_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if !is_admin(&principal) {
        return Err(ApiError::forbidden("model deletion requires the admin scope"));
    }
    state.registry.unload(&model_id).await.map_err(gateway_core::GatewayError::from)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /health` (and `/healthz`): a deep health check aggregating the
/// model registry's current catalog into a scored response.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let components = vec![if state.registry.is_empty() {
        ComponentHealth::unhealthy("model_registry", "no models registered")
    } else {
        ComponentHealth::healthy("model_registry").with_detail("models", state.registry.len())
    }];

    let response = state.health.check_deep(components).await;
    let status = StatusCode::from_u16(response.status.http_status_code()).unwrap_or(StatusCode::OK);
    (status, Json(response))
}

/// `GET /live` (and `/livez`): process-alive check, no dependency probing.
pub async fn liveness_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.health.check_liveness())
}

/// `GET /ready` (and `/readyz`): traffic-readiness check against the
/// provider registry's current size.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let provider_count = state.registry.provider_ids().len();
    let response = state.health.check_readiness(provider_count, provider_count).await;
    let status = if response.ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(response))
}

/// `GET /metrics`: Prometheus text exposition.
pub async fn metrics_endpoint(State(state): State<AppState>) -> Result<Response, ApiError> {
    let body = state.metrics.render().map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
        .body(axum::body::Body::from(body))
        .expect("static headers and a plain-text body always build a valid response"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider_type_round_trips_snake_case() {
        assert_eq!(parse_provider_type("azure"), Some(ProviderType::Azure));
        assert_eq!(parse_provider_type("not-a-provider"), None);
    }

    #[test]
    fn test_parse_capability_accepts_tools_alias() {
        assert_eq!(parse_capability("tools"), Some(Capability::FunctionCalling));
        assert_eq!(parse_capability("bogus"), None);
    }
}
