// SPDX-License-Identifier: MIT OR Apache-2.0
//! The HTTP frontend: spec.md §4.5's six routes plus the WebSocket upgrade,
//! all rooted at `/api/v1`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Path as AxPath, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use substrate_backend::{Backend, ListOptions};
use substrate_core::record::PayloadValue;
use substrate_core::uri::Uri;
use substrate_error::SubstrateError;
use substrate_wire::{uri_from_path_params, ListQuery, ReceiveRequest};

use crate::middleware::{request_id_middleware, CorsConfig, RequestLogger};
use crate::validation::validate_receive_body;
use crate::{AppState, LIST_TIMEOUT_SECS, POINT_OP_TIMEOUT_SECS};

/// Build the full `/api/v1` router: the six REST routes, the WebSocket
/// upgrade endpoint, and the ambient middleware stack (request id, request
/// logging, CORS).
pub fn build_router(state: Arc<AppState>, cors: CorsConfig) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/schema", get(schema))
        .route("/api/v1/receive", post(receive))
        .route("/api/v1/read/{scheme}/{authority}/{*path}", get(read))
        .route("/api/v1/read/{scheme}/{authority}", get(read_no_path))
        .route("/api/v1/list/{scheme}/{authority}/{*path}", get(list))
        .route("/api/v1/list/{scheme}/{authority}", get(list_no_path))
        .route("/api/v1/delete/{scheme}/{authority}/{*path}", delete(delete_record))
        .route("/api/v1/delete/{scheme}/{authority}", delete(delete_record_no_path))
        .route("/api/v1/ws", get(crate::ws::upgrade))
        .layer(axum::middleware::from_fn(crate::middleware::RequestLogger::layer))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(cors.to_cors_layer())
        .with_state(state)
}

async fn with_timeout<T>(
    seconds: u64,
    fut: impl std::future::Future<Output = T>,
) -> Result<T, SubstrateError> {
    tokio::time::timeout(Duration::from_secs(seconds), fut)
        .await
        .map_err(|_| SubstrateError::new(substrate_error::ErrorKind::Timeout, "operation timed out"))
}

fn error_response(err: &SubstrateError) -> Response {
    let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(json!({ "error": err.message, "errorKind": err.kind })),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

async fn health(State(state): State<Arc<AppState>>) -> Response {
    let cancel = CancellationToken::new();
    let outcome = state.backend.health(&cancel).await;
    let status = match outcome.status {
        substrate_backend::HealthState::Healthy => StatusCode::OK,
        substrate_backend::HealthState::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(outcome)).into_response()
}

// ---------------------------------------------------------------------------
// GET /schema
// ---------------------------------------------------------------------------

async fn schema(State(state): State<Arc<AppState>>) -> Response {
    Json(json!({ "schema": state.backend.get_schema() })).into_response()
}

// ---------------------------------------------------------------------------
// POST /receive
// ---------------------------------------------------------------------------

async fn receive(State(state): State<Arc<AppState>>, Json(req): Json<ReceiveRequest>) -> Response {
    let start = Instant::now();
    let (uri_str, raw_value) = req.tx;

    if let Err(errors) = validate_receive_body(&raw_value) {
        let err = SubstrateError::validation_failed(errors.join("; "));
        return error_response(&err);
    }

    let uri = match Uri::parse(&uri_str) {
        Ok(u) => u,
        Err(err) => return error_response(&err),
    };
    let data = match PayloadValue::from_wire_value(raw_value) {
        Ok(d) => d,
        Err(err) => return error_response(&err),
    };

    let cancel = state.cancel_token();
    let result = with_timeout(POINT_OP_TIMEOUT_SECS, state.backend.receive(&uri, data, &cancel)).await;
    let outcome = match result {
        Ok(o) => o,
        Err(err) => {
            state.record("receive", start.elapsed().as_millis() as u64, false, Some(err.kind.as_str()));
            return error_response(&err);
        }
    };

    state.record(
        "receive",
        start.elapsed().as_millis() as u64,
        outcome.accepted,
        outcome.error_kind.map(|k| k.as_str()),
    );

    let status = if outcome.accepted {
        StatusCode::OK
    } else {
        StatusCode::from_u16(
            outcome
                .error_kind
                .map(|k| k.http_status())
                .unwrap_or(400),
        )
        .unwrap_or(StatusCode::BAD_REQUEST)
    };
    (status, Json(outcome)).into_response()
}

// ---------------------------------------------------------------------------
// GET /read/:scheme/:authority/*path
// ---------------------------------------------------------------------------

async fn read(
    State(state): State<Arc<AppState>>,
    AxPath((scheme, authority, path)): AxPath<(String, String, String)>,
) -> Response {
    read_impl(state, scheme, authority, path).await
}

async fn read_no_path(
    State(state): State<Arc<AppState>>,
    AxPath((scheme, authority)): AxPath<(String, String)>,
) -> Response {
    read_impl(state, scheme, authority, String::new()).await
}

async fn read_impl(state: Arc<AppState>, scheme: String, authority: String, path: String) -> Response {
    let start = Instant::now();
    let uri = match uri_from_path_params(&scheme, &authority, &path) {
        Ok(u) => u,
        Err(err) => return error_response(&err),
    };
    let cancel = state.cancel_token();
    let result = with_timeout(POINT_OP_TIMEOUT_SECS, state.backend.read(&uri, &cancel)).await;
    let outcome = match result {
        Ok(o) => o,
        Err(err) => {
            state.record("read", start.elapsed().as_millis() as u64, false, Some(err.kind.as_str()));
            return error_response(&err);
        }
    };
    state.record(
        "read",
        start.elapsed().as_millis() as u64,
        outcome.success,
        outcome.error_kind.map(|k| k.as_str()),
    );

    if !outcome.success {
        let status = StatusCode::from_u16(
            outcome.error_kind.map(|k| k.http_status()).unwrap_or(404),
        )
        .unwrap_or(StatusCode::NOT_FOUND);
        return (status, Json(outcome)).into_response();
    }

    let record = outcome.record.expect("success implies record");
    match record.data {
        PayloadValue::Binary(bytes) => {
            let mime = substrate_wire::mime_for_path(&path);
            ([(axum::http::header::CONTENT_TYPE, mime)], bytes).into_response()
        }
        PayloadValue::Json(_) => Json(record).into_response(),
    }
}

// ---------------------------------------------------------------------------
// GET /list/:scheme/:authority/*path
// ---------------------------------------------------------------------------

async fn list(
    State(state): State<Arc<AppState>>,
    AxPath((scheme, authority, path)): AxPath<(String, String, String)>,
    Query(query): Query<ListQuery>,
) -> Response {
    list_impl(state, scheme, authority, path, query).await
}

async fn list_no_path(
    State(state): State<Arc<AppState>>,
    AxPath((scheme, authority)): AxPath<(String, String)>,
    Query(query): Query<ListQuery>,
) -> Response {
    list_impl(state, scheme, authority, String::new(), query).await
}

async fn list_impl(
    state: Arc<AppState>,
    scheme: String,
    authority: String,
    path: String,
    query: ListQuery,
) -> Response {
    let start = Instant::now();
    let uri = match uri_from_path_params(&scheme, &authority, &path) {
        Ok(u) => u,
        Err(err) => return error_response(&err),
    };
    let options: ListOptions = query.into_options();
    let cancel = state.cancel_token();
    let result = with_timeout(LIST_TIMEOUT_SECS, state.backend.list(&uri, &options, &cancel)).await;
    let outcome = match result {
        Ok(o) => o,
        Err(err) => {
            state.record("list", start.elapsed().as_millis() as u64, false, Some(err.kind.as_str()));
            return error_response(&err);
        }
    };
    state.record("list", start.elapsed().as_millis() as u64, outcome.success, None);
    let status = if outcome.success { StatusCode::OK } else { StatusCode::INTERNAL_SERVER_ERROR };
    (status, Json(outcome)).into_response()
}

// ---------------------------------------------------------------------------
// DELETE /delete/:scheme/:authority/*path
// ---------------------------------------------------------------------------

async fn delete_record(
    State(state): State<Arc<AppState>>,
    AxPath((scheme, authority, path)): AxPath<(String, String, String)>,
) -> Response {
    delete_impl(state, scheme, authority, path).await
}

async fn delete_record_no_path(
    State(state): State<Arc<AppState>>,
    AxPath((scheme, authority)): AxPath<(String, String)>,
) -> Response {
    delete_impl(state, scheme, authority, String::new()).await
}

async fn delete_impl(state: Arc<AppState>, scheme: String, authority: String, path: String) -> Response {
    let start = Instant::now();
    let uri = match uri_from_path_params(&scheme, &authority, &path) {
        Ok(u) => u,
        Err(err) => return error_response(&err),
    };
    let cancel = state.cancel_token();
    let result = with_timeout(POINT_OP_TIMEOUT_SECS, state.backend.delete(&uri, &cancel)).await;
    let outcome = match result {
        Ok(o) => o,
        Err(err) => {
            state.record("delete", start.elapsed().as_millis() as u64, false, Some(err.kind.as_str()));
            return error_response(&err);
        }
    };
    state.record(
        "delete",
        start.elapsed().as_millis() as u64,
        outcome.success,
        outcome.error_kind.map(|k| k.as_str()),
    );
    let status = if outcome.success {
        StatusCode::OK
    } else {
        StatusCode::from_u16(outcome.error_kind.map(|k| k.http_status()).unwrap_or(404))
            .unwrap_or(StatusCode::NOT_FOUND)
    };
    (status, Json(outcome)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use substrate_backend_memory::MemoryBackend;
    use substrate_validate::{schema, SchemaRegistry};
    use tower::ServiceExt;

    fn app() -> Router {
        let registry = SchemaRegistry::builder()
            .open_program_key("mutable://open")
            .open_program_key("blob://open")
            .open_program_key("immutable://open")
            .build();
        let backend = Arc::new(MemoryBackend::new(schema(registry.clone()), registry));
        let state = Arc::new(AppState::new(backend));
        build_router(state, CorsConfig::permissive())
    }

    #[tokio::test]
    async fn health_returns_200_when_healthy() {
        let resp = app()
            .oneshot(
                axum::http::Request::builder()
                    .uri("/api/v1/health")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn schema_lists_program_keys() {
        let resp = app()
            .oneshot(
                axum::http::Request::builder()
                    .uri("/api/v1/schema")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["schema"]
            .as_array()
            .unwrap()
            .iter()
            .any(|v| v == "mutable://open"));
    }

    #[tokio::test]
    async fn receive_then_read_roundtrips_through_http() {
        let app = app();
        let body = serde_json::json!({"tx": ["mutable://open/k", {"v": 1}]});
        let resp = app
            .clone()
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/api/v1/receive")
                    .header("content-type", "application/json")
                    .body(axum::body::Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/api/v1/read/mutable/open/k")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["data"]["v"], 1);
    }

    #[tokio::test]
    async fn read_missing_uri_returns_404() {
        let resp = app()
            .oneshot(
                axum::http::Request::builder()
                    .uri("/api/v1/read/mutable/open/missing")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn receive_unknown_program_returns_400() {
        let body = serde_json::json!({"tx": ["mutable://closed/k", {"v": 1}]});
        let resp = app()
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/api/v1/receive")
                    .header("content-type", "application/json")
                    .body(axum::body::Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_then_read_is_not_found() {
        let app = app();
        let body = serde_json::json!({"tx": ["mutable://open/k", {"v": 1}]});
        app.clone()
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/api/v1/receive")
                    .header("content-type", "application/json")
                    .body(axum::body::Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let resp = app
            .clone()
            .oneshot(
                axum::http::Request::builder()
                    .method("DELETE")
                    .uri("/api/v1/delete/mutable/open/k")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/api/v1/read/mutable/open/k")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_returns_paginated_children() {
        let app = app();
        for i in 0..3 {
            let body = serde_json::json!({"tx": [format!("mutable://open/k{i}"), {"v": i}]});
            app.clone()
                .oneshot(
                    axum::http::Request::builder()
                        .method("POST")
                        .uri("/api/v1/receive")
                        .header("content-type", "application/json")
                        .body(axum::body::Body::from(body.to_string()))
                        .unwrap(),
                )
                .await
                .unwrap();
        }
        let resp = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/api/v1/list/mutable/open?limit=2")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["pagination"]["total"], 3);
        assert_eq!(json["data"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn binary_read_infers_mime_from_extension() {
        let app = app();
        let bytes = b"hello world";
        let encoded = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, bytes);
        let body = serde_json::json!({
            "tx": ["mutable://open/site/index.html", {
                "__binary": true, "encoding": "base64", "data": encoded,
            }]
        });
        app.clone()
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/api/v1/receive")
                    .header("content-type", "application/json")
                    .body(axum::body::Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let resp = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/api/v1/read/mutable/open/site/index.html")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(axum::http::header::CONTENT_TYPE).unwrap(),
            "text/html"
        );
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], bytes);
    }
}
