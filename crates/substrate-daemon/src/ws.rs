// SPDX-License-Identifier: MIT OR Apache-2.0
//! The WebSocket frontend: one socket, many multiplexed `{id, op, args}`
//! requests per spec.md §4.6, dispatched against the same
//! [`crate::AppState::backend`] the HTTP frontend serves.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use serde::Deserialize;
use substrate_backend::ListOptions;
use substrate_core::record::PayloadValue;
use substrate_core::uri::Uri;
use substrate_error::SubstrateError;
use substrate_wire::{Op, WsReply, WsRequest};

use crate::{AppState, POINT_OP_TIMEOUT_SECS};

/// `GET /api/v1/ws`: upgrade the connection and hand it to [`handle_socket`].
pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    while let Some(Ok(message)) = socket.recv().await {
        let text = match message {
            Message::Text(t) => t,
            Message::Close(_) => break,
            // Ping/Pong/Binary frames carry no request; ignore and keep
            // the connection open per the one-bad-frame policy.
            _ => continue,
        };

        let reply = match serde_json::from_str::<WsRequest>(&text) {
            Ok(req) => dispatch(&state, req).await,
            Err(e) => {
                // We don't have a request id to echo; the spec allows the
                // connection to stay open, so reply under an empty id.
                WsReply::err(
                    "",
                    &SubstrateError::validation_failed(format!("malformed request frame: {e}")),
                )
            }
        };

        let encoded = match serde_json::to_string(&reply) {
            Ok(s) => s,
            Err(_) => continue,
        };
        if socket.send(Message::Text(encoded.into())).await.is_err() {
            break;
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct UriArgs {
    uri: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ReadMultiArgs {
    uris: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
struct ReceiveArgs {
    uri: Option<String>,
    data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, Default)]
struct ListArgs {
    uri: Option<String>,
    #[serde(flatten)]
    options: ListArgsOptions,
}

#[derive(Debug, Deserialize, Default)]
struct ListArgsOptions {
    page: Option<u32>,
    limit: Option<u32>,
    pattern: Option<String>,
    #[serde(rename = "sortBy")]
    sort_by: Option<substrate_backend::SortBy>,
    #[serde(rename = "sortOrder")]
    sort_order: Option<substrate_backend::SortOrder>,
}

impl ListArgsOptions {
    fn into_options(self) -> ListOptions {
        let default = ListOptions::default();
        ListOptions {
            page: self.page.unwrap_or(default.page),
            limit: self.limit.unwrap_or(default.limit),
            pattern: self.pattern,
            sort_by: self.sort_by.unwrap_or(default.sort_by),
            sort_order: self.sort_order.unwrap_or(default.sort_order),
        }
    }
}

fn parse_uri(arg: Option<String>) -> Result<Uri, SubstrateError> {
    let raw = arg.ok_or_else(|| SubstrateError::validation_failed("missing \"uri\" argument"))?;
    Uri::parse(&raw)
}

async fn dispatch(state: &Arc<AppState>, req: WsRequest) -> WsReply {
    let start = Instant::now();
    let cancel = state.cancel_token();
    let id = req.id.clone();

    let result = match req.op {
        Op::Receive => {
            let args: ReceiveArgs = match serde_json::from_value(req.args) {
                Ok(a) => a,
                Err(e) => return WsReply::err(id, &SubstrateError::validation_failed(e.to_string())),
            };
            let uri = match parse_uri(args.uri) {
                Ok(u) => u,
                Err(e) => return WsReply::err(id, &e),
            };
            let data = match PayloadValue::from_wire_value(args.data.unwrap_or(serde_json::Value::Null)) {
                Ok(d) => d,
                Err(e) => return WsReply::err(id, &e),
            };
            let outcome = tokio::time::timeout(
                std::time::Duration::from_secs(POINT_OP_TIMEOUT_SECS),
                state.backend.receive(&uri, data, &cancel),
            )
            .await;
            match outcome {
                Ok(o) => {
                    state.record("receive", start.elapsed().as_millis() as u64, o.accepted, o.error_kind.map(|k| k.as_str()));
                    serde_json::to_value(&o)
                }
                Err(_) => return WsReply::err(id, &SubstrateError::new(substrate_error::ErrorKind::Timeout, "receive timed out")),
            }
        }
        Op::Read => {
            let args: UriArgs = match serde_json::from_value(req.args) {
                Ok(a) => a,
                Err(e) => return WsReply::err(id, &SubstrateError::validation_failed(e.to_string())),
            };
            let uri = match parse_uri(args.uri) {
                Ok(u) => u,
                Err(e) => return WsReply::err(id, &e),
            };
            let outcome = state.backend.read(&uri, &cancel).await;
            state.record("read", start.elapsed().as_millis() as u64, outcome.success, outcome.error_kind.map(|k| k.as_str()));
            serde_json::to_value(&outcome)
        }
        Op::ReadMulti => {
            let args: ReadMultiArgs = match serde_json::from_value(req.args) {
                Ok(a) => a,
                Err(e) => return WsReply::err(id, &SubstrateError::validation_failed(e.to_string())),
            };
            let raw_uris = args.uris.unwrap_or_default();
            let mut uris = Vec::with_capacity(raw_uris.len());
            for raw in raw_uris {
                match Uri::parse(&raw) {
                    Ok(u) => uris.push(u),
                    Err(e) => return WsReply::err(id, &e),
                }
            }
            let outcome = state.backend.read_multi(&uris, &cancel).await;
            state.record("readMulti", start.elapsed().as_millis() as u64, outcome.success, None);
            serde_json::to_value(&outcome)
        }
        Op::List => {
            let args: ListArgs = match serde_json::from_value(req.args) {
                Ok(a) => a,
                Err(e) => return WsReply::err(id, &SubstrateError::validation_failed(e.to_string())),
            };
            let uri = match parse_uri(args.uri) {
                Ok(u) => u,
                Err(e) => return WsReply::err(id, &e),
            };
            let options = args.options.into_options();
            let outcome = state.backend.list(&uri, &options, &cancel).await;
            state.record("list", start.elapsed().as_millis() as u64, outcome.success, None);
            serde_json::to_value(&outcome)
        }
        Op::Delete => {
            let args: UriArgs = match serde_json::from_value(req.args) {
                Ok(a) => a,
                Err(e) => return WsReply::err(id, &SubstrateError::validation_failed(e.to_string())),
            };
            let uri = match parse_uri(args.uri) {
                Ok(u) => u,
                Err(e) => return WsReply::err(id, &e),
            };
            let outcome = state.backend.delete(&uri, &cancel).await;
            state.record("delete", start.elapsed().as_millis() as u64, outcome.success, outcome.error_kind.map(|k| k.as_str()));
            serde_json::to_value(&outcome)
        }
        Op::Health => {
            let outcome = state.backend.health(&cancel).await;
            serde_json::to_value(&outcome)
        }
        Op::Schema => serde_json::to_value(&state.backend.get_schema()),
    };

    match result {
        Ok(value) => WsReply::ok(id, value),
        Err(e) => WsReply::err(id, &SubstrateError::validation_failed(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use substrate_backend_memory::MemoryBackend;
    use substrate_validate::{schema, SchemaRegistry};
    use tokio_util::sync::CancellationToken;

    fn test_state() -> Arc<AppState> {
        let registry = SchemaRegistry::builder()
            .open_program_key("mutable://open")
            .build();
        let backend = Arc::new(MemoryBackend::new(schema(registry.clone()), registry));
        Arc::new(AppState::new(backend))
    }

    #[tokio::test]
    async fn dispatch_receive_then_read_roundtrips() {
        let state = test_state();
        let receive = WsRequest {
            id: "1".into(),
            op: Op::Receive,
            args: serde_json::json!({"uri": "mutable://open/k", "data": {"v": 1}}),
        };
        let reply = dispatch(&state, receive).await;
        assert_eq!(reply.id, "1");
        assert!(reply.error.is_none());

        let read = WsRequest {
            id: "2".into(),
            op: Op::Read,
            args: serde_json::json!({"uri": "mutable://open/k"}),
        };
        let reply = dispatch(&state, read).await;
        assert_eq!(reply.result.unwrap()["data"]["v"], 1);
    }

    #[tokio::test]
    async fn dispatch_read_missing_uri_errors() {
        let state = test_state();
        let req = WsRequest {
            id: "1".into(),
            op: Op::Read,
            args: serde_json::json!({}),
        };
        let reply = dispatch(&state, req).await;
        assert!(reply.error.is_some());
    }

    #[tokio::test]
    async fn dispatch_schema_lists_program_keys() {
        let state = test_state();
        let req = WsRequest {
            id: "1".into(),
            op: Op::Schema,
            args: serde_json::Value::Null,
        };
        let reply = dispatch(&state, req).await;
        let keys = reply.result.unwrap();
        assert!(keys.as_array().unwrap().contains(&serde_json::json!("mutable://open")));
    }

    #[tokio::test]
    async fn dispatch_unknown_program_reports_rejection() {
        let state = test_state();
        let req = WsRequest {
            id: "1".into(),
            op: Op::Receive,
            args: serde_json::json!({"uri": "mutable://closed/k", "data": {}}),
        };
        let reply = dispatch(&state, req).await;
        let result = reply.result.unwrap();
        assert_eq!(result["accepted"], false);
    }

    #[test]
    fn cancel_token_starts_uncancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
    }
}
