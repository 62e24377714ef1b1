//! The WebSocket frame protocol: `{id, op, args}` requests multiplexed
//! over one socket, replied to with `{id, result|error}`.

use serde::{Deserialize, Serialize};
use substrate_error::{ErrorKind, SubstrateError};

/// The operation a [`WsRequest`] dispatches to, matching the `Backend`
/// protocol one-for-one (`receive` is the only write).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Op {
    /// `Backend::receive`.
    Receive,
    /// `Backend::read`.
    Read,
    /// `Backend::read_multi`.
    ReadMulti,
    /// `Backend::list`.
    List,
    /// `Backend::delete`.
    Delete,
    /// `Backend::health`.
    Health,
    /// `Backend::get_schema`.
    Schema,
}

/// An inbound WebSocket request frame: `{id, op, args}`. `id` is opaque and
/// chosen by the client; the server echoes it verbatim in the reply so a
/// caller can multiplex many in-flight requests over one socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsRequest {
    /// Client-chosen correlation id.
    pub id: String,
    /// The operation to dispatch.
    pub op: Op,
    /// Operation arguments, shaped per `op` (e.g. `{uri, data}` for
    /// `receive`, `{uri}` for `read`).
    #[serde(default)]
    pub args: serde_json::Value,
}

/// An outbound WebSocket reply frame: `{id, result}` on success or
/// `{id, error, errorKind}` on failure. At most one reply per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsReply {
    /// Echoes the request's `id`.
    pub id: String,
    /// Present on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Present on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The error kind backing `error`, when present.
    #[serde(rename = "errorKind", skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl WsReply {
    /// A successful reply carrying `result`.
    pub fn ok(id: impl Into<String>, result: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            result: Some(result),
            error: None,
            error_kind: None,
        }
    }

    /// A failed reply. Malformed frames (bad JSON, unknown `op`) use this
    /// with [`ErrorKind::ValidationFailed`] or [`ErrorKind::Transport`];
    /// the connection stays open on a single bad frame.
    pub fn err(id: impl Into<String>, error: &SubstrateError) -> Self {
        Self {
            id: id.into(),
            result: None,
            error: Some(error.message.clone()),
            error_kind: Some(error.kind),
        }
    }
}
