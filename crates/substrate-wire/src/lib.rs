// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Transport-agnostic wire shapes shared by the HTTP and WebSocket
//! frontends and by the peer backends that speak to them: URL-to-URI
//! reconstruction, the MIME inference table for binary reads, and the
//! `{id, op, args}` / `{id, result|error}` WebSocket frame protocol.

mod http;
mod mime;
mod ws;

pub use http::{ListQuery, ReceiveRequest, uri_from_path_params};
pub use mime::mime_for_path;
pub use ws::{Op, WsReply, WsRequest};
