// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Remote `Backend` implementations: an HTTP peer, a multiplexed WebSocket
//! peer, and thin SQL/document adapter stubs, all speaking the nine-
//! operation protocol over a network connection instead of local memory.

mod doc;
mod http;
mod retry;
mod sql;
mod ws;

pub use doc::DocBackend;
pub use http::HttpPeerBackend;
pub use retry::{compute_delay, is_retryable, retry_connect, RetryConfig};
pub use sql::SqlBackend;
pub use ws::WsPeerBackend;
