//! An HTTP peer backend: implements the nine-operation `Backend` trait by
//! issuing requests against a remote substrate node's `/api/v1` routes.

use async_trait::async_trait;
use std::time::Duration;
use substrate_backend::{
    Backend, DeleteOutcome, HealthOutcome, ListOptions, ListResult, ReadOutcome, ReceiveOutcome,
};
use substrate_core::record::PayloadValue;
use substrate_core::uri::Uri;
use substrate_error::{ErrorKind, SubstrateError};
use substrate_wire::{ListQuery, ReceiveRequest};
use tokio_util::sync::CancellationToken;

/// Point operations (`receive`, `read`, `delete`, `health`) time out after this.
const POINT_OP_TIMEOUT: Duration = Duration::from_secs(30);
/// `list` times out after this.
const LIST_TIMEOUT: Duration = Duration::from_secs(60);

/// Implements [`Backend`] against a remote node's HTTP frontend, per
/// SPEC_FULL §4.7: one `reqwest::Client` built once at construction, never a
/// lazily-initialized global.
pub struct HttpPeerBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPeerBackend {
    /// Build a peer backend talking to `base_url` (e.g.
    /// `"https://node.example/api/v1"`, no trailing slash).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Build a peer backend with a caller-supplied client (connection
    /// pooling / TLS config already set up).
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn scheme_authority_path(uri: &Uri) -> (String, String, String) {
        let path = uri.path().trim_start_matches('/').to_string();
        (uri.scheme_str().to_string(), uri.authority().to_string(), path)
    }

    fn transport_error(err: reqwest::Error) -> SubstrateError {
        if err.is_timeout() {
            SubstrateError::new(ErrorKind::Timeout, err.to_string())
        } else {
            SubstrateError::new(ErrorKind::Transport, err.to_string())
        }
    }
}

fn cancelled() -> SubstrateError {
    SubstrateError::new(ErrorKind::Cancelled, "operation cancelled")
}

#[async_trait]
impl Backend for HttpPeerBackend {
    async fn receive(
        &self,
        uri: &Uri,
        data: PayloadValue,
        cancel: &CancellationToken,
    ) -> ReceiveOutcome {
        if cancel.is_cancelled() {
            return ReceiveOutcome::rejected(&cancelled());
        }
        let body = ReceiveRequest {
            tx: (uri.as_str().to_string(), data.to_wire_value()),
        };
        let result = self
            .client
            .post(format!("{}/receive", self.base_url))
            .timeout(POINT_OP_TIMEOUT)
            .json(&body)
            .send()
            .await;
        match result {
            Ok(resp) => match resp.json::<ReceiveOutcome>().await {
                Ok(outcome) => outcome,
                Err(e) => ReceiveOutcome::rejected(&Self::transport_error(e)),
            },
            Err(e) => ReceiveOutcome::rejected(&Self::transport_error(e)),
        }
    }

    async fn read(&self, uri: &Uri, cancel: &CancellationToken) -> ReadOutcome {
        if cancel.is_cancelled() {
            return ReadOutcome::failed(&cancelled());
        }
        let (scheme, authority, path) = Self::scheme_authority_path(uri);
        let result = self
            .client
            .get(format!("{}/read/{scheme}/{authority}/{path}", self.base_url))
            .timeout(POINT_OP_TIMEOUT)
            .send()
            .await;
        match result {
            Ok(resp) => match resp.json::<ReadOutcome>().await {
                Ok(outcome) => outcome,
                Err(e) => ReadOutcome::failed(&Self::transport_error(e)),
            },
            Err(e) => ReadOutcome::failed(&Self::transport_error(e)),
        }
    }

    async fn list(
        &self,
        prefix: &Uri,
        options: &ListOptions,
        cancel: &CancellationToken,
    ) -> ListResult {
        if cancel.is_cancelled() {
            return ListResult {
                success: false,
                data: Vec::new(),
                pagination: substrate_backend::Pagination {
                    page: options.page,
                    limit: options.limit,
                    total: 0,
                },
                error: Some(cancelled().message),
            };
        }
        let (scheme, authority, path) = Self::scheme_authority_path(prefix);
        let query = ListQuery {
            page: Some(options.page),
            limit: Some(options.limit),
            pattern: options.pattern.clone(),
            sort_by: Some(options.sort_by),
            sort_order: Some(options.sort_order),
        };
        let result = self
            .client
            .get(format!("{}/list/{scheme}/{authority}/{path}", self.base_url))
            .timeout(LIST_TIMEOUT)
            .query(&query)
            .send()
            .await;
        match result {
            Ok(resp) => match resp.json::<ListResult>().await {
                Ok(outcome) => outcome,
                Err(e) => Self::list_error(options, Self::transport_error(e)),
            },
            Err(e) => Self::list_error(options, Self::transport_error(e)),
        }
    }

    async fn delete(&self, uri: &Uri, cancel: &CancellationToken) -> DeleteOutcome {
        if cancel.is_cancelled() {
            return DeleteOutcome::failed(&cancelled());
        }
        let (scheme, authority, path) = Self::scheme_authority_path(uri);
        let result = self
            .client
            .delete(format!("{}/delete/{scheme}/{authority}/{path}", self.base_url))
            .timeout(POINT_OP_TIMEOUT)
            .send()
            .await;
        match result {
            Ok(resp) => match resp.json::<DeleteOutcome>().await {
                Ok(outcome) => outcome,
                Err(e) => DeleteOutcome::failed(&Self::transport_error(e)),
            },
            Err(e) => DeleteOutcome::failed(&Self::transport_error(e)),
        }
    }

    async fn health(&self, _cancel: &CancellationToken) -> HealthOutcome {
        let result = self
            .client
            .get(format!("{}/health", self.base_url))
            .timeout(POINT_OP_TIMEOUT)
            .send()
            .await;
        match result {
            Ok(resp) => resp
                .json::<HealthOutcome>()
                .await
                .unwrap_or_else(|e| HealthOutcome::unhealthy(e.to_string())),
            Err(e) => HealthOutcome::unhealthy(Self::transport_error(e).message),
        }
    }

    fn get_schema(&self) -> Vec<String> {
        // Synchronous per the trait; a peer cannot synchronously reach the
        // remote node, so this returns no advance knowledge of the remote's
        // registered programs. Callers wanting the live list should issue a
        // `GET /schema` themselves or via the WebSocket `schema` op.
        Vec::new()
    }

    async fn cleanup(&self) {}
}

impl HttpPeerBackend {
    fn list_error(options: &ListOptions, err: SubstrateError) -> ListResult {
        ListResult {
            success: false,
            data: Vec::new(),
            pagination: substrate_backend::Pagination {
                page: options.page,
                limit: options.limit,
                total: 0,
            },
            error: Some(err.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn receive_posts_tx_and_parses_outcome() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/receive"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "accepted": true, "duplicate": false
            })))
            .mount(&server)
            .await;

        let backend = HttpPeerBackend::new(format!("{}/api/v1", server.uri()));
        let uri = Uri::parse("mutable://open/k").unwrap();
        let outcome = backend
            .receive(&uri, PayloadValue::Json(json!({"a": 1})), &CancellationToken::new())
            .await;
        assert!(outcome.accepted);
    }

    #[tokio::test]
    async fn read_builds_expected_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/read/mutable/open/k"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": false, "error": "no record", "error_kind": "not-found"})))
            .mount(&server)
            .await;

        let backend = HttpPeerBackend::new(format!("{}/api/v1", server.uri()));
        let uri = Uri::parse("mutable://open/k").unwrap();
        let outcome = backend.read(&uri, &CancellationToken::new()).await;
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn transport_failure_surfaces_as_transport_error() {
        let backend = HttpPeerBackend::new("http://127.0.0.1:1".to_string());
        let uri = Uri::parse("mutable://open/k").unwrap();
        let outcome = backend.read(&uri, &CancellationToken::new()).await;
        assert!(!outcome.success);
        assert_eq!(outcome.error_kind, Some(ErrorKind::Transport));
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits_before_any_request() {
        let backend = HttpPeerBackend::new("http://127.0.0.1:1".to_string());
        let uri = Uri::parse("mutable://open/k").unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = backend.delete(&uri, &cancel).await;
        assert!(!outcome.success);
        assert_eq!(outcome.error_kind, Some(ErrorKind::Cancelled));
    }
}
