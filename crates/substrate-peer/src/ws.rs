//! A WebSocket peer backend: implements [`Backend`] over one multiplexed
//! connection speaking the `{id, op, args}` / `{id, result|error}` frame
//! protocol from SPEC_FULL §4.6.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use substrate_backend::{
    Backend, DeleteOutcome, HealthOutcome, ListOptions, ListResult, ReadMultiOutcome, ReadOutcome,
    ReceiveOutcome,
};
use substrate_core::record::PayloadValue;
use substrate_core::uri::Uri;
use substrate_error::{ErrorKind, SubstrateError};
use substrate_wire::{Op, WsReply, WsRequest};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::retry::{retry_connect, RetryConfig};

const POINT_OP_TIMEOUT: Duration = Duration::from_secs(30);
const LIST_TIMEOUT: Duration = Duration::from_secs(60);

type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<WsReply>>>>;

/// A connection to a remote substrate node's WebSocket frontend.
///
/// One connection multiplexes every in-flight request by `id`; connecting
/// retries transport failures with backoff per [`RetryConfig`], but a
/// substrate-level reply (a rejected `receive`, a `not-found` `read`) is
/// never retried.
pub struct WsPeerBackend {
    outbound: mpsc::UnboundedSender<Message>,
    pending: PendingMap,
    schema_cache: Arc<StdMutex<Vec<String>>>,
}

impl WsPeerBackend {
    /// Open a connection to `url` (e.g. `"wss://node.example/api/v1"`),
    /// retrying the initial dial per `retry`.
    pub async fn connect(url: impl Into<String>, retry: RetryConfig) -> Result<Self, SubstrateError> {
        let url = url.into();
        let stream = retry_connect(&retry, || {
            let url = url.clone();
            async move {
                tokio_tungstenite::connect_async(&url)
                    .await
                    .map(|(stream, _response)| stream)
                    .map_err(|e| SubstrateError::new(ErrorKind::Transport, e.to_string()))
            }
        })
        .await?;

        let (mut write, mut read) = stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let pending_reader = pending.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    outgoing = outbound_rx.recv() => {
                        match outgoing {
                            Some(msg) => {
                                if write.send(msg).await.is_err() {
                                    break;
                                }
                            }
                            None => break,
                        }
                    }
                    incoming = read.next() => {
                        match incoming {
                            Some(Ok(Message::Text(text))) => {
                                if let Ok(reply) = serde_json::from_str::<WsReply>(&text) {
                                    if let Some(tx) = pending_reader.lock().await.remove(&reply.id) {
                                        let _ = tx.send(reply);
                                    }
                                }
                            }
                            Some(Ok(_)) => continue,
                            Some(Err(_)) | None => break,
                        }
                    }
                }
            }
        });

        Ok(Self {
            outbound: outbound_tx,
            pending,
            schema_cache: Arc::new(StdMutex::new(Vec::new())),
        })
    }

    async fn call(
        &self,
        op: Op,
        args: serde_json::Value,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, SubstrateError> {
        if cancel.is_cancelled() {
            return Err(SubstrateError::new(ErrorKind::Cancelled, "operation cancelled"));
        }

        let id = format!("{:x}", uuid::Uuid::new_v4().as_u128());
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);

        let request = WsRequest {
            id: id.clone(),
            op,
            args,
        };
        let text = serde_json::to_string(&request)
            .map_err(|e| SubstrateError::new(ErrorKind::Transport, e.to_string()))?;

        if self.outbound.send(Message::Text(text.into())).is_err() {
            self.pending.lock().await.remove(&id);
            return Err(SubstrateError::new(ErrorKind::Transport, "connection closed"));
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => match reply.error {
                Some(message) => Err(SubstrateError::new(
                    reply.error_kind.unwrap_or(ErrorKind::Transport),
                    message,
                )),
                None => Ok(reply.result.unwrap_or(serde_json::Value::Null)),
            },
            Ok(Err(_)) => Err(SubstrateError::new(ErrorKind::Transport, "connection closed")),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(SubstrateError::new(
                    ErrorKind::Timeout,
                    format!("operation timed out after {timeout:?}"),
                ))
            }
        }
    }

    /// Refresh the cached program-key list returned by
    /// [`Backend::get_schema`] (synchronous in the trait, so it can't reach
    /// the remote itself).
    pub async fn refresh_schema(&self, cancel: &CancellationToken) -> Result<(), SubstrateError> {
        let result = self
            .call(Op::Schema, serde_json::Value::Null, POINT_OP_TIMEOUT, cancel)
            .await?;
        let keys: Vec<String> = serde_json::from_value(result)
            .map_err(|e| SubstrateError::new(ErrorKind::Transport, e.to_string()))?;
        *self.schema_cache.lock().expect("schema cache poisoned") = keys;
        Ok(())
    }
}

#[async_trait]
impl Backend for WsPeerBackend {
    async fn receive(
        &self,
        uri: &Uri,
        data: PayloadValue,
        cancel: &CancellationToken,
    ) -> ReceiveOutcome {
        let args = serde_json::json!({"uri": uri.as_str(), "data": data.to_wire_value()});
        match self.call(Op::Receive, args, POINT_OP_TIMEOUT, cancel).await {
            Ok(value) => serde_json::from_value(value)
                .unwrap_or_else(|e| ReceiveOutcome::rejected(&SubstrateError::new(ErrorKind::Transport, e.to_string()))),
            Err(e) => ReceiveOutcome::rejected(&e),
        }
    }

    async fn read(&self, uri: &Uri, cancel: &CancellationToken) -> ReadOutcome {
        let args = serde_json::json!({"uri": uri.as_str()});
        match self.call(Op::Read, args, POINT_OP_TIMEOUT, cancel).await {
            Ok(value) => serde_json::from_value(value)
                .unwrap_or_else(|e| ReadOutcome::failed(&SubstrateError::new(ErrorKind::Transport, e.to_string()))),
            Err(e) => ReadOutcome::failed(&e),
        }
    }

    async fn read_multi(&self, uris: &[Uri], cancel: &CancellationToken) -> ReadMultiOutcome {
        let as_strings: Vec<String> = uris.iter().map(|u| u.as_str().to_string()).collect();
        let args = serde_json::json!({"uris": as_strings});
        match self.call(Op::ReadMulti, args, POINT_OP_TIMEOUT, cancel).await {
            Ok(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                let err = SubstrateError::new(ErrorKind::Transport, e.to_string());
                ReadMultiOutcome::from_results(
                    as_strings
                        .iter()
                        .map(|u| (u.clone(), ReadOutcome::failed(&err)))
                        .collect(),
                )
            }),
            Err(e) => ReadMultiOutcome::from_results(
                as_strings
                    .iter()
                    .map(|u| (u.clone(), ReadOutcome::failed(&e)))
                    .collect(),
            ),
        }
    }

    async fn list(
        &self,
        prefix: &Uri,
        options: &ListOptions,
        cancel: &CancellationToken,
    ) -> ListResult {
        let args = serde_json::json!({"uri": prefix.as_str(), "options": options});
        match self.call(Op::List, args, LIST_TIMEOUT, cancel).await {
            Ok(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                Self::list_error(options, SubstrateError::new(ErrorKind::Transport, e.to_string()))
            }),
            Err(e) => Self::list_error(options, e),
        }
    }

    async fn delete(&self, uri: &Uri, cancel: &CancellationToken) -> DeleteOutcome {
        let args = serde_json::json!({"uri": uri.as_str()});
        match self.call(Op::Delete, args, POINT_OP_TIMEOUT, cancel).await {
            Ok(value) => serde_json::from_value(value)
                .unwrap_or_else(|e| DeleteOutcome::failed(&SubstrateError::new(ErrorKind::Transport, e.to_string()))),
            Err(e) => DeleteOutcome::failed(&e),
        }
    }

    async fn health(&self, cancel: &CancellationToken) -> HealthOutcome {
        match self
            .call(Op::Health, serde_json::Value::Null, POINT_OP_TIMEOUT, cancel)
            .await
        {
            Ok(value) => {
                serde_json::from_value(value).unwrap_or_else(|e| HealthOutcome::unhealthy(e.to_string()))
            }
            Err(e) => HealthOutcome::unhealthy(e.message),
        }
    }

    fn get_schema(&self) -> Vec<String> {
        self.schema_cache.lock().expect("schema cache poisoned").clone()
    }

    async fn cleanup(&self) {
        let _ = self.outbound.send(Message::Close(None));
    }
}

impl WsPeerBackend {
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
