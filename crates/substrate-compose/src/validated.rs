//! `validatedClient`: wrap a write backend and a read backend with a
//! [`Validator`] that runs before every `receive`.

use std::sync::Arc;

use async_trait::async_trait;
use substrate_backend::{
    Backend, DeleteOutcome, HealthOutcome, HealthState, ListOptions, ListResult, ReadMultiOutcome,
    ReadOutcome, ReceiveOutcome,
};
use substrate_core::record::PayloadValue;
use substrate_core::uri::Uri;
use substrate_error::SubstrateError;
use substrate_validate::Validator;
use tokio_util::sync::CancellationToken;

/// Wraps a write backend and a read backend with a [`Validator`] run
/// ahead of every `receive`. Reads, `readMulti`, and `list` delegate to the
/// read backend; `delete` delegates to the write backend. Useful when the
/// write path (e.g. a peer backend with no validation of its own) needs the
/// same program-schema enforcement the in-memory backend applies natively.
pub struct ValidatedClient {
    write: Arc<dyn Backend>,
    read: Arc<dyn Backend>,
    validator: Validator,
}

impl ValidatedClient {
    /// Wrap `write`/`read` with `validator`.
    pub fn new(write: Arc<dyn Backend>, read: Arc<dyn Backend>, validator: Validator) -> Self {
        Self {
            write,
            read,
            validator,
        }
    }
}

#[async_trait]
impl Backend for ValidatedClient {
    async fn receive(
        &self,
        uri: &Uri,
        data: PayloadValue,
        cancel: &CancellationToken,
    ) -> ReceiveOutcome {
        let outcome = self
            .validator
            .validate(uri, &data, self.read.as_ref(), cancel)
            .await;
        if !outcome.valid {
            let err = outcome
                .error
                .unwrap_or_else(|| SubstrateError::validation_failed("rejected by validator"));
            return ReceiveOutcome::rejected(&err);
        }
        self.write.receive(uri, data, cancel).await
    }

    async fn read(&self, uri: &Uri, cancel: &CancellationToken) -> ReadOutcome {
        self.read.read(uri, cancel).await
    }

    async fn read_multi(&self, uris: &[Uri], cancel: &CancellationToken) -> ReadMultiOutcome {
        self.read.read_multi(uris, cancel).await
    }

    async fn list(
        &self,
        prefix: &Uri,
        options: &ListOptions,
        cancel: &CancellationToken,
    ) -> ListResult {
        self.read.list(prefix, options, cancel).await
    }

    async fn delete(&self, uri: &Uri, cancel: &CancellationToken) -> DeleteOutcome {
        self.write.delete(uri, cancel).await
    }

    async fn health(&self, cancel: &CancellationToken) -> HealthOutcome {
        let w = self.write.health(cancel).await;
        let r = self.read.health(cancel).await;
        if w.status == HealthState::Healthy && r.status == HealthState::Healthy {
            HealthOutcome::healthy()
        } else {
            HealthOutcome::unhealthy("write or read backend is unhealthy")
        }
    }

    fn get_schema(&self) -> Vec<String> {
        self.read.get_schema()
    }

    async fn cleanup(&self) {
        self.write.cleanup().await;
        self.read.cleanup().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use substrate_backend_memory::MemoryBackend;
    use substrate_validate::{SchemaRegistry, reject, schema};

    fn memory_backend(registry: Arc<SchemaRegistry>) -> Arc<dyn Backend> {
        Arc::new(MemoryBackend::new(schema(registry.clone()), registry))
    }

    #[tokio::test]
    async fn validator_runs_before_delegating_to_write_backend() {
        let registry = SchemaRegistry::builder()
            .open_program_key("mutable://open")
            .build();
        let write = memory_backend(registry.clone());
        let read = memory_backend(registry);
        let client = ValidatedClient::new(write, read, reject("always rejected at this layer"));

        let uri = Uri::parse("mutable://open/k").unwrap();
        let cancel = CancellationToken::new();
        let outcome = client
            .receive(&uri, PayloadValue::Json(serde_json::json!(1)), &cancel)
            .await;
        assert!(!outcome.accepted);

        let read_outcome = client.read(&uri, &cancel).await;
        assert!(!read_outcome.success);
    }

    #[tokio::test]
    async fn accepted_write_is_visible_through_read_backend() {
        use substrate_validate::accept;
        let registry = SchemaRegistry::builder()
            .open_program_key("mutable://open")
            .build();
        let shared = memory_backend(registry);
        let client = ValidatedClient::new(shared.clone(), shared, accept());

        let uri = Uri::parse("mutable://open/k").unwrap();
        let cancel = CancellationToken::new();
        client
            .receive(&uri, PayloadValue::Json(serde_json::json!(1)), &cancel)
            .await;
        let outcome = client.read(&uri, &cancel).await;
        assert!(outcome.success);
    }
}
