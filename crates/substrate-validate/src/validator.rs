//! The [`Validator`] type: a boxed, cloneable async predicate over
//! `(uri, value, reader)`.

use futures::future::BoxFuture;
use std::sync::Arc;
use substrate_backend::Reader;
use substrate_core::record::PayloadValue;
use substrate_core::transaction::TransactionData;
use substrate_core::uri::Uri;
use substrate_error::SubstrateError;
use tokio_util::sync::CancellationToken;

use crate::cross_cutting::{check_authenticated_envelope, check_content_hash};
use crate::registry::{SchemaPolicy, SchemaRegistry};

/// The outcome of running a [`Validator`].
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    /// `true` iff the write should be accepted.
    pub valid: bool,
    /// Present when `valid` is `false`.
    pub error: Option<SubstrateError>,
}

impl ValidationOutcome {
    /// A passing outcome.
    pub fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    /// A failing outcome carrying the causing error.
    pub fn err(error: SubstrateError) -> Self {
        Self {
            valid: false,
            error: Some(error),
        }
    }
}

type BoxFut<'a> = BoxFuture<'a, ValidationOutcome>;
type ValidatorClosure =
    dyn for<'a> Fn(&'a Uri, &'a PayloadValue, &'a dyn Reader, &'a CancellationToken) -> BoxFut<'a>
        + Send
        + Sync;

/// A composable async validator: `(uri, value, reader) -> ValidationOutcome`.
///
/// Cheaply cloneable (an `Arc` underneath); combinators like [`crate::all`]
/// and [`crate::any`] take ownership of a `Vec<Validator>` and run them in
/// sequence with short-circuiting.
#[derive(Clone)]
pub struct Validator(Arc<ValidatorClosure>);

impl Validator {
    /// Build a validator from an async closure.
    pub fn new<F>(f: F) -> Self
    where
        F: for<'a> Fn(&'a Uri, &'a PayloadValue, &'a dyn Reader, &'a CancellationToken) -> BoxFut<'a>
            + Send
            + Sync
            + 'static,
    {
        Self(Arc::new(f))
    }

    /// Run the validator.
    pub async fn validate(
        &self,
        uri: &Uri,
        value: &PayloadValue,
        reader: &dyn Reader,
        cancel: &CancellationToken,
    ) -> ValidationOutcome {
        (self.0)(uri, value, reader, cancel).await
    }
}

/// Build the `schema`/`msgSchema` validator. `recurse_transactions` selects
/// `msgSchema`'s extra transaction-data behavior.
pub(crate) fn schema_validator(registry: Arc<SchemaRegistry>, recurse_transactions: bool) -> Validator {
    Validator::new(move |uri, value, reader, cancel| {
        let registry = registry.clone();
        Box::pin(validate_against_schema(
            registry,
            recurse_transactions,
            uri,
            value,
            reader,
            cancel,
        ))
    })
}

fn validate_against_schema<'a>(
    registry: Arc<SchemaRegistry>,
    recurse_transactions: bool,
    uri: &'a Uri,
    value: &'a PayloadValue,
    reader: &'a dyn Reader,
    cancel: &'a CancellationToken,
) -> BoxFut<'a> {
    Box::pin(async move {
        if let Err(e) = check_content_hash(uri, value) {
            return ValidationOutcome::err(e);
        }
        if let Err(e) = check_authenticated_envelope(uri, value) {
            return ValidationOutcome::err(e);
        }

        let program_key = uri.program_key();
        match registry.lookup(program_key.as_str()) {
            Some(validator) => {
                let outcome = validator.validate(uri, value, reader, cancel).await;
                if !outcome.valid {
                    return outcome;
                }
            }
            None => {
                let allowed = registry.is_open(program_key.as_str())
                    || matches!(registry.policy(), SchemaPolicy::AcceptUnknown);
                if !allowed {
                    return ValidationOutcome::err(SubstrateError::new(
                        substrate_error::ErrorKind::UnknownProgram,
                        format!("no validator registered for program {program_key}"),
                    ));
                }
            }
        }

        if !recurse_transactions {
            return ValidationOutcome::ok();
        }

        let Some(json) = value.as_json() else {
            return ValidationOutcome::ok();
        };
        let Some(tx) = TransactionData::from_value(json) else {
            return ValidationOutcome::ok();
        };

        for (uri_str, output_value) in &tx.outputs {
            let output_uri = match Uri::parse(uri_str) {
                Ok(u) => u,
                Err(e) => return ValidationOutcome::err(e),
            };
            let output_payload = PayloadValue::Json(output_value.clone());
            let outcome = validate_against_schema(
                registry.clone(),
                recurse_transactions,
                &output_uri,
                &output_payload,
                reader,
                cancel,
            )
            .await;
            if !outcome.valid {
                return outcome;
            }
        }

        ValidationOutcome::ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use substrate_backend::{ListOptions, ListResult, Pagination, ReadMultiOutcome, ReadOutcome};

    struct EmptyReader;

    #[async_trait]
    impl Reader for EmptyReader {
        async fn read(&self, uri: &Uri, _cancel: &CancellationToken) -> ReadOutcome {
            ReadOutcome::not_found(uri)
        }
        async fn read_multi(&self, uris: &[Uri], cancel: &CancellationToken) -> ReadMultiOutcome {
            let mut results = Vec::new();
            for u in uris {
                results.push((u.as_str().to_string(), self.read(u, cancel).await));
            }
            ReadMultiOutcome::from_results(results)
        }
        async fn list(
            &self,
            _prefix: &Uri,
            options: &ListOptions,
            _cancel: &CancellationToken,
        ) -> ListResult {
            ListResult {
                success: true,
                data: vec![],
                pagination: Pagination {
                    page: options.effective_page(),
                    limit: options.effective_limit(),
                    total: 0,
                },
                error: None,
            }
        }
    }

    #[tokio::test]
    async fn unknown_program_rejected_by_default_policy() {
        let registry = SchemaRegistry::builder().build();
        let v = crate::schema(registry);
        let uri = Uri::parse("mutable://unregistered/x").unwrap();
        let value = PayloadValue::Json(serde_json::json!({"a": 1}));
        let cancel = CancellationToken::new();
        let reader = EmptyReader;
        let outcome = v.validate(&uri, &value, &reader, &cancel).await;
        assert!(!outcome.valid);
        assert_eq!(
            outcome.error.unwrap().kind,
            substrate_error::ErrorKind::UnknownProgram
        );
    }

    #[tokio::test]
    async fn open_program_key_is_accepted_even_under_reject_unknown() {
        let registry = SchemaRegistry::builder()
            .open_program_key("mutable://open")
            .build();
        let v = crate::schema(registry);
        let uri = Uri::parse("mutable://open/x").unwrap();
        let value = PayloadValue::Json(serde_json::json!({"a": 1}));
        let cancel = CancellationToken::new();
        let reader = EmptyReader;
        let outcome = v.validate(&uri, &value, &reader, &cancel).await;
        assert!(outcome.valid);
    }

    #[tokio::test]
    async fn accept_unknown_policy_allows_any_program() {
        let registry = SchemaRegistry::builder()
            .policy(SchemaPolicy::AcceptUnknown)
            .build();
        let v = crate::schema(registry);
        let uri = Uri::parse("msg://anything/x").unwrap();
        let value = PayloadValue::Json(serde_json::json!({"a": 1}));
        let cancel = CancellationToken::new();
        let reader = EmptyReader;
        let outcome = v.validate(&uri, &value, &reader, &cancel).await;
        assert!(outcome.valid);
    }

    #[tokio::test]
    async fn msg_schema_recurses_into_transaction_outputs() {
        let registry = SchemaRegistry::builder()
            .open_program_key("mutable://open")
            .build();
        let v = crate::msg_schema(registry);
        let uri = Uri::parse("mutable://open/tx").unwrap();
        let value = PayloadValue::Json(serde_json::json!({
            "inputs": [],
            "outputs": [["mutable://unregistered/out", {"v": 1}]],
        }));
        let cancel = CancellationToken::new();
        let reader = EmptyReader;
        let outcome = v.validate(&uri, &value, &reader, &cancel).await;
        assert!(!outcome.valid);
        assert_eq!(
            outcome.error.unwrap().kind,
            substrate_error::ErrorKind::UnknownProgram
        );
    }
}
