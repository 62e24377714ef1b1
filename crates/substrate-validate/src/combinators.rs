//! Small composable validator primitives: `accept`, `reject`,
//! `requireFields`, `uriPattern`, `format`, `any`, `all`.

use regex::Regex;
use substrate_error::SubstrateError;

use crate::validator::{ValidationOutcome, Validator};

/// Always valid.
pub fn accept() -> Validator {
    Validator::new(|_uri, _value, _reader, _cancel| Box::pin(async { ValidationOutcome::ok() }))
}

/// Always invalid, with a fixed message.
pub fn reject(message: impl Into<String>) -> Validator {
    let message = message.into();
    Validator::new(move |_uri, _value, _reader, _cancel| {
        let message = message.clone();
        Box::pin(async move {
            ValidationOutcome::err(SubstrateError::validation_failed(message))
        })
    })
}

/// Valid iff the payload is a JSON object containing every field in
/// `fields`. If the payload is an authenticated envelope, the fields are
/// looked up on the envelope's `payload` instead of the envelope itself.
pub fn require_fields(fields: Vec<String>) -> Validator {
    Validator::new(move |_uri, value, _reader, _cancel| {
        let fields = fields.clone();
        Box::pin(async move {
            let Some(json) = value.as_json() else {
                return ValidationOutcome::err(SubstrateError::validation_failed(
                    "requireFields: payload is binary, expected a JSON object",
                ));
            };
            let target = if substrate_core::envelope::AuthEnvelope::looks_like_envelope(json) {
                json.get("payload").unwrap_or(json)
            } else {
                json
            };
            let Some(obj) = target.as_object() else {
                return ValidationOutcome::err(SubstrateError::validation_failed(
                    "requireFields: payload is not a JSON object",
                ));
            };
            let missing: Vec<&String> = fields.iter().filter(|f| !obj.contains_key(*f)).collect();
            if missing.is_empty() {
                ValidationOutcome::ok()
            } else {
                ValidationOutcome::err(SubstrateError::validation_failed(format!(
                    "missing required fields: {missing:?}"
                )))
            }
        })
    })
}

/// Valid iff the full URI string matches `pattern`.
pub fn uri_pattern(pattern: Regex) -> Validator {
    Validator::new(move |uri, _value, _reader, _cancel| {
        let matched = pattern.is_match(uri.as_str());
        Box::pin(async move {
            if matched {
                ValidationOutcome::ok()
            } else {
                ValidationOutcome::err(SubstrateError::validation_failed(format!(
                    "uri does not match required pattern {}",
                    pattern_display()
                )))
            }
        })
    })
}

fn pattern_display() -> &'static str {
    "<configured pattern>"
}

/// Valid iff `predicate` returns `true` for the payload's JSON value.
/// Binary payloads never satisfy a `format` check.
pub fn format<F>(predicate: F) -> Validator
where
    F: Fn(&serde_json::Value) -> bool + Send + Sync + 'static,
{
    Validator::new(move |_uri, value, _reader, _cancel| {
        let ok = value.as_json().map(&predicate).unwrap_or(false);
        Box::pin(async move {
            if ok {
                ValidationOutcome::ok()
            } else {
                ValidationOutcome::err(SubstrateError::validation_failed(
                    "payload failed format check",
                ))
            }
        })
    })
}

/// Valid iff every validator in `validators` is valid. Short-circuits on
/// the first failure and returns its error.
pub fn all(validators: Vec<Validator>) -> Validator {
    Validator::new(move |uri, value, reader, cancel| {
        let validators = validators.clone();
        Box::pin(async move {
            for v in &validators {
                let outcome = v.validate(uri, value, reader, cancel).await;
                if !outcome.valid {
                    return outcome;
                }
            }
            ValidationOutcome::ok()
        })
    })
}

/// Valid iff at least one validator in `validators` is valid. On total
/// failure, returns the first validator's error.
pub fn any(validators: Vec<Validator>) -> Validator {
    Validator::new(move |uri, value, reader, cancel| {
        let validators = validators.clone();
        Box::pin(async move {
            let mut first_error = None;
            for v in &validators {
                let outcome = v.validate(uri, value, reader, cancel).await;
                if outcome.valid {
                    return ValidationOutcome::ok();
                }
                if first_error.is_none() {
                    first_error = outcome.error;
                }
            }
            ValidationOutcome::err(first_error.unwrap_or_else(|| {
                SubstrateError::validation_failed("no validator in `any` group accepted the write")
            }))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use substrate_backend::{
        ListOptions, ListResult, Pagination, ReadMultiOutcome, ReadOutcome, Reader,
    };
    use substrate_core::record::PayloadValue;
    use substrate_core::uri::Uri;
    use tokio_util::sync::CancellationToken;

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

    fn harness() -> (Uri, CancellationToken, EmptyReader) {
        (
            Uri::parse("mutable://open/k").unwrap(),
            CancellationToken::new(),
            EmptyReader,
        )
    }

    #[tokio::test]
    async fn accept_always_passes() {
        let (uri, cancel, reader) = harness();
        let value = PayloadValue::Json(serde_json::json!({}));
        assert!(accept().validate(&uri, &value, &reader, &cancel).await.valid);
    }

    #[tokio::test]
    async fn reject_always_fails_with_message() {
        let (uri, cancel, reader) = harness();
        let value = PayloadValue::Json(serde_json::json!({}));
        let outcome = reject("nope").validate(&uri, &value, &reader, &cancel).await;
        assert!(!outcome.valid);
        assert_eq!(outcome.error.unwrap().message, "nope");
    }

    #[tokio::test]
    async fn require_fields_checks_top_level_object() {
        let (uri, cancel, reader) = harness();
        let v = require_fields(vec!["name".into()]);
        let ok = PayloadValue::Json(serde_json::json!({"name": "a"}));
        let bad = PayloadValue::Json(serde_json::json!({"other": "a"}));
        assert!(v.validate(&uri, &ok, &reader, &cancel).await.valid);
        assert!(!v.validate(&uri, &bad, &reader, &cancel).await.valid);
    }

    #[tokio::test]
    async fn require_fields_checks_envelope_payload() {
        let (uri, cancel, reader) = harness();
        let v = require_fields(vec!["name".into()]);
        let value = PayloadValue::Json(serde_json::json!({
            "auth": [],
            "payload": {"name": "a"},
        }));
        assert!(v.validate(&uri, &value, &reader, &cancel).await.valid);
    }

    #[tokio::test]
    async fn uri_pattern_matches_full_uri() {
        let (uri, cancel, reader) = harness();
        let value = PayloadValue::Json(serde_json::json!({}));
        let matching = uri_pattern(Regex::new(r"^mutable://open/").unwrap());
        let mismatching = uri_pattern(Regex::new(r"^immutable://").unwrap());
        assert!(matching.validate(&uri, &value, &reader, &cancel).await.valid);
        assert!(!mismatching.validate(&uri, &value, &reader, &cancel).await.valid);
    }

    #[tokio::test]
    async fn format_runs_predicate_on_json_payload() {
        let (uri, cancel, reader) = harness();
        let v = format(|j| j.get("n").and_then(|n| n.as_i64()).is_some_and(|n| n > 0));
        let ok = PayloadValue::Json(serde_json::json!({"n": 1}));
        let bad = PayloadValue::Json(serde_json::json!({"n": -1}));
        assert!(v.validate(&uri, &ok, &reader, &cancel).await.valid);
        assert!(!v.validate(&uri, &bad, &reader, &cancel).await.valid);
    }

    #[tokio::test]
    async fn all_short_circuits_on_first_failure() {
        let (uri, cancel, reader) = harness();
        let value = PayloadValue::Json(serde_json::json!({}));
        let v = all(vec![accept(), reject("stop here"), reject("never reached")]);
        let outcome = v.validate(&uri, &value, &reader, &cancel).await;
        assert_eq!(outcome.error.unwrap().message, "stop here");
    }

    #[tokio::test]
    async fn any_passes_if_one_validator_passes() {
        let (uri, cancel, reader) = harness();
        let value = PayloadValue::Json(serde_json::json!({}));
        let v = any(vec![reject("no"), accept()]);
        assert!(v.validate(&uri, &value, &reader, &cancel).await.valid);
    }

    #[tokio::test]
    async fn any_fails_with_first_error_if_all_fail() {
        let (uri, cancel, reader) = harness();
        let value = PayloadValue::Json(serde_json::json!({}));
        let v = any(vec![reject("first"), reject("second")]);
        let outcome = v.validate(&uri, &value, &reader, &cancel).await;
        assert_eq!(outcome.error.unwrap().message, "first");
    }
}
