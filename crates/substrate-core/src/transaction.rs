//! Transaction-data payload shape: `{inputs: [uri], outputs: [[uri, value]]}`.
//!
//! When a validated payload has this shape, the validator pipeline
//! recursively validates each output against the schema for that output's
//! own program key. Inputs carry no substrate-level effect — they are
//! references for application-level semantics only.

use crate::uri::Uri;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A transaction-data payload: references plus child messages to validate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionData {
    /// URIs referenced as inputs. No substrate-level effect.
    pub inputs: Vec<String>,
    /// `(uri, value)` pairs, each validated as its own message.
    pub outputs: Vec<(String, Value)>,
}

impl TransactionData {
    /// Detect the `{inputs, outputs}` shape in a raw JSON value.
    ///
    /// Returns `None` for anything that isn't a well-formed transaction-data
    /// object — callers fall back to treating the value as an opaque
    /// payload rather than erroring.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let inputs_raw = obj.get("inputs")?.as_array()?;
        let outputs_raw = obj.get("outputs")?.as_array()?;

        let mut inputs = Vec::with_capacity(inputs_raw.len());
        for v in inputs_raw {
            inputs.push(v.as_str()?.to_string());
        }

        let mut outputs = Vec::with_capacity(outputs_raw.len());
        for pair in outputs_raw {
            let pair = pair.as_array()?;
            if pair.len() != 2 {
                return None;
            }
            let uri = pair[0].as_str()?.to_string();
            outputs.push((uri, pair[1].clone()));
        }

        Some(Self { inputs, outputs })
    }

    /// Parsed [`Uri`]s for every output, in order.
    ///
    /// Fails with whichever output first fails to parse.
    pub fn output_uris(&self) -> Result<Vec<Uri>, substrate_error::SubstrateError> {
        self.outputs.iter().map(|(u, _)| Uri::parse(u)).collect()
    }
}
