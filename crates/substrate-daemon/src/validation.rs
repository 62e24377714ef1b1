// SPDX-License-Identifier: MIT OR Apache-2.0
//! Request-body guardrails applied before a `receive` body ever reaches a
//! backend or validator: depth and size limits on the raw JSON, independent
//! of whatever a program's own validator checks.

use substrate_json_guard::JsonGuardLimits;

/// Depth/size budget for a `receive` body's `data` value. Deliberately
/// generous compared to `substrate_config`'s config-file limits: payloads
/// here are user data, not structured configuration.
const RECEIVE_BODY_LIMITS: JsonGuardLimits = JsonGuardLimits::new(32, 16_000_000);

/// Validate the raw JSON value of a `/receive` request body before it is
/// converted into a [`substrate_core::record::PayloadValue`]. Returns the
/// list of violations; empty means the body passed.
pub fn validate_receive_body(value: &serde_json::Value) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if exceeds_depth(value, RECEIVE_BODY_LIMITS.max_depth) {
        errors.push(format!(
            "receive body exceeds maximum nesting depth of {}",
            RECEIVE_BODY_LIMITS.max_depth
        ));
    }

    if value.to_string().len() > RECEIVE_BODY_LIMITS.max_size_bytes {
        let max_mb = RECEIVE_BODY_LIMITS.max_size_bytes / 1_000_000;
        errors.push(format!("receive body exceeds maximum size of {max_mb}MB"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn exceeds_depth(value: &serde_json::Value, max_depth: usize) -> bool {
    if max_depth == 0 {
        return value.is_object() || value.is_array();
    }
    match value {
        serde_json::Value::Object(map) => map.values().any(|v| exceeds_depth(v, max_depth - 1)),
        serde_json::Value::Array(arr) => arr.iter().any(|v| exceeds_depth(v, max_depth - 1)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_ordinary_payload() {
        assert!(validate_receive_body(&json!({"a": 1, "b": [1, 2, 3]})).is_ok());
    }

    #[test]
    fn rejects_excessive_nesting() {
        let mut value = json!(1);
        for _ in 0..40 {
            value = json!({ "n": value });
        }
        let errors = validate_receive_body(&value).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("nesting depth")));
    }

    #[test]
    fn rejects_oversized_payload() {
        let big = "x".repeat(20_000_000);
        let errors = validate_receive_body(&json!({ "data": big })).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("maximum size")));
    }

    #[test]
    fn accepts_scalars_and_null() {
        assert!(validate_receive_body(&json!(null)).is_ok());
        assert!(validate_receive_body(&json!(42)).is_ok());
        assert!(validate_receive_body(&json!("hello")).is_ok());
    }
}
