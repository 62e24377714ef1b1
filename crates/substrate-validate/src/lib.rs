// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! The validator pipeline: program-schema dispatch, authenticated-envelope
//! verification, content-hash integrity, and transaction-data recursion.
//!
//! Validators are composed the way small `tower`-style middleware is
//! composed: [`all`]/[`any`] short-circuit, and [`schema`]/[`msg_schema`]
//! close over an immutable [`SchemaRegistry`]. Every validator takes a
//! [`Reader`] rather than a full [`substrate_backend::Backend`], so a
//! validator cannot call `receive` even by accident.

mod combinators;
mod cross_cutting;
mod registry;
mod validator;

pub use combinators::{accept, all, any, format, reject, require_fields, uri_pattern};
pub use cross_cutting::{check_authenticated_envelope, check_content_hash};
pub use registry::{SchemaPolicy, SchemaRegistry, SchemaRegistryBuilder};
pub use validator::{ValidationOutcome, Validator};

/// The `schema(registry)` validator: dispatches on program key, enforcing
/// the cross-cutting hash/signature rules before delegating to the
/// program's own validator.
pub fn schema(registry: std::sync::Arc<SchemaRegistry>) -> Validator {
    validator::schema_validator(registry, false)
}

/// The `msgSchema(registry)` validator: `schema`, plus recursive
/// transaction-data validation of each output.
pub fn msg_schema(registry: std::sync::Arc<SchemaRegistry>) -> Validator {
    validator::schema_validator(registry, true)
}
