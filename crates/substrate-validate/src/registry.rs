//! The schema registry: an immutable mapping from program key to validator,
//! plus the policy governing programs with no registered validator.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::validator::Validator;

/// What to do with a write to a program key that has no registered
/// validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemaPolicy {
    /// Reject the write with `unknown-program`, unless the program key is
    /// in the registry's open set.
    #[default]
    RejectUnknown,
    /// Accept the write regardless of registration.
    AcceptUnknown,
}

/// An immutable program-key-to-validator mapping, built once at backend
/// construction time and never mutated afterward.
pub struct SchemaRegistry {
    validators: BTreeMap<String, Validator>,
    policy: SchemaPolicy,
    open_program_keys: BTreeSet<String>,
}

impl SchemaRegistry {
    /// Start building a registry.
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::default()
    }

    /// The validator registered for `program_key`, if any.
    pub fn lookup(&self, program_key: &str) -> Option<&Validator> {
        self.validators.get(program_key)
    }

    /// `true` if `program_key` is always accepted regardless of `policy`.
    pub fn is_open(&self, program_key: &str) -> bool {
        self.open_program_keys.contains(program_key)
    }

    /// The policy applied to programs with no registered validator and not
    /// in the open set.
    pub fn policy(&self) -> SchemaPolicy {
        self.policy
    }

    /// Every program key this registry recognizes: registered validators
    /// plus open keys. Matches the `getSchema()` backend operation.
    pub fn program_keys(&self) -> Vec<String> {
        let mut keys: BTreeSet<String> = self.validators.keys().cloned().collect();
        keys.extend(self.open_program_keys.iter().cloned());
        keys.into_iter().collect()
    }
}

/// Builder for [`SchemaRegistry`].
#[derive(Default)]
pub struct SchemaRegistryBuilder {
    validators: BTreeMap<String, Validator>,
    policy: SchemaPolicy,
    open_program_keys: BTreeSet<String>,
}

impl SchemaRegistryBuilder {
    /// Register a validator for a program key.
    pub fn validator(mut self, program_key: impl Into<String>, validator: Validator) -> Self {
        self.validators.insert(program_key.into(), validator);
        self
    }

    /// Mark a program key as always-accepted, regardless of `policy`.
    pub fn open_program_key(mut self, program_key: impl Into<String>) -> Self {
        self.open_program_keys.insert(program_key.into());
        self
    }

    /// Set the policy for unregistered, non-open program keys.
    pub fn policy(mut self, policy: SchemaPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Finalize the registry. Immutable from this point on.
    pub fn build(self) -> Arc<SchemaRegistry> {
        Arc::new(SchemaRegistry {
            validators: self.validators,
            policy: self.policy,
            open_program_keys: self.open_program_keys,
        })
    }
}
