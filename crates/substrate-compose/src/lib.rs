// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Composition combinators over [`substrate_backend::Backend`]: fan writes
//! out to many backends in parallel, fail reads over to the first backend
//! with the value, and wrap a write/read pair with a validator.

mod parallel;
mod sequence;
mod validated;

pub use parallel::{AcceptPolicy, ParallelBroadcast};
pub use sequence::FirstMatchSequence;
pub use validated::ValidatedClient;
