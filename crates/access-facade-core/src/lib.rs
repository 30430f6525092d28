//! access-facade core: transport-agnostic model, error types, and metrics.
//!
//! This crate defines the authorization and audit contracts shared by the
//! authz facade, the audit facade, and the demo service. It carries no HTTP
//! or runtime dependencies so both facades can depend on it without pulling
//! each other in.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `AccessFacadeError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod model;
pub mod obs;
pub mod recorder;

/// Shared result type.
pub use error::{AccessFacadeError, ClientCode, Result};
pub use recorder::DecisionRecorder;
