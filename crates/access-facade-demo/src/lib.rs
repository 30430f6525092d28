//! access-facade demo service library entry.
//!
//! Wires the audit and authorization facades in front of a handful of sample
//! routes plus a local users-groups permissions endpoint. Consumed by the
//! binary (`main.rs`) and by integration tests.

pub mod app_state;
pub mod config;
pub mod consumer;
pub mod ops;
pub mod router;
pub mod web;
