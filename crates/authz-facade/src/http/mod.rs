//! HTTP integration: action resolution and the axum guard.

pub mod action;
pub mod guard;

pub use action::{
    extract_first_vendor_from_header_list, extract_vendor_action, resolve, ResolvedAction,
};
pub use guard::{authz_guard, AuthzGuard};
