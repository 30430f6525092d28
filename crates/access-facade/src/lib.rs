//! Top-level crate for access-facade.
//!
//! Re-exports the shared model, the authorization facade and the audit facade
//! so services can depend on a single crate.

pub mod core {
    pub use access_facade_core::*;
}

pub mod authz {
    pub use authz_facade::*;
}

pub mod audit {
    pub use audit_facade::*;
}
