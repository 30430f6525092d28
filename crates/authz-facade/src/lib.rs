//! Authorization facade.
//!
//! Puts one `authorize(subject, action, resource, context)` call in front of
//! any number of policy engines and ships an axum guard that resolves the
//! business action of an HTTP request, asks the facade, and refuses anything
//! that is not an explicit allow.

pub mod config;
pub mod engine;
pub mod http;

pub use config::{ActionRuleConfig, AuthzSettings, UsersGroupsSettings};
pub use engine::{
    GroupPolicyEngine, IdentityProvider, PolicyDecisionFacade, PolicyEngine,
    StaticIdentityProvider, UsersGroupsClient,
};
pub use http::{authz_guard, AuthzGuard, ResolvedAction};
