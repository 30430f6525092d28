//! Data model shared by both facades.
//!
//! - `authz`: subject/action/resource and the decision outcome.
//! - `audit`: audit events as they travel through queue, sink and outbox.
//! - `usersgroups`: the identity service payload the group engine consumes.

pub mod audit;
pub mod authz;
pub mod usersgroups;

pub use audit::{AuditEvent, AuditRecord, HttpAuditEvent, ServiceIdentity, EVENT_VERSION};
pub use authz::{Action, AuthzContext, AuthzRequest, Decision, DecisionOutcome, Resource, Subject};
pub use usersgroups::{
    LoggedInUserPermissions, SwitchableRole, UserGroup, UserPermission, USERSGROUPS_PERMISSIONS_MEDIA_TYPE,
};
