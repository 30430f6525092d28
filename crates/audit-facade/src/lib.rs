//! Audit facade.
//!
//! Turns HTTP exchanges and authorization outcomes into structured audit
//! events and delivers them to a sink without slowing the request path:
//!
//! - `web`: axum middleware capturing each exchange
//! - `redact`: header/body redaction before anything leaves the process
//! - `channel`: bounded queue + worker tasks
//! - `publisher` / `bus`: the sink side
//! - `outbox`: JSON-lines spool for events the sink refused, replayed later
//! - `facade`: wiring of all of the above from settings

pub mod bus;
pub mod channel;
pub mod config;
pub mod facade;
pub mod outbox;
pub mod publisher;
pub mod redact;
pub mod web;

pub use bus::{AuditBus, AuditMessage, AuditSubscription};
pub use channel::AsyncAuditChannel;
pub use config::{AuditSettings, DeliveryMode, FailurePolicy, HttpAuditSettings, OutboxSettings, SinkKind, SinkSettings};
pub use facade::AuditFacade;
pub use outbox::{AuditOutbox, ReplayReport};
pub use publisher::{build_publisher, AuditPublisher, BusPublisher, LogPublisher};
pub use redact::{AuditRedactor, REDACTED};
pub use web::http_audit;
