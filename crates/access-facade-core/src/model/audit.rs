//! Audit event payloads.
//!
//! Field names are camelCase on the wire so downstream consumers of the
//! audit destination see the same document regardless of which service
//! emitted it. `AuditEvent` is the unit carried by the queue, the sink and
//! the outbox; its `kind` tag selects the payload.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::authz::{AuthzRequest, Decision, DecisionOutcome};

/// Schema version stamped on every event.
pub const EVENT_VERSION: &str = "1.0";

/// Name and environment of the emitting service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceIdentity {
    pub name: String,
    pub env: String,
}

impl Default for ServiceIdentity {
    fn default() -> Self {
        Self {
            name: "app".into(),
            env: "local".into(),
        }
    }
}

/// One audited HTTP exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpAuditEvent {
    pub event_version: String,
    pub event_id: String,
    pub service: String,
    pub env: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub correlation_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub method: String,
    pub path: String,
    /// Raw query string, empty when absent.
    pub query: String,
    pub status: u16,
    pub latency_ms: u64,
    pub client_ip: String,
    pub user_agent: String,
    pub request_bytes: u64,
    pub response_bytes: u64,
    /// Request headers after redaction.
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub request_body: Option<String>,
    #[serde(default)]
    pub response_body: Option<String>,
}

/// Normalized authorization outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub event_version: String,
    pub event_id: String,
    pub service: String,
    pub env: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(default)]
    pub correlation_id: Option<String>,
    pub subject: String,
    pub action: String,
    /// `METHOD path` of the guarded request.
    pub resource: String,
    pub decision: Decision,
    pub reason: String,
}

impl AuditRecord {
    /// Build a record for `outcome`, stamped now with a fresh event id.
    pub fn from_outcome(
        identity: &ServiceIdentity,
        request: &AuthzRequest,
        outcome: &DecisionOutcome,
    ) -> Self {
        Self {
            event_version: EVENT_VERSION.to_string(),
            event_id: Uuid::new_v4().to_string(),
            service: identity.name.clone(),
            env: identity.env.clone(),
            timestamp: OffsetDateTime::now_utc(),
            correlation_id: request.context.correlation_id.clone(),
            subject: request.subject.id.clone(),
            action: request.action.name.clone(),
            resource: format!("{} {}", request.resource.method, request.resource.path),
            decision: outcome.decision,
            reason: outcome.reason.clone(),
        }
    }
}

/// Everything the audit pipeline can carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditEvent {
    Http(HttpAuditEvent),
    Authorization(AuditRecord),
}

impl AuditEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            AuditEvent::Http(_) => "http",
            AuditEvent::Authorization(_) => "authorization",
        }
    }

    pub fn event_id(&self) -> &str {
        match self {
            AuditEvent::Http(e) => &e.event_id,
            AuditEvent::Authorization(r) => &r.event_id,
        }
    }

    pub fn service(&self) -> &str {
        match self {
            AuditEvent::Http(e) => &e.service,
            AuditEvent::Authorization(r) => &r.service,
        }
    }

    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            AuditEvent::Http(e) => Some(e.correlation_id.as_str()),
            AuditEvent::Authorization(r) => r.correlation_id.as_deref(),
        }
    }
}

impl From<HttpAuditEvent> for AuditEvent {
    fn from(e: HttpAuditEvent) -> Self {
        AuditEvent::Http(e)
    }
}

impl From<AuditRecord> for AuditEvent {
    fn from(r: AuditRecord) -> Self {
        AuditEvent::Authorization(r)
    }
}
