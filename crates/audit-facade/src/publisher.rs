//! Sink side of the audit pipeline.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use time::OffsetDateTime;

use access_facade_core::error::{AccessFacadeError, Result};
use access_facade_core::model::AuditEvent;
use access_facade_core::obs::FacadeMetrics;

use crate::bus::{AuditBus, AuditMessage};
use crate::config::{DeliveryMode, SinkKind, SinkSettings};

#[async_trait]
pub trait AuditPublisher: Send + Sync {
    async fn publish(&self, event: &AuditEvent) -> Result<()>;
}

/// Publishes onto an [`AuditBus`] destination.
pub struct BusPublisher {
    bus: Arc<AuditBus>,
    sink: SinkSettings,
    metrics: Arc<FacadeMetrics>,
}

impl BusPublisher {
    pub fn new(bus: Arc<AuditBus>, sink: SinkSettings, metrics: Arc<FacadeMetrics>) -> Self {
        Self { bus, sink, metrics }
    }

    pub fn message(&self, event: &AuditEvent) -> Result<AuditMessage> {
        let body = serde_json::to_string(event)
            .map_err(|e| AccessFacadeError::Internal(format!("audit encode: {e}")))?;
        let timestamp = OffsetDateTime::now_utc();
        let expiration = match self.sink.time_to_live_ms {
            0 => None,
            ttl => {
                let ttl = i64::try_from(ttl).map_err(|_| {
                    AccessFacadeError::BadRequest(format!("audit ttl out of range: {ttl}"))
                })?;
                let at = timestamp
                    .checked_add(time::Duration::milliseconds(ttl))
                    .ok_or_else(|| {
                        AccessFacadeError::BadRequest(format!("audit ttl out of range: {ttl}"))
                    })?;
                Some(at)
            }
        };

        let mut properties = BTreeMap::new();
        properties.insert("kind".to_string(), event.kind().to_string());
        properties.insert("service".to_string(), event.service().to_string());
        if let AuditEvent::Http(http) = event {
            properties.insert("method".to_string(), http.method.clone());
            properties.insert("status".to_string(), http.status.to_string());
        }

        Ok(AuditMessage {
            destination: self.sink.destination.clone(),
            body,
            timestamp,
            priority: self.sink.priority,
            expiration,
            persistent: self.sink.delivery_mode == DeliveryMode::Persistent,
            properties,
        })
    }

    /// Returns the `result` label: `sent`, or `dropped` for an unheard non-persistent message.
    fn deliver(&self, event: &AuditEvent) -> Result<&'static str> {
        let msg = self.message(event)?;
        let persistent = msg.persistent;
        match self.bus.send(msg) {
            0 if persistent => Err(AccessFacadeError::Unavailable(format!(
                "no consumer bound to {}",
                self.sink.destination
            ))),
            0 => Ok("dropped"),
            _ => Ok("sent"),
        }
    }
}

#[async_trait]
impl AuditPublisher for BusPublisher {
    async fn publish(&self, event: &AuditEvent) -> Result<()> {
        let started = Instant::now();
        let res = self.deliver(event);
        self.metrics
            .audit_publish_duration
            .observe(&[("sink", "bus")], started.elapsed());

        match res {
            Ok(result) => {
                self.metrics.audit_published.inc(&[("result", result)]);
                tracing::debug!(
                    event_id = %event.event_id(),
                    kind = event.kind(),
                    destination = %self.sink.destination,
                    result,
                    "audit event published"
                );
                Ok(())
            }
            Err(e) => {
                self.metrics.audit_published.inc(&[("result", "failed")]);
                tracing::error!(
                    event_id = %event.event_id(),
                    destination = %self.sink.destination,
                    error = %e,
                    "audit publish failed"
                );
                Err(e)
            }
        }
    }
}

/// Writes each event as one JSON log line on target `audit`.
#[derive(Default)]
pub struct LogPublisher {
    metrics: Arc<FacadeMetrics>,
}

impl LogPublisher {
    pub fn new(metrics: Arc<FacadeMetrics>) -> Self {
        Self { metrics }
    }
}

#[async_trait]
impl AuditPublisher for LogPublisher {
    async fn publish(&self, event: &AuditEvent) -> Result<()> {
        let started = Instant::now();
        let json = serde_json::to_string(event)
            .map_err(|e| AccessFacadeError::Internal(format!("audit encode: {e}")))?;
        tracing::info!(target: "audit", kind = event.kind(), "{json}");
        self.metrics
            .audit_publish_duration
            .observe(&[("sink", "log")], started.elapsed());
        self.metrics.audit_published.inc(&[("result", "sent")]);
        Ok(())
    }
}

pub fn build_publisher(
    sink: &SinkSettings,
    bus: Arc<AuditBus>,
    metrics: Arc<FacadeMetrics>,
) -> Arc<dyn AuditPublisher> {
    match sink.kind {
        SinkKind::Bus => Arc::new(BusPublisher::new(bus, sink.clone(), metrics)),
        SinkKind::Log => Arc::new(LogPublisher::new(metrics)),
    }
}
