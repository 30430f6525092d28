//! In-process message bus standing in for the broker.
//!
//! Destinations are created on first use. A message sent to a destination
//! with no live subscriber is reported back to the caller, which decides
//! (by delivery mode) whether that is a failure.

use std::collections::BTreeMap;

use dashmap::DashMap;
use time::OffsetDateTime;
use tokio::sync::broadcast;

const DESTINATION_CAPACITY: usize = 1024;

/// One audit event as it travels on the bus.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditMessage {
    pub destination: String,
    /// Event JSON.
    pub body: String,
    pub timestamp: OffsetDateTime,
    /// 0 (lowest) to 9.
    pub priority: u8,
    /// None = never expires.
    pub expiration: Option<OffsetDateTime>,
    pub persistent: bool,
    pub properties: BTreeMap<String, String>,
}

impl AuditMessage {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expiration.is_some_and(|exp| now >= exp)
    }
}

#[derive(Default)]
pub struct AuditBus {
    destinations: DashMap<String, broadcast::Sender<AuditMessage>>,
}

impl AuditBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, destination: &str) -> broadcast::Sender<AuditMessage> {
        self.destinations
            .entry(destination.to_string())
            .or_insert_with(|| broadcast::channel(DESTINATION_CAPACITY).0)
            .clone()
    }

    pub fn subscribe(&self, destination: &str) -> AuditSubscription {
        AuditSubscription {
            destination: destination.to_string(),
            rx: self.sender(destination).subscribe(),
        }
    }

    /// Deliver to every current subscriber; returns how many received it.
    pub fn send(&self, msg: AuditMessage) -> usize {
        let tx = self.sender(&msg.destination);
        tx.send(msg).unwrap_or(0)
    }

    pub fn subscriber_count(&self, destination: &str) -> usize {
        self.destinations
            .get(destination)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

pub struct AuditSubscription {
    destination: String,
    rx: broadcast::Receiver<AuditMessage>,
}

impl AuditSubscription {
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Next live message. Expired messages are skipped; `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<AuditMessage> {
        loop {
            match self.rx.recv().await {
                Ok(msg) if msg.is_expired(OffsetDateTime::now_utc()) => {
                    tracing::debug!(destination = %self.destination, "skipping expired audit message");
                }
                Ok(msg) => return Some(msg),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(destination = %self.destination, skipped = n, "audit subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
