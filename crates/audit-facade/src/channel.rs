//! Bounded audit queue drained by a pool of worker tasks.
//!
//! `submit` never waits for the sink. When the queue is full the event goes
//! straight to the outbox; workers spool whatever the publisher refuses.

use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use access_facade_core::error::{AccessFacadeError, Result};
use access_facade_core::model::AuditEvent;
use access_facade_core::obs::FacadeMetrics;

use crate::outbox::AuditOutbox;
use crate::publisher::AuditPublisher;

pub struct AsyncAuditChannel {
    tx: mpsc::Sender<AuditEvent>,
    outbox: Arc<AuditOutbox>,
    metrics: Arc<FacadeMetrics>,
    stop: watch::Sender<bool>,
    workers: StdMutex<Vec<JoinHandle<()>>>,
}

struct Worker {
    id: usize,
    rx: Arc<Mutex<mpsc::Receiver<AuditEvent>>>,
    stop: watch::Receiver<bool>,
    publisher: Arc<dyn AuditPublisher>,
    outbox: Arc<AuditOutbox>,
    metrics: Arc<FacadeMetrics>,
}

impl AsyncAuditChannel {
    /// Spawn `workers` tasks on the current runtime.
    pub fn start(
        capacity: usize,
        workers: usize,
        publisher: Arc<dyn AuditPublisher>,
        outbox: Arc<AuditOutbox>,
        metrics: Arc<FacadeMetrics>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let (stop, stop_rx) = watch::channel(false);

        let handles = (0..workers.max(1))
            .map(|id| {
                let w = Worker {
                    id,
                    rx: rx.clone(),
                    stop: stop_rx.clone(),
                    publisher: publisher.clone(),
                    outbox: outbox.clone(),
                    metrics: metrics.clone(),
                };
                tokio::spawn(w.run())
            })
            .collect();

        Self {
            tx,
            outbox,
            metrics,
            stop,
            workers: StdMutex::new(handles),
        }
    }

    /// Hand an event to the workers.
    ///
    /// Errors only when the event is lost: queue full (or closed) and the
    /// outbox is disabled or failed to append. After `shutdown` starts, new
    /// events skip the queue.
    pub async fn submit(&self, event: AuditEvent) -> Result<()> {
        if *self.stop.borrow() {
            return self.reject(event, "closed").await;
        }
        self.metrics.audit_queue_depth.inc(&[]);
        let (event, reason) = match self.tx.try_send(event) {
            Ok(()) => return Ok(()),
            Err(mpsc::error::TrySendError::Full(ev)) => (ev, "full"),
            Err(mpsc::error::TrySendError::Closed(ev)) => (ev, "closed"),
        };
        self.metrics.audit_queue_depth.dec(&[]);
        self.reject(event, reason).await
    }

    async fn reject(&self, event: AuditEvent, reason: &'static str) -> Result<()> {
        self.metrics.audit_queue_dropped.inc(&[("reason", reason)]);
        tracing::warn!(event_id = %event.event_id(), reason, "audit queue rejected event");

        if !self.outbox.enabled() {
            return Err(AccessFacadeError::QueueFull);
        }
        self.outbox.append(&event).await
    }

    /// Stop accepting work and wait for the workers to drain the queue.
    pub async fn shutdown(&self) {
        self.stop.send_replace(true);
        let handles = match self.workers.lock() {
            Ok(mut g) => std::mem::take(&mut *g),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for h in handles {
            if let Err(e) = h.await {
                tracing::warn!(error = %e, "audit worker ended abnormally");
            }
        }
        tracing::info!("audit channel drained");
    }
}

impl Worker {
    async fn run(mut self) {
        tracing::debug!(worker = self.id, "audit worker started");
        while let Some(event) = self.next().await {
            self.metrics.audit_queue_depth.dec(&[]);
            self.handle(event).await;
        }
        tracing::debug!(worker = self.id, "audit worker stopped");
    }

    /// Next queued event. Once stop is signalled, only what is already queued.
    async fn next(&mut self) -> Option<AuditEvent> {
        let mut rx = self.rx.lock().await;
        if *self.stop.borrow() {
            return rx.try_recv().ok();
        }
        tokio::select! {
            ev = rx.recv() => ev,
            _ = self.stop.changed() => rx.try_recv().ok(),
        }
    }

    async fn handle(&self, event: AuditEvent) {
        if self.publisher.publish(&event).await.is_ok() {
            return;
        }
        if !self.outbox.enabled() {
            tracing::error!(event_id = %event.event_id(), "audit event lost, outbox disabled");
            return;
        }
        // append() already logs and counts its own failure.
        let _ = self.outbox.append(&event).await;
    }
}
