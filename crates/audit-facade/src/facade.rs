//! Audit facade: one handle wiring redactor, outbox, channel and publisher.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{middleware, Router};
use tokio::task::JoinHandle;

use access_facade_core::error::Result;
use access_facade_core::model::{
    AuditEvent, AuditRecord, AuthzRequest, DecisionOutcome, ServiceIdentity,
};
use access_facade_core::obs::FacadeMetrics;
use access_facade_core::DecisionRecorder;

use crate::bus::AuditBus;
use crate::channel::AsyncAuditChannel;
use crate::config::{AuditSettings, HttpAuditSettings};
use crate::outbox::{AuditOutbox, ReplayReport};
use crate::publisher::{build_publisher, AuditPublisher};
use crate::redact::AuditRedactor;
use crate::web::http_audit;

#[derive(Clone)]
pub struct AuditFacade {
    inner: Arc<AuditInner>,
}

struct AuditInner {
    settings: AuditSettings,
    identity: ServiceIdentity,
    redactor: AuditRedactor,
    publisher: Arc<dyn AuditPublisher>,
    outbox: Arc<AuditOutbox>,
    channel: AsyncAuditChannel,
    replay_task: StdMutex<Option<JoinHandle<()>>>,
}

impl AuditFacade {
    /// Build the sink from `settings.sink` and start the workers.
    pub fn start(
        settings: AuditSettings,
        identity: ServiceIdentity,
        bus: Arc<AuditBus>,
        metrics: Arc<FacadeMetrics>,
    ) -> Result<Self> {
        let publisher = build_publisher(&settings.sink, bus, metrics.clone());
        Self::with_publisher(settings, identity, publisher, metrics)
    }

    /// Start with a caller-supplied publisher.
    pub fn with_publisher(
        settings: AuditSettings,
        identity: ServiceIdentity,
        publisher: Arc<dyn AuditPublisher>,
        metrics: Arc<FacadeMetrics>,
    ) -> Result<Self> {
        settings.validate()?;
        let http = &settings.http;

        let redactor = AuditRedactor::new(http);
        let outbox = Arc::new(AuditOutbox::new(http.outbox.clone(), metrics.clone()));
        let channel = AsyncAuditChannel::start(
            http.queue_capacity,
            http.workers,
            publisher.clone(),
            outbox.clone(),
            metrics,
        );

        tracing::info!(
            service = %identity.name,
            env = %identity.env,
            http_enabled = http.enabled,
            sink = ?settings.sink.kind,
            destination = %settings.sink.destination,
            delivery = ?settings.sink.delivery_mode,
            queue_capacity = http.queue_capacity,
            workers = http.workers,
            request_body = http.include_request_body,
            response_body = http.include_response_body,
            failure_policy = ?http.failure_policy,
            outbox = http.outbox.enabled,
            outbox_dir = %http.outbox.dir.display(),
            "audit facade started"
        );

        Ok(Self {
            inner: Arc::new(AuditInner {
                settings,
                identity,
                redactor,
                publisher,
                outbox,
                channel,
                replay_task: StdMutex::new(None),
            }),
        })
    }

    pub fn settings(&self) -> &AuditSettings {
        &self.inner.settings
    }

    pub fn http_settings(&self) -> &HttpAuditSettings {
        &self.inner.settings.http
    }

    pub fn identity(&self) -> &ServiceIdentity {
        &self.inner.identity
    }

    pub fn redactor(&self) -> &AuditRedactor {
        &self.inner.redactor
    }

    pub fn outbox(&self) -> &AuditOutbox {
        &self.inner.outbox
    }

    /// Queue any audit event. Errors only when the event could not be kept.
    pub async fn record(&self, event: AuditEvent) -> Result<()> {
        self.inner.channel.submit(event).await
    }

    /// One replay pass over the outbox.
    pub async fn replay_now(&self) -> Result<ReplayReport> {
        self.inner.outbox.replay(self.inner.publisher.as_ref()).await
    }

    /// Start periodic outbox replay. A second call is a no-op.
    pub fn spawn_replay(&self) {
        let outbox = &self.inner.settings.http.outbox;
        if !outbox.enabled {
            return;
        }
        let mut slot = match self.inner.replay_task.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        if slot.is_some() {
            return;
        }

        let period = Duration::from_secs(outbox.replay_interval_sec);
        let this = self.clone();
        *slot = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // First tick fires immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = this.replay_now().await {
                    tracing::warn!(error = %e, "audit outbox replay failed");
                }
            }
        }));
        tracing::info!(interval_sec = outbox.replay_interval_sec, "audit outbox replay scheduled");
    }

    /// Stop replay and drain queued events through the workers.
    pub async fn shutdown(&self) {
        let task = match self.inner.replay_task.lock() {
            Ok(mut g) => g.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(task) = task {
            task.abort();
        }
        self.inner.channel.shutdown().await;
    }

    /// Wrap every route of `router` with HTTP auditing.
    pub fn apply<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.layer(middleware::from_fn_with_state(self.clone(), http_audit))
    }
}

#[async_trait]
impl DecisionRecorder for AuditFacade {
    async fn record_decision(&self, request: &AuthzRequest, outcome: &DecisionOutcome) {
        let record = AuditRecord::from_outcome(&self.inner.identity, request, outcome);
        let event_id = record.event_id.clone();
        if let Err(e) = self.record(record.into()).await {
            tracing::warn!(%event_id, error = %e, "authorization audit record lost");
        }
    }
}
