//! Shared application state for the demo service.
//!
//! Startup errors (bad rules, unreachable identity settings) come back as
//! `Result` so `main` can report them and exit cleanly.

use std::sync::Arc;

use access_facade_core::error::Result;
use access_facade_core::obs::FacadeMetrics;
use access_facade_core::DecisionRecorder;
use audit_facade::{AuditBus, AuditFacade};
use authz_facade::{AuthzGuard, IdentityProvider, PolicyDecisionFacade};

use crate::config::DemoConfig;
use crate::web::usersgroups::PERMISSIONS_PATH;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: DemoConfig,
    metrics: Arc<FacadeMetrics>,
    bus: Arc<AuditBus>,
    audit: AuditFacade,
    guard: AuthzGuard,
}

impl AppState {
    /// Build state; identities come from `authz.usersgroups` or `authz.static_groups`.
    pub fn new(cfg: DemoConfig) -> Result<Self> {
        Self::build(cfg, None)
    }

    /// Build state with an explicit identity provider.
    pub fn with_identity_provider(
        cfg: DemoConfig,
        identities: Arc<dyn IdentityProvider>,
    ) -> Result<Self> {
        Self::build(cfg, Some(identities))
    }

    fn build(cfg: DemoConfig, identities: Option<Arc<dyn IdentityProvider>>) -> Result<Self> {
        if cfg.authz.enabled && !cfg.authz.is_skipped(PERMISSIONS_PATH) {
            tracing::warn!(
                path = PERMISSIONS_PATH,
                "local permissions endpoint is guarded; add it to authz.skip_path_prefixes"
            );
        }

        let metrics = Arc::new(FacadeMetrics::default());
        let bus = Arc::new(AuditBus::new());

        let audit = AuditFacade::start(
            cfg.audit.clone(),
            cfg.service.identity(),
            bus.clone(),
            metrics.clone(),
        )?;

        let facade = PolicyDecisionFacade::from_settings(&cfg.authz, identities, metrics.clone())?;
        let recorder: Arc<dyn DecisionRecorder> = Arc::new(audit.clone());
        let guard = AuthzGuard::with_recorder(cfg.authz.clone(), facade, Some(recorder));

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                metrics,
                bus,
                audit,
                guard,
            }),
        })
    }

    pub fn cfg(&self) -> &DemoConfig {
        &self.inner.cfg
    }

    pub fn metrics(&self) -> &FacadeMetrics {
        &self.inner.metrics
    }

    pub fn bus(&self) -> &AuditBus {
        &self.inner.bus
    }

    pub fn audit(&self) -> &AuditFacade {
        &self.inner.audit
    }

    pub fn guard(&self) -> &AuthzGuard {
        &self.inner.guard
    }

    pub fn set_draining(&self) {
        self.inner.metrics.set_draining();
    }

    pub fn is_draining(&self) -> bool {
        self.inner.metrics.is_draining()
    }
}
