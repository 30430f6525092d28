//! Policy decision layer.
//!
//! `PolicyEngine` is the seam for underlying decision sources;
//! `PolicyDecisionFacade` asks all of them and combines the answers with
//! deny-overrides.

pub mod group;
pub mod identity;
pub mod rules;

use std::sync::Arc;

use async_trait::async_trait;

use access_facade_core::error::Result;
use access_facade_core::model::{
    Action, AuthzContext, AuthzRequest, Decision, DecisionOutcome, Resource, Subject,
};
use access_facade_core::obs::FacadeMetrics;

use crate::config::AuthzSettings;

pub use group::GroupPolicyEngine;
pub use identity::{IdentityProvider, StaticIdentityProvider, UsersGroupsClient};

#[async_trait]
pub trait PolicyEngine: Send + Sync {
    fn name(&self) -> &'static str;
    async fn authorize(&self, request: &AuthzRequest) -> Result<DecisionOutcome>;
}

/// Uniform entry point in front of the registered engines.
pub struct PolicyDecisionFacade {
    engines: Vec<Arc<dyn PolicyEngine>>,
    metrics: Arc<FacadeMetrics>,
}

impl PolicyDecisionFacade {
    pub fn new(metrics: Arc<FacadeMetrics>) -> Self {
        Self {
            engines: Vec::new(),
            metrics,
        }
    }

    /// Wire the group engine from settings.
    ///
    /// `identities` overrides the provider the settings would select
    /// (users-groups client when configured, otherwise `static_groups`).
    pub fn from_settings(
        settings: &AuthzSettings,
        identities: Option<Arc<dyn IdentityProvider>>,
        metrics: Arc<FacadeMetrics>,
    ) -> Result<Self> {
        let identities: Arc<dyn IdentityProvider> = match (identities, &settings.usersgroups) {
            (Some(p), _) => p,
            (None, Some(ug)) => Arc::new(UsersGroupsClient::new(ug, &settings.user_id_header)?),
            (None, None) => Arc::new(StaticIdentityProvider::from_names(&settings.static_groups)),
        };
        let engine = GroupPolicyEngine::new(&settings.rules, identities)?;
        Ok(Self::new(metrics).with_engine(Arc::new(engine)))
    }

    pub fn with_engine(mut self, engine: Arc<dyn PolicyEngine>) -> Self {
        self.register(engine);
        self
    }

    pub fn register(&mut self, engine: Arc<dyn PolicyEngine>) {
        self.engines.push(engine);
    }

    pub fn engine_names(&self) -> Vec<&'static str> {
        self.engines.iter().map(|e| e.name()).collect()
    }

    pub async fn authorize(
        &self,
        subject: Subject,
        action: Action,
        resource: Resource,
        context: AuthzContext,
    ) -> DecisionOutcome {
        let request = AuthzRequest {
            subject,
            action,
            resource,
            context,
        };
        self.evaluate(&request).await
    }

    /// Ask every engine in registration order.
    /// The first deny wins; otherwise any allow; otherwise indeterminate.
    pub async fn evaluate(&self, request: &AuthzRequest) -> DecisionOutcome {
        let mut allow: Option<DecisionOutcome> = None;
        let mut undecided: Option<DecisionOutcome> = None;

        for engine in &self.engines {
            let outcome = match engine.authorize(request).await {
                Ok(o) => o.by_engine(engine.name()),
                Err(e) => {
                    tracing::warn!(
                        engine = engine.name(),
                        action = %request.action.name,
                        error = %e,
                        "policy engine failed"
                    );
                    DecisionOutcome::indeterminate(format!("engine {} failed: {e}", engine.name()))
                        .by_engine(engine.name())
                }
            };

            match outcome.decision {
                Decision::Deny => return self.finish(outcome),
                Decision::Allow => {
                    allow.get_or_insert(outcome);
                }
                Decision::Indeterminate => {
                    undecided.get_or_insert(outcome);
                }
            }
        }

        let outcome = allow
            .or(undecided)
            .unwrap_or_else(|| DecisionOutcome::indeterminate("no policy engine registered"));
        self.finish(outcome)
    }

    fn finish(&self, outcome: DecisionOutcome) -> DecisionOutcome {
        self.metrics
            .authz_decisions
            .inc(&[("decision", outcome.decision.as_str())]);
        outcome
    }
}
