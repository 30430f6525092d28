//! Combining engine answers.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;

use async_trait::async_trait;

use access_facade_core::error::{AccessFacadeError, Result};
use access_facade_core::model::{
    Action, AuthzContext, AuthzRequest, Decision, DecisionOutcome, Resource, Subject,
};
use access_facade_core::obs::FacadeMetrics;
use authz_facade::{
    ActionRuleConfig, AuthzSettings, PolicyDecisionFacade, PolicyEngine, StaticIdentityProvider,
};

struct Fixed(&'static str, Decision);

#[async_trait]
impl PolicyEngine for Fixed {
    fn name(&self) -> &'static str {
        self.0
    }
    async fn authorize(&self, _request: &AuthzRequest) -> Result<DecisionOutcome> {
        Ok(DecisionOutcome::new(self.1, format!("{} says so", self.0)))
    }
}

struct Broken;

#[async_trait]
impl PolicyEngine for Broken {
    fn name(&self) -> &'static str {
        "broken"
    }
    async fn authorize(&self, _request: &AuthzRequest) -> Result<DecisionOutcome> {
        Err(AccessFacadeError::Unavailable("backend down".into()))
    }
}

async fn ask(facade: &PolicyDecisionFacade, user: &str, action: &str) -> DecisionOutcome {
    facade
        .authorize(
            Subject::new(user),
            Action::new(action),
            Resource::new("GET", "/x"),
            AuthzContext::default(),
        )
        .await
}

#[tokio::test]
async fn deny_overrides_allow() {
    let metrics = Arc::new(FacadeMetrics::default());
    let facade = PolicyDecisionFacade::new(metrics.clone())
        .with_engine(Arc::new(Fixed("a", Decision::Allow)))
        .with_engine(Arc::new(Fixed("d", Decision::Deny)));

    let out = ask(&facade, "u", "x").await;
    assert_eq!(out.decision, Decision::Deny);
    assert_eq!(out.engine.as_deref(), Some("d"));
    assert_eq!(metrics.authz_decisions.get(&[("decision", "DENY")]), 1);
}

#[tokio::test]
async fn allow_beats_indeterminate() {
    let facade = PolicyDecisionFacade::new(Arc::new(FacadeMetrics::default()))
        .with_engine(Arc::new(Fixed("i", Decision::Indeterminate)))
        .with_engine(Arc::new(Fixed("a", Decision::Allow)));
    assert_eq!(ask(&facade, "u", "x").await.decision, Decision::Allow);
}

#[tokio::test]
async fn engine_error_is_indeterminate() {
    let facade = PolicyDecisionFacade::new(Arc::new(FacadeMetrics::default()))
        .with_engine(Arc::new(Broken));
    let out = ask(&facade, "u", "x").await;
    assert_eq!(out.decision, Decision::Indeterminate);
    assert!(out.reason.contains("backend down"));
}

#[tokio::test]
async fn no_engines_is_indeterminate() {
    let facade = PolicyDecisionFacade::new(Arc::new(FacadeMetrics::default()));
    assert_eq!(ask(&facade, "u", "x").await.decision, Decision::Indeterminate);
}

#[tokio::test]
async fn group_engine_from_settings() {
    let settings = AuthzSettings {
        rules: vec![
            ActionRuleConfig {
                action: "sjp.*".into(),
                groups: vec!["Legal Advisers".into()],
            },
            ActionRuleConfig {
                action: "GET /api/hello".into(),
                groups: vec!["*".into()],
            },
        ],
        ..Default::default()
    };
    let identities = StaticIdentityProvider::new()
        .with_user("la-user-1", &["Legal Advisers"])
        .with_user("guest", &["Guests"]);
    let facade = PolicyDecisionFacade::from_settings(
        &settings,
        Some(Arc::new(identities)),
        Arc::new(FacadeMetrics::default()),
    )
    .unwrap();

    assert_eq!(
        ask(&facade, "la-user-1", "sjp.delete-financial-means").await.decision,
        Decision::Allow
    );
    assert_eq!(
        ask(&facade, "guest", "sjp.delete-financial-means").await.decision,
        Decision::Deny
    );
    assert_eq!(ask(&facade, "guest", "GET /api/hello").await.decision, Decision::Allow);
    assert_eq!(
        ask(&facade, "guest", "hearing.get-draft-result").await.decision,
        Decision::Indeterminate
    );
}

#[tokio::test]
async fn static_groups_from_settings() {
    let mut settings = AuthzSettings::default();
    settings.rules.push(ActionRuleConfig {
        action: "x".into(),
        groups: vec!["Court Clerk".into()],
    });
    settings
        .static_groups
        .insert("da-user-1".into(), vec!["Court Clerk".into()]);

    let facade =
        PolicyDecisionFacade::from_settings(&settings, None, Arc::new(FacadeMetrics::default()))
            .unwrap();
    assert_eq!(ask(&facade, "DA-USER-1", "x").await.decision, Decision::Allow);
}
