//! Guard middleware against a small router.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    routing::{get, post},
    Extension, Router,
};
use tower::ServiceExt;

use access_facade_core::model::{AuthzRequest, Decision, DecisionOutcome};
use access_facade_core::obs::FacadeMetrics;
use access_facade_core::DecisionRecorder;
use authz_facade::{
    ActionRuleConfig, AuthzGuard, AuthzSettings, PolicyDecisionFacade, ResolvedAction,
    StaticIdentityProvider,
};

#[derive(Default)]
struct Recorded(Mutex<Vec<(String, Decision)>>);

#[async_trait]
impl DecisionRecorder for Recorded {
    async fn record_decision(&self, request: &AuthzRequest, outcome: &DecisionOutcome) {
        self.0
            .lock()
            .unwrap()
            .push((request.action.name.clone(), outcome.decision));
    }
}

fn app(recorder: Arc<Recorded>) -> Router {
    let settings = AuthzSettings {
        rules: vec![
            ActionRuleConfig {
                action: "GET /api/hello".into(),
                groups: vec!["*".into()],
            },
            ActionRuleConfig {
                action: "sjp.delete-financial-means".into(),
                groups: vec!["Legal Advisers".into()],
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
    let guard = AuthzGuard::with_recorder(
        settings,
        facade,
        Some(recorder as Arc<dyn DecisionRecorder>),
    );

    let router = Router::new()
        .route("/api/hello", get(|| async { "hello" }))
        .route(
            "/cases",
            post(|Extension(action): Extension<ResolvedAction>| async move { action.name }),
        )
        .route("/healthz", get(|| async { "ok" }));
    guard.apply(router)
}

async fn body_text(resp: axum::response::Response) -> String {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn missing_subject_is_unauthorized() {
    let resp = app(Arc::default())
        .oneshot(Request::get("/api/hello").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(body_text(resp).await.contains("AUTH_FAILED"));
}

#[tokio::test]
async fn skip_prefix_bypasses_guard() {
    let resp = app(Arc::default())
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn any_group_rule_admits_identified_subject() {
    let resp = app(Arc::default())
        .oneshot(
            Request::get("/api/hello")
                .header("CJSCPPUID", "guest")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn vendor_action_allowed_for_member_and_exposed_downstream() {
    let recorder = Arc::new(Recorded::default());
    let resp = app(recorder.clone())
        .oneshot(
            Request::post("/cases")
                .header("CJSCPPUID", "la-user-1")
                .header("content-type", "application/vnd.sjp.delete-financial-means+json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_text(resp).await, "sjp.delete-financial-means");

    let rec = recorder.0.lock().unwrap();
    assert_eq!(
        rec.as_slice(),
        &[("sjp.delete-financial-means".to_string(), Decision::Allow)]
    );
}

#[tokio::test]
async fn non_member_is_forbidden_and_recorded() {
    let recorder = Arc::new(Recorded::default());
    let resp = app(recorder.clone())
        .oneshot(
            Request::post("/cases")
                .header("CJSCPPUID", "guest")
                .header("content-type", "application/vnd.sjp.delete-financial-means+json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body = body_text(resp).await;
    assert!(body.contains("NOT_ALLOWED"));
    assert!(body.contains("\"decision\":\"DENY\""));
    assert_eq!(recorder.0.lock().unwrap()[0].1, Decision::Deny);
}

#[tokio::test]
async fn unknown_action_is_forbidden() {
    let resp = app(Arc::default())
        .oneshot(
            Request::post("/cases")
                .header("CJSCPPUID", "la-user-1")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert!(body_text(resp).await.contains("INDETERMINATE"));
}
