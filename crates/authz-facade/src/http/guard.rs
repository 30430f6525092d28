//! Authorization guard middleware.
//!
//! Flow per request:
//! - skip when disabled or when the path is an ops/skip prefix
//! - subject from the user header (401 when missing)
//! - resolve the business action, ask the facade
//! - hand the outcome to the recorder (audit)
//! - forward on ALLOW, 403 otherwise

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::json;

use access_facade_core::error::ClientCode;
use access_facade_core::model::{Action, AuthzContext, AuthzRequest, Resource, Subject};
use access_facade_core::DecisionRecorder;

use super::action::resolve;
use crate::config::AuthzSettings;
use crate::engine::PolicyDecisionFacade;

const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Clone)]
pub struct AuthzGuard {
    inner: Arc<GuardInner>,
}

struct GuardInner {
    settings: AuthzSettings,
    facade: PolicyDecisionFacade,
    recorder: Option<Arc<dyn DecisionRecorder>>,
}

impl AuthzGuard {
    pub fn new(settings: AuthzSettings, facade: PolicyDecisionFacade) -> Self {
        Self::with_recorder(settings, facade, None)
    }

    pub fn with_recorder(
        settings: AuthzSettings,
        facade: PolicyDecisionFacade,
        recorder: Option<Arc<dyn DecisionRecorder>>,
    ) -> Self {
        tracing::info!(
            enabled = settings.enabled,
            user_header = %settings.user_id_header,
            action_header = ?settings.action_header,
            rules = settings.rules.len(),
            engines = ?facade.engine_names(),
            "authz guard configured"
        );
        Self {
            inner: Arc::new(GuardInner {
                settings,
                facade,
                recorder,
            }),
        }
    }

    pub fn settings(&self) -> &AuthzSettings {
        &self.inner.settings
    }

    pub fn facade(&self) -> &PolicyDecisionFacade {
        &self.inner.facade
    }

    /// Wrap every route of `router` with the guard.
    pub fn apply<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.layer(middleware::from_fn_with_state(self.clone(), authz_guard))
    }
}

fn refuse(status: StatusCode, body: serde_json::Value) -> Response {
    (status, Json(body)).into_response()
}

pub async fn authz_guard(
    State(guard): State<AuthzGuard>,
    mut req: Request,
    next: Next,
) -> Response {
    let settings = guard.settings();
    let path = req.uri().path().to_string();
    if !settings.enabled || settings.is_skipped(&path) {
        return next.run(req).await;
    }

    let user = req
        .headers()
        .get(settings.user_id_header.as_str())
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let Some(user) = user else {
        tracing::debug!(%path, header = %settings.user_id_header, "authz: no subject");
        return refuse(
            StatusCode::UNAUTHORIZED,
            json!({
                "code": ClientCode::AuthFailed.as_str(),
                "msg": format!("missing {} header", settings.user_id_header),
            }),
        );
    };

    let resolved = resolve(
        req.method(),
        req.headers(),
        settings.action_header.as_deref(),
        &path,
    );
    let correlation_id = req
        .headers()
        .get(CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let request = AuthzRequest {
        subject: Subject::new(user),
        action: Action::new(resolved.name.clone()),
        resource: Resource::new(req.method().as_str(), path.as_str()),
        context: AuthzContext {
            correlation_id,
            ..Default::default()
        },
    };

    let outcome = guard.facade().evaluate(&request).await;
    if let Some(recorder) = &guard.inner.recorder {
        recorder.record_decision(&request, &outcome).await;
    }

    tracing::debug!(
        subject = %request.subject.id,
        action = %resolved.name,
        vendor = resolved.vendor_supplied,
        header = resolved.header_supplied,
        decision = %outcome.decision,
        reason = %outcome.reason,
        "authz decision"
    );

    if outcome.decision.is_allow() {
        req.extensions_mut().insert(resolved);
        req.extensions_mut().insert(request.subject);
        return next.run(req).await;
    }

    refuse(
        StatusCode::FORBIDDEN,
        json!({
            "code": ClientCode::NotAllowed.as_str(),
            "action": resolved.name,
            "decision": outcome.decision,
            "reason": outcome.reason,
        }),
    )
}
