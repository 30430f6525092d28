//! HTTP audit middleware against a small router.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body, Bytes},
    http::{Request, StatusCode},
    routing::{get, post},
    Router,
};
use tower::ServiceExt;

use access_facade_core::error::Result;
use access_facade_core::model::{AuditEvent, HttpAuditEvent, ServiceIdentity};
use access_facade_core::obs::FacadeMetrics;
use audit_facade::{
    AuditFacade, AuditPublisher, AuditSettings, FailurePolicy, HttpAuditSettings, OutboxSettings,
    REDACTED,
};

#[derive(Default)]
struct Recording(Mutex<Vec<AuditEvent>>);

#[async_trait]
impl AuditPublisher for Recording {
    async fn publish(&self, event: &AuditEvent) -> Result<()> {
        self.0.lock().unwrap().push(event.clone());
        Ok(())
    }
}

impl Recording {
    fn http_events(&self) -> Vec<HttpAuditEvent> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                AuditEvent::Http(h) => Some(h.clone()),
                AuditEvent::Authorization(_) => None,
            })
            .collect()
    }
}

struct Harness {
    app: Router,
    audit: AuditFacade,
    sink: Arc<Recording>,
    _tmp: tempfile::TempDir,
}

fn harness(tweak: impl FnOnce(&mut HttpAuditSettings)) -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    let mut http = HttpAuditSettings {
        outbox: OutboxSettings {
            dir: tmp.path().to_path_buf(),
            ..Default::default()
        },
        ..Default::default()
    };
    tweak(&mut http);
    let sink = Arc::new(Recording::default());
    let audit = AuditFacade::with_publisher(
        AuditSettings {
            http,
            ..Default::default()
        },
        ServiceIdentity {
            name: "demo".into(),
            env: "test".into(),
        },
        sink.clone(),
        Arc::new(FacadeMetrics::default()),
    )
    .expect("valid settings");

    let router = Router::new()
        .route("/api/hello", get(|| async { "hello" }))
        .route("/api/echo", post(|body: String| async move { body }))
        .route("/healthz", get(|| async { "ok" }));
    Harness {
        app: audit.apply(router),
        audit,
        sink,
        _tmp: tmp,
    }
}

#[tokio::test]
async fn exchange_is_audited_with_correlation_echo() {
    let h = harness(|_| {});
    let resp = h
        .app
        .clone()
        .oneshot(
            Request::get("/api/hello?name=bob")
                .header("x-correlation-id", "corr-1")
                .header("CPP_USERID", "u-42")
                .header("authorization", "Bearer secret")
                .header("x-forwarded-for", "10.1.2.3, 10.0.0.1")
                .header("user-agent", "curl/8.0")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["x-correlation-id"], "corr-1");

    h.audit.shutdown().await;
    let events = h.sink.http_events();
    assert_eq!(events.len(), 1);
    let ev = &events[0];
    assert_eq!(ev.service, "demo");
    assert_eq!(ev.env, "test");
    assert_eq!(ev.correlation_id, "corr-1");
    assert_eq!(ev.user_id.as_deref(), Some("u-42"));
    assert_eq!(ev.method, "GET");
    assert_eq!(ev.path, "/api/hello");
    assert_eq!(ev.query, "name=bob");
    assert_eq!(ev.status, 200);
    assert_eq!(ev.client_ip, "10.1.2.3");
    assert_eq!(ev.user_agent, "curl/8.0");
    assert_eq!(ev.request_bytes, 0);
    assert_eq!(ev.response_bytes, 5);
    assert_eq!(ev.headers["authorization"], REDACTED);
    assert!(ev.request_body.is_none());
}

#[tokio::test]
async fn missing_correlation_id_gets_a_uuid() {
    let h = harness(|_| {});
    let resp = h
        .app
        .clone()
        .oneshot(Request::get("/api/hello").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let echoed = resp.headers()["x-correlation-id"].to_str().unwrap().to_string();
    assert!(uuid::Uuid::parse_str(&echoed).is_ok());

    h.audit.shutdown().await;
    let events = h.sink.http_events();
    assert_eq!(events[0].correlation_id, echoed);
    assert_eq!(events[0].client_ip, "unknown");
}

#[tokio::test]
async fn ops_paths_are_not_audited() {
    let h = harness(|_| {});
    let resp = h
        .app
        .clone()
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().get("x-correlation-id").is_none());
    h.audit.shutdown().await;
    assert!(h.sink.http_events().is_empty());
}

#[tokio::test]
async fn captured_bodies_are_redacted_and_passed_through() {
    let h = harness(|s| {
        s.include_request_body = true;
        s.include_response_body = true;
    });
    let payload = r#"{"name":"bob","password":"hunter2"}"#;
    let resp = h
        .app
        .clone()
        .oneshot(
            Request::post("/api/echo")
                .header("content-type", "application/json")
                .header("content-length", payload.len().to_string())
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body, payload.as_bytes());

    h.audit.shutdown().await;
    let ev = &h.sink.http_events()[0];
    let expected = format!(r#"{{"name":"bob","password":"{REDACTED}"}}"#);
    assert_eq!(ev.request_body.as_deref(), Some(expected.as_str()));
    assert_eq!(ev.response_body.as_deref(), Some(expected.as_str()));
    assert_eq!(ev.request_bytes, payload.len() as u64);
    assert_eq!(ev.response_bytes, payload.len() as u64);
}

#[tokio::test]
async fn oversized_bodies_stream_through_and_capture_is_bounded() {
    let h = harness(|s| {
        s.include_request_body = true;
        s.include_response_body = true;
        s.max_body_bytes = 8;
    });
    let chunks: Vec<String> = (0..4).map(|i| format!("{i}").repeat(25)).collect();
    let payload = chunks.concat();
    let frames = chunks
        .into_iter()
        .map(|c| Ok::<_, std::io::Error>(Bytes::from(c)));

    let resp = h
        .app
        .clone()
        .oneshot(
            Request::post("/api/echo")
                .header("content-length", payload.len().to_string())
                .body(Body::from_stream(futures_util::stream::iter(frames)))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body, payload.as_bytes());

    h.audit.shutdown().await;
    let ev = &h.sink.http_events()[0];
    assert_eq!(ev.request_body.as_deref(), Some("00000000"));
    assert_eq!(ev.response_body.as_deref(), Some("00000000"));
    assert_eq!(ev.request_bytes, 100);
}

/// Workers stopped and no outbox: every submission is lost.
async fn lost_event_response(policy: FailurePolicy) -> axum::response::Response {
    let h = harness(|s| {
        s.failure_policy = policy;
        s.outbox.enabled = false;
    });
    h.audit.shutdown().await;
    h.app
        .clone()
        .oneshot(Request::get("/api/hello").body(Body::empty()).unwrap())
        .await
        .unwrap()
}

#[tokio::test]
async fn fail_closed_turns_lost_event_into_500() {
    let resp = lost_event_response(FailurePolicy::FailClosed).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&body).contains("INTERNAL"));
}

#[tokio::test]
async fn fail_open_keeps_response() {
    let resp = lost_event_response(FailurePolicy::FailOpen).await;
    assert_eq!(resp.status(), StatusCode::OK);
}
