//! HTTP exchange auditing middleware.
//!
//! Runs outermost so the correlation id it settles on is visible to every
//! inner layer (the authz guard reads it from the request headers).

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    body::{Body, Bytes, HttpBody},
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use futures_util::{stream, StreamExt};
use serde_json::json;
use time::OffsetDateTime;
use uuid::Uuid;

use access_facade_core::error::ClientCode;
use access_facade_core::model::{HttpAuditEvent, EVENT_VERSION};

use crate::config::FailurePolicy;
use crate::facade::AuditFacade;

pub const CORRELATION_HEADER: &str = "x-correlation-id";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// First `X-Forwarded-For` hop, else the socket peer, else `unknown`.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    header_str(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|p| p.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// A body read up to the capture limit.
struct Captured {
    /// Same content as the original body.
    body: Body,
    /// At most `limit` bytes, for the audit record.
    text: String,
    /// Full length, when the whole body fit under the limit.
    len: Option<u64>,
}

/// Buffer at most `limit` bytes (plus the frame that crosses it). Anything
/// past that streams through untouched.
async fn capture(body: Body, limit: usize) -> Result<Captured, axum::Error> {
    let mut rest = body.into_data_stream();
    let mut head: Vec<Bytes> = Vec::new();
    let mut read = 0usize;
    let mut complete = false;

    while read <= limit {
        match rest.next().await {
            Some(Ok(chunk)) => {
                read += chunk.len();
                head.push(chunk);
            }
            Some(Err(e)) => return Err(e),
            None => {
                complete = true;
                break;
            }
        }
    }

    let mut prefix = Vec::with_capacity(read.min(limit));
    for chunk in &head {
        let take = (limit - prefix.len()).min(chunk.len());
        prefix.extend_from_slice(&chunk[..take]);
        if prefix.len() == limit {
            break;
        }
    }
    let text = String::from_utf8_lossy(&prefix).into_owned();

    if complete {
        let mut all = Vec::with_capacity(read);
        for chunk in &head {
            all.extend_from_slice(chunk);
        }
        return Ok(Captured {
            body: Body::from(all),
            text,
            len: Some(read as u64),
        });
    }
    let replay = stream::iter(head.into_iter().map(Ok::<_, axum::Error>));
    Ok(Captured {
        body: Body::from_stream(replay.chain(rest)),
        text,
        len: None,
    })
}

fn internal_error(msg: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "code": ClientCode::Internal.as_str(), "msg": msg })),
    )
        .into_response()
}

pub async fn http_audit(State(audit): State<AuditFacade>, req: Request, next: Next) -> Response {
    let settings = audit.http_settings();
    let path = req.uri().path().to_string();
    if !settings.enabled || settings.is_skipped(&path) {
        return next.run(req).await;
    }
    let started = Instant::now();

    let correlation_id = header_str(req.headers(), CORRELATION_HEADER)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let user_id = header_str(req.headers(), &settings.user_id_header).map(str::to_string);
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0);
    let client_ip = client_ip(req.headers(), peer);
    let user_agent = header_str(req.headers(), header::USER_AGENT.as_str())
        .unwrap_or_default()
        .to_string();
    let request_bytes = header_str(req.headers(), header::CONTENT_LENGTH.as_str())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);
    let method = req.method().as_str().to_string();
    let query = req.uri().query().unwrap_or_default().to_string();
    let headers = audit.redactor().redact_headers(req.headers());

    let (mut parts, body) = req.into_parts();
    if let Ok(v) = HeaderValue::from_str(&correlation_id) {
        parts.headers.insert(CORRELATION_HEADER, v);
    }
    let (req, request_body) = if settings.include_request_body {
        match capture(body, settings.max_body_bytes).await {
            Ok(c) => (Request::from_parts(parts, c.body), Some(c.text)),
            Err(e) => {
                tracing::warn!(%path, error = %e, "audit: failed to read request body");
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "code": ClientCode::BadRequest.as_str(), "msg": "unreadable body" })),
                )
                    .into_response();
            }
        }
    } else {
        (Request::from_parts(parts, body), None)
    };

    let resp = next.run(req).await;
    let status = resp.status().as_u16();

    let (mut resp, response_body, captured_len) = if settings.include_response_body {
        let (parts, body) = resp.into_parts();
        match capture(body, settings.max_body_bytes).await {
            Ok(c) => (Response::from_parts(parts, c.body), Some(c.text), c.len),
            Err(e) => {
                tracing::warn!(%path, error = %e, "audit: failed to read response body");
                return internal_error("unreadable response body");
            }
        }
    } else {
        (resp, None, None)
    };

    let response_bytes = header_str(resp.headers(), header::CONTENT_LENGTH.as_str())
        .and_then(|v| v.parse::<u64>().ok())
        .or(captured_len)
        .or_else(|| resp.body().size_hint().exact())
        .unwrap_or(0);

    if let Ok(v) = HeaderValue::from_str(&correlation_id) {
        resp.headers_mut().insert(CORRELATION_HEADER, v);
    }

    let identity = audit.identity();
    let event = HttpAuditEvent {
        event_version: EVENT_VERSION.to_string(),
        event_id: Uuid::new_v4().to_string(),
        service: identity.name.clone(),
        env: identity.env.clone(),
        timestamp: OffsetDateTime::now_utc(),
        correlation_id,
        user_id,
        method,
        path,
        query,
        status,
        latency_ms: started.elapsed().as_millis() as u64,
        client_ip,
        user_agent,
        request_bytes,
        response_bytes,
        headers,
        request_body: audit.redactor().redact_body(request_body.as_deref()),
        response_body: audit.redactor().redact_body(response_body.as_deref()),
    };

    let event_id = event.event_id.clone();
    if let Err(e) = audit.record(event.into()).await {
        match settings.failure_policy {
            FailurePolicy::FailClosed => {
                tracing::error!(%event_id, error = %e, "audit submit failed, failing request");
                return internal_error("audit unavailable");
            }
            FailurePolicy::FailOpen => {
                tracing::warn!(%event_id, error = %e, "audit submit failed, response kept");
            }
        }
    }
    resp
}
