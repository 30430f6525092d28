//! Audit settings (strict parsing + range validation).

use std::path::PathBuf;

use serde::Deserialize;

use access_facade_core::error::{AccessFacadeError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditSettings {
    #[serde(default)]
    pub http: HttpAuditSettings,
    #[serde(default)]
    pub sink: SinkSettings,
}

impl AuditSettings {
    pub fn validate(&self) -> Result<()> {
        self.http.validate()?;
        self.sink.validate()?;
        Ok(())
    }
}

/// What the request path does when an event cannot be kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    #[default]
    FailOpen,
    FailClosed,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpAuditSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub include_request_body: bool,

    #[serde(default)]
    pub include_response_body: bool,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    #[serde(default = "default_redact_headers")]
    pub redact_headers: Vec<String>,

    #[serde(default = "default_redact_json_fields")]
    pub redact_json_fields: Vec<String>,

    #[serde(default)]
    pub failure_policy: FailurePolicy,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_user_id_header")]
    pub user_id_header: String,

    #[serde(default = "default_skip_path_prefixes")]
    pub skip_path_prefixes: Vec<String>,

    #[serde(default)]
    pub outbox: OutboxSettings,
}

impl Default for HttpAuditSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            include_request_body: false,
            include_response_body: false,
            max_body_bytes: default_max_body_bytes(),
            redact_headers: default_redact_headers(),
            redact_json_fields: default_redact_json_fields(),
            failure_policy: FailurePolicy::default(),
            queue_capacity: default_queue_capacity(),
            workers: default_workers(),
            user_id_header: default_user_id_header(),
            skip_path_prefixes: default_skip_path_prefixes(),
            outbox: OutboxSettings::default(),
        }
    }
}

impl HttpAuditSettings {
    pub fn validate(&self) -> Result<()> {
        if !(1..=1_000_000).contains(&self.queue_capacity) {
            return Err(AccessFacadeError::BadRequest(
                "audit.http.queue_capacity must be between 1 and 1000000".into(),
            ));
        }
        if !(1..=64).contains(&self.workers) {
            return Err(AccessFacadeError::BadRequest(
                "audit.http.workers must be between 1 and 64".into(),
            ));
        }
        if self.max_body_bytes == 0 {
            return Err(AccessFacadeError::BadRequest(
                "audit.http.max_body_bytes must be positive".into(),
            ));
        }
        if self.user_id_header.trim().is_empty() {
            return Err(AccessFacadeError::BadRequest(
                "audit.http.user_id_header must not be empty".into(),
            ));
        }
        self.outbox.validate()?;
        Ok(())
    }

    pub fn is_skipped(&self, path: &str) -> bool {
        self.skip_path_prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutboxSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_outbox_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_max_file_size_bytes")]
    pub max_file_size_bytes: u64,

    #[serde(default = "default_max_files")]
    pub max_files: usize,

    #[serde(default = "default_replay_interval_sec")]
    pub replay_interval_sec: u64,
}

impl Default for OutboxSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_outbox_dir(),
            max_file_size_bytes: default_max_file_size_bytes(),
            max_files: default_max_files(),
            replay_interval_sec: default_replay_interval_sec(),
        }
    }
}

impl OutboxSettings {
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.max_file_size_bytes < 1024 {
            return Err(AccessFacadeError::BadRequest(
                "audit.http.outbox.max_file_size_bytes must be at least 1024".into(),
            ));
        }
        if self.max_files == 0 {
            return Err(AccessFacadeError::BadRequest(
                "audit.http.outbox.max_files must be positive".into(),
            ));
        }
        if !(1..=3600).contains(&self.replay_interval_sec) {
            return Err(AccessFacadeError::BadRequest(
                "audit.http.outbox.replay_interval_sec must be between 1 and 3600".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    #[default]
    Bus,
    Log,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    #[default]
    Persistent,
    NonPersistent,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SinkSettings {
    #[serde(default)]
    pub kind: SinkKind,

    #[serde(default = "default_destination")]
    pub destination: String,

    #[serde(default = "default_priority")]
    pub priority: u8,

    /// 0 = messages never expire.
    #[serde(default)]
    pub time_to_live_ms: u64,

    #[serde(default)]
    pub delivery_mode: DeliveryMode,
}

impl Default for SinkSettings {
    fn default() -> Self {
        Self {
            kind: SinkKind::default(),
            destination: default_destination(),
            priority: default_priority(),
            time_to_live_ms: 0,
            delivery_mode: DeliveryMode::default(),
        }
    }
}

/// Upper bound for `audit.sink.time_to_live_ms`.
pub const MAX_TIME_TO_LIVE_MS: u64 = 30 * 24 * 60 * 60 * 1000;

impl SinkSettings {
    pub fn validate(&self) -> Result<()> {
        if self.destination.trim().is_empty() {
            return Err(AccessFacadeError::BadRequest(
                "audit.sink.destination must not be empty".into(),
            ));
        }
        if self.priority > 9 {
            return Err(AccessFacadeError::BadRequest(
                "audit.sink.priority must be between 0 and 9".into(),
            ));
        }
        if self.time_to_live_ms > MAX_TIME_TO_LIVE_MS {
            return Err(AccessFacadeError::BadRequest(format!(
                "audit.sink.time_to_live_ms must be at most {MAX_TIME_TO_LIVE_MS} (30 days)"
            )));
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}
fn default_max_body_bytes() -> usize {
    4096
}
fn default_redact_headers() -> Vec<String> {
    ["authorization", "cookie", "set-cookie", "x-api-key"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_redact_json_fields() -> Vec<String> {
    ["password", "token", "secret", "cardNumber", "cvv"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_queue_capacity() -> usize {
    5000
}
fn default_workers() -> usize {
    2
}
fn default_user_id_header() -> String {
    "CPP_USERID".into()
}
fn default_skip_path_prefixes() -> Vec<String> {
    ["/actuator", "/healthz", "/readyz", "/metrics"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_outbox_dir() -> PathBuf {
    PathBuf::from("./audit-outbox")
}
fn default_max_file_size_bytes() -> u64 {
    10 * 1024 * 1024
}
fn default_max_files() -> usize {
    200
}
fn default_replay_interval_sec() -> u64 {
    15
}
fn default_destination() -> String {
    "jms.queue.audit".into()
}
fn default_priority() -> u8 {
    4
}
