//! Authz settings (strict parsing, defaults match the users-groups estate).

use std::collections::BTreeMap;

use axum::http::HeaderName;
use serde::Deserialize;

use access_facade_core::error::{AccessFacadeError, Result};

use crate::engine::rules::compile_rules;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthzSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Explicit action header; `null` disables that source.
    #[serde(default = "default_action_header")]
    pub action_header: Option<String>,

    #[serde(default = "default_user_id_header")]
    pub user_id_header: String,

    #[serde(default = "default_skip_path_prefixes")]
    pub skip_path_prefixes: Vec<String>,

    #[serde(default)]
    pub rules: Vec<ActionRuleConfig>,

    /// user id -> group names, used when no users-groups service is configured.
    #[serde(default)]
    pub static_groups: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub usersgroups: Option<UsersGroupsSettings>,
}

impl Default for AuthzSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            action_header: default_action_header(),
            user_id_header: default_user_id_header(),
            skip_path_prefixes: default_skip_path_prefixes(),
            rules: Vec::new(),
            static_groups: BTreeMap::new(),
            usersgroups: None,
        }
    }
}

impl AuthzSettings {
    pub fn validate(&self) -> Result<()> {
        check_header_name("authz.user_id_header", &self.user_id_header)?;
        if let Some(h) = &self.action_header {
            check_header_name("authz.action_header", h)?;
        }
        for p in &self.skip_path_prefixes {
            if !p.starts_with('/') {
                return Err(AccessFacadeError::BadRequest(format!(
                    "authz.skip_path_prefixes entry must start with '/': {p}"
                )));
            }
        }
        compile_rules(&self.rules)?;
        if let Some(ug) = &self.usersgroups {
            ug.validate()?;
        }
        Ok(())
    }

    pub fn is_skipped(&self, path: &str) -> bool {
        self.skip_path_prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }
}

/// One row of the rule table: action pattern -> groups allowed to perform it.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionRuleConfig {
    pub action: String,
    pub groups: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UsersGroupsSettings {
    pub base_url: String,

    #[serde(default = "default_permissions_path")]
    pub permissions_path: String,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_cache_ttl_sec")]
    pub cache_ttl_sec: u64,
}

impl UsersGroupsSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(AccessFacadeError::BadRequest(
                "authz.usersgroups.base_url must be an http(s) url".into(),
            ));
        }
        if !self.permissions_path.starts_with('/') {
            return Err(AccessFacadeError::BadRequest(
                "authz.usersgroups.permissions_path must start with '/'".into(),
            ));
        }
        if !(100..=60_000).contains(&self.timeout_ms) {
            return Err(AccessFacadeError::BadRequest(
                "authz.usersgroups.timeout_ms must be between 100 and 60000".into(),
            ));
        }
        Ok(())
    }

    pub fn permissions_url(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.permissions_path
        )
    }
}

fn check_header_name(field: &str, value: &str) -> Result<()> {
    HeaderName::from_bytes(value.as_bytes())
        .map(|_| ())
        .map_err(|_| AccessFacadeError::BadRequest(format!("{field} is not a valid header name: {value}")))
}

fn default_true() -> bool {
    true
}
fn default_action_header() -> Option<String> {
    Some("CPP-ACTION".into())
}
fn default_user_id_header() -> String {
    "CJSCPPUID".into()
}
fn default_skip_path_prefixes() -> Vec<String> {
    vec!["/healthz".into(), "/readyz".into(), "/metrics".into()]
}
fn default_permissions_path() -> String {
    "/usersgroups-query-api/query/api/rest/usersgroups/users/logged-in-user/permissions".into()
}
fn default_timeout_ms() -> u64 {
    2000
}
fn default_cache_ttl_sec() -> u64 {
    60
}
