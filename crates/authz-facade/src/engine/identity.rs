//! Group membership lookup.
//!
//! The users-groups service is an external collaborator; `UsersGroupsClient`
//! fetches the logged-in-user permissions document and caches the groups per
//! user for a short TTL. `StaticIdentityProvider` serves the same answer from
//! configuration and tests.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::http::header::ACCEPT;
use dashmap::DashMap;

use access_facade_core::error::{AccessFacadeError, Result};
use access_facade_core::model::{
    LoggedInUserPermissions, UserGroup, USERSGROUPS_PERMISSIONS_MEDIA_TYPE,
};

use crate::config::UsersGroupsSettings;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Groups `user_id` belongs to. Unknown users have no groups.
    async fn groups_for(&self, user_id: &str) -> Result<Vec<UserGroup>>;
}

/// In-memory user -> groups table. Lookups ignore case.
#[derive(Debug, Default)]
pub struct StaticIdentityProvider {
    users: HashMap<String, Vec<UserGroup>>,
}

impl StaticIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user_id: &str, group_names: &[&str]) -> Self {
        let groups = group_names
            .iter()
            .map(|name| UserGroup::new(*name, *name, None))
            .collect();
        self.users.insert(user_id.to_lowercase(), groups);
        self
    }

    pub fn from_names(table: &BTreeMap<String, Vec<String>>) -> Self {
        let users = table
            .iter()
            .map(|(user, names)| {
                let groups = names
                    .iter()
                    .map(|n| UserGroup::new(n.as_str(), n.as_str(), None))
                    .collect();
                (user.to_lowercase(), groups)
            })
            .collect();
        Self { users }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn groups_for(&self, user_id: &str) -> Result<Vec<UserGroup>> {
        Ok(self
            .users
            .get(&user_id.to_lowercase())
            .cloned()
            .unwrap_or_default())
    }
}

struct CachedGroups {
    fetched_at: Instant,
    groups: Vec<UserGroup>,
}

/// HTTP client for the users-groups query API.
pub struct UsersGroupsClient {
    http: reqwest::Client,
    url: String,
    user_header: String,
    ttl: Duration,
    cache: DashMap<String, CachedGroups>,
}

impl UsersGroupsClient {
    pub fn new(settings: &UsersGroupsSettings, user_header: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()
            .map_err(|e| AccessFacadeError::Internal(format!("usersgroups client build failed: {e}")))?;
        Ok(Self {
            http,
            url: settings.permissions_url(),
            user_header: user_header.to_string(),
            ttl: Duration::from_secs(settings.cache_ttl_sec),
            cache: DashMap::new(),
        })
    }

    fn cached(&self, user_id: &str) -> Option<Vec<UserGroup>> {
        if let Some(entry) = self.cache.get(user_id) {
            if entry.fetched_at.elapsed() < self.ttl {
                return Some(entry.groups.clone());
            }
        }
        // Guard above is released; removing under it would deadlock the shard.
        self.cache
            .remove_if(user_id, |_, e| e.fetched_at.elapsed() >= self.ttl);
        None
    }

    /// Drop every entry past its TTL.
    fn evict_expired(&self) {
        self.cache.retain(|_, e| e.fetched_at.elapsed() < self.ttl);
    }

    async fn fetch(&self, user_id: &str) -> Result<Vec<UserGroup>> {
        let resp = self
            .http
            .get(&self.url)
            .header(self.user_header.as_str(), user_id)
            .header(ACCEPT, USERSGROUPS_PERMISSIONS_MEDIA_TYPE)
            .send()
            .await
            .map_err(|e| AccessFacadeError::Unavailable(format!("usersgroups request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AccessFacadeError::Unavailable(format!(
                "usersgroups returned {status}"
            )));
        }

        let doc: LoggedInUserPermissions = resp
            .json()
            .await
            .map_err(|e| AccessFacadeError::Unavailable(format!("usersgroups body invalid: {e}")))?;
        Ok(doc.groups)
    }
}

#[async_trait]
impl IdentityProvider for UsersGroupsClient {
    async fn groups_for(&self, user_id: &str) -> Result<Vec<UserGroup>> {
        if let Some(groups) = self.cached(user_id) {
            return Ok(groups);
        }
        let groups = self.fetch(user_id).await?;
        tracing::debug!(user = %user_id, groups = groups.len(), "usersgroups lookup");
        if !self.ttl.is_zero() {
            self.evict_expired();
            self.cache.insert(
                user_id.to_string(),
                CachedGroups {
                    fetched_at: Instant::now(),
                    groups: groups.clone(),
                },
            );
        }
        Ok(groups)
    }
}
