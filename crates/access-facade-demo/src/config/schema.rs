use std::net::SocketAddr;

use serde::Deserialize;

use access_facade_core::error::{AccessFacadeError, Result};
use access_facade_core::model::ServiceIdentity;
use audit_facade::AuditSettings;
use authz_facade::AuthzSettings;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DemoConfig {
    pub version: u32,

    #[serde(default)]
    pub service: ServiceSection,

    #[serde(default)]
    pub audit: AuditSettings,

    #[serde(default)]
    pub authz: AuthzSettings,

    #[serde(default)]
    pub demo: DemoSection,
}

impl DemoConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(AccessFacadeError::UnsupportedVersion);
        }
        self.service.validate()?;
        self.audit.validate()?;
        self.authz.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceSection {
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default = "default_env")]
    pub env: String,

    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            name: default_name(),
            env: default_env(),
            listen: default_listen(),
        }
    }
}

impl ServiceSection {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AccessFacadeError::BadRequest(
                "service.name must not be empty".into(),
            ));
        }
        self.listen_addr()?;
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen.parse().map_err(|e| {
            AccessFacadeError::BadRequest(format!(
                "service.listen must be a valid socket address ({}): {e}",
                self.listen
            ))
        })
    }

    pub fn identity(&self) -> ServiceIdentity {
        ServiceIdentity {
            name: self.name.clone(),
            env: self.env.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DemoSection {
    /// Subscribe to the audit destination and log every payload.
    #[serde(default)]
    pub log_consumer: bool,
}

fn default_name() -> String {
    "access-facade-demo".into()
}
fn default_env() -> String {
    "local".into()
}
fn default_listen() -> String {
    "0.0.0.0:8080".into()
}
