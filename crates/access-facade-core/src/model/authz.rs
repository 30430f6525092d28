//! Authorization request and decision types.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The calling user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
}

impl Subject {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Normalized action name (vendor token, explicit header, or `METHOD path`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub name: String,
}

impl Action {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// HTTP target of the request being authorized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub method: String,
    pub path: String,
}

impl Resource {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
        }
    }
}

/// Extra facts engines may consult.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthzContext {
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// One authorization question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthzRequest {
    pub subject: Subject,
    pub action: Action,
    pub resource: Resource,
    pub context: AuthzContext,
}

/// Final answer of a policy engine or of the facade.
///
/// Only `Allow` admits a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Allow,
    Deny,
    Indeterminate,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Allow => "ALLOW",
            Decision::Deny => "DENY",
            Decision::Indeterminate => "INDETERMINATE",
        }
    }

    pub fn is_allow(self) -> bool {
        matches!(self, Decision::Allow)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decision plus the reason and the engine that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionOutcome {
    pub decision: Decision,
    pub reason: String,
    pub engine: Option<String>,
}

impl DecisionOutcome {
    pub fn new(decision: Decision, reason: impl Into<String>) -> Self {
        Self {
            decision,
            reason: reason.into(),
            engine: None,
        }
    }

    pub fn allow(reason: impl Into<String>) -> Self {
        Self::new(Decision::Allow, reason)
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self::new(Decision::Deny, reason)
    }

    pub fn indeterminate(reason: impl Into<String>) -> Self {
        Self::new(Decision::Indeterminate, reason)
    }

    /// Tag the outcome with the engine name.
    pub fn by_engine(mut self, engine: &str) -> Self {
        self.engine = Some(engine.to_string());
        self
    }
}
