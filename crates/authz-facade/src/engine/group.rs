use std::sync::Arc;

use async_trait::async_trait;

use access_facade_core::error::Result;
use access_facade_core::model::{AuthzRequest, DecisionOutcome};

use super::identity::IdentityProvider;
use super::rules::{compile_rules, matching_rule, ActionRule};
use super::PolicyEngine;
use crate::config::ActionRuleConfig;

/// Group-membership engine: an action is allowed when the subject belongs
/// to one of the groups its rule names.
pub struct GroupPolicyEngine {
    rules: Vec<ActionRule>,
    identities: Arc<dyn IdentityProvider>,
}

impl GroupPolicyEngine {
    pub fn new(rules: &[ActionRuleConfig], identities: Arc<dyn IdentityProvider>) -> Result<Self> {
        Ok(Self {
            rules: compile_rules(rules)?,
            identities,
        })
    }
}

#[async_trait]
impl PolicyEngine for GroupPolicyEngine {
    fn name(&self) -> &'static str {
        "groups"
    }

    async fn authorize(&self, request: &AuthzRequest) -> Result<DecisionOutcome> {
        let action = request.action.name.as_str();
        let Some(rule) = matching_rule(&self.rules, action) else {
            return Ok(DecisionOutcome::indeterminate(format!("no rule for action {action}")));
        };

        if rule.any_group {
            return Ok(DecisionOutcome::allow("rule admits any identified subject"));
        }

        let groups = self.identities.groups_for(&request.subject.id).await?;
        match rule.admitting_group(&groups) {
            Some(g) => Ok(DecisionOutcome::allow(format!("member of {}", g.group_name))),
            None => Ok(DecisionOutcome::deny(format!(
                "subject not in any of [{}]",
                rule.groups.join(", ")
            ))),
        }
    }
}
