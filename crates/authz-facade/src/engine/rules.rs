//! Rule table compilation and matching.
//!
//! Supports exact actions (`sjp.delete-financial-means`), trailing wildcard
//! prefixes (`sjp.*`, `GET /api/*`) and the catch-all `*`. Matching is
//! case-insensitive; the most specific matching rule wins.

use access_facade_core::error::{AccessFacadeError, Result};
use access_facade_core::model::UserGroup;

use crate::config::ActionRuleConfig;

/// Compiled action pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionPattern {
    Any,
    Prefix(String),
    Exact(String),
}

impl ActionPattern {
    fn matches(&self, action: &str) -> bool {
        match self {
            ActionPattern::Any => true,
            ActionPattern::Prefix(p) => action.starts_with(p.as_str()),
            ActionPattern::Exact(a) => a == action,
        }
    }

    /// Exact beats any prefix; a longer prefix beats a shorter one.
    fn specificity(&self) -> usize {
        match self {
            ActionPattern::Any => 0,
            ActionPattern::Prefix(p) => 1 + p.len(),
            ActionPattern::Exact(_) => usize::MAX,
        }
    }
}

/// Compiled rule.
#[derive(Debug, Clone)]
pub struct ActionRule {
    pub pattern: ActionPattern,
    /// Lower-cased group names.
    pub groups: Vec<String>,
    /// `*` in the group list: any identified subject.
    pub any_group: bool,
}

impl ActionRule {
    /// First of the subject's groups admitted by this rule.
    pub fn admitting_group<'a>(&self, groups: &'a [UserGroup]) -> Option<&'a UserGroup> {
        groups.iter().find(|g| {
            let name = g.group_name.to_lowercase();
            self.groups.iter().any(|allowed| *allowed == name)
        })
    }
}

pub fn compile_rules(raw: &[ActionRuleConfig]) -> Result<Vec<ActionRule>> {
    let mut out = Vec::with_capacity(raw.len());
    for r in raw {
        let pattern = compile_pattern(&r.action)?;
        if r.groups.is_empty() {
            return Err(AccessFacadeError::BadRequest(format!(
                "authz rule for '{}' must name at least one group",
                r.action
            )));
        }
        let any_group = r.groups.iter().any(|g| g.trim() == "*");
        let groups = r
            .groups
            .iter()
            .map(|g| g.trim().to_lowercase())
            .filter(|g| g != "*")
            .collect();
        out.push(ActionRule {
            pattern,
            groups,
            any_group,
        });
    }
    Ok(out)
}

fn compile_pattern(raw: &str) -> Result<ActionPattern> {
    let s = raw.trim().to_lowercase();
    if s.is_empty() {
        return Err(AccessFacadeError::BadRequest(
            "authz rule action must not be empty".into(),
        ));
    }
    if s == "*" {
        return Ok(ActionPattern::Any);
    }
    match s.find('*') {
        None => Ok(ActionPattern::Exact(s)),
        Some(i) if i == s.len() - 1 => Ok(ActionPattern::Prefix(s[..i].to_string())),
        Some(_) => Err(AccessFacadeError::BadRequest(format!(
            "invalid authz rule action: {raw} ('*' only allowed at the end)"
        ))),
    }
}

/// Most specific rule matching `action`, if any.
pub fn matching_rule<'a>(rules: &'a [ActionRule], action: &str) -> Option<&'a ActionRule> {
    let action = action.to_lowercase();
    rules
        .iter()
        .filter(|r| r.pattern.matches(&action))
        .max_by_key(|r| r.pattern.specificity())
}
