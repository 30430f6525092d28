use async_trait::async_trait;

use crate::model::{AuthzRequest, DecisionOutcome};

/// Receives every authorization outcome the guard produces.
///
/// Implemented by the audit facade; the authz facade only sees this trait so
/// the two crates stay independent.
#[async_trait]
pub trait DecisionRecorder: Send + Sync {
    async fn record_decision(&self, request: &AuthzRequest, outcome: &DecisionOutcome);
}
