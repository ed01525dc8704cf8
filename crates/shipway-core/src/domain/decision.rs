//! The routing decision threaded through one promotion run.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::branch::BranchRef;
use super::rule::{Environment, PromotionRule};

/// Identity of one build, supplied by the calling system.
///
/// Used only to derive the artifact tag; never persisted independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildIdentity {
    pub branch: BranchRef,
    /// Monotonically increasing build number from the calling system.
    pub sequence: u64,
}

/// Identity the automation commits as. The loop guard compares the last
/// commit's author email against this to suppress self-triggered runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitIdentity {
    pub author_email: String,
}

impl CommitIdentity {
    pub fn new(author_email: impl Into<String>) -> Self {
        Self {
            author_email: author_email.into(),
        }
    }
}

/// Outcome of policy evaluation: gate plus routing.
///
/// Immutable once produced; one run owns exactly one decision. When
/// `proceed` is false the routing fields are `None` and `reason` explains the
/// rejection for operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionDecision {
    pub proceed: bool,
    pub environment: Option<Environment>,
    pub credential_set_id: Option<String>,
    pub descriptor_path: Option<PathBuf>,
    pub reason: String,
}

impl PromotionDecision {
    /// Decision routing the branch through the matched rule.
    pub fn route(rule: &PromotionRule, branch: &BranchRef) -> Self {
        Self {
            proceed: true,
            environment: Some(rule.environment),
            credential_set_id: Some(rule.credential_set_id.clone()),
            descriptor_path: Some(rule.descriptor_path.clone()),
            reason: format!(
                "branch '{}' promotes to {}",
                branch.as_str(),
                rule.environment
            ),
        }
    }

    /// Terminal rejection with an operator-facing reason.
    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            proceed: false,
            environment: None,
            credential_set_id: None,
            descriptor_path: None,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_carries_rule_fields() {
        let rule = PromotionRule::exact(
            "main",
            Environment::Prod,
            "prod-creds",
            "deploy/prod/deployment.yaml",
        );
        let decision = PromotionDecision::route(&rule, &BranchRef::from("main"));

        assert!(decision.proceed);
        assert_eq!(decision.environment, Some(Environment::Prod));
        assert_eq!(decision.credential_set_id.as_deref(), Some("prod-creds"));
        assert_eq!(
            decision.descriptor_path.as_deref(),
            Some(std::path::Path::new("deploy/prod/deployment.yaml"))
        );
    }

    #[test]
    fn test_reject_has_no_routing() {
        let decision = PromotionDecision::reject("no rule matches");
        assert!(!decision.proceed);
        assert!(decision.environment.is_none());
        assert!(decision.credential_set_id.is_none());
        assert!(decision.descriptor_path.is_none());
        assert_eq!(decision.reason, "no rule matches");
    }
}
