//! Promotion rule table: the declarative branch-to-environment mapping.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::branch::BranchRef;

/// Deployment environment a branch promotes into.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Environment {
    Dev,
    Uat,
    Prod,
}

impl Environment {
    /// Lowercase short name, used in paths and log fields.
    pub fn name(&self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Uat => "uat",
            Environment::Prod => "prod",
        }
    }

    /// Runtime namespace the environment's workloads live in.
    pub fn namespace(&self) -> &'static str {
        match self {
            Environment::Dev => "app-dev",
            Environment::Uat => "app-uat",
            Environment::Prod => "app-prod",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How a rule decides whether it applies to a branch.
///
/// Exact matchers should be listed before prefix matchers in a rule table so
/// a branch that could satisfy both resolves unambiguously; evaluation is
/// strictly first-match-wins by rule order, never by specificity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleMatcher {
    /// Branch name equals `name` exactly.
    Exact { name: String },
    /// Branch name starts with `prefix` (covers `release/*`, `hotfix/*`).
    Prefix { prefix: String },
}

impl RuleMatcher {
    /// Whether this matcher accepts the branch.
    pub fn accepts(&self, branch: &BranchRef) -> bool {
        match self {
            RuleMatcher::Exact { name } => branch.as_str() == name,
            RuleMatcher::Prefix { prefix } => branch.as_str().starts_with(prefix.as_str()),
        }
    }
}

/// One row of the promotion rule table.
///
/// Rules are data, not code: a table is serializable so policies can be
/// loaded from configuration and unit tested in isolation from any tool
/// invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PromotionRule {
    pub matcher: RuleMatcher,
    pub environment: Environment,
    /// Opaque reference to the access materials for the target environment.
    pub credential_set_id: String,
    /// Path of the environment's deployment descriptor.
    pub descriptor_path: PathBuf,
}

impl PromotionRule {
    /// Rule matching a branch name exactly.
    pub fn exact(
        name: &str,
        environment: Environment,
        credential_set_id: &str,
        descriptor_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            matcher: RuleMatcher::Exact {
                name: name.to_string(),
            },
            environment,
            credential_set_id: credential_set_id.to_string(),
            descriptor_path: descriptor_path.into(),
        }
    }

    /// Rule matching any branch with the given prefix.
    pub fn prefix(
        prefix: &str,
        environment: Environment,
        credential_set_id: &str,
        descriptor_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            matcher: RuleMatcher::Prefix {
                prefix: prefix.to_string(),
            },
            environment,
            credential_set_id: credential_set_id.to_string(),
            descriptor_path: descriptor_path.into(),
        }
    }
}
