//! Promotion configuration.
//!
//! The rule table is data, not code, so the whole policy can be loaded from
//! a JSON file and unit tested in isolation from any tool invocation.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::domain::{CommitIdentity, Environment, PromotionRule, Result};
use crate::collaborators::ImageRef;
use crate::tagger::ArtifactTag;

/// Whether scanner findings block the run.
///
/// The observed pipelines never gated on findings; that permissive behavior
/// is the default, with an enforcing mode available for callers that want
/// findings above a budget to fail the run at the scan step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanGate {
    pub enforce: bool,
    pub max_findings: u64,
}

impl Default for ScanGate {
    fn default() -> Self {
        Self {
            enforce: false,
            max_findings: 0,
        }
    }
}

/// Commands the process-backed collaborators run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolsConfig {
    pub build_command: Vec<String>,
    pub package_command: Vec<String>,
    pub scan_command: Vec<String>,
    /// Where the packaged artifact lands, relative to the source dir.
    pub artifact_path: PathBuf,
    pub timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            build_command: split("mvn -B clean compile"),
            package_command: split("mvn -B package -DskipTests"),
            scan_command: split("mvn -B sonar:sonar"),
            artifact_path: PathBuf::from("target"),
            timeout_secs: 1800,
        }
    }
}

fn split(command: &str) -> Vec<String> {
    command.split_whitespace().map(str::to_string).collect()
}

/// Configuration for one promotion pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PromotionConfig {
    /// Deployment resource name, also used as the rollout target.
    pub app_name: String,

    /// Branch assumed when no candidate source names one.
    pub default_branch: String,

    /// Registry repository images are tagged into, e.g.
    /// `registry.example.com/app`.
    pub image_repository: String,

    /// Identity the automation commits as; the loop guard compares the last
    /// commit author against this email.
    pub automation: CommitIdentity,

    /// Commit message for the descriptor update; `{image}` expands to the
    /// full image reference.
    pub commit_message: String,

    /// Ordered rule table; first match wins, exact rules before prefix rules.
    pub rules: Vec<PromotionRule>,

    #[serde(default)]
    pub scan_gate: ScanGate,

    #[serde(default)]
    pub tools: ToolsConfig,
}

impl Default for PromotionConfig {
    fn default() -> Self {
        Self {
            app_name: "app".to_string(),
            default_branch: "develop".to_string(),
            image_repository: "registry.example.com/app".to_string(),
            automation: CommitIdentity::new("shipway-bot@example.com"),
            commit_message: "Update deployment image to {image} [ci skip]".to_string(),
            rules: default_rules(),
            scan_gate: ScanGate::default(),
            tools: ToolsConfig::default(),
        }
    }
}

impl PromotionConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Full image reference for a tag under this config's repository.
    pub fn image_reference(&self, tag: &ArtifactTag) -> ImageRef {
        ImageRef::new(format!("{}:{}", self.image_repository, tag))
    }

    /// Render the descriptor-update commit message for an image.
    pub fn render_commit_message(&self, image: &ImageRef) -> String {
        self.commit_message.replace("{image}", image.as_str())
    }

    /// Deterministic digest of the serialized rule table. Two runs with the
    /// same digest were routed by the same policy, which makes policy drift
    /// across near-duplicate pipelines visible in logs.
    pub fn policy_digest(&self) -> Result<String> {
        let serialized = serde_json::to_vec(&self.rules)?;
        let mut hasher = Sha256::new();
        hasher.update(&serialized);
        Ok(hex::encode(hasher.finalize()))
    }
}

/// The completed default rule table: exact rules first, then the
/// `release/*` and `hotfix/*` prefix families.
pub fn default_rules() -> Vec<PromotionRule> {
    vec![
        PromotionRule::exact(
            "develop",
            Environment::Dev,
            "dev-cluster",
            "deploy/dev/deployment.yaml",
        ),
        PromotionRule::exact(
            "uat",
            Environment::Uat,
            "uat-cluster",
            "deploy/uat/deployment.yaml",
        ),
        PromotionRule::exact(
            "main",
            Environment::Prod,
            "prod-cluster",
            "deploy/prod/deployment.yaml",
        ),
        PromotionRule::exact(
            "master",
            Environment::Prod,
            "prod-cluster",
            "deploy/prod/deployment.yaml",
        ),
        PromotionRule::prefix(
            "release/",
            Environment::Uat,
            "uat-cluster",
            "deploy/uat/deployment.yaml",
        ),
        PromotionRule::prefix(
            "hotfix/",
            Environment::Prod,
            "prod-cluster",
            "deploy/prod/deployment.yaml",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BranchRef;

    #[test]
    fn test_default_rules_exact_before_prefix() {
        let rules = default_rules();
        let first_prefix = rules
            .iter()
            .position(|r| matches!(r.matcher, crate::domain::RuleMatcher::Prefix { .. }))
            .expect("table has prefix rules");
        assert!(rules[..first_prefix]
            .iter()
            .all(|r| matches!(r.matcher, crate::domain::RuleMatcher::Exact { .. })));
    }

    #[test]
    fn test_policy_digest_stable_for_equal_tables() {
        let a = PromotionConfig::default();
        let b = PromotionConfig::default();
        assert_eq!(
            a.policy_digest().expect("digest"),
            b.policy_digest().expect("digest")
        );
    }

    #[test]
    fn test_policy_digest_changes_with_table() {
        let a = PromotionConfig::default();
        let mut b = PromotionConfig::default();
        b.rules.pop();
        assert_ne!(
            a.policy_digest().expect("digest"),
            b.policy_digest().expect("digest")
        );
    }

    #[test]
    fn test_image_reference_and_commit_message() {
        let config = PromotionConfig::default();
        let tag = ArtifactTag::derive(&BranchRef::from("hotfix/urgent-fix"), 13).expect("tag");
        let image = config.image_reference(&tag);
        assert_eq!(
            image.as_str(),
            "registry.example.com/app:hotfix-urgent-fix-13"
        );

        let message = config.render_commit_message(&image);
        assert!(message.contains("registry.example.com/app:hotfix-urgent-fix-13"));
        assert!(message.contains("[ci skip]"));
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = PromotionConfig::default();
        let json = serde_json::to_string_pretty(&config).expect("serialize");
        let back: PromotionConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(config, back);
    }

    #[test]
    fn test_from_file_missing_path_is_io_error() {
        let err = PromotionConfig::from_file(Path::new("/nonexistent/shipway.json")).unwrap_err();
        assert!(matches!(err, crate::domain::PromotionError::Io(_)));
    }
}
