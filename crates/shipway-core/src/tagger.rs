//! Artifact tag derivation.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::{BranchRef, BuildIdentity, PromotionError, Result};

/// Unique, immutable tag identifying one build's output image.
///
/// Created once per pipeline run and derived deterministically from the
/// build identity. Contains no `/`, so it is safe as a container-image tag
/// and as a single path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactTag(String);

impl ArtifactTag {
    /// Derive the tag for a build: every `/` in the branch name becomes `-`,
    /// with `-<sequence>` appended.
    ///
    /// Fails with `InvalidInput` on an empty branch or a zero sequence
    /// number; build numbers from real CI systems start at 1.
    pub fn derive(branch: &BranchRef, sequence: u64) -> Result<Self> {
        if branch.as_str().is_empty() {
            return Err(PromotionError::InvalidInput(
                "branch name must not be empty".to_string(),
            ));
        }
        if sequence == 0 {
            return Err(PromotionError::InvalidInput(
                "build sequence number must be positive".to_string(),
            ));
        }

        let flattened = branch.as_str().replace('/', "-");
        Ok(Self(format!("{flattened}-{sequence}")))
    }

    /// Derive the tag from a [`BuildIdentity`].
    pub fn from_identity(identity: &BuildIdentity) -> Result<Self> {
        Self::derive(&identity.branch, identity.sequence)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slash_replaced_and_sequence_appended() {
        let tag = ArtifactTag::derive(&BranchRef::from("release/v1"), 42).expect("derive");
        assert_eq!(tag.as_str(), "release-v1-42");
    }

    #[test]
    fn test_plain_branch() {
        let tag = ArtifactTag::derive(&BranchRef::from("dev"), 7).expect("derive");
        assert_eq!(tag.as_str(), "dev-7");
    }

    #[test]
    fn test_nested_slashes_all_replaced() {
        let tag = ArtifactTag::derive(&BranchRef::from("hotfix/auth/token-leak"), 3).expect("derive");
        assert_eq!(tag.as_str(), "hotfix-auth-token-leak-3");
        assert!(!tag.as_str().contains('/'));
    }

    #[test]
    fn test_empty_branch_rejected() {
        let err = ArtifactTag::derive(&BranchRef::from(""), 1).unwrap_err();
        assert!(matches!(err, PromotionError::InvalidInput(_)));
    }

    #[test]
    fn test_zero_sequence_rejected() {
        let err = ArtifactTag::derive(&BranchRef::from("main"), 0).unwrap_err();
        assert!(matches!(err, PromotionError::InvalidInput(_)));
    }

    #[test]
    fn test_from_identity() {
        let identity = BuildIdentity {
            branch: BranchRef::from("hotfix/urgent-fix"),
            sequence: 13,
        };
        let tag = ArtifactTag::from_identity(&identity).expect("derive");
        assert_eq!(tag.as_str(), "hotfix-urgent-fix-13");
    }
}
