//! Domain-level error taxonomy for Shipway.

/// Shipway domain errors.
///
/// Every fatal condition halts the promotion run; there is no retry inside
/// the core. Retry policy, if any, belongs to the external collaborator or
/// the caller wrapping the orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum PromotionError {
    /// Malformed branch or build-sequence data.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The branch is not covered by any promotion rule. Deploying an
    /// unrecognized branch is unsafe by design, so this is terminal.
    #[error("branch '{branch}' rejected by policy: {reason}")]
    PolicyRejected { branch: String, reason: String },

    /// The descriptor rewrite found no `image:` line to replace. Continuing
    /// would silently deploy the wrong image.
    #[error("descriptor malformed: {0}")]
    DescriptorMalformed(String),

    /// An external tool or service reported failure. The cause is propagated
    /// verbatim.
    #[error("collaborator '{stage}' failed: {cause}")]
    CollaboratorFailure { stage: &'static str, cause: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PromotionError {
    /// Shorthand for a [`PromotionError::CollaboratorFailure`].
    pub fn collaborator(stage: &'static str, cause: impl std::fmt::Display) -> Self {
        Self::CollaboratorFailure {
            stage,
            cause: cause.to_string(),
        }
    }
}

/// Result type for Shipway domain operations.
pub type Result<T> = std::result::Result<T, PromotionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promotion_error_display() {
        let err = PromotionError::InvalidInput("sequence number must be positive".to_string());
        assert!(err.to_string().contains("invalid input"));

        let err = PromotionError::PolicyRejected {
            branch: "feature/unlisted".to_string(),
            reason: "no rule matches".to_string(),
        };
        assert!(err.to_string().contains("feature/unlisted"));
        assert!(err.to_string().contains("no rule matches"));
    }

    #[test]
    fn test_collaborator_failure_carries_cause() {
        let err = PromotionError::collaborator("docker_push", "connection refused");
        let msg = err.to_string();
        assert!(msg.contains("docker_push"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn test_descriptor_malformed() {
        let err = PromotionError::DescriptorMalformed("no image line found".to_string());
        assert!(err.to_string().contains("descriptor malformed"));
    }
}
