//! Branch identity and resolution.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a version-control branch.
///
/// Invariant: non-empty after resolution. Construct via [`BranchRef::new`] or
/// [`resolve_branch`], which guarantees the invariant by falling back to a
/// configured default.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchRef(String);

impl BranchRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BranchRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for BranchRef {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for BranchRef {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Resolve the building branch from an ordered list of candidate sources.
///
/// Returns the first non-empty candidate, with a `origin/` remote qualifier
/// stripped when present. Falls back to `default` when every candidate is
/// absent or blank. Absence of input is a normal case, not an error, so this
/// never fails.
pub fn resolve_branch<'a, I>(candidates: I, default: &str) -> BranchRef
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    for candidate in candidates.into_iter().flatten() {
        let trimmed = candidate.trim();
        if trimmed.is_empty() {
            continue;
        }
        let name = trimmed.strip_prefix("origin/").unwrap_or(trimmed);
        if !name.is_empty() {
            return BranchRef::new(name);
        }
    }
    BranchRef::new(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_non_empty_candidate_wins() {
        let branch = resolve_branch([None, Some(""), Some("develop"), Some("main")], "master");
        assert_eq!(branch.as_str(), "develop");
    }

    #[test]
    fn test_remote_qualifier_stripped() {
        let branch = resolve_branch([Some("origin/release/v2")], "master");
        assert_eq!(branch.as_str(), "release/v2");
    }

    #[test]
    fn test_all_absent_falls_back_to_default() {
        let branch = resolve_branch([None, None], "master");
        assert_eq!(branch.as_str(), "master");
    }

    #[test]
    fn test_whitespace_only_counts_as_absent() {
        let branch = resolve_branch([Some("   "), Some("\t")], "main");
        assert_eq!(branch.as_str(), "main");
    }

    #[test]
    fn test_bare_remote_qualifier_counts_as_absent() {
        // "origin/" with nothing after it names no branch at all.
        let branch = resolve_branch([Some("origin/"), Some("uat")], "master");
        assert_eq!(branch.as_str(), "uat");
    }
}
