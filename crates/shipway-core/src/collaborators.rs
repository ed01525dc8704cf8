//! Contracts for the external collaborators the promotion core drives.
//!
//! The core never performs blocking I/O itself: building, scanning, image
//! handling, version control, descriptor persistence, and deployment are all
//! delegated through these traits as synchronous calls with a success or
//! failure outcome. Process-backed implementations live in [`crate::tools`];
//! in-memory fakes for tests and dry runs live in [`crate::fakes`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::domain::{BranchRef, CommitIdentity, Result};
use crate::tagger::ArtifactTag;

/// Output of a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifact {
    pub artifact_path: PathBuf,
}

/// Output of a scan. Never fatal by itself; whether findings block the run
/// is the orchestrator's configured scan gate, not the scanner's call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub report_path: PathBuf,
    pub findings_count: u64,
}

/// Addressable reference to a pushed (or pushable) container image,
/// e.g. `registry.example.com/app:dev-7`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Outcome of a commit attempt. `NoChanges` is a normal case: re-running a
/// promotion with an already-applied tag rewrites the descriptor to
/// byte-identical content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    NoChanges,
}

/// Produces an artifact from source. `build` compiles, `package` produces
/// the deployable artifact.
#[async_trait]
pub trait BuildTool: Send + Sync {
    async fn build(&self, source_dir: &Path) -> Result<BuildArtifact>;
    async fn package(&self, source_dir: &Path) -> Result<BuildArtifact>;
}

/// Static-analysis scanner.
#[async_trait]
pub trait Scanner: Send + Sync {
    async fn scan(&self, target_dir: &Path) -> Result<ScanReport>;
}

/// Container builder plus registry.
#[async_trait]
pub trait ImageRegistry: Send + Sync {
    async fn build_image(&self, context_dir: &Path, tag: &ArtifactTag) -> Result<ImageRef>;
    async fn push(&self, image: &ImageRef) -> Result<()>;
}

/// Source-control system: commit metadata in, descriptor commits out.
///
/// Concurrency control for the tracked branch stays with the remote: a push
/// is rejected when the remote has advanced, surfacing as a collaborator
/// failure for the caller toretry.
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Author email of the most recent commit on the branch, if it can be
    /// determined. `Ok(None)` is not an error; the loop guard fails open.
    async fn last_commit_author(&self, branch: &BranchRef) -> Result<Option<String>>;

    async fn commit(
        &self,
        paths: &[PathBuf],
        message: &str,
        author: &CommitIdentity,
    ) -> Result<CommitOutcome>;

    async fn push(&self, branch: &BranchRef) -> Result<()>;
}

/// Persistence for deployment descriptors.
#[async_trait]
pub trait DescriptorStore: Send + Sync {
    async fn load(&self, path: &Path) -> Result<String>;
    async fn store(&self, path: &Path, content: &str) -> Result<()>;
}

/// Applies a descriptor to a runtime and reports rollout status.
#[async_trait]
pub trait DeployExecutor: Send + Sync {
    async fn apply(&self, descriptor_path: &Path, credential_set_id: &str) -> Result<()>;

    async fn wait_for_rollout(
        &self,
        resource_name: &str,
        namespace: &str,
        credential_set_id: &str,
    ) -> Result<()>;
}
