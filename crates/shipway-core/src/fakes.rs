//! In-memory fakes for collaborator traits (tests and dry runs)
//!
//! Every fake records its invocations into a shared [`CallLog`] so callers
//! can assert which collaborators ran and in what order, and each fake can
//! be armed to fail so failure paths are reachable without any external
//! tooling.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::collaborators::{
    BuildArtifact, BuildTool, CommitOutcome, DeployExecutor, DescriptorStore, ImageRef,
    ImageRegistry, ScanReport, Scanner, VersionControl,
};
use crate::domain::{BranchRef, CommitIdentity, PromotionError, Result};
use crate::tagger::ArtifactTag;

/// Ordered record of collaborator invocations across a run.
#[derive(Debug, Default)]
pub struct CallLog {
    calls: Mutex<Vec<String>>,
}

impl CallLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    /// Snapshot of the recorded calls, in invocation order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Whether any call name starts with the given prefix.
    pub fn saw(&self, prefix: &str) -> bool {
        self.calls().iter().any(|c| c.starts_with(prefix))
    }
}

fn refused(stage: &'static str) -> PromotionError {
    PromotionError::collaborator(stage, "fake armed to fail")
}

// ---------------------------------------------------------------------------
// FakeBuildTool
// ---------------------------------------------------------------------------

pub struct FakeBuildTool {
    log: Arc<CallLog>,
    fail: bool,
}

impl FakeBuildTool {
    pub fn new(log: Arc<CallLog>) -> Self {
        Self { log, fail: false }
    }

    pub fn failing(log: Arc<CallLog>) -> Self {
        Self { log, fail: true }
    }
}

#[async_trait]
impl BuildTool for FakeBuildTool {
    async fn build(&self, source_dir: &Path) -> Result<BuildArtifact> {
        self.log.record(format!("build {}", source_dir.display()));
        if self.fail {
            return Err(refused("build"));
        }
        Ok(BuildArtifact {
            artifact_path: source_dir.join("target/classes"),
        })
    }

    async fn package(&self, source_dir: &Path) -> Result<BuildArtifact> {
        self.log.record(format!("package {}", source_dir.display()));
        if self.fail {
            return Err(refused("package"));
        }
        Ok(BuildArtifact {
            artifact_path: source_dir.join("target/app.jar"),
        })
    }
}

// ---------------------------------------------------------------------------
// FakeScanner
// ---------------------------------------------------------------------------

pub struct FakeScanner {
    log: Arc<CallLog>,
    fail: bool,
    findings: u64,
}

impl FakeScanner {
    pub fn new(log: Arc<CallLog>) -> Self {
        Self {
            log,
            fail: false,
            findings: 0,
        }
    }

    pub fn failing(log: Arc<CallLog>) -> Self {
        Self {
            log,
            fail: true,
            findings: 0,
        }
    }

    /// Scanner that succeeds but reports the given findings count.
    pub fn with_findings(log: Arc<CallLog>, findings: u64) -> Self {
        Self {
            log,
            fail: false,
            findings,
        }
    }
}

#[async_trait]
impl Scanner for FakeScanner {
    async fn scan(&self, target_dir: &Path) -> Result<ScanReport> {
        self.log.record(format!("scan {}", target_dir.display()));
        if self.fail {
            return Err(refused("scan"));
        }
        Ok(ScanReport {
            report_path: target_dir.join("scan-report.json"),
            findings_count: self.findings,
        })
    }
}

// ---------------------------------------------------------------------------
// FakeImageRegistry
// ---------------------------------------------------------------------------

pub struct FakeImageRegistry {
    log: Arc<CallLog>,
    repository: String,
    fail_push: bool,
    pushed: Mutex<Vec<ImageRef>>,
}

impl FakeImageRegistry {
    pub fn new(log: Arc<CallLog>, repository: &str) -> Self {
        Self {
            log,
            repository: repository.to_string(),
            fail_push: false,
            pushed: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_push(log: Arc<CallLog>, repository: &str) -> Self {
        Self {
            fail_push: true,
            ..Self::new(log, repository)
        }
    }

    pub fn pushed(&self) -> Vec<ImageRef> {
        self.pushed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageRegistry for FakeImageRegistry {
    async fn build_image(&self, context_dir: &Path, tag: &ArtifactTag) -> Result<ImageRef> {
        self.log
            .record(format!("build_image {} {}", context_dir.display(), tag));
        Ok(ImageRef::new(format!("{}:{}", self.repository, tag)))
    }

    async fn push(&self, image: &ImageRef) -> Result<()> {
        self.log.record(format!("push_image {image}"));
        if self.fail_push {
            return Err(refused("push_image"));
        }
        self.pushed.lock().unwrap().push(image.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FakeVersionControl
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCommit {
    pub paths: Vec<PathBuf>,
    pub message: String,
    pub author_email: String,
}

pub struct FakeVersionControl {
    log: Arc<CallLog>,
    last_author: Option<String>,
    author_lookup_fails: bool,
    fail_push: bool,
    commits: Mutex<Vec<RecordedCommit>>,
}

impl FakeVersionControl {
    /// Repository whose most recent commit has the given author email
    /// (`None` means no commits / unknown author).
    pub fn with_last_author(log: Arc<CallLog>, last_author: Option<&str>) -> Self {
        Self {
            log,
            last_author: last_author.map(str::to_string),
            author_lookup_fails: false,
            fail_push: false,
            commits: Mutex::new(Vec::new()),
        }
    }

    /// Repository where the author lookup itself errors, for exercising the
    /// loop guard's fail-open path.
    pub fn with_broken_author_lookup(log: Arc<CallLog>) -> Self {
        Self {
            author_lookup_fails: true,
            ..Self::with_last_author(log, None)
        }
    }

    pub fn failing_push(mut self) -> Self {
        self.fail_push = true;
        self
    }

    pub fn commits(&self) -> Vec<RecordedCommit> {
        self.commits.lock().unwrap().clone()
    }
}

#[async_trait]
impl VersionControl for FakeVersionControl {
    async fn last_commit_author(&self, branch: &BranchRef) -> Result<Option<String>> {
        self.log.record(format!("last_commit_author {branch}"));
        if self.author_lookup_fails {
            return Err(refused("last_commit_author"));
        }
        Ok(self.last_author.clone())
    }

    async fn commit(
        &self,
        paths: &[PathBuf],
        message: &str,
        author: &CommitIdentity,
    ) -> Result<CommitOutcome> {
        self.log.record(format!("commit {message}"));
        self.commits.lock().unwrap().push(RecordedCommit {
            paths: paths.to_vec(),
            message: message.to_string(),
            author_email: author.author_email.clone(),
        });
        Ok(CommitOutcome::Committed)
    }

    async fn push(&self, branch: &BranchRef) -> Result<()> {
        self.log.record(format!("push {branch}"));
        if self.fail_push {
            return Err(refused("push"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FakeDescriptorStore
// ---------------------------------------------------------------------------

/// In-memory descriptor store backed by a `HashMap<path, content>`.
#[derive(Default)]
pub struct FakeDescriptorStore {
    files: Mutex<HashMap<PathBuf, String>>,
}

impl FakeDescriptorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a descriptor file.
    pub fn seed(&self, path: impl Into<PathBuf>, content: &str) {
        self.files
            .lock()
            .unwrap()
            .insert(path.into(), content.to_string());
    }

    /// Current content of a descriptor, if present.
    pub fn content(&self, path: &Path) -> Option<String> {
        self.files.lock().unwrap().get(path).cloned()
    }
}

#[async_trait]
impl DescriptorStore for FakeDescriptorStore {
    async fn load(&self, path: &Path) -> Result<String> {
        self.files.lock().unwrap().get(path).cloned().ok_or_else(|| {
            PromotionError::collaborator(
                "descriptor_load",
                format!("no descriptor at {}", path.display()),
            )
        })
    }

    async fn store(&self, path: &Path, content: &str) -> Result<()> {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), content.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FakeDeployExecutor
// ---------------------------------------------------------------------------

pub struct FakeDeployExecutor {
    log: Arc<CallLog>,
    fail: bool,
}

impl FakeDeployExecutor {
    pub fn new(log: Arc<CallLog>) -> Self {
        Self { log, fail: false }
    }

    pub fn failing(log: Arc<CallLog>) -> Self {
        Self { log, fail: true }
    }
}

#[async_trait]
impl DeployExecutor for FakeDeployExecutor {
    async fn apply(&self, descriptor_path: &Path, credential_set_id: &str) -> Result<()> {
        self.log.record(format!(
            "apply {} {}",
            descriptor_path.display(),
            credential_set_id
        ));
        if self.fail {
            return Err(refused("apply"));
        }
        Ok(())
    }

    async fn wait_for_rollout(
        &self,
        resource_name: &str,
        namespace: &str,
        credential_set_id: &str,
    ) -> Result<()> {
        self.log.record(format!(
            "wait_for_rollout {resource_name} {namespace} {credential_set_id}"
        ));
        if self.fail {
            return Err(refused("wait_for_rollout"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_call_log_records_in_order() {
        let log = CallLog::new();
        let build = FakeBuildTool::new(log.clone());
        let scanner = FakeScanner::new(log.clone());

        build.build(Path::new("/src")).await.expect("build");
        scanner.scan(Path::new("/src")).await.expect("scan");

        let calls = log.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].starts_with("build "));
        assert!(calls[1].starts_with("scan "));
    }

    #[tokio::test]
    async fn test_descriptor_store_round_trip() {
        let store = FakeDescriptorStore::new();
        store.seed("deploy/dev/deployment.yaml", "image: old\n");

        let loaded = store
            .load(Path::new("deploy/dev/deployment.yaml"))
            .await
            .expect("load");
        assert_eq!(loaded, "image: old\n");

        store
            .store(Path::new("deploy/dev/deployment.yaml"), "image: new\n")
            .await
            .expect("store");
        assert_eq!(
            store.content(Path::new("deploy/dev/deployment.yaml")).as_deref(),
            Some("image: new\n")
        );
    }

    #[tokio::test]
    async fn test_missing_descriptor_is_collaborator_failure() {
        let store = FakeDescriptorStore::new();
        let err = store.load(Path::new("deploy/absent.yaml")).await.unwrap_err();
        assert!(matches!(
            err,
            PromotionError::CollaboratorFailure { stage: "descriptor_load", .. }
        ));
    }

    #[tokio::test]
    async fn test_broken_author_lookup_errors() {
        let log = CallLog::new();
        let vcs = FakeVersionControl::with_broken_author_lookup(log);
        let err = vcs
            .last_commit_author(&BranchRef::from("develop"))
            .await
            .unwrap_err();
        assert!(matches!(err, PromotionError::CollaboratorFailure { .. }));
    }
}
