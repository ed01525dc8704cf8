//! Process-backed collaborator adapters.
//!
//! Everything here shells out: build and scan commands, `git` for commit
//! metadata and descriptor commits, `docker` for image build/push, `kubectl`
//! for apply and rollout status. Each adapter maps a non-zero exit or a
//! timeout into a [`PromotionError::CollaboratorFailure`] carrying the
//! tool's stderr verbatim.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::debug;

use crate::collaborators::{
    BuildArtifact, BuildTool, CommitOutcome, DeployExecutor, DescriptorStore, ImageRef,
    ImageRegistry, ScanReport, Scanner, VersionControl,
};
use crate::config::ToolsConfig;
use crate::domain::{BranchRef, CommitIdentity, PromotionError, Result};
use crate::tagger::ArtifactTag;

/// Captured result of one tool invocation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run a command to completion, capturing output.
///
/// `command[0]` is the executable; `stage` names the collaborator step for
/// error attribution. Spawn failures and timeouts become collaborator
/// failures; a non-zero exit is returned as data for the caller to judge.
pub async fn run_command(
    stage: &'static str,
    command: &[String],
    cwd: &Path,
    timeout_secs: u64,
) -> Result<CommandOutput> {
    let (exe, args) = command
        .split_first()
        .ok_or_else(|| PromotionError::collaborator(stage, "empty command"))?;

    let start = Instant::now();
    let child = Command::new(exe)
        .args(args)
        .current_dir(cwd)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| PromotionError::collaborator(stage, format!("failed to spawn {exe}: {e}")))?;

    let output = if timeout_secs > 0 {
        tokio::time::timeout(
            std::time::Duration::from_secs(timeout_secs),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| {
            PromotionError::collaborator(stage, format!("timed out after {timeout_secs} seconds"))
        })?
        .map_err(|e| PromotionError::collaborator(stage, e.to_string()))?
    } else {
        child
            .wait_with_output()
            .await
            .map_err(|e| PromotionError::collaborator(stage, e.to_string()))?
    };

    let result = CommandOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        duration_ms: start.elapsed().as_millis() as u64,
    };
    debug!(stage, exe = %exe, exit_code = result.exit_code, duration_ms = result.duration_ms, "tool finished");
    Ok(result)
}

/// Turn a non-zero exit into a collaborator failure with the stderr attached.
fn expect_success(stage: &'static str, output: CommandOutput) -> Result<CommandOutput> {
    if output.success() {
        Ok(output)
    } else {
        Err(PromotionError::collaborator(
            stage,
            format!(
                "exit code {}: {}",
                output.exit_code,
                output.stderr.trim()
            ),
        ))
    }
}

// ---------------------------------------------------------------------------
// Build + scan commands
// ---------------------------------------------------------------------------

/// Build tool driven by configured commands (`mvn` in the observed
/// pipelines, but any build command works).
pub struct CommandBuildTool {
    build_command: Vec<String>,
    package_command: Vec<String>,
    artifact_path: PathBuf,
    timeout_secs: u64,
}

impl CommandBuildTool {
    pub fn from_config(tools: &ToolsConfig) -> Self {
        Self {
            build_command: tools.build_command.clone(),
            package_command: tools.package_command.clone(),
            artifact_path: tools.artifact_path.clone(),
            timeout_secs: tools.timeout_secs,
        }
    }
}

#[async_trait]
impl BuildTool for CommandBuildTool {
    async fn build(&self, source_dir: &Path) -> Result<BuildArtifact> {
        let output = run_command("build", &self.build_command, source_dir, self.timeout_secs).await?;
        expect_success("build", output)?;
        Ok(BuildArtifact {
            artifact_path: source_dir.join(&self.artifact_path),
        })
    }

    async fn package(&self, source_dir: &Path) -> Result<BuildArtifact> {
        let output =
            run_command("package", &self.package_command, source_dir, self.timeout_secs).await?;
        expect_success("package", output)?;
        Ok(BuildArtifact {
            artifact_path: source_dir.join(&self.artifact_path),
        })
    }
}

/// Scanner driven by a configured command. Command-line scanners publish
/// findings to their own backend, so the report here carries the target dir
/// and a zero findings count; the exit code is the signal this adapter acts
/// on.
pub struct CommandScanner {
    scan_command: Vec<String>,
    timeout_secs: u64,
}

impl CommandScanner {
    pub fn from_config(tools: &ToolsConfig) -> Self {
        Self {
            scan_command: tools.scan_command.clone(),
            timeout_secs: tools.timeout_secs,
        }
    }
}

#[async_trait]
impl Scanner for CommandScanner {
    async fn scan(&self, target_dir: &Path) -> Result<ScanReport> {
        let output = run_command("scan", &self.scan_command, target_dir, self.timeout_secs).await?;
        expect_success("scan", output)?;
        Ok(ScanReport {
            report_path: target_dir.join("target/scan-report.txt"),
            findings_count: 0,
        })
    }
}

// ---------------------------------------------------------------------------
// GitCli
// ---------------------------------------------------------------------------

/// Version control backed by the `git` binary in a working copy.
pub struct GitCli {
    repo_dir: PathBuf,
    remote: String,
    timeout_secs: u64,
}

impl GitCli {
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            remote: "origin".to_string(),
            timeout_secs: 120,
        }
    }

    pub fn with_remote(mut self, remote: &str) -> Self {
        self.remote = remote.to_string();
        self
    }

    async fn git(&self, stage: &'static str, args: &[&str]) -> Result<CommandOutput> {
        let command: Vec<String> = std::iter::once("git".to_string())
            .chain(args.iter().map(|s| s.to_string()))
            .collect();
        run_command(stage, &command, &self.repo_dir, self.timeout_secs).await
    }
}

#[async_trait]
impl VersionControl for GitCli {
    async fn last_commit_author(&self, branch: &BranchRef) -> Result<Option<String>> {
        let output = self
            .git(
                "last_commit_author",
                &["log", "-1", "--pretty=format:%ae", branch.as_str()],
            )
            .await?;
        if !output.success() {
            return Err(PromotionError::collaborator(
                "last_commit_author",
                output.stderr.trim().to_string(),
            ));
        }
        let email = output.stdout.trim();
        if email.is_empty() {
            Ok(None)
        } else {
            Ok(Some(email.to_string()))
        }
    }

    async fn commit(
        &self,
        paths: &[PathBuf],
        message: &str,
        author: &CommitIdentity,
    ) -> Result<CommitOutcome> {
        let mut add_args = vec!["add", "--"];
        let path_strings: Vec<String> = paths
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        add_args.extend(path_strings.iter().map(String::as_str));
        expect_success("commit", self.git("commit", &add_args).await?)?;

        // Nothing staged means the rewrite was byte-identical; that is the
        // idempotent re-run case, not an error.
        let staged = expect_success(
            "commit",
            self.git("commit", &["diff", "--cached", "--name-only"]).await?,
        )?;
        if staged.stdout.trim().is_empty() {
            return Ok(CommitOutcome::NoChanges);
        }

        let name_config = format!("user.name={}", author.author_email);
        let email_config = format!("user.email={}", author.author_email);
        expect_success(
            "commit",
            self.git(
                "commit",
                &[
                    "-c", &name_config, "-c", &email_config, "commit", "-m", message,
                ],
            )
            .await?,
        )?;
        Ok(CommitOutcome::Committed)
    }

    async fn push(&self, branch: &BranchRef) -> Result<()> {
        let refspec = format!("HEAD:{}", branch.as_str());
        expect_success(
            "push",
            self.git("push", &["push", &self.remote, &refspec]).await?,
        )?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// DockerCli
// ---------------------------------------------------------------------------

/// Container builder/registry backed by the `docker` binary.
pub struct DockerCli {
    repository: String,
    timeout_secs: u64,
}

impl DockerCli {
    pub fn new(repository: &str) -> Self {
        Self {
            repository: repository.to_string(),
            timeout_secs: 1800,
        }
    }
}

#[async_trait]
impl ImageRegistry for DockerCli {
    async fn build_image(&self, context_dir: &Path, tag: &ArtifactTag) -> Result<ImageRef> {
        let reference = format!("{}:{}", self.repository, tag);
        let command = vec![
            "docker".to_string(),
            "build".to_string(),
            "-t".to_string(),
            reference.clone(),
            ".".to_string(),
        ];
        expect_success(
            "build_image",
            run_command("build_image", &command, context_dir, self.timeout_secs).await?,
        )?;
        Ok(ImageRef::new(reference))
    }

    async fn push(&self, image: &ImageRef) -> Result<()> {
        let command = vec![
            "docker".to_string(),
            "push".to_string(),
            image.as_str().to_string(),
        ];
        expect_success(
            "push_image",
            run_command("push_image", &command, Path::new("."), self.timeout_secs).await?,
        )?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// KubectlCli
// ---------------------------------------------------------------------------

/// Deployment executor backed by the `kubectl` binary. The credential set id
/// names the kubeconfig context to act under.
pub struct KubectlCli {
    timeout_secs: u64,
}

impl KubectlCli {
    pub fn new() -> Self {
        Self { timeout_secs: 600 }
    }
}

impl Default for KubectlCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeployExecutor for KubectlCli {
    async fn apply(&self, descriptor_path: &Path, credential_set_id: &str) -> Result<()> {
        let command = vec![
            "kubectl".to_string(),
            "--context".to_string(),
            credential_set_id.to_string(),
            "apply".to_string(),
            "-f".to_string(),
            descriptor_path.to_string_lossy().into_owned(),
        ];
        expect_success(
            "apply",
            run_command("apply", &command, Path::new("."), self.timeout_secs).await?,
        )?;
        Ok(())
    }

    async fn wait_for_rollout(
        &self,
        resource_name: &str,
        namespace: &str,
        credential_set_id: &str,
    ) -> Result<()> {
        let command = vec![
            "kubectl".to_string(),
            "--context".to_string(),
            credential_set_id.to_string(),
            "-n".to_string(),
            namespace.to_string(),
            "rollout".to_string(),
            "status".to_string(),
            format!("deployment/{resource_name}"),
        ];
        expect_success(
            "wait_for_rollout",
            run_command("wait_for_rollout", &command, Path::new("."), self.timeout_secs).await?,
        )?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FsDescriptorStore
// ---------------------------------------------------------------------------

/// Descriptor store over the working copy's filesystem. Relative descriptor
/// paths resolve against `root`.
pub struct FsDescriptorStore {
    root: PathBuf,
}

impl FsDescriptorStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

#[async_trait]
impl DescriptorStore for FsDescriptorStore {
    async fn load(&self, path: &Path) -> Result<String> {
        let content = tokio::fs::read_to_string(self.resolve(path)).await?;
        Ok(content)
    }

    async fn store(&self, path: &Path, content: &str) -> Result<()> {
        tokio::fs::write(self.resolve(path), content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_run_command_captures_stdout() {
        let output = run_command("build", &cmd(&["echo", "hello"]), Path::new("."), 30)
            .await
            .expect("run");
        assert!(output.success());
        assert!(output.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn test_run_command_nonzero_exit_is_data() {
        let output = run_command("build", &cmd(&["false"]), Path::new("."), 30)
            .await
            .expect("run");
        assert!(!output.success());
        assert!(expect_success("build", output).is_err());
    }

    #[tokio::test]
    async fn test_run_command_empty_command_fails() {
        let err = run_command("build", &[], Path::new("."), 30).await.unwrap_err();
        assert!(matches!(err, PromotionError::CollaboratorFailure { stage: "build", .. }));
    }

    #[tokio::test]
    async fn test_run_command_spawn_failure() {
        let err = run_command("scan", &cmd(&["definitely-not-a-binary-xyz"]), Path::new("."), 30)
            .await
            .unwrap_err();
        assert!(matches!(err, PromotionError::CollaboratorFailure { stage: "scan", .. }));
    }

    #[tokio::test]
    async fn test_fs_descriptor_store_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsDescriptorStore::new(dir.path());

        store
            .store(Path::new("deployment.yaml"), "image: app:1\n")
            .await
            .expect("store");
        let loaded = store.load(Path::new("deployment.yaml")).await.expect("load");
        assert_eq!(loaded, "image: app:1\n");
    }

    mod git {
        use super::*;
        use std::process::Command as StdCommand;

        fn run_git(repo_dir: &Path, args: &[&str]) {
            let output = StdCommand::new("git")
                .args(args)
                .current_dir(repo_dir)
                .output()
                .unwrap();
            assert!(
                output.status.success(),
                "git {:?} failed: {}",
                args,
                String::from_utf8_lossy(&output.stderr)
            );
        }

        fn make_git_repo(author_email: &str) -> tempfile::TempDir {
            let dir = tempfile::tempdir().unwrap();
            run_git(dir.path(), &["init", "-b", "develop"]);
            run_git(dir.path(), &["config", "user.name", "test-user"]);
            run_git(dir.path(), &["config", "user.email", author_email]);
            run_git(dir.path(), &["commit", "--allow-empty", "-m", "initial"]);
            dir
        }

        #[tokio::test]
        async fn test_last_commit_author_reads_email() {
            let repo = make_git_repo("human@example.com");
            let git = GitCli::new(repo.path());

            let author = git
                .last_commit_author(&BranchRef::from("develop"))
                .await
                .expect("lookup");
            assert_eq!(author.as_deref(), Some("human@example.com"));
        }

        #[tokio::test]
        async fn test_last_commit_author_unknown_branch_errors() {
            let repo = make_git_repo("human@example.com");
            let git = GitCli::new(repo.path());

            let result = git.last_commit_author(&BranchRef::from("no-such-branch")).await;
            assert!(result.is_err());
        }

        #[tokio::test]
        async fn test_commit_reports_no_changes_for_clean_tree() {
            let repo = make_git_repo("human@example.com");
            let git = GitCli::new(repo.path());

            let outcome = git
                .commit(
                    &[PathBuf::from(".")],
                    "Update deployment image",
                    &CommitIdentity::new("bot@example.com"),
                )
                .await
                .expect("commit");
            assert_eq!(outcome, CommitOutcome::NoChanges);
        }

        #[tokio::test]
        async fn test_commit_uses_automation_identity() {
            let repo = make_git_repo("human@example.com");
            std::fs::write(repo.path().join("deployment.yaml"), "image: app:2\n").unwrap();
            let git = GitCli::new(repo.path());

            let outcome = git
                .commit(
                    &[PathBuf::from("deployment.yaml")],
                    "Update deployment image",
                    &CommitIdentity::new("bot@example.com"),
                )
                .await
                .expect("commit");
            assert_eq!(outcome, CommitOutcome::Committed);

            let author = git
                .last_commit_author(&BranchRef::from("develop"))
                .await
                .expect("lookup");
            assert_eq!(author.as_deref(), Some("bot@example.com"));
        }
    }
}
