//! Promotion orchestration.
//!
//! Composes branch resolution, the loop guard, policy evaluation, tagging,
//! descriptor rewriting, and the external collaborators into one explicit
//! state machine:
//!
//! `Start → BranchResolved → LoopCheck → {Skipped | PolicyEvaluated} →
//! {Rejected | Building} → Scanned → Packaged → Tagged → Pushed →
//! DescriptorUpdated → Committed → Deployed`
//!
//! Any collaborator failure is terminal for the run with the reported cause
//! attached; the core never retries. One orchestrator instance executes per
//! pipeline run and owns its decision and derived values exclusively, so
//! concurrent runs for different branches share nothing inside this core.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

use crate::collaborators::{
    BuildTool, CommitOutcome, DeployExecutor, DescriptorStore, ImageRef, ImageRegistry, Scanner,
    VersionControl,
};
use crate::config::PromotionConfig;
use crate::descriptor::rewrite_image;
use crate::domain::{resolve_branch, BranchRef, Environment, PromotionError};
use crate::loop_guard;
use crate::obs;
use crate::policy::evaluate_policy;
use crate::tagger::ArtifactTag;

/// States of one promotion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Start,
    BranchResolved,
    LoopCheck,
    PolicyEvaluated,
    Building,
    Scanned,
    Packaged,
    Tagged,
    Pushed,
    DescriptorUpdated,
    Committed,
    Deployed,
}

impl RunState {
    pub fn name(&self) -> &'static str {
        match self {
            RunState::Start => "start",
            RunState::BranchResolved => "branch_resolved",
            RunState::LoopCheck => "loop_check",
            RunState::PolicyEvaluated => "policy_evaluated",
            RunState::Building => "building",
            RunState::Scanned => "scanned",
            RunState::Packaged => "packaged",
            RunState::Tagged => "tagged",
            RunState::Pushed => "pushed",
            RunState::DescriptorUpdated => "descriptor_updated",
            RunState::Committed => "committed",
            RunState::Deployed => "deployed",
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Terminal outcome of a promotion run.
///
/// `Skipped` and `Rejected` are distinguished deliberately: a skip is
/// expected steady-state behavior of the loop guard, while a rejection
/// signals a branch the rule table was never taught about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PromotionOutcome {
    Deployed {
        environment: Environment,
        tag: ArtifactTag,
        image: ImageRef,
    },
    Skipped {
        reason: String,
    },
    Rejected {
        reason: String,
    },
    Failed {
        state: String,
        cause: String,
    },
}

impl PromotionOutcome {
    /// Whether the run terminated successfully from the operator's
    /// perspective (deployed, or skipped by the loop guard).
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            PromotionOutcome::Deployed { .. } | PromotionOutcome::Skipped { .. }
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PromotionOutcome::Deployed { .. } => "deployed",
            PromotionOutcome::Skipped { .. } => "skipped",
            PromotionOutcome::Rejected { .. } => "rejected",
            PromotionOutcome::Failed { .. } => "failed",
        }
    }
}

/// Report of a complete promotion run.
#[derive(Debug, Clone, Serialize)]
pub struct PromotionReport {
    pub run_id: String,
    pub branch: BranchRef,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Digest of the rule table that routed this run.
    pub policy_digest: String,
    #[serde(flatten)]
    pub outcome: PromotionOutcome,
}

/// The external collaborators one orchestrator drives.
#[derive(Clone)]
pub struct Collaborators {
    pub build: Arc<dyn BuildTool>,
    pub scanner: Arc<dyn Scanner>,
    pub registry: Arc<dyn ImageRegistry>,
    pub vcs: Arc<dyn VersionControl>,
    pub descriptors: Arc<dyn DescriptorStore>,
    pub deploy: Arc<dyn DeployExecutor>,
}

/// End-to-end promotion control flow.
pub struct PromotionOrchestrator {
    config: PromotionConfig,
    collaborators: Collaborators,
}

impl PromotionOrchestrator {
    pub fn new(config: PromotionConfig, collaborators: Collaborators) -> Self {
        Self {
            config,
            collaborators,
        }
    }

    /// Execute one promotion run.
    ///
    /// `branch_candidates` are tried in order (CI systems expose the branch
    /// under different variables depending on trigger type); the configured
    /// default branch is assumed when all are absent. `sequence` is the
    /// caller-supplied build number; `source_dir` is the checked-out source.
    pub async fn run(
        &self,
        branch_candidates: &[Option<String>],
        sequence: u64,
        source_dir: &Path,
    ) -> PromotionReport {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let start = Instant::now();
        let _span = obs::RunSpan::enter(&run_id);

        let policy_digest = match self.config.policy_digest() {
            Ok(digest) => digest,
            Err(e) => {
                tracing::warn!(error = %e, "rule table digest unavailable");
                String::new()
            }
        };

        obs::emit_state(&run_id, RunState::Start.name());
        let branch = resolve_branch(
            branch_candidates.iter().map(|c| c.as_deref()),
            &self.config.default_branch,
        );
        obs::emit_state(&run_id, RunState::BranchResolved.name());
        obs::emit_promotion_started(&run_id, branch.as_str(), sequence, &policy_digest);

        let outcome = self.execute(&run_id, &branch, sequence, source_dir).await;

        let duration_ms = start.elapsed().as_millis() as u64;
        obs::emit_promotion_finished(&run_id, outcome.kind(), duration_ms);

        PromotionReport {
            run_id,
            branch,
            started_at,
            duration_ms,
            policy_digest,
            outcome,
        }
    }

    async fn execute(
        &self,
        run_id: &str,
        branch: &BranchRef,
        sequence: u64,
        source_dir: &Path,
    ) -> PromotionOutcome {
        // Loop guard runs once, early, and gates the entire chain: the
        // automation's own descriptor commit must not re-trigger a deploy.
        obs::emit_state(run_id, RunState::LoopCheck.name());
        let last_author = match self.collaborators.vcs.last_commit_author(branch).await {
            Ok(author) => author,
            Err(e) => {
                // Fail open: a transient lookup error must not silently
                // swallow real work.
                obs::emit_loop_guard_degraded(run_id, &e);
                None
            }
        };
        if loop_guard::should_skip(last_author.as_deref(), &self.config.automation.author_email) {
            return PromotionOutcome::Skipped {
                reason: format!(
                    "last commit on '{}' was authored by automation identity '{}'",
                    branch, self.config.automation.author_email
                ),
            };
        }

        let decision = evaluate_policy(branch, &self.config.rules);
        obs::emit_state(run_id, RunState::PolicyEvaluated.name());
        if !decision.proceed {
            obs::emit_policy_rejected(run_id, branch.as_str(), &decision.reason);
            return PromotionOutcome::Rejected {
                reason: decision.reason,
            };
        }
        let (Some(environment), Some(credential_set_id), Some(descriptor_path)) = (
            decision.environment,
            decision.credential_set_id,
            decision.descriptor_path,
        ) else {
            // A proceeding decision always carries routing; guard anyway so
            // a policy bug surfaces as a failure, not a panic.
            return failed(
                RunState::PolicyEvaluated,
                PromotionError::InvalidInput("decision proceeded without routing".to_string()),
            );
        };
        info!(
            environment = %environment,
            credential_set = %credential_set_id,
            descriptor = %descriptor_path.display(),
            "policy routed branch"
        );

        obs::emit_state(run_id, RunState::Building.name());
        if let Err(e) = self.collaborators.build.build(source_dir).await {
            return failed(RunState::Building, e);
        }

        obs::emit_state(run_id, RunState::Scanned.name());
        match self.collaborators.scanner.scan(source_dir).await {
            Ok(report) => {
                info!(
                    findings = report.findings_count,
                    report = %report.report_path.display(),
                    "scan completed"
                );
                let gate = &self.config.scan_gate;
                if gate.enforce && report.findings_count > gate.max_findings {
                    return failed(
                        RunState::Scanned,
                        PromotionError::collaborator(
                            "scan",
                            format!(
                                "{} findings exceed budget of {}",
                                report.findings_count, gate.max_findings
                            ),
                        ),
                    );
                }
            }
            Err(e) => return failed(RunState::Scanned, e),
        }

        obs::emit_state(run_id, RunState::Packaged.name());
        if let Err(e) = self.collaborators.build.package(source_dir).await {
            return failed(RunState::Packaged, e);
        }

        obs::emit_state(run_id, RunState::Tagged.name());
        let tag = match ArtifactTag::derive(branch, sequence) {
            Ok(tag) => tag,
            Err(e) => return failed(RunState::Tagged, e),
        };

        obs::emit_state(run_id, RunState::Pushed.name());
        let image = match self
            .collaborators
            .registry
            .build_image(source_dir, &tag)
            .await
        {
            Ok(image) => image,
            Err(e) => return failed(RunState::Pushed, e),
        };
        if let Err(e) = self.collaborators.registry.push(&image).await {
            return failed(RunState::Pushed, e);
        }

        // The rewrite is computed fully in memory before anything is
        // persisted; a failure here leaves the descriptor untouched.
        obs::emit_state(run_id, RunState::DescriptorUpdated.name());
        let current = match self.collaborators.descriptors.load(&descriptor_path).await {
            Ok(content) => content,
            Err(e) => return failed(RunState::DescriptorUpdated, e),
        };
        let updated = match rewrite_image(&current, image.as_str()) {
            Ok(content) => content,
            Err(e) => return failed(RunState::DescriptorUpdated, e),
        };
        if let Err(e) = self
            .collaborators
            .descriptors
            .store(&descriptor_path, &updated)
            .await
        {
            return failed(RunState::DescriptorUpdated, e);
        }

        obs::emit_state(run_id, RunState::Committed.name());
        let message = self.config.render_commit_message(&image);
        match self
            .collaborators
            .vcs
            .commit(
                std::slice::from_ref(&descriptor_path),
                &message,
                &self.config.automation,
            )
            .await
        {
            Ok(CommitOutcome::Committed) => {
                if let Err(e) = self.collaborators.vcs.push(branch).await {
                    return failed(RunState::Committed, e);
                }
            }
            Ok(CommitOutcome::NoChanges) => {
                // Byte-identical rewrite on a re-run; nothing to push.
                info!("descriptor unchanged, skipping push");
            }
            Err(e) => return failed(RunState::Committed, e),
        }

        obs::emit_state(run_id, RunState::Deployed.name());
        if let Err(e) = self
            .collaborators
            .deploy
            .apply(&descriptor_path, &credential_set_id)
            .await
        {
            return failed(RunState::Deployed, e);
        }
        if let Err(e) = self
            .collaborators
            .deploy
            .wait_for_rollout(
                &self.config.app_name,
                environment.namespace(),
                &credential_set_id,
            )
            .await
        {
            return failed(RunState::Deployed, e);
        }

        PromotionOutcome::Deployed {
            environment,
            tag,
            image,
        }
    }
}

fn failed(state: RunState, error: PromotionError) -> PromotionOutcome {
    PromotionOutcome::Failed {
        state: state.name().to_string(),
        cause: error.to_string(),
    }
}
