//! Shipway Core Library
//!
//! Branch-driven deployment promotion: resolves the building branch, gates
//! and routes it through a declarative rule table, derives an immutable
//! artifact tag, rewrites the target environment's deployment descriptor,
//! and drives the external build/scan/registry/VCS/deploy collaborators
//! through an explicit state machine with self-trigger loop prevention.

pub mod collaborators;
pub mod config;
pub mod descriptor;
pub mod domain;
pub mod fakes;
pub mod loop_guard;
pub mod obs;
pub mod orchestrator;
pub mod policy;
pub mod tagger;
pub mod telemetry;
pub mod tools;

pub use domain::{
    resolve_branch, BranchRef, BuildIdentity, CommitIdentity, Environment, PromotionDecision,
    PromotionError, PromotionRule, Result, RuleMatcher,
};

pub use collaborators::{
    BuildArtifact, BuildTool, CommitOutcome, DeployExecutor, DescriptorStore, ImageRef,
    ImageRegistry, ScanReport, Scanner, VersionControl,
};
pub use config::{default_rules, PromotionConfig, ScanGate, ToolsConfig};
pub use descriptor::rewrite_image;
pub use loop_guard::should_skip;
pub use orchestrator::{
    Collaborators, PromotionOrchestrator, PromotionOutcome, PromotionReport, RunState,
};
pub use policy::evaluate_policy;
pub use tagger::ArtifactTag;
pub use telemetry::{init_tracing, LogFormat};
pub use tools::{
    CommandBuildTool, CommandScanner, DockerCli, FsDescriptorStore, GitCli, KubectlCli,
};

/// Shipway version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
