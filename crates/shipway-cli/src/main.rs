//! Shipway - branch-driven deployment promotion
//!
//! The `shipway` command drives one promotion run from a CI job.
//!
//! ## Commands
//!
//! - `promote`: Run the full promotion pipeline for the current branch
//! - `policy`: Evaluate the rule table for a branch without running anything
//! - `tag`: Derive the artifact tag for a branch and build number

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, Level};

use shipway_core::fakes::{
    CallLog, FakeBuildTool, FakeDeployExecutor, FakeDescriptorStore, FakeImageRegistry,
    FakeScanner, FakeVersionControl,
};
use shipway_core::{
    evaluate_policy, init_tracing, resolve_branch, ArtifactTag, Collaborators, CommandBuildTool,
    CommandScanner, DockerCli, FsDescriptorStore, GitCli, KubectlCli, LogFormat, PromotionConfig,
    PromotionOrchestrator, PromotionOutcome,
};

#[derive(Parser)]
#[command(name = "shipway")]
#[command(author = "Stevedores Org")]
#[command(version = shipway_core::VERSION)]
#[command(about = "Branch-driven deployment promotion", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as newline-delimited JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Path to the promotion config file (JSON); defaults are used when absent
    #[arg(short, long, global = true, env = "SHIPWAY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full promotion pipeline
    Promote {
        /// Branch to promote; falls back to BRANCH_NAME, then GIT_BRANCH,
        /// then the configured default branch
        #[arg(short, long, env = "BRANCH_NAME")]
        branch: Option<String>,

        /// Secondary branch source, as exposed by SCM-triggered builds
        #[arg(long, env = "GIT_BRANCH", hide_env_values = true)]
        git_branch: Option<String>,

        /// Build number from the calling CI system
        #[arg(short = 'n', long, env = "BUILD_NUMBER")]
        sequence: u64,

        /// Checked-out source directory
        #[arg(short, long, default_value = ".")]
        source_dir: PathBuf,

        /// Run against in-memory collaborators instead of real tools;
        /// descriptors are seeded from disk when present
        #[arg(long)]
        dry_run: bool,
    },

    /// Evaluate the rule table for a branch
    Policy {
        /// Branch name to evaluate
        branch: String,
    },

    /// Derive the artifact tag for a branch and build number
    Tag {
        branch: String,
        sequence: u64,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    init_tracing(format, level);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Promote {
            branch,
            git_branch,
            sequence,
            source_dir,
            dry_run,
        } => {
            let candidates = vec![branch, git_branch];
            let collaborators = if dry_run {
                info!("dry run: wiring in-memory collaborators");
                dry_run_collaborators(&config, &source_dir)
            } else {
                live_collaborators(&config, &source_dir)
            };

            let orchestrator = PromotionOrchestrator::new(config, collaborators);
            let report = orchestrator.run(&candidates, sequence, &source_dir).await;

            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(outcome_exit_code(&report.outcome))
        }

        Commands::Policy { branch } => {
            let branch = resolve_branch([Some(branch.as_str())], &config.default_branch);
            let decision = evaluate_policy(&branch, &config.rules);
            println!("{}", serde_json::to_string_pretty(&decision)?);
            if decision.proceed {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(2))
            }
        }

        Commands::Tag { branch, sequence } => {
            let branch = resolve_branch([Some(branch.as_str())], &config.default_branch);
            let tag = ArtifactTag::derive(&branch, sequence)
                .with_context(|| format!("cannot derive tag for '{branch}'"))?;
            println!("{tag}");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<PromotionConfig> {
    match path {
        Some(path) => PromotionConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(PromotionConfig::default()),
    }
}

fn live_collaborators(config: &PromotionConfig, source_dir: &std::path::Path) -> Collaborators {
    Collaborators {
        build: Arc::new(CommandBuildTool::from_config(&config.tools)),
        scanner: Arc::new(CommandScanner::from_config(&config.tools)),
        registry: Arc::new(DockerCli::new(&config.image_repository)),
        vcs: Arc::new(GitCli::new(source_dir)),
        descriptors: Arc::new(FsDescriptorStore::new(source_dir)),
        deploy: Arc::new(KubectlCli::new()),
    }
}

fn dry_run_collaborators(config: &PromotionConfig, source_dir: &std::path::Path) -> Collaborators {
    let log = CallLog::new();

    let descriptors = Arc::new(FakeDescriptorStore::new());
    for rule in &config.rules {
        let on_disk = source_dir.join(&rule.descriptor_path);
        if let Ok(content) = std::fs::read_to_string(&on_disk) {
            descriptors.seed(rule.descriptor_path.clone(), &content);
        }
    }

    Collaborators {
        build: Arc::new(FakeBuildTool::new(log.clone())),
        scanner: Arc::new(FakeScanner::new(log.clone())),
        registry: Arc::new(FakeImageRegistry::new(log.clone(), &config.image_repository)),
        vcs: Arc::new(FakeVersionControl::with_last_author(log.clone(), None)),
        descriptors,
        deploy: Arc::new(FakeDeployExecutor::new(log)),
    }
}

fn outcome_exit_code(outcome: &PromotionOutcome) -> ExitCode {
    match outcome {
        // Skipped is expected steady-state behavior, not an error.
        PromotionOutcome::Deployed { .. } | PromotionOutcome::Skipped { .. } => ExitCode::SUCCESS,
        // Rejection signals a misconfigured rule table; keep it apart from
        // step failures so operators can tell them from the exit code alone.
        PromotionOutcome::Rejected { .. } => ExitCode::from(2),
        PromotionOutcome::Failed { .. } => ExitCode::FAILURE,
    }
}
