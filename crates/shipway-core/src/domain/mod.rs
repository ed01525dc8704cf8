//! Domain models for Shipway.
//!
//! Canonical definitions for the core entities:
//! - `BranchRef`: Identity of the building branch
//! - `PromotionRule`: One row of the declarative branch-to-environment table
//! - `PromotionDecision`: Gate-plus-routing outcome of policy evaluation
//! - `PromotionError`: Error taxonomy for a promotion run

pub mod branch;
pub mod decision;
pub mod error;
pub mod rule;

// Re-export main types and errors
pub use branch::{resolve_branch, BranchRef};
pub use decision::{BuildIdentity, CommitIdentity, PromotionDecision};
pub use error::{PromotionError, Result};
pub use rule::{Environment, PromotionRule, RuleMatcher};
