//! Structured observability hooks for promotion run lifecycle events.
//!
//! This module provides:
//! - Run-scoped tracing spans via `RunSpan` RAII guard
//! - Emission functions for key lifecycle events: start, state transitions,
//!   loop-guard degradation, policy rejection, finish
//!
//! Events are emitted at `info!` level; the degraded loop-guard case is a
//! warning since the run proceeds on weaker information.

use tracing::{info, warn};

/// RAII guard that enters a run-scoped tracing span for the duration of a
/// promotion run.
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    /// Create and enter a span tagged with the run id.
    pub fn enter(run_id: &str) -> Self {
        let span = tracing::info_span!("shipway.run", run_id = %run_id);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: promotion run started for a branch.
pub fn emit_promotion_started(run_id: &str, branch: &str, sequence: u64, policy_digest: &str) {
    info!(
        event = "promotion.started",
        run_id = %run_id,
        branch = %branch,
        sequence = sequence,
        policy_digest = %policy_digest,
    );
}

/// Emit event: the state machine entered a new state.
pub fn emit_state(run_id: &str, state: &str) {
    info!(event = "promotion.state", run_id = %run_id, state = %state);
}

/// Emit event: commit-author lookup failed, loop guard failing open.
pub fn emit_loop_guard_degraded(run_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "loop_guard.degraded", run_id = %run_id, error = %error);
}

/// Emit event: branch not covered by the rule table.
pub fn emit_policy_rejected(run_id: &str, branch: &str, reason: &str) {
    info!(event = "policy.rejected", run_id = %run_id, branch = %branch, reason = %reason);
}

/// Emit event: promotion run reached a terminal state.
pub fn emit_promotion_finished(run_id: &str, outcome: &str, duration_ms: u64) {
    info!(
        event = "promotion.finished",
        run_id = %run_id,
        outcome = %outcome,
        duration_ms = duration_ms,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_span_create() {
        // Just ensure RunSpan::enter doesn't panic
        let _span = RunSpan::enter("test-run-id");
    }
}
