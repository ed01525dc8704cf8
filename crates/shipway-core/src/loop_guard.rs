//! Self-trigger loop prevention.
//!
//! The automation commits the descriptor update back to the tracked branch,
//! and that commit would re-trigger the pipeline, which would re-deploy and
//! re-commit indefinitely. The guard runs once, early, and suppresses the
//! whole downstream chain when the most recent commit was authored by the
//! automation's own identity.

/// Whether the run should be skipped because the last commit on the tracked
/// branch was authored by the automation itself.
///
/// Returns true only when the author email is present and case-sensitively
/// equal to the automation identity. `None` means the author could not be
/// determined; the guard fails open (does not skip) because silently
/// dropping real work on a transient lookup error is worse than an
/// occasional redundant run. The orchestrator logs that degraded case.
pub fn should_skip(last_commit_author_email: Option<&str>, automation_identity_email: &str) -> bool {
    match last_commit_author_email {
        Some(author) => author == automation_identity_email,
        None => false,
    }
}
