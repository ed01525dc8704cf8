//! Promotion policy engine.
//!
//! Evaluates a [`BranchRef`] against an ordered [`PromotionRule`] table to
//! produce a [`PromotionDecision`] — the gate-plus-routing decision that
//! blocks or allows a promotion.

use crate::domain::{BranchRef, PromotionDecision, PromotionRule};

/// Evaluate a branch against an ordered rule table.
///
/// Iterates rules in table order; the first matcher that accepts the branch
/// determines environment, credential set, and descriptor path. Ordering is
/// the whole of the disambiguation contract: a branch satisfying both an
/// exact rule and a prefix rule resolves by position in the table, not by
/// matcher specificity. Compose tables with exact rules first.
///
/// No match returns `proceed = false` with an operator-facing reason. The
/// orchestrator treats that as terminal for the run; deploying an
/// unrecognized branch is unsafe by design.
///
/// Deterministic and total: for a fixed rule table and branch string the
/// decision is identical on every invocation.
pub fn evaluate_policy(branch: &BranchRef, rules: &[PromotionRule]) -> PromotionDecision {
    for rule in rules {
        if rule.matcher.accepts(branch) {
            return PromotionDecision::route(rule, branch);
        }
    }

    PromotionDecision::reject(format!(
        "no promotion rule matches branch '{}' ({} rules checked)",
        branch.as_str(),
        rules.len()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_rules;
    use crate::domain::Environment;

    #[test]
    fn test_first_match_wins_in_rule_order() {
        // "release/hot" satisfies both rules; position decides, not specificity.
        let rules = vec![
            PromotionRule::prefix("release/", Environment::Uat, "uat-creds", "deploy/uat.yaml"),
            PromotionRule::exact(
                "release/hot",
                Environment::Prod,
                "prod-creds",
                "deploy/prod.yaml",
            ),
        ];

        let decision = evaluate_policy(&BranchRef::from("release/hot"), &rules);
        assert_eq!(decision.environment, Some(Environment::Uat));
    }

    #[test]
    fn test_no_match_rejects_with_reason() {
        let decision = evaluate_policy(&BranchRef::from("feature/unlisted"), &default_rules());
        assert!(!decision.proceed);
        assert!(decision.reason.contains("feature/unlisted"));
    }

    #[test]
    fn test_deterministic_for_fixed_inputs() {
        let rules = default_rules();
        let branch = BranchRef::from("hotfix/urgent-fix");

        let first = evaluate_policy(&branch, &rules);
        for _ in 0..10 {
            assert_eq!(evaluate_policy(&branch, &rules), first);
        }
    }

    #[test]
    fn test_default_table_routing() {
        let rules = default_rules();

        let cases = [
            ("develop", Environment::Dev),
            ("uat", Environment::Uat),
            ("main", Environment::Prod),
            ("master", Environment::Prod),
            ("release/v2.1", Environment::Uat),
            ("hotfix/urgent-fix", Environment::Prod),
        ];

        for (branch, expected) in cases {
            let decision = evaluate_policy(&BranchRef::from(branch), &rules);
            assert!(decision.proceed, "branch {branch} should be allowed");
            assert_eq!(decision.environment, Some(expected), "branch {branch}");
        }
    }

    #[test]
    fn test_empty_table_rejects_everything() {
        let decision = evaluate_policy(&BranchRef::from("main"), &[]);
        assert!(!decision.proceed);
    }
}
