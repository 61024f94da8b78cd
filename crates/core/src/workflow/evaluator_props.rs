//! Property-based tests for CompletionEvaluator.

use proptest::prelude::*;
use rust_decimal::Decimal;

use crate::workflow::evaluator::{CompletionEvaluator, CompletionPolicy};
use crate::workflow::rule::RuleType;
use crate::workflow::types::ApprovalTally;

/// Percentages between 0 and 100 with up to two decimal places.
fn arb_percentage() -> impl Strategy<Value = Decimal> {
    (0i64..=10_000i64).prop_map(|n| Decimal::new(n, 2))
}

fn arb_unanimous_rule_type() -> impl Strategy<Value = RuleType> {
    prop_oneof![
        Just(RuleType::Sequential),
        Just(RuleType::Parallel),
        Just(RuleType::SpecificApprover),
        Just(RuleType::Hybrid),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// The quorum never exceeds the number of slots.
    #[test]
    fn prop_required_within_slots(slots in 0u32..50, pct in arb_percentage()) {
        let required = CompletionEvaluator::required_approvals(slots, pct);
        prop_assert!(required <= slots);
    }

    /// The quorum is the floor of slots * pct / 100.
    #[test]
    fn prop_required_is_floor(slots in 1u32..50, pct in arb_percentage()) {
        let required = Decimal::from(CompletionEvaluator::required_approvals(slots, pct));
        let exact = Decimal::from(slots) * pct / Decimal::ONE_HUNDRED;

        prop_assert!(required <= exact);
        prop_assert!(exact < required + Decimal::ONE);
    }

    /// A higher percentage never needs fewer approvals.
    #[test]
    fn prop_required_monotonic_in_percentage(
        slots in 1u32..50,
        a in arb_percentage(),
        b in arb_percentage(),
    ) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(
            CompletionEvaluator::required_approvals(slots, low)
                <= CompletionEvaluator::required_approvals(slots, high)
        );
    }

    /// Percentage rules complete exactly when approvals reach the quorum.
    #[test]
    fn prop_percentage_completion_matches_quorum(
        slots in 1u32..20,
        approved in 0u32..20,
        pct in arb_percentage(),
    ) {
        let approved = approved.min(slots);
        let policy = CompletionPolicy {
            rule_type: RuleType::Percentage,
            minimum_approval_percentage: pct,
            total_slots: slots,
        };
        let tally = ApprovalTally { approved, pending: slots - approved, rejected: 0 };

        prop_assert_eq!(
            CompletionEvaluator::is_complete(&policy, &tally),
            approved >= CompletionEvaluator::required_approvals(slots, pct)
        );
    }

    /// Other rule types complete exactly when nothing is pending.
    #[test]
    fn prop_unanimous_completion_matches_pending(
        rule_type in arb_unanimous_rule_type(),
        approved in 0u32..20,
        pending in 0u32..20,
        pct in arb_percentage(),
    ) {
        let policy = CompletionPolicy {
            rule_type,
            minimum_approval_percentage: pct,
            total_slots: approved + pending,
        };
        let tally = ApprovalTally { approved, pending, rejected: 0 };

        prop_assert_eq!(CompletionEvaluator::is_complete(&policy, &tally), pending == 0);
    }
}
