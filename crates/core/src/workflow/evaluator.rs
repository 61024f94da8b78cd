//! Completion evaluation for approval workflows.
//!
//! Decides, from the current approval tally and the rule parameters captured
//! on the workflow, whether the workflow has collected enough approvals.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::workflow::rule::{ApprovalRule, RuleType};
use crate::workflow::types::{ApprovalTally, ApprovalWorkflow};

/// Rule parameters that decide completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionPolicy {
    /// Rule type of the workflow.
    pub rule_type: RuleType,
    /// Quorum for percentage rules, 0 to 100.
    pub minimum_approval_percentage: Decimal,
    /// Listed approvers plus the manager slot.
    pub total_slots: u32,
}

impl From<&ApprovalRule> for CompletionPolicy {
    fn from(rule: &ApprovalRule) -> Self {
        Self {
            rule_type: rule.rule_type,
            minimum_approval_percentage: rule.minimum_approval_percentage,
            total_slots: rule.total_slots(),
        }
    }
}

impl From<&ApprovalWorkflow> for CompletionPolicy {
    fn from(workflow: &ApprovalWorkflow) -> Self {
        Self {
            rule_type: workflow.rule_type,
            minimum_approval_percentage: workflow.minimum_approval_percentage,
            total_slots: workflow.total_steps,
        }
    }
}

/// Stateless evaluator for workflow completion.
pub struct CompletionEvaluator;

impl CompletionEvaluator {
    /// Returns true once the workflow has collected enough approvals.
    ///
    /// Percentage rules need a quorum of approvals; every other rule type needs
    /// all of its tasks decided.
    #[must_use]
    pub fn is_complete(policy: &CompletionPolicy, tally: &ApprovalTally) -> bool {
        match policy.rule_type {
            RuleType::Percentage => Self::quorum_reached(policy, tally),
            RuleType::Sequential
            | RuleType::Parallel
            | RuleType::SpecificApprover
            | RuleType::Hybrid => Self::all_decided(tally),
        }
    }

    /// Number of approvals a percentage rule needs.
    ///
    /// `floor(total_slots * percentage / 100)`, so 3 slots at 66% need a
    /// single approval.
    #[must_use]
    pub fn required_approvals(total_slots: u32, percentage: Decimal) -> u32 {
        let exact = Decimal::from(total_slots) * percentage / Decimal::ONE_HUNDRED;
        exact.floor().to_u32().unwrap_or(0).min(total_slots)
    }

    fn quorum_reached(policy: &CompletionPolicy, tally: &ApprovalTally) -> bool {
        tally.approved
            >= Self::required_approvals(policy.total_slots, policy.minimum_approval_percentage)
    }

    fn all_decided(tally: &ApprovalTally) -> bool {
        tally.pending == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn policy(rule_type: RuleType, total_slots: u32, pct: Decimal) -> CompletionPolicy {
        CompletionPolicy {
            rule_type,
            minimum_approval_percentage: pct,
            total_slots,
        }
    }

    fn tally(approved: u32, pending: u32) -> ApprovalTally {
        ApprovalTally {
            approved,
            pending,
            rejected: 0,
        }
    }

    #[rstest]
    #[case(4, dec!(75), 3)]
    #[case(3, dec!(66), 1)]
    #[case(3, dec!(100), 3)]
    #[case(3, dec!(0), 0)]
    #[case(5, dec!(50), 2)]
    #[case(2, dec!(50), 1)]
    #[case(1, dec!(99.9), 0)]
    #[case(10, dec!(33.3), 3)]
    fn test_required_approvals(#[case] slots: u32, #[case] pct: Decimal, #[case] expected: u32) {
        assert_eq!(CompletionEvaluator::required_approvals(slots, pct), expected);
    }

    #[test]
    fn test_percentage_completes_at_quorum() {
        let p = policy(RuleType::Percentage, 4, dec!(75));

        assert!(!CompletionEvaluator::is_complete(&p, &tally(2, 2)));
        assert!(CompletionEvaluator::is_complete(&p, &tally(3, 1)));
    }

    #[test]
    fn test_percentage_first_approval_is_enough_at_66_of_3() {
        let p = policy(RuleType::Percentage, 3, dec!(66));

        assert!(!CompletionEvaluator::is_complete(&p, &tally(0, 3)));
        assert!(CompletionEvaluator::is_complete(&p, &tally(1, 2)));
    }

    #[test]
    fn test_percentage_ignores_pending() {
        let p = policy(RuleType::Percentage, 4, dec!(50));
        assert!(CompletionEvaluator::is_complete(&p, &tally(2, 2)));
    }

    #[rstest]
    #[case(RuleType::Sequential)]
    #[case(RuleType::Parallel)]
    #[case(RuleType::SpecificApprover)]
    #[case(RuleType::Hybrid)]
    fn test_unanimous_rule_types_wait_for_every_task(#[case] rule_type: RuleType) {
        let p = policy(rule_type, 3, dec!(100));

        assert!(!CompletionEvaluator::is_complete(&p, &tally(2, 1)));
        assert!(CompletionEvaluator::is_complete(&p, &tally(3, 0)));
    }

    #[test]
    fn test_unanimous_ignores_percentage() {
        let p = policy(RuleType::Parallel, 3, dec!(10));
        assert!(!CompletionEvaluator::is_complete(&p, &tally(1, 2)));
    }
}
