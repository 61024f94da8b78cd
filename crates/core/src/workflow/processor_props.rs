//! Property-based tests for DecisionProcessor.
//!
//! Random sequences of decisions are replayed against one workflow snapshot;
//! the workflow invariants must hold after every step.

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;

use expensa_shared::types::{ApprovalId, ApprovalRuleId, CompanyId, UserId, WorkflowId};

use crate::expense::{Expense, ExpenseStatus};
use crate::workflow::error::WorkflowError;
use crate::workflow::processor::{
    DecisionCommand, DecisionOutcome, DecisionProcessor, SequencePolicy, WorkflowState,
};
use crate::workflow::rule::RuleType;
use crate::workflow::types::{Approval, ApprovalStatus, ApprovalWorkflow, Verdict};

fn arb_rule_type() -> impl Strategy<Value = RuleType> {
    prop_oneof![
        Just(RuleType::Sequential),
        Just(RuleType::Parallel),
        Just(RuleType::Percentage),
        Just(RuleType::SpecificApprover),
        Just(RuleType::Hybrid),
    ]
}

fn arb_verdict() -> impl Strategy<Value = Verdict> {
    prop_oneof![4 => Just(Verdict::Approve), 1 => Just(Verdict::Reject)]
}

fn arb_policy() -> impl Strategy<Value = SequencePolicy> {
    prop_oneof![Just(SequencePolicy::Advisory), Just(SequencePolicy::Strict)]
}

fn build_state(rule_type: RuleType, pct: Decimal, tasks: u32) -> WorkflowState {
    let now = Utc::now();
    let mut expense = Expense::draft(CompanyId::new(), UserId::new(), Decimal::ONE, "USD", "Lunch");
    expense.status = ExpenseStatus::PendingApproval;
    let workflow = ApprovalWorkflow {
        id: WorkflowId::new(),
        expense_id: expense.id,
        rule_id: ApprovalRuleId::new(),
        rule_type,
        minimum_approval_percentage: pct,
        status: ApprovalStatus::Pending,
        current_step: 1,
        total_steps: tasks,
        completed_steps: 0,
        created_at: now,
        updated_at: now,
    };
    let approvals = (1..=tasks)
        .map(|position| Approval {
            id: ApprovalId::new(),
            workflow_id: workflow.id,
            expense_id: expense.id,
            approver_id: UserId::new(),
            step: if rule_type == RuleType::Sequential { position } else { 1 },
            status: ApprovalStatus::Pending,
            comments: None,
            approved_at: None,
            created_at: now,
        })
        .collect();
    WorkflowState { workflow, approvals, expense }
}

fn decide(
    state: &mut WorkflowState,
    index: usize,
    verdict: Verdict,
    policy: SequencePolicy,
) -> Result<DecisionOutcome, WorkflowError> {
    let approval = &state.approvals[index];
    let command = DecisionCommand {
        approval_id: approval.id,
        actor_id: approval.approver_id,
        verdict,
        comments: None,
        decided_at: Utc::now(),
    };
    DecisionProcessor::apply(state, &command, policy).map(|r| r.outcome)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// completed_steps stays within bounds and counts each approval once.
    #[test]
    fn prop_completed_steps_bounded(
        rule_type in arb_rule_type(),
        pct in (0i64..=100i64).prop_map(Decimal::from),
        tasks in 1u32..8,
        picks in prop::collection::vec((0usize..8, arb_verdict()), 1..20),
        policy in arb_policy(),
    ) {
        let mut state = build_state(rule_type, pct, tasks);

        for (pick, verdict) in picks {
            let index = pick % state.approvals.len();
            let _ = decide(&mut state, index, verdict, policy);

            let approved = state
                .approvals
                .iter()
                .filter(|a| a.status == ApprovalStatus::Approved)
                .count();
            prop_assert!(state.workflow.completed_steps <= state.workflow.total_steps);
            prop_assert_eq!(state.workflow.completed_steps as usize, approved);
        }
    }

    /// Once terminal, the workflow never changes status and rejects every decision.
    #[test]
    fn prop_terminal_is_immutable(
        rule_type in arb_rule_type(),
        pct in (0i64..=100i64).prop_map(Decimal::from),
        tasks in 1u32..8,
        picks in prop::collection::vec((0usize..8, arb_verdict()), 1..20),
    ) {
        let mut state = build_state(rule_type, pct, tasks);
        let mut verdict_seen: Option<ApprovalStatus> = None;

        for (pick, verdict) in picks {
            let index = pick % state.approvals.len();
            let before = state.clone();
            let result = decide(&mut state, index, verdict, SequencePolicy::Advisory);

            if let Some(terminal) = verdict_seen {
                prop_assert!(result.is_err());
                prop_assert_eq!(&state, &before);
                prop_assert_eq!(state.workflow.status, terminal);
            } else if state.workflow.status.is_terminal() {
                verdict_seen = Some(state.workflow.status);
            }
        }
    }

    /// A rejection leaves no pending task and rejects the expense.
    #[test]
    fn prop_rejection_cascades(
        rule_type in arb_rule_type(),
        tasks in 1u32..8,
        approvals_first in 0usize..8,
        rejecter in 0usize..8,
    ) {
        let mut state = build_state(rule_type, Decimal::ONE_HUNDRED, tasks);
        let len = state.approvals.len();
        let approve_count = approvals_first.min(len - 1);
        for index in 0..approve_count {
            decide(&mut state, index, Verdict::Approve, SequencePolicy::Advisory).unwrap();
        }
        let rejecter = approve_count + rejecter % (len - approve_count);

        let outcome = decide(&mut state, rejecter, Verdict::Reject, SequencePolicy::Advisory);

        prop_assert_eq!(outcome.unwrap(), DecisionOutcome::Rejected);
        prop_assert_eq!(state.expense.status, ExpenseStatus::Rejected);
        prop_assert_eq!(state.workflow.status, ApprovalStatus::Rejected);
        prop_assert!(state.approvals.iter().all(|a| !a.is_pending()));
        prop_assert!(state.approvals.iter().all(|a| a.approved_at.is_some()));
    }

    /// A decided task never transitions again.
    #[test]
    fn prop_decided_task_is_final(
        rule_type in arb_rule_type(),
        tasks in 2u32..8,
        first in arb_verdict(),
        second in arb_verdict(),
    ) {
        let mut state = build_state(rule_type, Decimal::ONE_HUNDRED, tasks);
        decide(&mut state, 0, first, SequencePolicy::Advisory).unwrap();
        let status = state.approvals[0].status;
        let approved_at = state.approvals[0].approved_at;

        let again = decide(&mut state, 0, second, SequencePolicy::Advisory);

        prop_assert!(matches!(again, Err(WorkflowError::AlreadyDecided(_))));
        prop_assert_eq!(state.approvals[0].status, status);
        prop_assert_eq!(state.approvals[0].approved_at, approved_at);
    }
}
