//! Decision processing for approval workflows.
//!
//! [`DecisionProcessor::apply`] takes a snapshot of one workflow, checks every
//! precondition, then applies a single approver decision to the snapshot.
//! Stores load the snapshot under a lock, call `apply` and write back the
//! changed rows before releasing the lock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use expensa_shared::SequencePolicySetting;
use expensa_shared::types::{ApprovalId, UserId};

use crate::expense::{Expense, ExpenseStatus};
use crate::workflow::audit::{AuditAction, AuditRecord};
use crate::workflow::error::WorkflowError;
use crate::workflow::evaluator::{CompletionEvaluator, CompletionPolicy};
use crate::workflow::rule::RuleType;
use crate::workflow::types::{Approval, ApprovalStatus, ApprovalTally, ApprovalWorkflow, Verdict};

/// Whether approvers of a sequential workflow may act ahead of their turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SequencePolicy {
    /// Any pending task may be decided at any time.
    #[default]
    Advisory,
    /// A sequential task may only be decided once every earlier step is approved.
    Strict,
}

impl SequencePolicy {
    /// Checks the sequence gate for `approval`.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::OutOfSequence` when the policy is strict and an
    /// earlier step of a sequential workflow is still undecided.
    pub fn permits(
        self,
        workflow: &ApprovalWorkflow,
        approvals: &[Approval],
        approval: &Approval,
    ) -> Result<(), WorkflowError> {
        match (self, workflow.rule_type) {
            (Self::Strict, RuleType::Sequential) => {
                let waiting_on = approvals
                    .iter()
                    .filter(|a| a.step < approval.step && a.status != ApprovalStatus::Approved)
                    .map(|a| a.step)
                    .min();
                match waiting_on {
                    Some(current_step) => Err(WorkflowError::OutOfSequence {
                        approval_id: approval.id,
                        step: approval.step,
                        current_step,
                    }),
                    None => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }
}

impl From<SequencePolicySetting> for SequencePolicy {
    fn from(setting: SequencePolicySetting) -> Self {
        match setting {
            SequencePolicySetting::Advisory => Self::Advisory,
            SequencePolicySetting::Strict => Self::Strict,
        }
    }
}

/// One approver's decision on one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionCommand {
    /// Task being decided.
    pub approval_id: ApprovalId,
    /// Authenticated user acting on it.
    pub actor_id: UserId,
    /// Approve or reject.
    pub verdict: Verdict,
    /// Optional comments.
    pub comments: Option<String>,
    /// Decision time.
    pub decided_at: DateTime<Utc>,
}

/// Everything a decision reads and may change, loaded under one lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowState {
    /// The workflow.
    pub workflow: ApprovalWorkflow,
    /// All of its tasks.
    pub approvals: Vec<Approval>,
    /// The expense under approval.
    pub expense: Expense,
}

/// How a decision moved the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionOutcome {
    /// Recorded; the workflow is still pending.
    Advanced,
    /// The workflow and the expense are approved.
    Approved,
    /// The workflow and the expense are rejected.
    Rejected,
}

/// Result of a recorded decision.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionResult {
    /// The decided task.
    pub approval: Approval,
    /// The workflow after the decision.
    pub workflow: ApprovalWorkflow,
    /// Expense status after the decision.
    pub expense_status: ExpenseStatus,
    /// What the decision did to the workflow.
    pub outcome: DecisionOutcome,
    /// Sibling tasks force-rejected by a rejection.
    pub cascaded: Vec<ApprovalId>,
    /// Audit entry for the decision.
    pub audit: AuditRecord,
}

/// Stateless processor for approver decisions.
pub struct DecisionProcessor;

impl DecisionProcessor {
    /// Applies a decision to a workflow snapshot.
    ///
    /// Preconditions are checked before anything is touched, so on error the
    /// snapshot is unchanged.
    ///
    /// # Errors
    ///
    /// * `ApprovalNotFound` if the task is not part of the workflow
    /// * `NotAssignedApprover` if the actor is not the task's approver
    /// * `AlreadyDecided` if the task is no longer pending
    /// * `WorkflowClosed` if the workflow already reached a verdict
    /// * `OutOfSequence` if the sequence gate refuses the task
    pub fn apply(
        state: &mut WorkflowState,
        command: &DecisionCommand,
        policy: SequencePolicy,
    ) -> Result<DecisionResult, WorkflowError> {
        let index = state
            .approvals
            .iter()
            .position(|a| a.id == command.approval_id)
            .ok_or(WorkflowError::ApprovalNotFound(command.approval_id))?;

        Self::check_preconditions(state, index, command, policy)?;

        let now = command.decided_at;
        let previous_expense_status = state.expense.status;

        let approval = &mut state.approvals[index];
        approval.status = command.verdict.resulting_status();
        approval.approved_at = Some(now);
        approval.comments.clone_from(&command.comments);

        let (outcome, cascaded) = match command.verdict {
            Verdict::Approve => (Self::after_approval(state), Vec::new()),
            Verdict::Reject => (DecisionOutcome::Rejected, Self::after_rejection(state, now)),
        };

        state.workflow.updated_at = now;
        match outcome {
            DecisionOutcome::Approved => {
                state.workflow.status = ApprovalStatus::Approved;
                state.expense.status = ExpenseStatus::Approved;
                state.expense.updated_at = now;
            }
            DecisionOutcome::Rejected => {
                state.workflow.status = ApprovalStatus::Rejected;
                state.expense.status = ExpenseStatus::Rejected;
                state.expense.updated_at = now;
            }
            DecisionOutcome::Advanced => {}
        }

        let approval = state.approvals[index].clone();
        let audit = Self::audit_for(&approval, command, previous_expense_status, state);

        Ok(DecisionResult {
            approval,
            workflow: state.workflow.clone(),
            expense_status: state.expense.status,
            outcome,
            cascaded,
            audit,
        })
    }

    fn check_preconditions(
        state: &WorkflowState,
        index: usize,
        command: &DecisionCommand,
        policy: SequencePolicy,
    ) -> Result<(), WorkflowError> {
        let approval = &state.approvals[index];

        if approval.approver_id != command.actor_id {
            return Err(WorkflowError::NotAssignedApprover {
                approval_id: approval.id,
                actor_id: command.actor_id,
            });
        }
        if !approval.is_pending() {
            return Err(WorkflowError::AlreadyDecided(approval.id));
        }
        if !state.workflow.is_open() {
            return Err(WorkflowError::WorkflowClosed(state.workflow.id));
        }

        policy.permits(&state.workflow, &state.approvals, approval)
    }

    /// Counts the approval and asks the evaluator whether the workflow is done.
    fn after_approval(state: &mut WorkflowState) -> DecisionOutcome {
        let workflow = &mut state.workflow;
        workflow.completed_steps = (workflow.completed_steps + 1).min(workflow.total_steps);

        let tally = ApprovalTally::from_approvals(&state.approvals);
        let policy = CompletionPolicy::from(&*workflow);

        if CompletionEvaluator::is_complete(&policy, &tally) {
            return DecisionOutcome::Approved;
        }

        if workflow.rule_type == RuleType::Sequential {
            workflow.current_step = (workflow.current_step + 1).min(workflow.total_steps);
        }
        DecisionOutcome::Advanced
    }

    /// Force-rejects every task still pending and returns their ids.
    fn after_rejection(state: &mut WorkflowState, now: DateTime<Utc>) -> Vec<ApprovalId> {
        state
            .approvals
            .iter_mut()
            .filter(|a| a.is_pending())
            .map(|a| {
                a.status = ApprovalStatus::Rejected;
                a.approved_at = Some(now);
                a.id
            })
            .collect()
    }

    fn audit_for(
        approval: &Approval,
        command: &DecisionCommand,
        previous_expense_status: ExpenseStatus,
        state: &WorkflowState,
    ) -> AuditRecord {
        let (action, verb) = match command.verdict {
            Verdict::Approve => (AuditAction::Approve, "approved"),
            Verdict::Reject => (AuditAction::Reject, "rejected"),
        };
        let description = match &command.comments {
            Some(comments) => format!("Approval step {} {verb}: {comments}", approval.step),
            None => format!("Approval step {} {verb}", approval.step),
        };

        AuditRecord::new(
            action,
            command.actor_id,
            state.expense.id,
            description,
            command.decided_at,
        )
        .with_values(
            json!({
                "approval_id": approval.id,
                "approval_status": ApprovalStatus::Pending,
                "expense_status": previous_expense_status,
            }),
            json!({
                "approval_id": approval.id,
                "approval_status": approval.status,
                "expense_status": state.expense.status,
                "workflow_status": state.workflow.status,
                "completed_steps": state.workflow.completed_steps,
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use expensa_shared::types::{ApprovalRuleId, CompanyId, WorkflowId};

    /// Builds a pending workflow with one task per approver.
    fn state(rule_type: RuleType, pct: Decimal, approvers: &[UserId]) -> WorkflowState {
        let now = Utc::now();
        let mut expense = Expense::draft(CompanyId::new(), UserId::new(), dec!(80), "USD", "Taxi");
        expense.status = ExpenseStatus::PendingApproval;
        let total = u32::try_from(approvers.len()).unwrap();
        let workflow = ApprovalWorkflow {
            id: WorkflowId::new(),
            expense_id: expense.id,
            rule_id: ApprovalRuleId::new(),
            rule_type,
            minimum_approval_percentage: pct,
            status: ApprovalStatus::Pending,
            current_step: 1,
            total_steps: total,
            completed_steps: 0,
            created_at: now,
            updated_at: now,
        };
        let approvals = approvers
            .iter()
            .zip(1u32..)
            .map(|(approver_id, position)| Approval {
                id: ApprovalId::new(),
                workflow_id: workflow.id,
                expense_id: expense.id,
                approver_id: *approver_id,
                step: if rule_type == RuleType::Sequential {
                    position
                } else {
                    1
                },
                status: ApprovalStatus::Pending,
                comments: None,
                approved_at: None,
                created_at: now,
            })
            .collect();
        WorkflowState {
            workflow,
            approvals,
            expense,
        }
    }

    fn command(state: &WorkflowState, index: usize, verdict: Verdict) -> DecisionCommand {
        let approval = &state.approvals[index];
        DecisionCommand {
            approval_id: approval.id,
            actor_id: approval.approver_id,
            verdict,
            comments: None,
            decided_at: Utc::now(),
        }
    }

    fn users(n: usize) -> Vec<UserId> {
        (0..n).map(|_| UserId::new()).collect()
    }

    #[test]
    fn test_parallel_needs_every_approval() {
        let mut s = state(RuleType::Parallel, dec!(100), &users(3));

        for i in 0..2 {
            let cmd = command(&s, i, Verdict::Approve);
            let result = DecisionProcessor::apply(&mut s, &cmd, SequencePolicy::Advisory).unwrap();
            assert_eq!(result.outcome, DecisionOutcome::Advanced);
            assert_eq!(result.expense_status, ExpenseStatus::PendingApproval);
        }

        let cmd = command(&s, 2, Verdict::Approve);
        let result = DecisionProcessor::apply(&mut s, &cmd, SequencePolicy::Advisory).unwrap();

        assert_eq!(result.outcome, DecisionOutcome::Approved);
        assert_eq!(result.workflow.status, ApprovalStatus::Approved);
        assert_eq!(result.workflow.completed_steps, 3);
        assert_eq!(s.expense.status, ExpenseStatus::Approved);
    }

    #[test]
    fn test_decided_task_conflicts() {
        let mut s = state(RuleType::Parallel, dec!(100), &users(3));
        let cmd = command(&s, 0, Verdict::Approve);
        DecisionProcessor::apply(&mut s, &cmd, SequencePolicy::Advisory).unwrap();

        let again = DecisionProcessor::apply(&mut s, &cmd, SequencePolicy::Advisory);

        assert!(matches!(again, Err(WorkflowError::AlreadyDecided(_))));
        assert_eq!(s.workflow.completed_steps, 1);
    }

    #[test]
    fn test_rejection_cascades() {
        let mut s = state(RuleType::Parallel, dec!(100), &users(4));
        let cmd = command(&s, 0, Verdict::Approve);
        DecisionProcessor::apply(&mut s, &cmd, SequencePolicy::Advisory).unwrap();

        let cmd = command(&s, 1, Verdict::Reject);
        let result = DecisionProcessor::apply(&mut s, &cmd, SequencePolicy::Advisory).unwrap();

        assert_eq!(result.outcome, DecisionOutcome::Rejected);
        assert_eq!(result.expense_status, ExpenseStatus::Rejected);
        assert_eq!(result.workflow.status, ApprovalStatus::Rejected);
        assert_eq!(result.cascaded.len(), 2);
        assert_eq!(s.approvals[0].status, ApprovalStatus::Approved);
        assert!(
            s.approvals[1..]
                .iter()
                .all(|a| a.status == ApprovalStatus::Rejected && a.approved_at.is_some())
        );
        assert_eq!(result.audit.action, AuditAction::Reject);
    }

    #[test]
    fn test_percentage_quorum() {
        let mut s = state(RuleType::Percentage, dec!(75), &users(4));

        for i in 0..2 {
            let cmd = command(&s, i, Verdict::Approve);
            let result = DecisionProcessor::apply(&mut s, &cmd, SequencePolicy::Advisory).unwrap();
            assert_eq!(result.outcome, DecisionOutcome::Advanced);
        }
        let cmd = command(&s, 2, Verdict::Approve);
        let result = DecisionProcessor::apply(&mut s, &cmd, SequencePolicy::Advisory).unwrap();
        assert_eq!(result.outcome, DecisionOutcome::Approved);

        let cmd = command(&s, 3, Verdict::Approve);
        let late = DecisionProcessor::apply(&mut s, &cmd, SequencePolicy::Advisory);
        assert!(matches!(late, Err(WorkflowError::WorkflowClosed(_))));
        assert!(s.approvals[3].is_pending());
    }

    #[test]
    fn test_wrong_actor_is_forbidden() {
        let mut s = state(RuleType::Parallel, dec!(100), &users(2));
        let mut cmd = command(&s, 0, Verdict::Approve);
        cmd.actor_id = UserId::new();

        let result = DecisionProcessor::apply(&mut s, &cmd, SequencePolicy::Advisory);

        assert!(matches!(
            result,
            Err(WorkflowError::NotAssignedApprover { .. })
        ));
        assert!(s.approvals[0].is_pending());
    }

    #[test]
    fn test_unknown_approval() {
        let mut s = state(RuleType::Parallel, dec!(100), &users(2));
        let mut cmd = command(&s, 0, Verdict::Approve);
        cmd.approval_id = ApprovalId::new();

        let result = DecisionProcessor::apply(&mut s, &cmd, SequencePolicy::Advisory);

        assert!(matches!(result, Err(WorkflowError::ApprovalNotFound(_))));
    }

    #[test]
    fn test_sequential_advances_current_step() {
        let mut s = state(RuleType::Sequential, dec!(100), &users(3));

        let cmd = command(&s, 0, Verdict::Approve);
        DecisionProcessor::apply(&mut s, &cmd, SequencePolicy::Strict).unwrap();
        assert_eq!(s.workflow.current_step, 2);

        let cmd = command(&s, 1, Verdict::Approve);
        DecisionProcessor::apply(&mut s, &cmd, SequencePolicy::Strict).unwrap();
        assert_eq!(s.workflow.current_step, 3);

        let cmd = command(&s, 2, Verdict::Approve);
        let result = DecisionProcessor::apply(&mut s, &cmd, SequencePolicy::Strict).unwrap();
        assert_eq!(result.outcome, DecisionOutcome::Approved);
        assert_eq!(s.workflow.current_step, 3);
    }

    #[test]
    fn test_parallel_keeps_current_step() {
        let mut s = state(RuleType::Parallel, dec!(100), &users(3));
        let cmd = command(&s, 0, Verdict::Approve);
        DecisionProcessor::apply(&mut s, &cmd, SequencePolicy::Advisory).unwrap();
        assert_eq!(s.workflow.current_step, 1);
    }

    #[test]
    fn test_strict_policy_blocks_later_steps() {
        let mut s = state(RuleType::Sequential, dec!(100), &users(3));
        let cmd = command(&s, 2, Verdict::Approve);

        let result = DecisionProcessor::apply(&mut s, &cmd, SequencePolicy::Strict);

        assert!(matches!(
            result,
            Err(WorkflowError::OutOfSequence {
                step: 3,
                current_step: 1,
                ..
            })
        ));
        assert_eq!(s.workflow.completed_steps, 0);
    }

    #[test]
    fn test_advisory_policy_allows_early_action() {
        let mut s = state(RuleType::Sequential, dec!(100), &users(3));
        let cmd = command(&s, 2, Verdict::Approve);

        let result = DecisionProcessor::apply(&mut s, &cmd, SequencePolicy::Advisory).unwrap();

        assert_eq!(result.outcome, DecisionOutcome::Advanced);
        assert_eq!(s.workflow.completed_steps, 1);
    }

    #[test]
    fn test_strict_policy_ignores_parallel_rules() {
        let mut s = state(RuleType::Parallel, dec!(100), &users(3));
        let cmd = command(&s, 2, Verdict::Approve);
        assert!(DecisionProcessor::apply(&mut s, &cmd, SequencePolicy::Strict).is_ok());
    }

    #[test]
    fn test_comments_and_timestamp_stored() {
        let mut s = state(RuleType::Parallel, dec!(100), &users(2));
        let mut cmd = command(&s, 0, Verdict::Approve);
        cmd.comments = Some("Receipt checked".to_string());

        let result = DecisionProcessor::apply(&mut s, &cmd, SequencePolicy::Advisory).unwrap();

        assert_eq!(result.approval.comments.as_deref(), Some("Receipt checked"));
        assert_eq!(result.approval.approved_at, Some(cmd.decided_at));
        assert!(result.audit.description.contains("Receipt checked"));
        assert_eq!(result.audit.user_id, cmd.actor_id);
    }

    #[test]
    fn test_policy_from_setting() {
        assert_eq!(
            SequencePolicy::from(SequencePolicySetting::Advisory),
            SequencePolicy::Advisory
        );
        assert_eq!(
            SequencePolicy::from(SequencePolicySetting::Strict),
            SequencePolicy::Strict
        );
    }
}
