//! Approval engine facade.
//!
//! Request handlers talk to [`ApprovalEngine`]; it stamps timestamps, picks
//! the rule resolver and sequence policy, and delegates atomic work to the
//! configured [`WorkflowStore`].

use chrono::Utc;
use std::sync::Arc;

use expensa_shared::types::{ApprovalId, ExpenseId, PageResponse, UserId};

use crate::expense::{Expense, ExpenseChanges, ExpenseQuery};
use crate::workflow::error::WorkflowError;
use crate::workflow::factory::WorkflowOutcome;
use crate::workflow::processor::{DecisionCommand, DecisionOutcome, DecisionResult, SequencePolicy};
use crate::workflow::selection::{FirstActiveRule, RuleResolver};
use crate::workflow::store::WorkflowStore;
use crate::workflow::types::{Approval, Verdict, WorkflowView};

/// Entry point of the approval workflow engine.
#[derive(Clone)]
pub struct ApprovalEngine {
    store: Arc<dyn WorkflowStore>,
    resolver: Arc<dyn RuleResolver>,
    sequence_policy: SequencePolicy,
}

impl std::fmt::Debug for ApprovalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalEngine")
            .field("sequence_policy", &self.sequence_policy)
            .finish_non_exhaustive()
    }
}

impl ApprovalEngine {
    /// Creates an engine with first-active-rule selection and advisory sequencing.
    #[must_use]
    pub fn new(store: Arc<dyn WorkflowStore>) -> Self {
        Self {
            store,
            resolver: Arc::new(FirstActiveRule),
            sequence_policy: SequencePolicy::default(),
        }
    }

    /// Replaces the rule selection strategy.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn RuleResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Replaces the sequence gate policy.
    #[must_use]
    pub fn with_sequence_policy(mut self, policy: SequencePolicy) -> Self {
        self.sequence_policy = policy;
        self
    }

    /// The active sequence gate policy.
    #[must_use]
    pub const fn sequence_policy(&self) -> SequencePolicy {
        self.sequence_policy
    }

    /// Stores a new draft expense.
    pub async fn create_expense(&self, expense: Expense) -> Result<Expense, WorkflowError> {
        let expense = self.store.create_expense(expense).await?;
        tracing::debug!(
            expense_id = %expense.id,
            submitter_id = %expense.submitter_id,
            "Expense created"
        );
        Ok(expense)
    }

    /// Loads an expense.
    pub async fn expense(&self, expense_id: ExpenseId) -> Result<Expense, WorkflowError> {
        self.store.expense(expense_id).await
    }

    /// Edits a draft expense.
    ///
    /// # Errors
    ///
    /// `ExpenseNotEditable` once the expense has been submitted.
    pub async fn update_expense(
        &self,
        expense_id: ExpenseId,
        changes: ExpenseChanges,
    ) -> Result<Expense, WorkflowError> {
        let expense = self
            .store
            .update_expense(expense_id, changes, Utc::now())
            .await?;
        tracing::debug!(expense_id = %expense.id, "Draft expense updated");
        Ok(expense)
    }

    /// Lists expenses matching `query`, newest first.
    pub async fn list_expenses(
        &self,
        query: &ExpenseQuery,
    ) -> Result<PageResponse<Expense>, WorkflowError> {
        self.store.list_expenses(query).await
    }

    /// Starts the approval workflow of a submitted expense.
    ///
    /// With no applicable rule the expense is approved straight away and no
    /// workflow is created.
    ///
    /// # Errors
    ///
    /// * `ExpenseNotFound` if the expense does not exist
    /// * `ExpenseNotSubmittable` or `WorkflowAlreadyActive` on conflicts
    /// * `InvalidRuleConfiguration` if the rule yields no task
    pub async fn start_workflow(
        &self,
        expense_id: ExpenseId,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        let outcome = self
            .store
            .submit(expense_id, self.resolver.as_ref(), Utc::now())
            .await
            .inspect_err(|e| {
                tracing::warn!(expense_id = %expense_id, error = %e, "Failed to start workflow");
            })?;

        match &outcome {
            WorkflowOutcome::AutoApproved { .. } => {
                tracing::info!(
                    expense_id = %expense_id,
                    "No active approval rule, expense approved"
                );
            }
            WorkflowOutcome::Started(plan) => {
                tracing::info!(
                    expense_id = %expense_id,
                    workflow_id = %plan.workflow.id,
                    rule_id = %plan.workflow.rule_id,
                    rule_type = %plan.workflow.rule_type,
                    tasks = plan.approvals.len(),
                    "Approval workflow started"
                );
            }
        }
        Ok(outcome)
    }

    /// Records an approver's decision on their task.
    ///
    /// # Errors
    ///
    /// * `ApprovalNotFound` if the task does not exist
    /// * `NotAssignedApprover` if `actor_id` is not the task's approver
    /// * `AlreadyDecided`, `WorkflowClosed` or `OutOfSequence` on conflicts
    pub async fn record_decision(
        &self,
        approval_id: ApprovalId,
        actor_id: UserId,
        verdict: Verdict,
        comments: Option<String>,
    ) -> Result<DecisionResult, WorkflowError> {
        let command = DecisionCommand {
            approval_id,
            actor_id,
            verdict,
            comments,
            decided_at: Utc::now(),
        };

        let result = self
            .store
            .decide(&command, self.sequence_policy)
            .await
            .inspect_err(|e| {
                tracing::debug!(
                    approval_id = %approval_id,
                    actor_id = %actor_id,
                    error = %e,
                    "Decision refused"
                );
            })?;

        match result.outcome {
            DecisionOutcome::Advanced => tracing::info!(
                workflow_id = %result.workflow.id,
                approval_id = %approval_id,
                completed_steps = result.workflow.completed_steps,
                total_steps = result.workflow.total_steps,
                "Approval recorded, workflow still pending"
            ),
            DecisionOutcome::Approved => tracing::info!(
                workflow_id = %result.workflow.id,
                expense_id = %result.workflow.expense_id,
                "Workflow approved"
            ),
            DecisionOutcome::Rejected => tracing::info!(
                workflow_id = %result.workflow.id,
                expense_id = %result.workflow.expense_id,
                cascaded = result.cascaded.len(),
                "Workflow rejected"
            ),
        }
        Ok(result)
    }

    /// Pending tasks waiting on `approver_id`.
    pub async fn pending_approvals(
        &self,
        approver_id: UserId,
    ) -> Result<Vec<Approval>, WorkflowError> {
        self.store.pending_approvals(approver_id).await
    }

    /// The latest workflow of an expense with its tasks.
    pub async fn workflow_for_expense(
        &self,
        expense_id: ExpenseId,
    ) -> Result<Option<WorkflowView>, WorkflowError> {
        self.store.workflow_for_expense(expense_id).await
    }
}
