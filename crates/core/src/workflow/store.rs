//! Persistence contract for the approval engine.
//!
//! A store owns expenses, rules, workflows, approvals and audit records. The
//! two mutating workflow operations, [`WorkflowStore::submit`] and
//! [`WorkflowStore::decide`], must each run as one atomic unit: load the rows
//! they need under an exclusive lock, call the pure factory or processor, and
//! write every resulting change before the lock is released.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use expensa_shared::types::{ExpenseId, PageResponse, UserId};

use crate::expense::{Expense, ExpenseChanges, ExpenseQuery};
use crate::workflow::error::WorkflowError;
use crate::workflow::factory::WorkflowOutcome;
use crate::workflow::processor::{DecisionCommand, DecisionResult, SequencePolicy};
use crate::workflow::selection::RuleResolver;
use crate::workflow::types::{Approval, WorkflowView};

/// Storage backend for the approval engine.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Persists a new expense.
    async fn create_expense(&self, expense: Expense) -> Result<Expense, WorkflowError>;

    /// Loads an expense.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::ExpenseNotFound` if it does not exist.
    async fn expense(&self, expense_id: ExpenseId) -> Result<Expense, WorkflowError>;

    /// Edits a draft expense.
    ///
    /// The status check and the write happen under one lock, so an edit can
    /// never land after the expense was submitted.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::ExpenseNotFound` or
    /// `WorkflowError::ExpenseNotEditable`.
    async fn update_expense(
        &self,
        expense_id: ExpenseId,
        changes: ExpenseChanges,
        now: DateTime<Utc>,
    ) -> Result<Expense, WorkflowError>;

    /// One page of the expenses matching `query`, newest first.
    async fn list_expenses(
        &self,
        query: &ExpenseQuery,
    ) -> Result<PageResponse<Expense>, WorkflowError>;

    /// Submits an expense for approval.
    ///
    /// Resolves the governing rule among the company's rules with `resolver`,
    /// plans the workflow with `WorkflowFactory::plan` and persists the
    /// outcome, the expense status and the audit record together.
    async fn submit(
        &self,
        expense_id: ExpenseId,
        resolver: &dyn RuleResolver,
        now: DateTime<Utc>,
    ) -> Result<WorkflowOutcome, WorkflowError>;

    /// Records one approver decision.
    ///
    /// Locks the workflow, its expense and its approvals, applies
    /// `DecisionProcessor::apply` and persists the result together.
    async fn decide(
        &self,
        command: &DecisionCommand,
        policy: SequencePolicy,
    ) -> Result<DecisionResult, WorkflowError>;

    /// Pending tasks of `approver_id` in workflows that are still pending.
    async fn pending_approvals(
        &self,
        approver_id: UserId,
    ) -> Result<Vec<Approval>, WorkflowError>;

    /// The latest workflow of an expense with its tasks, if any.
    async fn workflow_for_expense(
        &self,
        expense_id: ExpenseId,
    ) -> Result<Option<WorkflowView>, WorkflowError>;
}
