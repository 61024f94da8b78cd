//! In-memory workflow store.
//!
//! A single `tokio::sync::Mutex` guards the whole state, so every submit and
//! every decision runs in one critical section. Used by tests and by
//! deployments that do not need durability.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

use expensa_shared::types::{ExpenseId, PageResponse, UserId, WorkflowId};

use crate::expense::{Expense, ExpenseChanges, ExpenseQuery};
use crate::workflow::audit::AuditRecord;
use crate::workflow::error::WorkflowError;
use crate::workflow::factory::{WorkflowFactory, WorkflowOutcome};
use crate::workflow::processor::{
    DecisionCommand, DecisionProcessor, DecisionResult, SequencePolicy, WorkflowState,
};
use crate::workflow::rule::ApprovalRule;
use crate::workflow::selection::RuleResolver;
use crate::workflow::store::WorkflowStore;
use crate::workflow::types::{Approval, ApprovalWorkflow, WorkflowView};

#[derive(Debug, Default)]
struct MemoryState {
    expenses: HashMap<ExpenseId, Expense>,
    rules: Vec<ApprovalRule>,
    managers: HashMap<UserId, UserId>,
    workflows: Vec<ApprovalWorkflow>,
    approvals: Vec<Approval>,
    audit_log: Vec<AuditRecord>,
}

impl MemoryState {
    fn expense(&self, expense_id: ExpenseId) -> Result<&Expense, WorkflowError> {
        self.expenses
            .get(&expense_id)
            .ok_or(WorkflowError::ExpenseNotFound(expense_id))
    }

    fn approvals_of(&self, workflow_id: WorkflowId) -> Vec<Approval> {
        let mut approvals: Vec<Approval> = self
            .approvals
            .iter()
            .filter(|a| a.workflow_id == workflow_id)
            .cloned()
            .collect();
        approvals.sort_by_key(|a| a.step);
        approvals
    }

    fn replace_workflow(&mut self, workflow: ApprovalWorkflow) {
        if let Some(slot) = self.workflows.iter_mut().find(|w| w.id == workflow.id) {
            *slot = workflow;
        }
    }

    fn replace_approvals(&mut self, updated: Vec<Approval>) {
        for approval in updated {
            if let Some(slot) = self.approvals.iter_mut().find(|a| a.id == approval.id) {
                *slot = approval;
            }
        }
    }
}

/// Workflow store kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an approval rule.
    pub async fn insert_rule(&self, rule: ApprovalRule) {
        let mut state = self.state.lock().await;
        state.rules.retain(|r| r.id != rule.id);
        state.rules.push(rule);
    }

    /// Records `manager_id` as the reporting manager of `user_id`.
    pub async fn set_manager(&self, user_id: UserId, manager_id: UserId) {
        self.state.lock().await.managers.insert(user_id, manager_id);
    }

    /// All audit records in insertion order.
    pub async fn audit_log(&self) -> Vec<AuditRecord> {
        self.state.lock().await.audit_log.clone()
    }

    /// Number of workflows ever created.
    pub async fn workflow_count(&self) -> usize {
        self.state.lock().await.workflows.len()
    }

    /// Number of approval tasks ever created.
    pub async fn approval_count(&self) -> usize {
        self.state.lock().await.approvals.len()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryStore {
    async fn create_expense(&self, expense: Expense) -> Result<Expense, WorkflowError> {
        let mut state = self.state.lock().await;
        state.expenses.insert(expense.id, expense.clone());
        Ok(expense)
    }

    async fn expense(&self, expense_id: ExpenseId) -> Result<Expense, WorkflowError> {
        self.state.lock().await.expense(expense_id).cloned()
    }

    async fn update_expense(
        &self,
        expense_id: ExpenseId,
        changes: ExpenseChanges,
        now: DateTime<Utc>,
    ) -> Result<Expense, WorkflowError> {
        let mut state = self.state.lock().await;
        let expense = state
            .expenses
            .get_mut(&expense_id)
            .ok_or(WorkflowError::ExpenseNotFound(expense_id))?;
        expense.apply_changes(changes, now)?;
        Ok(expense.clone())
    }

    async fn list_expenses(
        &self,
        query: &ExpenseQuery,
    ) -> Result<PageResponse<Expense>, WorkflowError> {
        let state = self.state.lock().await;
        let mut matching: Vec<&Expense> =
            state.expenses.values().filter(|e| query.matches(e)).collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = u64::try_from(matching.len()).unwrap_or(u64::MAX);
        let skip = usize::try_from(query.page.offset()).unwrap_or(usize::MAX);
        let take = usize::try_from(query.page.limit()).unwrap_or(usize::MAX);
        let page = matching.into_iter().skip(skip).take(take).cloned().collect();

        Ok(PageResponse::new(page, query.page, total))
    }

    async fn submit(
        &self,
        expense_id: ExpenseId,
        resolver: &dyn RuleResolver,
        now: DateTime<Utc>,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        let mut state = self.state.lock().await;

        let expense = state.expense(expense_id)?.clone();
        let rule = resolver.resolve(&expense, &state.rules);
        let manager = state.managers.get(&expense.submitter_id).copied();
        let has_active_workflow = state
            .workflows
            .iter()
            .any(|w| w.expense_id == expense_id && w.is_open());

        let outcome = WorkflowFactory::plan(&expense, rule, manager, has_active_workflow, now)?;

        if let Some(stored) = state.expenses.get_mut(&expense_id) {
            stored.status = outcome.expense_status();
            stored.updated_at = now;
        }
        if let WorkflowOutcome::Started(plan) = &outcome {
            state.workflows.push(plan.workflow.clone());
            state.approvals.extend(plan.approvals.iter().cloned());
        }
        state.audit_log.push(outcome.audit().clone());

        Ok(outcome)
    }

    async fn decide(
        &self,
        command: &DecisionCommand,
        policy: SequencePolicy,
    ) -> Result<DecisionResult, WorkflowError> {
        let mut state = self.state.lock().await;

        let workflow_id = state
            .approvals
            .iter()
            .find(|a| a.id == command.approval_id)
            .map(|a| a.workflow_id)
            .ok_or(WorkflowError::ApprovalNotFound(command.approval_id))?;
        let workflow = state
            .workflows
            .iter()
            .find(|w| w.id == workflow_id)
            .cloned()
            .ok_or(WorkflowError::WorkflowNotFound(workflow_id))?;
        let expense = state.expense(workflow.expense_id)?.clone();

        let mut snapshot = WorkflowState {
            approvals: state.approvals_of(workflow.id),
            workflow,
            expense,
        };
        let result = DecisionProcessor::apply(&mut snapshot, command, policy)?;

        let WorkflowState {
            workflow,
            approvals,
            expense,
        } = snapshot;
        state.replace_workflow(workflow);
        state.replace_approvals(approvals);
        state.expenses.insert(expense.id, expense);
        state.audit_log.push(result.audit.clone());

        Ok(result)
    }

    async fn pending_approvals(
        &self,
        approver_id: UserId,
    ) -> Result<Vec<Approval>, WorkflowError> {
        let state = self.state.lock().await;
        let approvals = state
            .approvals
            .iter()
            .filter(|a| a.approver_id == approver_id && a.is_pending())
            .filter(|a| {
                state
                    .workflows
                    .iter()
                    .any(|w| w.id == a.workflow_id && w.is_open())
            })
            .cloned()
            .collect();
        Ok(approvals)
    }

    async fn workflow_for_expense(
        &self,
        expense_id: ExpenseId,
    ) -> Result<Option<WorkflowView>, WorkflowError> {
        let state = self.state.lock().await;
        let view = state
            .workflows
            .iter()
            .rev()
            .find(|w| w.expense_id == expense_id)
            .map(|workflow| WorkflowView {
                workflow: workflow.clone(),
                approvals: state.approvals_of(workflow.id),
            });
        Ok(view)
    }
}
