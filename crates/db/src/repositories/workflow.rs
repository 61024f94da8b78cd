//! Workflow Repository
//!
//! Postgres implementation of [`WorkflowStore`]. Submissions and decisions
//! each run in one transaction. Row locks are always taken in the same order:
//! workflow, then expense, then the workflow's approvals.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Unchanged, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::debug;
use uuid::Uuid;

use expensa_core::expense::{Expense, ExpenseChanges, ExpenseQuery};
use expensa_core::workflow::{
    Approval, ApprovalWorkflow, AuditRecord, DecisionCommand, DecisionProcessor, DecisionResult,
    RuleResolver, SequencePolicy, WorkflowError, WorkflowFactory, WorkflowOutcome, WorkflowState,
    WorkflowStore, WorkflowView,
};
use expensa_shared::types::{CompanyId, ExpenseId, PageResponse, UserId, WorkflowId};

use crate::entities::{
    approval_workflows, approvals, audit_logs, expenses, sea_orm_active_enums::ApprovalStatus,
    users,
};
use crate::repositories::approval_rule::load_active_rules;
use crate::repositories::convert::{
    approval_from_model, expense_from_model, to_i32, workflow_from_model,
};
use crate::repositories::expense::ExpenseRepository;

/// Repository for approval workflows.
#[derive(Clone)]
pub struct WorkflowRepository {
    db: DatabaseConnection,
}

impl WorkflowRepository {
    /// Creates a new `WorkflowRepository`.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl WorkflowStore for WorkflowRepository {
    async fn create_expense(&self, expense: Expense) -> Result<Expense, WorkflowError> {
        Ok(ExpenseRepository::new(self.db.clone()).create(expense).await?)
    }

    async fn expense(&self, expense_id: ExpenseId) -> Result<Expense, WorkflowError> {
        Ok(ExpenseRepository::new(self.db.clone())
            .find_by_id(expense_id)
            .await?)
    }

    async fn update_expense(
        &self,
        expense_id: ExpenseId,
        changes: ExpenseChanges,
        now: DateTime<Utc>,
    ) -> Result<Expense, WorkflowError> {
        Ok(ExpenseRepository::new(self.db.clone())
            .update_draft(expense_id, changes, now)
            .await?)
    }

    async fn list_expenses(
        &self,
        query: &ExpenseQuery,
    ) -> Result<PageResponse<Expense>, WorkflowError> {
        Ok(ExpenseRepository::new(self.db.clone()).list(query).await?)
    }

    async fn submit(
        &self,
        expense_id: ExpenseId,
        resolver: &dyn RuleResolver,
        now: DateTime<Utc>,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| WorkflowError::Storage(e.to_string()))?;

        let expense = expenses::Entity::find_by_id(expense_id.into_inner())
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(|e| WorkflowError::Storage(e.to_string()))?
            .map(expense_from_model)
            .ok_or(WorkflowError::ExpenseNotFound(expense_id))?;

        let rules = load_active_rules(&txn, expense.company_id)
            .await
            .map_err(|e| WorkflowError::Storage(e.to_string()))?;
        let manager = reporting_manager(&txn, expense.company_id, expense.submitter_id).await?;

        let open_workflows = approval_workflows::Entity::find()
            .filter(approval_workflows::Column::ExpenseId.eq(expense_id.into_inner()))
            .filter(approval_workflows::Column::Status.eq(ApprovalStatus::Pending))
            .count(&txn)
            .await
            .map_err(|e| WorkflowError::Storage(e.to_string()))?;

        let rule = resolver.resolve(&expense, &rules);
        let outcome = WorkflowFactory::plan(&expense, rule, manager, open_workflows > 0, now)?;

        expenses::ActiveModel {
            id: Unchanged(expense_id.into_inner()),
            status: Set(outcome.expense_status().into()),
            updated_at: Set(now.into()),
            ..Default::default()
        }
        .update(&txn)
        .await
        .map_err(|e| WorkflowError::Storage(e.to_string()))?;

        if let WorkflowOutcome::Started(plan) = &outcome {
            insert_workflow(&txn, &plan.workflow).await?;
            for approval in &plan.approvals {
                insert_approval(&txn, approval).await?;
            }
        }
        insert_audit(&txn, outcome.audit()).await?;

        txn.commit()
            .await
            .map_err(|e| WorkflowError::Storage(e.to_string()))?;

        debug!(expense_id = %expense_id, "Submission persisted");
        Ok(outcome)
    }

    async fn decide(
        &self,
        command: &DecisionCommand,
        policy: SequencePolicy,
    ) -> Result<DecisionResult, WorkflowError> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| WorkflowError::Storage(e.to_string()))?;

        let workflow_id = approvals::Entity::find_by_id(command.approval_id.into_inner())
            .one(&txn)
            .await
            .map_err(|e| WorkflowError::Storage(e.to_string()))?
            .map(|a| WorkflowId::from_uuid(a.workflow_id))
            .ok_or(WorkflowError::ApprovalNotFound(command.approval_id))?;

        let workflow = approval_workflows::Entity::find_by_id(workflow_id.into_inner())
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(|e| WorkflowError::Storage(e.to_string()))?
            .map(workflow_from_model)
            .ok_or(WorkflowError::WorkflowNotFound(workflow_id))?;

        let expense = expenses::Entity::find_by_id(workflow.expense_id.into_inner())
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(|e| WorkflowError::Storage(e.to_string()))?
            .map(expense_from_model)
            .ok_or(WorkflowError::ExpenseNotFound(workflow.expense_id))?;

        let tasks: Vec<Approval> = approvals::Entity::find()
            .filter(approvals::Column::WorkflowId.eq(workflow_id.into_inner()))
            .order_by_asc(approvals::Column::Step)
            .order_by_asc(approvals::Column::CreatedAt)
            .lock_exclusive()
            .all(&txn)
            .await
            .map_err(|e| WorkflowError::Storage(e.to_string()))?
            .into_iter()
            .map(approval_from_model)
            .collect();

        let before = tasks.clone();
        let previous_expense_status = expense.status;
        let mut state = WorkflowState {
            workflow,
            approvals: tasks,
            expense,
        };

        // Dropping the transaction on error rolls it back.
        let result = DecisionProcessor::apply(&mut state, command, policy)?;

        approval_workflows::ActiveModel {
            id: Unchanged(state.workflow.id.into_inner()),
            status: Set(state.workflow.status.into()),
            current_step: Set(to_i32(state.workflow.current_step)),
            completed_steps: Set(to_i32(state.workflow.completed_steps)),
            updated_at: Set(state.workflow.updated_at.into()),
            ..Default::default()
        }
        .update(&txn)
        .await
        .map_err(|e| WorkflowError::Storage(e.to_string()))?;

        if state.expense.status != previous_expense_status {
            expenses::ActiveModel {
                id: Unchanged(state.expense.id.into_inner()),
                status: Set(state.expense.status.into()),
                updated_at: Set(state.expense.updated_at.into()),
                ..Default::default()
            }
            .update(&txn)
            .await
            .map_err(|e| WorkflowError::Storage(e.to_string()))?;
        }

        for (updated, original) in state.approvals.iter().zip(&before) {
            if updated != original {
                approvals::ActiveModel {
                    id: Unchanged(updated.id.into_inner()),
                    status: Set(updated.status.into()),
                    comments: Set(updated.comments.clone()),
                    approved_at: Set(updated.approved_at.map(Into::into)),
                    ..Default::default()
                }
                .update(&txn)
                .await
                .map_err(|e| WorkflowError::Storage(e.to_string()))?;
            }
        }

        insert_audit(&txn, &result.audit).await?;

        txn.commit()
            .await
            .map_err(|e| WorkflowError::Storage(e.to_string()))?;

        debug!(
            approval_id = %command.approval_id,
            workflow_id = %workflow_id,
            cascaded = result.cascaded.len(),
            "Decision persisted"
        );
        Ok(result)
    }

    async fn pending_approvals(
        &self,
        approver_id: UserId,
    ) -> Result<Vec<Approval>, WorkflowError> {
        let tasks = approvals::Entity::find()
            .inner_join(approval_workflows::Entity)
            .filter(approvals::Column::ApproverId.eq(approver_id.into_inner()))
            .filter(approvals::Column::Status.eq(ApprovalStatus::Pending))
            .filter(approval_workflows::Column::Status.eq(ApprovalStatus::Pending))
            .order_by_asc(approvals::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(|e| WorkflowError::Storage(e.to_string()))?;

        Ok(tasks.into_iter().map(approval_from_model).collect())
    }

    async fn workflow_for_expense(
        &self,
        expense_id: ExpenseId,
    ) -> Result<Option<WorkflowView>, WorkflowError> {
        let Some(workflow) = approval_workflows::Entity::find()
            .filter(approval_workflows::Column::ExpenseId.eq(expense_id.into_inner()))
            .order_by_desc(approval_workflows::Column::CreatedAt)
            .order_by_desc(approval_workflows::Column::Id)
            .one(&self.db)
            .await
            .map_err(|e| WorkflowError::Storage(e.to_string()))?
        else {
            return Ok(None);
        };

        let tasks = approvals::Entity::find()
            .filter(approvals::Column::WorkflowId.eq(workflow.id))
            .order_by_asc(approvals::Column::Step)
            .order_by_asc(approvals::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(|e| WorkflowError::Storage(e.to_string()))?;

        Ok(Some(WorkflowView {
            workflow: workflow_from_model(workflow),
            approvals: tasks.into_iter().map(approval_from_model).collect(),
        }))
    }
}

/// Reporting manager of the submitter, if set and in the same company.
async fn reporting_manager<C: ConnectionTrait>(
    conn: &C,
    company_id: CompanyId,
    submitter_id: UserId,
) -> Result<Option<UserId>, WorkflowError> {
    let submitter = users::Entity::find_by_id(submitter_id.into_inner())
        .filter(users::Column::CompanyId.eq(company_id.into_inner()))
        .one(conn)
        .await
        .map_err(|e| WorkflowError::Storage(e.to_string()))?;

    Ok(submitter
        .and_then(|u| u.reporting_manager_id)
        .map(UserId::from_uuid))
}

async fn insert_workflow<C: ConnectionTrait>(
    conn: &C,
    workflow: &ApprovalWorkflow,
) -> Result<(), WorkflowError> {
    approval_workflows::ActiveModel {
        id: Set(workflow.id.into_inner()),
        expense_id: Set(workflow.expense_id.into_inner()),
        rule_id: Set(workflow.rule_id.into_inner()),
        rule_type: Set(workflow.rule_type.into()),
        minimum_approval_percentage: Set(workflow.minimum_approval_percentage),
        status: Set(workflow.status.into()),
        current_step: Set(to_i32(workflow.current_step)),
        total_steps: Set(to_i32(workflow.total_steps)),
        completed_steps: Set(to_i32(workflow.completed_steps)),
        created_at: Set(workflow.created_at.into()),
        updated_at: Set(workflow.updated_at.into()),
    }
    .insert(conn)
    .await
    .map_err(|e| WorkflowError::Storage(e.to_string()))?;
    Ok(())
}

async fn insert_approval<C: ConnectionTrait>(
    conn: &C,
    approval: &Approval,
) -> Result<(), WorkflowError> {
    approvals::ActiveModel {
        id: Set(approval.id.into_inner()),
        workflow_id: Set(approval.workflow_id.into_inner()),
        expense_id: Set(approval.expense_id.into_inner()),
        approver_id: Set(approval.approver_id.into_inner()),
        step: Set(to_i32(approval.step)),
        status: Set(approval.status.into()),
        comments: Set(approval.comments.clone()),
        approved_at: Set(approval.approved_at.map(Into::into)),
        created_at: Set(approval.created_at.into()),
    }
    .insert(conn)
    .await
    .map_err(|e| WorkflowError::Storage(e.to_string()))?;
    Ok(())
}

async fn insert_audit<C: ConnectionTrait>(
    conn: &C,
    record: &AuditRecord,
) -> Result<(), WorkflowError> {
    audit_logs::ActiveModel {
        id: Set(Uuid::now_v7()),
        user_id: Set(record.user_id.into_inner()),
        expense_id: Set(record.expense_id.into_inner()),
        action: Set(record.action.into()),
        description: Set(record.description.clone()),
        old_values: Set(record.old_values.clone()),
        new_values: Set(record.new_values.clone()),
        created_at: Set(record.created_at.into()),
    }
    .insert(conn)
    .await
    .map_err(|e| WorkflowError::Storage(e.to_string()))?;
    Ok(())
}
