//! Expense Repository
//!
//! Creates, lists and edits expenses. Status changes after creation belong to
//! the workflow repository, which writes them together with workflow state.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Unchanged, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use thiserror::Error;

use expensa_core::expense::{Expense, ExpenseChanges, ExpenseQuery, ExpenseStatus};
use expensa_core::workflow::WorkflowError;
use expensa_shared::types::{ExpenseId, PageResponse};

use crate::entities::{expenses, sea_orm_active_enums as db};
use crate::repositories::convert::expense_from_model;

/// Errors that can occur during expense operations.
#[derive(Debug, Error)]
pub enum ExpenseError {
    /// Expense not found.
    #[error("Expense {0} not found")]
    NotFound(ExpenseId),

    /// Only drafts may be edited.
    #[error("Expense {expense_id} cannot be edited in status {status}")]
    NotEditable {
        /// The expense.
        expense_id: ExpenseId,
        /// Its current status.
        status: ExpenseStatus,
    },

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl From<ExpenseError> for WorkflowError {
    fn from(err: ExpenseError) -> Self {
        match err {
            ExpenseError::NotFound(id) => Self::ExpenseNotFound(id),
            ExpenseError::NotEditable { expense_id, status } => {
                Self::ExpenseNotEditable { expense_id, status }
            }
            ExpenseError::Database(e) => Self::Storage(e.to_string()),
        }
    }
}

/// Repository for expense operations.
pub struct ExpenseRepository {
    db: DatabaseConnection,
}

impl ExpenseRepository {
    /// Creates a new `ExpenseRepository`.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Inserts an expense as given.
    pub async fn create(&self, expense: Expense) -> Result<Expense, ExpenseError> {
        let model = expenses::ActiveModel {
            id: Set(expense.id.into_inner()),
            company_id: Set(expense.company_id.into_inner()),
            submitter_id: Set(expense.submitter_id.into_inner()),
            amount: Set(expense.amount),
            currency: Set(expense.currency),
            description: Set(expense.description),
            status: Set(expense.status.into()),
            created_at: Set(expense.created_at.into()),
            updated_at: Set(expense.updated_at.into()),
        }
        .insert(&self.db)
        .await?;

        Ok(expense_from_model(model))
    }

    /// Finds an expense by ID.
    pub async fn find_by_id(&self, expense_id: ExpenseId) -> Result<Expense, ExpenseError> {
        expenses::Entity::find_by_id(expense_id.into_inner())
            .one(&self.db)
            .await?
            .map(expense_from_model)
            .ok_or(ExpenseError::NotFound(expense_id))
    }

    /// Edits a draft expense.
    ///
    /// The row is locked for the status check, so a concurrent submission
    /// either sees the edit or makes it fail.
    pub async fn update_draft(
        &self,
        expense_id: ExpenseId,
        changes: ExpenseChanges,
        now: DateTime<Utc>,
    ) -> Result<Expense, ExpenseError> {
        let txn = self.db.begin().await?;

        let mut expense = expenses::Entity::find_by_id(expense_id.into_inner())
            .lock_exclusive()
            .one(&txn)
            .await?
            .map(expense_from_model)
            .ok_or(ExpenseError::NotFound(expense_id))?;

        if expense.apply_changes(changes, now).is_err() {
            return Err(ExpenseError::NotEditable {
                expense_id,
                status: expense.status,
            });
        }

        expenses::ActiveModel {
            id: Unchanged(expense.id.into_inner()),
            amount: Set(expense.amount),
            currency: Set(expense.currency.clone()),
            description: Set(expense.description.clone()),
            updated_at: Set(now.into()),
            ..Default::default()
        }
        .update(&txn)
        .await?;

        txn.commit().await?;
        Ok(expense)
    }

    /// One page of the expenses matching `query`, newest first.
    pub async fn list(&self, query: &ExpenseQuery) -> Result<PageResponse<Expense>, ExpenseError> {
        let mut select = expenses::Entity::find()
            .filter(expenses::Column::CompanyId.eq(query.company_id.into_inner()));
        if let Some(submitter_id) = query.submitter_id {
            select = select.filter(expenses::Column::SubmitterId.eq(submitter_id.into_inner()));
        }
        if let Some(status) = query.status {
            select = select.filter(expenses::Column::Status.eq(db::ExpenseStatus::from(status)));
        }

        let total = select.clone().count(&self.db).await?;
        let rows = select
            .order_by_desc(expenses::Column::CreatedAt)
            .order_by_desc(expenses::Column::Id)
            .offset(query.page.offset())
            .limit(query.page.limit())
            .all(&self.db)
            .await?;

        Ok(PageResponse::new(
            rows.into_iter().map(expense_from_model).collect(),
            query.page,
            total,
        ))
    }
}
