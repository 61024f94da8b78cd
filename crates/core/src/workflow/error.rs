//! Workflow error types for expense approval.
//!
//! Every failure the engine can report maps to one [`ErrorKind`], so callers
//! can tell "not found" from "not yours" from "already decided" without
//! string matching.

use thiserror::Error;

use expensa_shared::types::{ApprovalId, ApprovalRuleId, ExpenseId, UserId, WorkflowId};

use crate::expense::ExpenseStatus;

/// Broad category of a [`WorkflowError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown approval, workflow, expense or rule id.
    NotFound,
    /// Actor is not the assigned approver.
    Forbidden,
    /// Approval already decided, workflow already terminal, or similar.
    Conflict,
    /// The rule cannot drive a workflow.
    InvalidRuleConfiguration,
    /// Storage or other infrastructure failure.
    Internal,
}

/// Errors that can occur during workflow operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Approval task not found.
    #[error("Approval {0} not found")]
    ApprovalNotFound(ApprovalId),

    /// Workflow not found.
    #[error("Workflow {0} not found")]
    WorkflowNotFound(WorkflowId),

    /// Expense not found.
    #[error("Expense {0} not found")]
    ExpenseNotFound(ExpenseId),

    /// Approval rule not found.
    #[error("Approval rule {0} not found")]
    RuleNotFound(ApprovalRuleId),

    /// The actor is not the approver assigned to the task.
    #[error("User {actor_id} is not the assigned approver of approval {approval_id}")]
    NotAssignedApprover {
        /// The task.
        approval_id: ApprovalId,
        /// The user who tried to act.
        actor_id: UserId,
    },

    /// The task already carries a decision.
    #[error("Approval {0} has already been decided")]
    AlreadyDecided(ApprovalId),

    /// The workflow reached a terminal status.
    #[error("Workflow {0} is already closed")]
    WorkflowClosed(WorkflowId),

    /// The sequence gate refused the task.
    #[error("Approval {approval_id} is step {step} but the workflow is waiting on step {current_step}")]
    OutOfSequence {
        /// The task.
        approval_id: ApprovalId,
        /// Step of the task.
        step: u32,
        /// Step the workflow is waiting on.
        current_step: u32,
    },

    /// The expense is not in a status that can start a workflow.
    #[error("Expense {expense_id} cannot be submitted from status {status}")]
    ExpenseNotSubmittable {
        /// The expense.
        expense_id: ExpenseId,
        /// Its current status.
        status: ExpenseStatus,
    },

    /// Only drafts may be edited.
    #[error("Expense {expense_id} cannot be edited in status {status}")]
    ExpenseNotEditable {
        /// The expense.
        expense_id: ExpenseId,
        /// Its current status.
        status: ExpenseStatus,
    },

    /// The expense already has a pending workflow.
    #[error("Expense {0} already has an active workflow")]
    WorkflowAlreadyActive(ExpenseId),

    /// The rule cannot drive a workflow.
    #[error("Approval rule {rule_id} is misconfigured: {reason}")]
    InvalidRuleConfiguration {
        /// The rule.
        rule_id: ApprovalRuleId,
        /// What is wrong with it.
        reason: String,
    },

    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl WorkflowError {
    /// Returns the category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ApprovalNotFound(_)
            | Self::WorkflowNotFound(_)
            | Self::ExpenseNotFound(_)
            | Self::RuleNotFound(_) => ErrorKind::NotFound,

            Self::NotAssignedApprover { .. } => ErrorKind::Forbidden,

            Self::AlreadyDecided(_)
            | Self::WorkflowClosed(_)
            | Self::OutOfSequence { .. }
            | Self::ExpenseNotSubmittable { .. }
            | Self::ExpenseNotEditable { .. }
            | Self::WorkflowAlreadyActive(_) => ErrorKind::Conflict,

            Self::InvalidRuleConfiguration { .. } => ErrorKind::InvalidRuleConfiguration,

            Self::Storage(_) => ErrorKind::Internal,
        }
    }

    /// Returns true if the error reports a lost race or a repeated decision.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self.kind(), ErrorKind::Conflict)
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::NotFound => 404,
            ErrorKind::Forbidden => 403,
            ErrorKind::Conflict => 409,
            ErrorKind::InvalidRuleConfiguration => 422,
            ErrorKind::Internal => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::ApprovalNotFound(_) => "APPROVAL_NOT_FOUND",
            Self::WorkflowNotFound(_) => "WORKFLOW_NOT_FOUND",
            Self::ExpenseNotFound(_) => "EXPENSE_NOT_FOUND",
            Self::RuleNotFound(_) => "RULE_NOT_FOUND",
            Self::NotAssignedApprover { .. } => "NOT_ASSIGNED_APPROVER",
            Self::AlreadyDecided(_) => "ALREADY_DECIDED",
            Self::WorkflowClosed(_) => "WORKFLOW_CLOSED",
            Self::OutOfSequence { .. } => "OUT_OF_SEQUENCE",
            Self::ExpenseNotSubmittable { .. } => "EXPENSE_NOT_SUBMITTABLE",
            Self::ExpenseNotEditable { .. } => "EXPENSE_NOT_EDITABLE",
            Self::WorkflowAlreadyActive(_) => "WORKFLOW_ALREADY_ACTIVE",
            Self::InvalidRuleConfiguration { .. } => "INVALID_RULE_CONFIGURATION",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }
}
