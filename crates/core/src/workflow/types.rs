//! Workflow domain types for expense approval.
//!
//! This module defines the records the engine reads and writes while an
//! expense moves through its approval workflow.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use expensa_shared::types::{ApprovalId, ApprovalRuleId, ExpenseId, UserId, WorkflowId};

use crate::workflow::rule::RuleType;

/// Status shared by workflows and individual approval tasks.
///
/// Both start `Pending` and move exactly once to a terminal state:
/// - Pending → Approved
/// - Pending → Rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    /// Waiting for a decision.
    Pending,
    /// Approved (terminal).
    Approved,
    /// Rejected (terminal).
    Rejected,
}

impl ApprovalStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Returns true if no further transition is allowed.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An approver's decision on their task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Approve the expense.
    Approve,
    /// Reject the expense; one rejection rejects the whole expense.
    Reject,
}

impl Verdict {
    /// Status the approval task takes after this verdict.
    #[must_use]
    pub const fn resulting_status(&self) -> ApprovalStatus {
        match self {
            Self::Approve => ApprovalStatus::Approved,
            Self::Reject => ApprovalStatus::Rejected,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approve => write!(f, "approve"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

/// One approval process instance for one expense submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalWorkflow {
    /// Unique identifier.
    pub id: WorkflowId,
    /// Expense under approval.
    pub expense_id: ExpenseId,
    /// Rule the workflow was built from.
    pub rule_id: ApprovalRuleId,
    /// Rule type captured at creation.
    pub rule_type: RuleType,
    /// Quorum captured at creation.
    pub minimum_approval_percentage: Decimal,
    /// Overall status; immutable once terminal.
    pub status: ApprovalStatus,
    /// 1-based step pointer, only advanced for sequential rules.
    pub current_step: u32,
    /// Number of approval slots the rule defines.
    pub total_steps: u32,
    /// Number of approvals recorded so far (never above `total_steps`).
    pub completed_steps: u32,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl ApprovalWorkflow {
    /// Returns true while decisions are still accepted.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self.status, ApprovalStatus::Pending)
    }
}

/// A single approver's obligation within a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    /// Unique identifier.
    pub id: ApprovalId,
    /// Owning workflow.
    pub workflow_id: WorkflowId,
    /// Expense under approval (denormalised for "my pending approvals" queries).
    pub expense_id: ExpenseId,
    /// The only user allowed to decide this task.
    pub approver_id: UserId,
    /// 1-based position in the approval order. Every task of a
    /// non-sequential rule is step 1.
    pub step: u32,
    /// Task status; immutable once terminal.
    pub status: ApprovalStatus,
    /// Approver comments.
    pub comments: Option<String>,
    /// When the task reached a terminal status.
    pub approved_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Approval {
    /// Returns true while the task awaits a decision.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self.status, ApprovalStatus::Pending)
    }
}

/// Counts of approval task statuses on one workflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApprovalTally {
    /// Tasks approved.
    pub approved: u32,
    /// Tasks awaiting a decision.
    pub pending: u32,
    /// Tasks rejected.
    pub rejected: u32,
}

impl ApprovalTally {
    /// Tallies the given approval tasks.
    pub fn from_approvals<'a>(approvals: impl IntoIterator<Item = &'a Approval>) -> Self {
        approvals
            .into_iter()
            .fold(Self::default(), |mut tally, approval| {
                match approval.status {
                    ApprovalStatus::Pending => tally.pending += 1,
                    ApprovalStatus::Approved => tally.approved += 1,
                    ApprovalStatus::Rejected => tally.rejected += 1,
                }
                tally
            })
    }

    /// Total number of tasks counted.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.approved + self.pending + self.rejected
    }
}

/// A workflow together with its approval tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowView {
    /// The workflow record.
    pub workflow: ApprovalWorkflow,
    /// Its approval tasks ordered by step.
    pub approvals: Vec<Approval>,
}
