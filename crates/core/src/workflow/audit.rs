//! Audit trail entries emitted by the workflow engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use expensa_shared::types::{ExpenseId, UserId};

/// What the audited user did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    /// Expense submitted for approval.
    Submit,
    /// Approval task approved.
    Approve,
    /// Approval task rejected.
    Reject,
}

impl AuditAction {
    /// Returns the string representation of the action.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Submit => "SUBMIT",
            Self::Approve => "APPROVE",
            Self::Reject => "REJECT",
        }
    }

    /// Parses an action from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "SUBMIT" => Some(Self::Submit),
            "APPROVE" => Some(Self::Approve),
            "REJECT" => Some(Self::Reject),
            _ => None,
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One audit log entry, persisted with the state change it describes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// What happened.
    pub action: AuditAction,
    /// Who did it.
    pub user_id: UserId,
    /// Expense affected.
    pub expense_id: ExpenseId,
    /// Human-readable summary.
    pub description: String,
    /// State before the change.
    pub old_values: Option<Value>,
    /// State after the change.
    pub new_values: Option<Value>,
    /// When it happened.
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Creates a record stamped with `created_at`.
    #[must_use]
    pub fn new(
        action: AuditAction,
        user_id: UserId,
        expense_id: ExpenseId,
        description: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            action,
            user_id,
            expense_id,
            description: description.into(),
            old_values: None,
            new_values: None,
            created_at,
        }
    }

    /// Attaches before/after snapshots.
    #[must_use]
    pub fn with_values(mut self, old_values: Value, new_values: Value) -> Self {
        self.old_values = Some(old_values);
        self.new_values = Some(new_values);
        self
    }
}
