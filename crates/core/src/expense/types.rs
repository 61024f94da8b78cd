//! Expense domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use expensa_shared::types::{CompanyId, ExpenseId, PageRequest, UserId};

use crate::workflow::error::WorkflowError;

/// Expense status in its lifecycle.
///
/// The approval engine drives these transitions:
/// - Draft/Submitted → PendingApproval (workflow started)
/// - Draft/Submitted → Approved (no active rule)
/// - PendingApproval → Approved (completion reached)
/// - PendingApproval → Rejected (any rejection)
///
/// `Paid` is set by the payment side once an approved expense is reimbursed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseStatus {
    /// Expense is being drafted and can be modified.
    Draft,
    /// Expense has been handed to the approval engine.
    Submitted,
    /// A workflow is collecting decisions.
    PendingApproval,
    /// Approved, ready to be paid.
    Approved,
    /// Rejected by an approver.
    Rejected,
    /// Reimbursed.
    Paid,
}

impl ExpenseStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::PendingApproval => "pending_approval",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Paid => "paid",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "submitted" => Some(Self::Submitted),
            "pending_approval" => Some(Self::PendingApproval),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "paid" => Some(Self::Paid),
            _ => None,
        }
    }

    /// Returns true if a workflow may be started for an expense in this status.
    #[must_use]
    pub const fn is_submittable(&self) -> bool {
        matches!(self, Self::Draft | Self::Submitted)
    }

    /// Returns true once the approval engine has nothing left to decide.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Paid)
    }
}

impl fmt::Display for ExpenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An expense claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    /// Unique identifier.
    pub id: ExpenseId,
    /// Owning company.
    pub company_id: CompanyId,
    /// Employee who filed the claim.
    pub submitter_id: UserId,
    /// Amount in the claim's currency.
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency: String,
    /// Free-form description.
    pub description: String,
    /// Current lifecycle status.
    pub status: ExpenseStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl Expense {
    /// Creates a new draft expense.
    #[must_use]
    pub fn draft(
        company_id: CompanyId,
        submitter_id: UserId,
        amount: Decimal,
        currency: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ExpenseId::new(),
            company_id,
            submitter_id,
            amount,
            currency: currency.into(),
            description: description.into(),
            status: ExpenseStatus::Draft,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Expense {
    /// Applies an edit to a draft.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::ExpenseNotEditable` once the expense has left
    /// `Draft`; the expense is left untouched.
    pub fn apply_changes(
        &mut self,
        changes: ExpenseChanges,
        now: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        if self.status != ExpenseStatus::Draft {
            return Err(WorkflowError::ExpenseNotEditable {
                expense_id: self.id,
                status: self.status,
            });
        }
        if let Some(amount) = changes.amount {
            self.amount = amount;
        }
        if let Some(currency) = changes.currency {
            self.currency = currency;
        }
        if let Some(description) = changes.description {
            self.description = description;
        }
        self.updated_at = now;
        Ok(())
    }
}

/// Edit of a draft expense; `None` leaves the field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpenseChanges {
    /// New amount.
    pub amount: Option<Decimal>,
    /// New currency code.
    pub currency: Option<String>,
    /// New description.
    pub description: Option<String>,
}

/// Filter for listing a company's expenses, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpenseQuery {
    /// Company whose expenses are listed.
    pub company_id: CompanyId,
    /// Restricts the listing to one submitter.
    pub submitter_id: Option<UserId>,
    /// Restricts the listing to one status.
    pub status: Option<ExpenseStatus>,
    /// Page to return.
    pub page: PageRequest,
}

impl ExpenseQuery {
    /// All expenses of a company.
    #[must_use]
    pub fn company(company_id: CompanyId) -> Self {
        Self {
            company_id,
            submitter_id: None,
            status: None,
            page: PageRequest::default(),
        }
    }

    /// Expenses a user filed in their company.
    #[must_use]
    pub fn submitted_by(company_id: CompanyId, submitter_id: UserId) -> Self {
        Self {
            submitter_id: Some(submitter_id),
            ..Self::company(company_id)
        }
    }

    /// Restricts to `status` when given.
    #[must_use]
    pub const fn with_status(mut self, status: Option<ExpenseStatus>) -> Self {
        self.status = status;
        self
    }

    /// Selects the page, clamped to valid bounds.
    #[must_use]
    pub fn with_page(mut self, page: PageRequest) -> Self {
        self.page = page.normalized();
        self
    }

    /// Returns true if `expense` passes the filter, ignoring the page.
    #[must_use]
    pub fn matches(&self, expense: &Expense) -> bool {
        expense.company_id == self.company_id
            && self.submitter_id.is_none_or(|id| expense.submitter_id == id)
            && self.status.is_none_or(|status| expense.status == status)
    }
}
