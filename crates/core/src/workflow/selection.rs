//! Rule selection for submitted expenses.

use crate::expense::Expense;
use crate::workflow::rule::ApprovalRule;

/// Picks the rule that governs an expense.
///
/// Implementations must be pure: the same expense and candidates always give
/// the same answer. Returning `None` means the expense needs no approval.
pub trait RuleResolver: Send + Sync {
    /// Selects one rule out of `candidates`, or none.
    fn resolve<'a>(
        &self,
        expense: &Expense,
        candidates: &'a [ApprovalRule],
    ) -> Option<&'a ApprovalRule>;
}

/// Selects the oldest active rule of the expense's company.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstActiveRule;

impl RuleResolver for FirstActiveRule {
    fn resolve<'a>(
        &self,
        expense: &Expense,
        candidates: &'a [ApprovalRule],
    ) -> Option<&'a ApprovalRule> {
        candidates
            .iter()
            .filter(|r| r.is_active && r.company_id == expense.company_id)
            .min_by_key(|r| (r.created_at, r.id))
    }
}
