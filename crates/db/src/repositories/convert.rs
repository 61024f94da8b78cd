//! Conversions between database models and engine types.

use chrono::{DateTime, Utc};
use sea_orm::prelude::DateTimeWithTimeZone;

use expensa_core::expense::{Expense, ExpenseStatus};
use expensa_core::workflow::{
    Approval, ApprovalRule, ApprovalStatus, ApprovalWorkflow, AuditAction, RuleApprover, RuleType,
};
use expensa_shared::UserRole;
use expensa_shared::types::{ApprovalId, ApprovalRuleId, CompanyId, ExpenseId, UserId, WorkflowId};

use crate::entities::{
    approval_rule_approvers, approval_rules, approval_workflows, approvals, expenses,
    sea_orm_active_enums as db,
};

impl From<db::ExpenseStatus> for ExpenseStatus {
    fn from(status: db::ExpenseStatus) -> Self {
        match status {
            db::ExpenseStatus::Draft => Self::Draft,
            db::ExpenseStatus::Submitted => Self::Submitted,
            db::ExpenseStatus::PendingApproval => Self::PendingApproval,
            db::ExpenseStatus::Approved => Self::Approved,
            db::ExpenseStatus::Rejected => Self::Rejected,
            db::ExpenseStatus::Paid => Self::Paid,
        }
    }
}

impl From<ExpenseStatus> for db::ExpenseStatus {
    fn from(status: ExpenseStatus) -> Self {
        match status {
            ExpenseStatus::Draft => Self::Draft,
            ExpenseStatus::Submitted => Self::Submitted,
            ExpenseStatus::PendingApproval => Self::PendingApproval,
            ExpenseStatus::Approved => Self::Approved,
            ExpenseStatus::Rejected => Self::Rejected,
            ExpenseStatus::Paid => Self::Paid,
        }
    }
}

impl From<db::ApprovalStatus> for ApprovalStatus {
    fn from(status: db::ApprovalStatus) -> Self {
        match status {
            db::ApprovalStatus::Pending => Self::Pending,
            db::ApprovalStatus::Approved => Self::Approved,
            db::ApprovalStatus::Rejected => Self::Rejected,
        }
    }
}

impl From<ApprovalStatus> for db::ApprovalStatus {
    fn from(status: ApprovalStatus) -> Self {
        match status {
            ApprovalStatus::Pending => Self::Pending,
            ApprovalStatus::Approved => Self::Approved,
            ApprovalStatus::Rejected => Self::Rejected,
        }
    }
}

impl From<db::ApprovalRuleType> for RuleType {
    fn from(rule_type: db::ApprovalRuleType) -> Self {
        match rule_type {
            db::ApprovalRuleType::Sequential => Self::Sequential,
            db::ApprovalRuleType::Parallel => Self::Parallel,
            db::ApprovalRuleType::Percentage => Self::Percentage,
            db::ApprovalRuleType::SpecificApprover => Self::SpecificApprover,
            db::ApprovalRuleType::Hybrid => Self::Hybrid,
        }
    }
}

impl From<RuleType> for db::ApprovalRuleType {
    fn from(rule_type: RuleType) -> Self {
        match rule_type {
            RuleType::Sequential => Self::Sequential,
            RuleType::Parallel => Self::Parallel,
            RuleType::Percentage => Self::Percentage,
            RuleType::SpecificApprover => Self::SpecificApprover,
            RuleType::Hybrid => Self::Hybrid,
        }
    }
}

impl From<AuditAction> for db::AuditAction {
    fn from(action: AuditAction) -> Self {
        match action {
            AuditAction::Submit => Self::Submit,
            AuditAction::Approve => Self::Approve,
            AuditAction::Reject => Self::Reject,
        }
    }
}

impl From<db::UserRole> for UserRole {
    fn from(role: db::UserRole) -> Self {
        match role {
            db::UserRole::Admin => Self::Admin,
            db::UserRole::Manager => Self::Manager,
            db::UserRole::Employee => Self::Employee,
        }
    }
}

impl From<UserRole> for db::UserRole {
    fn from(role: UserRole) -> Self {
        match role {
            UserRole::Admin => Self::Admin,
            UserRole::Manager => Self::Manager,
            UserRole::Employee => Self::Employee,
        }
    }
}

/// Postgres INTEGER column to a step counter. Negative values cannot pass the
/// table constraints.
pub(crate) fn to_u32(value: i32) -> u32 {
    u32::try_from(value).unwrap_or_default()
}

/// Step counter to a Postgres INTEGER column.
pub(crate) fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

pub(crate) fn to_utc(value: DateTimeWithTimeZone) -> DateTime<Utc> {
    value.with_timezone(&Utc)
}

pub(crate) fn expense_from_model(model: expenses::Model) -> Expense {
    Expense {
        id: ExpenseId::from_uuid(model.id),
        company_id: CompanyId::from_uuid(model.company_id),
        submitter_id: UserId::from_uuid(model.submitter_id),
        amount: model.amount,
        currency: model.currency,
        description: model.description,
        status: model.status.into(),
        created_at: to_utc(model.created_at),
        updated_at: to_utc(model.updated_at),
    }
}

pub(crate) fn rule_from_models(
    rule: approval_rules::Model,
    mut approvers: Vec<approval_rule_approvers::Model>,
) -> ApprovalRule {
    approvers.sort_by_key(|a| a.sequence_order);
    ApprovalRule {
        id: ApprovalRuleId::from_uuid(rule.id),
        company_id: CompanyId::from_uuid(rule.company_id),
        name: rule.name,
        description: rule.description,
        rule_type: rule.rule_type.into(),
        minimum_approval_percentage: rule.minimum_approval_percentage,
        requires_manager_approval: rule.requires_manager_approval,
        approver_sequence_matters: rule.approver_sequence_matters,
        is_active: rule.is_active,
        approvers: approvers
            .into_iter()
            .map(|a| RuleApprover {
                approver_id: UserId::from_uuid(a.approver_id),
                sequence_order: to_u32(a.sequence_order),
                is_required: a.is_required,
            })
            .collect(),
        created_at: to_utc(rule.created_at),
        updated_at: to_utc(rule.updated_at),
    }
}

pub(crate) fn workflow_from_model(model: approval_workflows::Model) -> ApprovalWorkflow {
    ApprovalWorkflow {
        id: WorkflowId::from_uuid(model.id),
        expense_id: ExpenseId::from_uuid(model.expense_id),
        rule_id: ApprovalRuleId::from_uuid(model.rule_id),
        rule_type: model.rule_type.into(),
        minimum_approval_percentage: model.minimum_approval_percentage,
        status: model.status.into(),
        current_step: to_u32(model.current_step),
        total_steps: to_u32(model.total_steps),
        completed_steps: to_u32(model.completed_steps),
        created_at: to_utc(model.created_at),
        updated_at: to_utc(model.updated_at),
    }
}

pub(crate) fn approval_from_model(model: approvals::Model) -> Approval {
    Approval {
        id: ApprovalId::from_uuid(model.id),
        workflow_id: WorkflowId::from_uuid(model.workflow_id),
        expense_id: ExpenseId::from_uuid(model.expense_id),
        approver_id: UserId::from_uuid(model.approver_id),
        step: to_u32(model.step),
        status: model.status.into(),
        comments: model.comments,
        approved_at: model.approved_at.map(to_utc),
        created_at: to_utc(model.created_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expense_status_round_trip() {
        for status in [
            ExpenseStatus::Draft,
            ExpenseStatus::Submitted,
            ExpenseStatus::PendingApproval,
            ExpenseStatus::Approved,
            ExpenseStatus::Rejected,
            ExpenseStatus::Paid,
        ] {
            let stored: db::ExpenseStatus = status.into();
            assert_eq!(ExpenseStatus::from(stored), status);
        }
    }

    #[test]
    fn test_rule_type_round_trip() {
        for rule_type in [
            RuleType::Sequential,
            RuleType::Parallel,
            RuleType::Percentage,
            RuleType::SpecificApprover,
            RuleType::Hybrid,
        ] {
            let stored: db::ApprovalRuleType = rule_type.into();
            assert_eq!(RuleType::from(stored), rule_type);
        }
    }

    #[test]
    fn test_step_conversions_saturate() {
        assert_eq!(to_u32(-1), 0);
        assert_eq!(to_u32(3), 3);
        assert_eq!(to_i32(u32::MAX), i32::MAX);
        assert_eq!(to_i32(7), 7);
    }
}
