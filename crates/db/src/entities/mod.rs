//! `SeaORM` entity definitions.

pub mod prelude;

pub mod approval_rule_approvers;
pub mod approval_rules;
pub mod approval_workflows;
pub mod approvals;
pub mod audit_logs;
pub mod companies;
pub mod expenses;
pub mod sea_orm_active_enums;
pub mod users;
