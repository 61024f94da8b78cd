//! `SeaORM` entity prelude.

pub use super::approval_rule_approvers::Entity as ApprovalRuleApprovers;
pub use super::approval_rules::Entity as ApprovalRules;
pub use super::approval_workflows::Entity as ApprovalWorkflows;
pub use super::approvals::Entity as Approvals;
pub use super::audit_logs::Entity as AuditLogs;
pub use super::companies::Entity as Companies;
pub use super::expenses::Entity as Expenses;
pub use super::users::Entity as Users;
