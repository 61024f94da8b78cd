//! Repository abstractions for data access.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the application.

pub mod approval_rule;
pub mod company;
mod convert;
pub mod expense;
pub mod user;
pub mod workflow;

pub use approval_rule::{
    ApprovalRuleError, ApprovalRuleRepository, CreateApprovalRuleInput, UpdateApprovalRuleInput,
};
pub use company::CompanyRepository;
pub use expense::{ExpenseError, ExpenseRepository};
pub use user::{CreateUserInput, UserRepository};
pub use workflow::WorkflowRepository;
