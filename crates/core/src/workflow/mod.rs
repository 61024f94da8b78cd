//! Expense approval workflow engine.
//!
//! # Modules
//!
//! - `types` - Workflow, approval task and tally types
//! - `rule` - Approval rule definitions
//! - `error` - Workflow-specific error types
//! - `selection` - Rule resolution strategies
//! - `evaluator` - Completion predicates per rule type
//! - `factory` - Workflow and task creation
//! - `processor` - Approver decision state machine
//! - `audit` - Audit records emitted with every state change
//! - `store` - Persistence contract
//! - `memory` - In-memory store
//! - `engine` - Facade used by request handlers

pub mod audit;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod factory;
pub mod memory;
pub mod processor;
pub mod rule;
pub mod selection;
pub mod store;
pub mod types;

#[cfg(test)]
mod evaluator_props;
#[cfg(test)]
mod processor_props;

pub use audit::{AuditAction, AuditRecord};
pub use engine::ApprovalEngine;
pub use error::{ErrorKind, WorkflowError};
pub use evaluator::{CompletionEvaluator, CompletionPolicy};
pub use factory::{WorkflowFactory, WorkflowOutcome, WorkflowPlan};
pub use memory::InMemoryStore;
pub use processor::{
    DecisionCommand, DecisionOutcome, DecisionProcessor, DecisionResult, SequencePolicy,
    WorkflowState,
};
pub use rule::{ApprovalRule, RuleApprover, RuleType, validate_percentage};
pub use selection::{FirstActiveRule, RuleResolver};
pub use store::WorkflowStore;
pub use types::{Approval, ApprovalStatus, ApprovalTally, ApprovalWorkflow, Verdict, WorkflowView};
