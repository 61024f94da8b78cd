//! Approval workflow engine for Expensa.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! Persistence is reached through the [`workflow::WorkflowStore`] contract.
//!
//! # Modules
//!
//! - `workflow` - Approval rules, workflow creation, decisions and completion
//! - `expense` - Expense records and their lifecycle status

pub mod expense;
pub mod workflow;
