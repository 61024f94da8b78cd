//! Expense records as seen by the approval engine.
//!
//! Currency conversion, receipts and OCR live outside this crate; the engine
//! only needs who submitted what, for which company, and the current status.

pub mod types;

pub use types::{Expense, ExpenseChanges, ExpenseQuery, ExpenseStatus};
