//! Shared types, errors, and configuration for Expensa.
//!
//! This crate provides common types used across all other crates:
//! - Typed IDs for type-safe entity references
//! - Application-wide error types
//! - Configuration management
//! - JWT claims and token validation

pub mod auth;
pub mod config;
pub mod error;
pub mod jwt;
pub mod types;


pub use auth::{Claims, UserRole};
pub use config::{AppConfig, SequencePolicySetting};
pub use error::{AppError, AppResult};
pub use jwt::{JwtError, JwtService};
