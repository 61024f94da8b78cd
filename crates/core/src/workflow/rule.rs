//! Approval rule definitions.
//!
//! A rule is owned by a company and names who approves its expenses and how
//! their decisions combine. Workflows copy what they need at creation time, so
//! editing a rule never changes a workflow already in flight.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use expensa_shared::types::{ApprovalRuleId, CompanyId, UserId};

use crate::workflow::error::WorkflowError;

/// How the approvers of a rule combine into a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    /// Approvers act in `sequence_order`; every task must be approved.
    Sequential,
    /// All approvers act at once; every task must be approved.
    Parallel,
    /// A minimum percentage of approval slots must approve.
    Percentage,
    /// A named approver decides. Currently built like `Parallel`.
    SpecificApprover,
    /// Mix of percentage and specific approver. Currently built like `Parallel`.
    Hybrid,
}

impl RuleType {
    /// Returns the string representation of the rule type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
            Self::Percentage => "percentage",
            Self::SpecificApprover => "specific_approver",
            Self::Hybrid => "hybrid",
        }
    }

    /// Parses a rule type from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sequential" => Some(Self::Sequential),
            "parallel" => Some(Self::Parallel),
            "percentage" => Some(Self::Percentage),
            "specific_approver" => Some(Self::SpecificApprover),
            "hybrid" => Some(Self::Hybrid),
            _ => None,
        }
    }

    /// Returns false for rule types that fall back to parallel task creation
    /// until they get their own behaviour.
    #[must_use]
    pub const fn has_dedicated_strategy(&self) -> bool {
        match self {
            Self::Sequential | Self::Parallel | Self::Percentage => true,
            Self::SpecificApprover | Self::Hybrid => false,
        }
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An approver listed on a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleApprover {
    /// The approving user.
    pub approver_id: UserId,
    /// 1-based position for sequential rules.
    pub sequence_order: u32,
    /// Whether this approver must act. Recorded, not yet used by any completion policy.
    pub is_required: bool,
}

/// An approval rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRule {
    /// Unique identifier for the rule.
    pub id: ApprovalRuleId,
    /// Owning company.
    pub company_id: CompanyId,
    /// Human-readable name for the rule.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// How approvals combine.
    pub rule_type: RuleType,
    /// Quorum for percentage rules, 0 to 100.
    pub minimum_approval_percentage: Decimal,
    /// Whether the submitter's reporting manager gets a task too.
    pub requires_manager_approval: bool,
    /// Informational flag mirroring `Sequential`.
    pub approver_sequence_matters: bool,
    /// Inactive rules are never selected.
    pub is_active: bool,
    /// Listed approvers.
    pub approvers: Vec<RuleApprover>,
    /// Creation time; rule selection walks rules in this order.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl ApprovalRule {
    /// Default quorum when none is given.
    pub const DEFAULT_PERCENTAGE: Decimal = Decimal::ONE_HUNDRED;

    /// Number of approval slots: listed approvers plus one for the manager.
    #[must_use]
    pub fn total_slots(&self) -> u32 {
        let listed = u32::try_from(self.approvers.len()).unwrap_or(u32::MAX);
        listed.saturating_add(u32::from(self.requires_manager_approval))
    }

    /// Listed approvers ordered by `sequence_order`, ties kept in list order.
    #[must_use]
    pub fn ordered_approvers(&self) -> Vec<&RuleApprover> {
        let mut ordered: Vec<&RuleApprover> = self.approvers.iter().collect();
        ordered.sort_by_key(|a| a.sequence_order);
        ordered
    }

    /// Checks the rule can drive a workflow.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::InvalidRuleConfiguration` when the rule has no
    /// approval slots or its percentage lies outside 0..=100.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        if self.total_slots() == 0 {
            return Err(WorkflowError::InvalidRuleConfiguration {
                rule_id: self.id,
                reason: "rule has no approvers and does not require manager approval".to_string(),
            });
        }

        validate_percentage(self.minimum_approval_percentage).map_err(|reason| {
            WorkflowError::InvalidRuleConfiguration {
                rule_id: self.id,
                reason,
            }
        })
    }
}

/// Checks a quorum percentage lies within 0..=100.
///
/// # Errors
///
/// Returns a human-readable reason when it does not.
pub fn validate_percentage(percentage: Decimal) -> Result<(), String> {
    if percentage < Decimal::ZERO || percentage > Decimal::ONE_HUNDRED {
        return Err(format!(
            "minimum approval percentage {percentage} is outside 0..=100"
        ));
    }
    Ok(())
}
