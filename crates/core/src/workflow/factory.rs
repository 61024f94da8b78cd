//! Workflow creation for submitted expenses.
//!
//! The factory is pure: it turns an expense, its governing rule and the
//! submitter's reporting manager into a [`WorkflowOutcome`]. Stores persist
//! the outcome as one atomic unit.

use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::HashSet;

use expensa_shared::types::{ApprovalId, UserId, WorkflowId};

use crate::expense::{Expense, ExpenseStatus};
use crate::workflow::audit::{AuditAction, AuditRecord};
use crate::workflow::error::WorkflowError;
use crate::workflow::evaluator::CompletionEvaluator;
use crate::workflow::rule::{ApprovalRule, RuleType};
use crate::workflow::types::{Approval, ApprovalStatus, ApprovalWorkflow};

/// A workflow ready to be persisted together with its tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowPlan {
    /// The new workflow, `Pending` at step 1.
    pub workflow: ApprovalWorkflow,
    /// One pending task per distinct approver, ordered by step.
    pub approvals: Vec<Approval>,
    /// True when the rule wanted a manager but the submitter has none.
    pub manager_skipped: bool,
    /// Submission audit entry.
    pub audit: AuditRecord,
}

/// Result of submitting an expense.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowOutcome {
    /// No rule applies; the expense is approved without a workflow.
    AutoApproved {
        /// Submission audit entry.
        audit: AuditRecord,
    },
    /// A workflow was planned.
    Started(WorkflowPlan),
}

impl WorkflowOutcome {
    /// Status the expense takes once the outcome is persisted.
    #[must_use]
    pub const fn expense_status(&self) -> ExpenseStatus {
        match self {
            Self::AutoApproved { .. } => ExpenseStatus::Approved,
            Self::Started(_) => ExpenseStatus::PendingApproval,
        }
    }

    /// The audit entry to persist with the outcome.
    #[must_use]
    pub const fn audit(&self) -> &AuditRecord {
        match self {
            Self::AutoApproved { audit } => audit,
            Self::Started(plan) => &plan.audit,
        }
    }

    /// The planned workflow, if any.
    #[must_use]
    pub const fn plan(&self) -> Option<&WorkflowPlan> {
        match self {
            Self::AutoApproved { .. } => None,
            Self::Started(plan) => Some(plan),
        }
    }
}

/// Stateless factory for approval workflows.
pub struct WorkflowFactory;

impl WorkflowFactory {
    /// Plans the workflow for a submitted expense.
    ///
    /// # Arguments
    /// * `expense` - The expense being submitted
    /// * `rule` - The rule selected for it, `None` when no rule applies
    /// * `reporting_manager` - The submitter's manager, if any
    /// * `has_active_workflow` - Whether the expense already has a pending workflow
    /// * `now` - Timestamp for every record created
    ///
    /// # Errors
    ///
    /// * `ExpenseNotSubmittable` if the expense is not draft or submitted
    /// * `WorkflowAlreadyActive` if a pending workflow exists
    /// * `InvalidRuleConfiguration` if the rule yields no approval task, or a
    ///   percentage quorum the created tasks could never reach
    pub fn plan(
        expense: &Expense,
        rule: Option<&ApprovalRule>,
        reporting_manager: Option<UserId>,
        has_active_workflow: bool,
        now: DateTime<Utc>,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        if !expense.status.is_submittable() {
            return Err(WorkflowError::ExpenseNotSubmittable {
                expense_id: expense.id,
                status: expense.status,
            });
        }
        if has_active_workflow {
            return Err(WorkflowError::WorkflowAlreadyActive(expense.id));
        }

        let Some(rule) = rule else {
            let audit = AuditRecord::new(
                AuditAction::Submit,
                expense.submitter_id,
                expense.id,
                "Expense approved automatically: no active approval rule",
                now,
            )
            .with_values(
                json!({ "status": expense.status }),
                json!({ "status": ExpenseStatus::Approved }),
            );
            return Ok(WorkflowOutcome::AutoApproved { audit });
        };

        rule.validate()?;

        if !rule.rule_type.has_dedicated_strategy() {
            tracing::info!(
                rule_id = %rule.id,
                rule_type = %rule.rule_type,
                "Rule type has no dedicated strategy, creating parallel tasks"
            );
        }

        let (approvers, manager_skipped) = Self::approver_order(rule, reporting_manager);
        if manager_skipped {
            tracing::warn!(
                expense_id = %expense.id,
                submitter_id = %expense.submitter_id,
                "Rule requires manager approval but submitter has no reporting manager"
            );
        }
        if approvers.is_empty() {
            return Err(WorkflowError::InvalidRuleConfiguration {
                rule_id: rule.id,
                reason: "no approval task could be created for this expense".to_string(),
            });
        }
        Self::ensure_quorum_reachable(rule, approvers.len())?;

        let workflow = ApprovalWorkflow {
            id: WorkflowId::new(),
            expense_id: expense.id,
            rule_id: rule.id,
            rule_type: rule.rule_type,
            minimum_approval_percentage: rule.minimum_approval_percentage,
            status: ApprovalStatus::Pending,
            current_step: 1,
            total_steps: rule.total_slots(),
            completed_steps: 0,
            created_at: now,
            updated_at: now,
        };

        let approvals = approvers
            .into_iter()
            .zip(1u32..)
            .map(|(approver_id, position)| Approval {
                id: ApprovalId::new(),
                workflow_id: workflow.id,
                expense_id: expense.id,
                approver_id,
                step: Self::step_for(rule.rule_type, position),
                status: ApprovalStatus::Pending,
                comments: None,
                approved_at: None,
                created_at: now,
            })
            .collect();

        let audit = AuditRecord::new(
            AuditAction::Submit,
            expense.submitter_id,
            expense.id,
            format!("Expense submitted for approval under rule '{}'", rule.name),
            now,
        )
        .with_values(
            json!({ "status": expense.status }),
            json!({
                "status": ExpenseStatus::PendingApproval,
                "workflow_id": workflow.id,
                "rule_id": rule.id,
            }),
        );

        Ok(WorkflowOutcome::Started(WorkflowPlan {
            workflow,
            approvals,
            manager_skipped,
            audit,
        }))
    }

    /// Distinct approvers in task order: manager first, then listed approvers
    /// by `sequence_order`. The flag is set when a required manager is missing.
    fn approver_order(
        rule: &ApprovalRule,
        reporting_manager: Option<UserId>,
    ) -> (Vec<UserId>, bool) {
        let mut seen = HashSet::new();
        let mut order = Vec::with_capacity(rule.approvers.len() + 1);

        let manager_skipped = rule.requires_manager_approval && reporting_manager.is_none();
        if rule.requires_manager_approval
            && let Some(manager) = reporting_manager
        {
            seen.insert(manager);
            order.push(manager);
        }

        for approver in rule.ordered_approvers() {
            if seen.insert(approver.approver_id) {
                order.push(approver.approver_id);
            }
        }

        (order, manager_skipped)
    }

    /// Duplicate approvers and a missing manager shrink the task list below
    /// the slot count the quorum is computed from. A workflow that can never
    /// reach its quorum would stay pending forever.
    fn ensure_quorum_reachable(rule: &ApprovalRule, tasks: usize) -> Result<(), WorkflowError> {
        if rule.rule_type != RuleType::Percentage {
            return Ok(());
        }
        let required = CompletionEvaluator::required_approvals(
            rule.total_slots(),
            rule.minimum_approval_percentage,
        );
        let tasks = u32::try_from(tasks).unwrap_or(u32::MAX);
        if required > tasks {
            return Err(WorkflowError::InvalidRuleConfiguration {
                rule_id: rule.id,
                reason: format!(
                    "quorum needs {required} approvals but only {tasks} distinct approvers are available"
                ),
            });
        }
        Ok(())
    }

    const fn step_for(rule_type: RuleType, position: u32) -> u32 {
        match rule_type {
            RuleType::Sequential => position,
            RuleType::Parallel
            | RuleType::Percentage
            | RuleType::SpecificApprover
            | RuleType::Hybrid => 1,
        }
    }
}
