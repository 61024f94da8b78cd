//! Approval Rule Repository
//!
//! CRUD operations for approval rules and their ordered approver lists.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use uuid::Uuid;

use expensa_core::workflow::{ApprovalRule, RuleType, validate_percentage};
use expensa_shared::types::{ApprovalRuleId, CompanyId, UserId};

use crate::entities::{approval_rule_approvers, approval_rules, users};
use crate::repositories::convert::{rule_from_models, to_i32};

/// Errors that can occur during approval rule operations.
#[derive(Debug, Error)]
pub enum ApprovalRuleError {
    /// Approval rule not found.
    #[error("Approval rule {0} not found")]
    NotFound(ApprovalRuleId),

    /// Rule input failed validation.
    #[error("Invalid approval rule: {0}")]
    Validation(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

/// Input for creating an approval rule.
#[derive(Debug, Clone)]
pub struct CreateApprovalRuleInput {
    /// Name of the approval rule.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// How approvals combine.
    pub rule_type: RuleType,
    /// Quorum for percentage rules; defaults to 100.
    pub minimum_approval_percentage: Option<Decimal>,
    /// Whether the submitter's reporting manager gets a task.
    pub requires_manager_approval: bool,
    /// Informational sequencing flag.
    pub approver_sequence_matters: bool,
    /// Approvers in sequence order.
    pub approver_ids: Vec<UserId>,
}

/// Input for updating an approval rule.
#[derive(Debug, Clone, Default)]
pub struct UpdateApprovalRuleInput {
    /// New name.
    pub name: Option<String>,
    /// New description.
    pub description: Option<Option<String>>,
    /// New rule type.
    pub rule_type: Option<RuleType>,
    /// New quorum.
    pub minimum_approval_percentage: Option<Decimal>,
    /// New manager flag.
    pub requires_manager_approval: Option<bool>,
    /// New sequencing flag.
    pub approver_sequence_matters: Option<bool>,
    /// Active status.
    pub is_active: Option<bool>,
    /// Replacement approver list.
    pub approver_ids: Option<Vec<UserId>>,
}

/// Repository for approval rule operations.
pub struct ApprovalRuleRepository {
    db: DatabaseConnection,
}

impl ApprovalRuleRepository {
    /// Creates a new `ApprovalRuleRepository`.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates a rule and its approver list in one transaction.
    ///
    /// Approvers receive `sequence_order` 1..n from their list position.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for an empty name, a percentage outside 0..=100,
    /// an approver listed twice or an approver outside the company.
    pub async fn create_rule(
        &self,
        company_id: CompanyId,
        input: CreateApprovalRuleInput,
    ) -> Result<ApprovalRule, ApprovalRuleError> {
        let name = validate_name(&input.name)?;
        let percentage = input
            .minimum_approval_percentage
            .unwrap_or(ApprovalRule::DEFAULT_PERCENTAGE);
        validate_percentage(percentage).map_err(ApprovalRuleError::Validation)?;
        validate_distinct(&input.approver_ids)?;

        let now = Utc::now();
        let txn = self.db.begin().await?;

        ensure_company_members(&txn, company_id, &input.approver_ids).await?;

        let rule = approval_rules::ActiveModel {
            id: Set(ApprovalRuleId::new().into_inner()),
            company_id: Set(company_id.into_inner()),
            name: Set(name),
            description: Set(input.description),
            rule_type: Set(input.rule_type.into()),
            minimum_approval_percentage: Set(percentage),
            requires_manager_approval: Set(input.requires_manager_approval),
            approver_sequence_matters: Set(input.approver_sequence_matters),
            is_active: Set(true),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&txn)
        .await?;

        let approvers = insert_approvers(&txn, rule.id, &input.approver_ids).await?;
        txn.commit().await?;

        Ok(rule_from_models(rule, approvers))
    }

    /// Lists all active approval rules of a company, oldest first.
    pub async fn list_rules(
        &self,
        company_id: CompanyId,
    ) -> Result<Vec<ApprovalRule>, ApprovalRuleError> {
        let rules = load_active_rules(&self.db, company_id).await?;
        Ok(rules)
    }

    /// Gets a specific approval rule by ID, active or not.
    pub async fn get_rule(
        &self,
        company_id: CompanyId,
        rule_id: ApprovalRuleId,
    ) -> Result<ApprovalRule, ApprovalRuleError> {
        let rule = find_rule(&self.db, company_id, rule_id).await?;
        let approvers = approval_rule_approvers::Entity::find()
            .filter(approval_rule_approvers::Column::RuleId.eq(rule.id))
            .all(&self.db)
            .await?;
        Ok(rule_from_models(rule, approvers))
    }

    /// Updates an approval rule.
    ///
    /// A new approver list replaces the old one inside the same transaction.
    /// Workflows already started keep the parameters they were created with.
    pub async fn update_rule(
        &self,
        company_id: CompanyId,
        rule_id: ApprovalRuleId,
        input: UpdateApprovalRuleInput,
    ) -> Result<ApprovalRule, ApprovalRuleError> {
        let txn = self.db.begin().await?;
        let existing = find_rule(&txn, company_id, rule_id).await?;

        let mut rule: approval_rules::ActiveModel = existing.into();

        if let Some(name) = input.name {
            rule.name = Set(validate_name(&name)?);
        }
        if let Some(description) = input.description {
            rule.description = Set(description);
        }
        if let Some(rule_type) = input.rule_type {
            rule.rule_type = Set(rule_type.into());
        }
        if let Some(percentage) = input.minimum_approval_percentage {
            validate_percentage(percentage).map_err(ApprovalRuleError::Validation)?;
            rule.minimum_approval_percentage = Set(percentage);
        }
        if let Some(requires_manager) = input.requires_manager_approval {
            rule.requires_manager_approval = Set(requires_manager);
        }
        if let Some(sequence_matters) = input.approver_sequence_matters {
            rule.approver_sequence_matters = Set(sequence_matters);
        }
        if let Some(is_active) = input.is_active {
            rule.is_active = Set(is_active);
        }

        rule.updated_at = Set(Utc::now().into());
        let updated = rule.update(&txn).await?;

        let approvers = if let Some(approver_ids) = input.approver_ids {
            validate_distinct(&approver_ids)?;
            ensure_company_members(&txn, company_id, &approver_ids).await?;
            approval_rule_approvers::Entity::delete_many()
                .filter(approval_rule_approvers::Column::RuleId.eq(updated.id))
                .exec(&txn)
                .await?;
            insert_approvers(&txn, updated.id, &approver_ids).await?
        } else {
            approval_rule_approvers::Entity::find()
                .filter(approval_rule_approvers::Column::RuleId.eq(updated.id))
                .all(&txn)
                .await?
        };

        txn.commit().await?;
        Ok(rule_from_models(updated, approvers))
    }

    /// Soft deletes an approval rule by setting `is_active` to false.
    pub async fn deactivate_rule(
        &self,
        company_id: CompanyId,
        rule_id: ApprovalRuleId,
    ) -> Result<(), ApprovalRuleError> {
        let existing = find_rule(&self.db, company_id, rule_id).await?;

        let mut rule: approval_rules::ActiveModel = existing.into();
        rule.is_active = Set(false);
        rule.updated_at = Set(Utc::now().into());
        rule.update(&self.db).await?;

        Ok(())
    }
}

fn validate_name(name: &str) -> Result<String, ApprovalRuleError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ApprovalRuleError::Validation(
            "name must not be empty".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

fn validate_distinct(approver_ids: &[UserId]) -> Result<(), ApprovalRuleError> {
    let mut seen = HashSet::with_capacity(approver_ids.len());
    match approver_ids.iter().find(|id| !seen.insert(**id)) {
        Some(duplicate) => Err(ApprovalRuleError::Validation(format!(
            "approver {duplicate} is listed more than once"
        ))),
        None => Ok(()),
    }
}

async fn find_rule<C: ConnectionTrait>(
    conn: &C,
    company_id: CompanyId,
    rule_id: ApprovalRuleId,
) -> Result<approval_rules::Model, ApprovalRuleError> {
    approval_rules::Entity::find_by_id(rule_id.into_inner())
        .filter(approval_rules::Column::CompanyId.eq(company_id.into_inner()))
        .one(conn)
        .await?
        .ok_or(ApprovalRuleError::NotFound(rule_id))
}

async fn ensure_company_members<C: ConnectionTrait>(
    conn: &C,
    company_id: CompanyId,
    approver_ids: &[UserId],
) -> Result<(), ApprovalRuleError> {
    for approver_id in approver_ids {
        let found = users::Entity::find_by_id(approver_id.into_inner())
            .filter(users::Column::CompanyId.eq(company_id.into_inner()))
            .count(conn)
            .await?;
        if found == 0 {
            return Err(ApprovalRuleError::Validation(format!(
                "approver {approver_id} is not a member of the company"
            )));
        }
    }
    Ok(())
}

async fn insert_approvers<C: ConnectionTrait>(
    conn: &C,
    rule_id: Uuid,
    approver_ids: &[UserId],
) -> Result<Vec<approval_rule_approvers::Model>, ApprovalRuleError> {
    let now = Utc::now();
    let mut inserted = Vec::with_capacity(approver_ids.len());
    for (position, approver_id) in (1u32..).zip(approver_ids) {
        let approver = approval_rule_approvers::ActiveModel {
            id: Set(Uuid::now_v7()),
            rule_id: Set(rule_id),
            approver_id: Set(approver_id.into_inner()),
            sequence_order: Set(to_i32(position)),
            is_required: Set(true),
            created_at: Set(now.into()),
        }
        .insert(conn)
        .await?;
        inserted.push(approver);
    }
    Ok(inserted)
}

/// Loads the active rules of a company with their approvers, oldest first.
///
/// Runs on any connection so the workflow repository can call it inside its
/// submission transaction.
pub(crate) async fn load_active_rules<C: ConnectionTrait>(
    conn: &C,
    company_id: CompanyId,
) -> Result<Vec<ApprovalRule>, sea_orm::DbErr> {
    let rules = approval_rules::Entity::find()
        .filter(approval_rules::Column::CompanyId.eq(company_id.into_inner()))
        .filter(approval_rules::Column::IsActive.eq(true))
        .order_by_asc(approval_rules::Column::CreatedAt)
        .order_by_asc(approval_rules::Column::Id)
        .all(conn)
        .await?;

    let rule_ids: Vec<Uuid> = rules.iter().map(|r| r.id).collect();
    let mut approvers_by_rule: HashMap<Uuid, Vec<approval_rule_approvers::Model>> = HashMap::new();
    if !rule_ids.is_empty() {
        let approvers = approval_rule_approvers::Entity::find()
            .filter(approval_rule_approvers::Column::RuleId.is_in(rule_ids))
            .all(conn)
            .await?;
        for approver in approvers {
            approvers_by_rule.entry(approver.rule_id).or_default().push(approver);
        }
    }

    Ok(rules
        .into_iter()
        .map(|rule| {
            let approvers = approvers_by_rule.remove(&rule.id).unwrap_or_default();
            rule_from_models(rule, approvers)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name_trims() {
        assert_eq!(validate_name("  Travel  ").unwrap(), "Travel");
    }

    #[test]
    fn test_validate_name_rejects_blank() {
        assert!(matches!(
            validate_name("   "),
            Err(ApprovalRuleError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_distinct_rejects_repeated_approver() {
        let repeated = UserId::new();
        let result = validate_distinct(&[repeated, UserId::new(), repeated]);
        assert!(matches!(result, Err(ApprovalRuleError::Validation(msg)) if msg.contains(&repeated.to_string())));
    }

    #[test]
    fn test_validate_distinct_accepts_unique_list() {
        assert!(validate_distinct(&[UserId::new(), UserId::new()]).is_ok());
        assert!(validate_distinct(&[]).is_ok());
    }

    #[test]
    fn test_update_input_default_changes_nothing() {
        let input = UpdateApprovalRuleInput::default();
        assert!(input.name.is_none());
        assert!(input.approver_ids.is_none());
        assert!(input.is_active.is_none());
    }
}
