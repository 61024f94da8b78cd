//! Approval rule management routes.
//!
//! Rules belong to the caller's company; every route requires the admin role.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{AppState, error::ApiError, middleware::AuthUser};
use expensa_core::workflow::RuleType;
use expensa_db::repositories::{
    ApprovalRuleRepository, CreateApprovalRuleInput, UpdateApprovalRuleInput,
};
use expensa_shared::types::{ApprovalRuleId, UserId};

/// Creates the approval rules routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/approval-rules",
            get(list_approval_rules).post(create_approval_rule),
        )
        .route(
            "/approval-rules/{rule_id}",
            get(get_approval_rule)
                .put(update_approval_rule)
                .delete(delete_approval_rule),
        )
}

/// Request body for creating an approval rule.
#[derive(Debug, Deserialize)]
pub struct CreateApprovalRuleRequest {
    /// Name of the approval rule.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// How approvals combine.
    pub rule_type: RuleType,
    /// Quorum for percentage rules, 0 to 100. Defaults to 100.
    pub minimum_approval_percentage: Option<Decimal>,
    /// Whether the submitter's reporting manager gets a task.
    #[serde(default)]
    pub requires_manager_approval: bool,
    /// Informational sequencing flag; defaults to true for sequential rules.
    pub approver_sequence_matters: Option<bool>,
    /// Approver user IDs in sequence order.
    #[serde(default)]
    pub approvers: Vec<Uuid>,
}

/// Request body for updating an approval rule.
#[derive(Debug, Deserialize)]
pub struct UpdateApprovalRuleRequest {
    /// New name.
    pub name: Option<String>,
    /// New description.
    pub description: Option<String>,
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
    pub approvers: Option<Vec<Uuid>>,
}

fn user_ids(ids: Vec<Uuid>) -> Vec<UserId> {
    ids.into_iter().map(UserId::from_uuid).collect()
}

/// GET `/approval-rules` - List active rules of the caller's company.
async fn list_approval_rules(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_admin()?;

    let rules = ApprovalRuleRepository::new((*state.db).clone())
        .list_rules(auth.company_id())
        .await?;

    Ok(Json(json!({ "data": rules })))
}

/// POST `/approval-rules` - Create approval rule.
async fn create_approval_rule(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreateApprovalRuleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_admin()?;

    let input = CreateApprovalRuleInput {
        name: payload.name,
        description: payload.description,
        rule_type: payload.rule_type,
        minimum_approval_percentage: payload.minimum_approval_percentage,
        requires_manager_approval: payload.requires_manager_approval,
        approver_sequence_matters: payload
            .approver_sequence_matters
            .unwrap_or(payload.rule_type == RuleType::Sequential),
        approver_ids: user_ids(payload.approvers),
    };

    let rule = ApprovalRuleRepository::new((*state.db).clone())
        .create_rule(auth.company_id(), input)
        .await?;

    info!(
        company_id = %rule.company_id,
        rule_id = %rule.id,
        rule_type = %rule.rule_type,
        "Approval rule created"
    );

    Ok((StatusCode::CREATED, Json(rule)))
}

/// GET `/approval-rules/{rule_id}` - Get approval rule.
async fn get_approval_rule(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(rule_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_admin()?;

    let rule = ApprovalRuleRepository::new((*state.db).clone())
        .get_rule(auth.company_id(), ApprovalRuleId::from_uuid(rule_id))
        .await?;

    Ok(Json(rule))
}

/// PUT `/approval-rules/{rule_id}` - Update approval rule.
async fn update_approval_rule(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(rule_id): Path<Uuid>,
    Json(payload): Json<UpdateApprovalRuleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_admin()?;

    let input = UpdateApprovalRuleInput {
        name: payload.name,
        description: payload.description.map(Some),
        rule_type: payload.rule_type,
        minimum_approval_percentage: payload.minimum_approval_percentage,
        requires_manager_approval: payload.requires_manager_approval,
        approver_sequence_matters: payload.approver_sequence_matters,
        is_active: payload.is_active,
        approver_ids: payload.approvers.map(user_ids),
    };

    let rule = ApprovalRuleRepository::new((*state.db).clone())
        .update_rule(auth.company_id(), ApprovalRuleId::from_uuid(rule_id), input)
        .await?;

    info!(rule_id = %rule.id, "Approval rule updated");

    Ok(Json(rule))
}

/// DELETE `/approval-rules/{rule_id}` - Deactivate approval rule.
async fn delete_approval_rule(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(rule_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_admin()?;

    let rule_id = ApprovalRuleId::from_uuid(rule_id);
    ApprovalRuleRepository::new((*state.db).clone())
        .deactivate_rule(auth.company_id(), rule_id)
        .await?;

    info!(rule_id = %rule_id, "Approval rule deactivated");

    Ok(StatusCode::NO_CONTENT)
}
