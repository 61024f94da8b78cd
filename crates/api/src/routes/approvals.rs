//! Approver routes: pending queue and decisions.

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::{AppState, error::ApiError, middleware::AuthUser};
use expensa_core::expense::ExpenseStatus;
use expensa_core::workflow::{Approval, ApprovalWorkflow, DecisionOutcome, DecisionResult, Verdict};
use expensa_shared::types::ApprovalId;

/// Creates the approval routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/approvals/pending", get(list_pending))
        .route("/approvals/{approval_id}/approve", post(approve))
        .route("/approvals/{approval_id}/reject", post(reject))
}

/// Optional request body for a decision.
#[derive(Debug, Default, Deserialize)]
pub struct DecisionRequest {
    /// Free-form comments stored on the task.
    pub comments: Option<String>,
}

/// Result of a decision.
#[derive(Debug, Serialize)]
pub struct DecisionResponse {
    /// The decided task.
    pub approval: Approval,
    /// The workflow after the decision.
    pub workflow: ApprovalWorkflow,
    /// Expense status after the decision.
    pub expense_status: ExpenseStatus,
    /// What the decision did to the workflow.
    pub outcome: DecisionOutcome,
    /// Tasks force-rejected by a rejection.
    pub cascaded: Vec<ApprovalId>,
}

impl From<DecisionResult> for DecisionResponse {
    fn from(result: DecisionResult) -> Self {
        Self {
            approval: result.approval,
            workflow: result.workflow,
            expense_status: result.expense_status,
            outcome: result.outcome,
            cascaded: result.cascaded,
        }
    }
}

/// GET `/approvals/pending` - Tasks waiting on the caller.
async fn list_pending(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let approvals = state.engine.pending_approvals(auth.user_id()).await?;
    Ok(Json(json!({ "data": approvals })))
}

async fn decide(
    state: &AppState,
    auth: &AuthUser,
    approval_id: Uuid,
    verdict: Verdict,
    body: Option<Json<DecisionRequest>>,
) -> Result<Json<DecisionResponse>, ApiError> {
    let comments = body
        .and_then(|Json(request)| request.comments)
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    let result = state
        .engine
        .record_decision(
            ApprovalId::from_uuid(approval_id),
            auth.user_id(),
            verdict,
            comments,
        )
        .await?;

    Ok(Json(result.into()))
}

/// POST `/approvals/{approval_id}/approve` - Approve a task.
async fn approve(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(approval_id): Path<Uuid>,
    body: Option<Json<DecisionRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    decide(&state, &auth, approval_id, Verdict::Approve, body).await
}

/// POST `/approvals/{approval_id}/reject` - Reject a task.
async fn reject(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(approval_id): Path<Uuid>,
    body: Option<Json<DecisionRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    decide(&state, &auth, approval_id, Verdict::Reject, body).await
}
