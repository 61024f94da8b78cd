//! Expense routes: drafts, listings and submission for approval.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, error::ApiError, middleware::AuthUser};
use expensa_core::expense::{Expense, ExpenseChanges, ExpenseQuery, ExpenseStatus};
use expensa_core::workflow::{WorkflowOutcome, WorkflowView};
use expensa_shared::AppError;
use expensa_shared::types::{ExpenseId, PageRequest};

/// Creates the expense routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/expenses", post(create_expense).get(list_own_expenses))
        .route("/expenses/company", get(list_company_expenses))
        .route(
            "/expenses/{expense_id}",
            get(get_expense).put(update_expense),
        )
        .route("/expenses/{expense_id}/submit", post(submit_expense))
}

/// Query parameters for expense listings.
#[derive(Debug, Default, Deserialize)]
pub struct ListExpensesParams {
    /// Only expenses in this status.
    pub status: Option<ExpenseStatus>,
    /// Page number, 1-indexed.
    pub page: Option<u32>,
    /// Page size, at most 100.
    pub per_page: Option<u32>,
}

impl ListExpensesParams {
    fn apply(&self, query: ExpenseQuery) -> ExpenseQuery {
        let defaults = PageRequest::default();
        query.with_status(self.status).with_page(PageRequest {
            page: self.page.unwrap_or(defaults.page),
            per_page: self.per_page.unwrap_or(defaults.per_page),
        })
    }
}

/// Request body for creating an expense.
#[derive(Debug, Deserialize)]
pub struct CreateExpenseRequest {
    /// Amount, strictly positive.
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency: String,
    /// What the money was spent on.
    pub description: String,
}

/// An expense with its latest workflow.
#[derive(Debug, Serialize)]
pub struct ExpenseResponse {
    /// The expense.
    #[serde(flatten)]
    pub expense: Expense,
    /// Latest approval workflow, if one was started.
    pub workflow: Option<WorkflowView>,
}

/// Result of submitting an expense.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    /// The expense.
    pub expense_id: ExpenseId,
    /// Expense status after submission.
    pub status: ExpenseStatus,
    /// True when no rule applied and the expense was approved outright.
    pub auto_approved: bool,
    /// The started workflow.
    pub workflow: Option<WorkflowView>,
}

/// Request body for editing a draft; omitted fields stay unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateExpenseRequest {
    /// New amount, strictly positive.
    pub amount: Option<Decimal>,
    /// New ISO 4217 currency code.
    pub currency: Option<String>,
    /// New description.
    pub description: Option<String>,
}

fn validate_amount(amount: Decimal) -> Result<Decimal, AppError> {
    if amount <= Decimal::ZERO {
        return Err(AppError::Validation("amount must be positive".to_string()));
    }
    Ok(amount)
}

fn validate_currency(currency: &str) -> Result<String, AppError> {
    let currency = currency.trim();
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::Validation(
            "currency must be a three-letter code".to_string(),
        ));
    }
    Ok(currency.to_uppercase())
}

fn validate_description(description: &str) -> Result<String, AppError> {
    let description = description.trim();
    if description.is_empty() {
        return Err(AppError::Validation(
            "description must not be empty".to_string(),
        ));
    }
    Ok(description.to_string())
}

fn validate(payload: &CreateExpenseRequest) -> Result<(), AppError> {
    validate_amount(payload.amount)?;
    validate_currency(&payload.currency)?;
    validate_description(&payload.description)?;
    Ok(())
}

fn validate_changes(payload: UpdateExpenseRequest) -> Result<ExpenseChanges, AppError> {
    Ok(ExpenseChanges {
        amount: payload.amount.map(validate_amount).transpose()?,
        currency: payload.currency.as_deref().map(validate_currency).transpose()?,
        description: payload
            .description
            .as_deref()
            .map(validate_description)
            .transpose()?,
    })
}

/// Loads an expense visible to the caller. Expenses of other companies are
/// reported as missing.
async fn visible_expense(
    state: &AppState,
    auth: &AuthUser,
    expense_id: ExpenseId,
) -> Result<Expense, ApiError> {
    let expense = state.engine.expense(expense_id).await?;
    if expense.company_id != auth.company_id() {
        return Err(AppError::NotFound(format!("expense {expense_id}")).into());
    }
    Ok(expense)
}

/// POST `/expenses` - Create a draft expense for the caller.
async fn create_expense(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreateExpenseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate(&payload)?;

    let draft = Expense::draft(
        auth.company_id(),
        auth.user_id(),
        payload.amount,
        payload.currency.trim().to_uppercase(),
        payload.description.trim(),
    );
    let expense = state.engine.create_expense(draft).await?;

    Ok((
        StatusCode::CREATED,
        Json(ExpenseResponse {
            expense,
            workflow: None,
        }),
    ))
}

/// GET `/expenses` - List the caller's own expenses, newest first.
async fn list_own_expenses(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<ListExpensesParams>,
) -> Result<impl IntoResponse, ApiError> {
    let query = params.apply(ExpenseQuery::submitted_by(auth.company_id(), auth.user_id()));
    let page = state.engine.list_expenses(&query).await?;
    Ok(Json(page))
}

/// GET `/expenses/company` - List every expense of the caller's company.
///
/// Managers and admins only.
async fn list_company_expenses(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<ListExpensesParams>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_manager_or_admin()?;

    let query = params.apply(ExpenseQuery::company(auth.company_id()));
    let page = state.engine.list_expenses(&query).await?;
    Ok(Json(page))
}

/// GET `/expenses/{expense_id}` - Get an expense with its workflow.
async fn get_expense(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(expense_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let expense_id = ExpenseId::from_uuid(expense_id);
    let expense = visible_expense(&state, &auth, expense_id).await?;
    let workflow = state.engine.workflow_for_expense(expense_id).await?;

    Ok(Json(ExpenseResponse { expense, workflow }))
}

/// PUT `/expenses/{expense_id}` - Edit a draft expense.
///
/// Only the submitter may edit, and only while the expense is a draft.
async fn update_expense(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(expense_id): Path<Uuid>,
    Json(payload): Json<UpdateExpenseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let expense_id = ExpenseId::from_uuid(expense_id);
    let expense = visible_expense(&state, &auth, expense_id).await?;
    if expense.submitter_id != auth.user_id() {
        return Err(
            AppError::Forbidden("only the submitter can edit this expense".to_string()).into(),
        );
    }
    let changes = validate_changes(payload)?;

    let expense = state.engine.update_expense(expense_id, changes).await?;

    Ok(Json(ExpenseResponse {
        expense,
        workflow: None,
    }))
}

/// POST `/expenses/{expense_id}/submit` - Submit an expense for approval.
///
/// Only the submitter may submit their expense.
async fn submit_expense(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(expense_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let expense_id = ExpenseId::from_uuid(expense_id);
    let expense = visible_expense(&state, &auth, expense_id).await?;
    if expense.submitter_id != auth.user_id() {
        return Err(
            AppError::Forbidden("only the submitter can submit this expense".to_string()).into(),
        );
    }

    let outcome = state.engine.start_workflow(expense_id).await?;

    let response = match outcome {
        WorkflowOutcome::AutoApproved { .. } => SubmitResponse {
            expense_id,
            status: ExpenseStatus::Approved,
            auto_approved: true,
            workflow: None,
        },
        WorkflowOutcome::Started(plan) => SubmitResponse {
            expense_id,
            status: ExpenseStatus::PendingApproval,
            auto_approved: false,
            workflow: Some(WorkflowView {
                workflow: plan.workflow,
                approvals: plan.approvals,
            }),
        },
    };

    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn request(amount: Decimal, currency: &str, description: &str) -> CreateExpenseRequest {
        CreateExpenseRequest {
            amount,
            currency: currency.to_string(),
            description: description.to_string(),
        }
    }

    #[rstest]
    #[case(dec!(0), "USD", "Taxi")]
    #[case(dec!(-5), "USD", "Taxi")]
    #[case(dec!(10), "US", "Taxi")]
    #[case(dec!(10), "U5D", "Taxi")]
    #[case(dec!(10), "USD", "   ")]
    fn test_invalid_expense_rejected(
        #[case] amount: Decimal,
        #[case] currency: &str,
        #[case] description: &str,
    ) {
        let result = validate(&request(amount, currency, description));
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_valid_expense_accepted() {
        assert!(validate(&request(dec!(42.10), " eur ", "Train ticket")).is_ok());
    }

    #[test]
    fn test_changes_are_normalized() {
        let changes = validate_changes(UpdateExpenseRequest {
            amount: None,
            currency: Some(" gbp ".to_string()),
            description: Some("  Hotel, two nights ".to_string()),
        })
        .unwrap();

        assert_eq!(changes.amount, None);
        assert_eq!(changes.currency.as_deref(), Some("GBP"));
        assert_eq!(changes.description.as_deref(), Some("Hotel, two nights"));
    }

    #[rstest]
    #[case(UpdateExpenseRequest { amount: Some(dec!(0)), ..Default::default() })]
    #[case(UpdateExpenseRequest { currency: Some("EURO".to_string()), ..Default::default() })]
    #[case(UpdateExpenseRequest { description: Some(" ".to_string()), ..Default::default() })]
    fn test_invalid_changes_rejected(#[case] payload: UpdateExpenseRequest) {
        assert!(matches!(
            validate_changes(payload),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_list_params_default_to_first_page() {
        let query = ListExpensesParams::default().apply(ExpenseQuery::company(
            expensa_shared::types::CompanyId::new(),
        ));
        assert_eq!(query.page, PageRequest::default());
        assert_eq!(query.status, None);
    }
}
