//! Error responses.
//!
//! Every failure leaves the API as `{"error": <code>, "message": <text>}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use expensa_core::workflow::WorkflowError;
use expensa_db::repositories::ApprovalRuleError;
use expensa_shared::AppError;

/// An error rendered as a JSON response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    /// Creates an error response.
    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    /// HTTP status of the response.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }
}

fn status_from(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self::new(status_from(err.status_code()), err.error_code(), err.to_string())
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        Self::new(status_from(err.status_code()), err.error_code(), err.to_string())
    }
}

impl From<ApprovalRuleError> for ApiError {
    fn from(err: ApprovalRuleError) -> Self {
        let app = match err {
            ApprovalRuleError::NotFound(id) => AppError::NotFound(format!("approval rule {id}")),
            ApprovalRuleError::Validation(reason) => AppError::Validation(reason),
            ApprovalRuleError::Database(e) => AppError::Database(e.to_string()),
        };
        app.into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = if self.status.is_server_error() {
            error!(code = self.code, error = %self.message, "Request failed");
            "An internal error occurred".to_string()
        } else {
            self.message
        };

        (
            self.status,
            Json(json!({ "error": self.code, "message": message })),
        )
            .into_response()
    }
}
