//! API route definitions.

use axum::{Router, middleware};

use crate::{AppState, middleware::auth_middleware};

pub mod approval_rules;
pub mod approvals;
pub mod expenses;
pub mod health;

/// Creates the API router: public health check plus the authenticated routes.
#[allow(clippy::needless_pass_by_value)]
pub fn api_routes_with_state(state: AppState) -> Router<AppState> {
    let protected_routes = Router::new()
        .merge(approval_rules::routes())
        .merge(expenses::routes())
        .merge(approvals::routes())
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(health::routes())
        .merge(protected_routes)
}
