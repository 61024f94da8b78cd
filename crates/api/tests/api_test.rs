//! End-to-end tests for the HTTP surface.
//!
//! The router runs against the in-memory workflow store, so no database is
//! needed. Rule routes are only exercised up to their authorization checks.

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use jsonwebtoken::{EncodingKey, Header, encode};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::DatabaseConnection;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use expensa_api::{AppState, create_router};
use expensa_core::workflow::{ApprovalEngine, ApprovalRule, InMemoryStore, RuleApprover, RuleType};
use expensa_shared::types::{ApprovalRuleId, CompanyId, UserId};
use expensa_shared::{Claims, JwtService};

const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

struct TestApp {
    router: Router,
    store: Arc<InMemoryStore>,
    company: Uuid,
}

impl TestApp {
    fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let state = AppState {
            db: Arc::new(DatabaseConnection::Disconnected),
            jwt_service: Arc::new(JwtService::new(SECRET)),
            engine: ApprovalEngine::new(store.clone()),
        };
        Self {
            router: create_router(state),
            store,
            company: Uuid::now_v7(),
        }
    }

    fn token(&self, user: Uuid, role: &str) -> String {
        token_for(user, self.company, role, Utc::now() + Duration::hours(1))
    }

    async fn add_rule(&self, approvers: &[Uuid], rule_type: RuleType, percentage: Decimal) {
        let now = Utc::now();
        self.store
            .insert_rule(ApprovalRule {
                id: ApprovalRuleId::new(),
                company_id: CompanyId::from_uuid(self.company),
                name: "Default".to_string(),
                description: None,
                rule_type,
                minimum_approval_percentage: percentage,
                requires_manager_approval: false,
                approver_sequence_matters: rule_type == RuleType::Sequential,
                is_active: true,
                approvers: approvers
                    .iter()
                    .zip(1u32..)
                    .map(|(id, order)| RuleApprover {
                        approver_id: UserId::from_uuid(*id),
                        sequence_order: order,
                        is_required: true,
                    })
                    .collect(),
                created_at: now,
                updated_at: now,
            })
            .await;
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn create_expense(&self, token: &str) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/v1/expenses",
                Some(token),
                Some(json!({ "amount": "84.20", "currency": "usd", "description": "Taxi" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }
}

fn token_for(user: Uuid, company: Uuid, role: &str, expires_at: chrono::DateTime<Utc>) -> String {
    let claims = Claims::new(user, company, role, expires_at);
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, "/api/v1/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let app = TestApp::new();

    let (status, body) = app
        .send(Method::GET, "/api/v1/approvals/pending", None, None)
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "MISSING_TOKEN");
}

#[tokio::test]
async fn test_expired_token_is_unauthorized() {
    let app = TestApp::new();
    let token = token_for(
        Uuid::now_v7(),
        app.company,
        "employee",
        Utc::now() - Duration::hours(2),
    );

    let (status, body) = app
        .send(Method::GET, "/api/v1/approvals/pending", Some(&token), None)
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "TOKEN_EXPIRED");
}

#[tokio::test]
async fn test_garbage_token_is_unauthorized() {
    let app = TestApp::new();

    let (status, body) = app
        .send(Method::GET, "/api/v1/approvals/pending", Some("not-a-jwt"), None)
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "INVALID_TOKEN");
}

#[tokio::test]
async fn test_rule_routes_require_admin() {
    let app = TestApp::new();
    let token = app.token(Uuid::now_v7(), "manager");

    let (list_status, list_body) = app
        .send(Method::GET, "/api/v1/approval-rules", Some(&token), None)
        .await;
    let (create_status, _) = app
        .send(
            Method::POST,
            "/api/v1/approval-rules",
            Some(&token),
            Some(json!({ "name": "Travel", "rule_type": "parallel", "approvers": [] })),
        )
        .await;
    let uri = format!("/api/v1/approval-rules/{}", Uuid::now_v7());
    let (delete_status, _) = app.send(Method::DELETE, &uri, Some(&token), None).await;

    assert_eq!(list_status, StatusCode::FORBIDDEN);
    assert_eq!(list_body["error"], "ADMIN_REQUIRED");
    assert_eq!(create_status, StatusCode::FORBIDDEN);
    assert_eq!(delete_status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_create_expense_returns_draft() {
    let app = TestApp::new();
    let submitter = Uuid::now_v7();
    let token = app.token(submitter, "employee");

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/expenses",
            Some(&token),
            Some(json!({ "amount": "12.50", "currency": "eur", "description": " Lunch " })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "draft");
    assert_eq!(body["currency"], "EUR");
    assert_eq!(body["description"], "Lunch");
    assert_eq!(body["submitter_id"], submitter.to_string());
    assert!(body["workflow"].is_null());
}

#[tokio::test]
async fn test_create_expense_validates_amount() {
    let app = TestApp::new();
    let token = app.token(Uuid::now_v7(), "employee");

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/expenses",
            Some(&token),
            Some(json!({ "amount": "0", "currency": "USD", "description": "Nothing" })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_submit_without_rule_auto_approves() {
    let app = TestApp::new();
    let token = app.token(Uuid::now_v7(), "employee");
    let expense_id = app.create_expense(&token).await;

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/v1/expenses/{expense_id}/submit"),
            Some(&token),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["auto_approved"], true);
    assert_eq!(body["status"], "approved");
    assert!(body["workflow"].is_null());
}

#[tokio::test]
async fn test_only_submitter_can_submit() {
    let app = TestApp::new();
    let owner = app.token(Uuid::now_v7(), "employee");
    let colleague = app.token(Uuid::now_v7(), "employee");
    let expense_id = app.create_expense(&owner).await;

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/v1/expenses/{expense_id}/submit"),
            Some(&colleague),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "FORBIDDEN");
}

#[tokio::test]
async fn test_expense_of_other_company_is_hidden() {
    let app = TestApp::new();
    let owner = app.token(Uuid::now_v7(), "employee");
    let expense_id = app.create_expense(&owner).await;
    let outsider = token_for(
        Uuid::now_v7(),
        Uuid::now_v7(),
        "admin",
        Utc::now() + Duration::hours(1),
    );

    let (status, _) = app
        .send(
            Method::GET,
            &format!("/api/v1/expenses/{expense_id}"),
            Some(&outsider),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_expense_is_not_found() {
    let app = TestApp::new();
    let token = app.token(Uuid::now_v7(), "employee");

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/api/v1/expenses/{}", Uuid::now_v7()),
            Some(&token),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "EXPENSE_NOT_FOUND");
}

#[tokio::test]
async fn test_parallel_approval_flow() {
    let app = TestApp::new();
    let (first, second) = (Uuid::now_v7(), Uuid::now_v7());
    app.add_rule(&[first, second], RuleType::Parallel, Decimal::ONE_HUNDRED)
        .await;
    let submitter = app.token(Uuid::now_v7(), "employee");
    let first_token = app.token(first, "manager");
    let second_token = app.token(second, "manager");
    let expense_id = app.create_expense(&submitter).await;

    let (status, submitted) = app
        .send(
            Method::POST,
            &format!("/api/v1/expenses/{expense_id}/submit"),
            Some(&submitter),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(submitted["status"], "pending_approval");
    assert_eq!(submitted["workflow"]["approvals"].as_array().unwrap().len(), 2);

    let (_, pending) = app
        .send(Method::GET, "/api/v1/approvals/pending", Some(&first_token), None)
        .await;
    let tasks = pending["data"].as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    let first_task = tasks[0]["id"].as_str().unwrap().to_string();

    let (status, decided) = app
        .send(
            Method::POST,
            &format!("/api/v1/approvals/{first_task}/approve"),
            Some(&first_token),
            Some(json!({ "comments": "Looks fine" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decided["outcome"], "advanced");
    assert_eq!(decided["approval"]["comments"], "Looks fine");
    assert_eq!(decided["workflow"]["completed_steps"], 1);

    let (_, pending) = app
        .send(Method::GET, "/api/v1/approvals/pending", Some(&second_token), None)
        .await;
    let second_task = pending["data"][0]["id"].as_str().unwrap().to_string();

    let (status, decided) = app
        .send(
            Method::POST,
            &format!("/api/v1/approvals/{second_task}/approve"),
            Some(&second_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decided["outcome"], "approved");
    assert_eq!(decided["expense_status"], "approved");

    let (_, expense) = app
        .send(
            Method::GET,
            &format!("/api/v1/expenses/{expense_id}"),
            Some(&submitter),
            None,
        )
        .await;
    assert_eq!(expense["status"], "approved");
    assert_eq!(expense["workflow"]["workflow"]["status"], "approved");
}

#[tokio::test]
async fn test_rejection_closes_workflow() {
    let app = TestApp::new();
    let (first, second) = (Uuid::now_v7(), Uuid::now_v7());
    app.add_rule(&[first, second], RuleType::Percentage, dec!(50))
        .await;
    let submitter = app.token(Uuid::now_v7(), "employee");
    let first_token = app.token(first, "manager");
    let second_token = app.token(second, "manager");
    let expense_id = app.create_expense(&submitter).await;
    let (_, submitted) = app
        .send(
            Method::POST,
            &format!("/api/v1/expenses/{expense_id}/submit"),
            Some(&submitter),
            None,
        )
        .await;
    let approvals = submitted["workflow"]["approvals"].as_array().unwrap();
    let task_of = |user: Uuid| {
        approvals
            .iter()
            .find(|a| a["approver_id"] == user.to_string())
            .and_then(|a| a["id"].as_str())
            .unwrap()
            .to_string()
    };
    let (first_task, second_task) = (task_of(first), task_of(second));

    let (status, decided) = app
        .send(
            Method::POST,
            &format!("/api/v1/approvals/{first_task}/reject"),
            Some(&first_token),
            Some(json!({ "comments": "No receipt" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decided["outcome"], "rejected");
    assert_eq!(decided["cascaded"].as_array().unwrap().len(), 1);

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/v1/approvals/{second_task}/approve"),
            Some(&second_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "ALREADY_DECIDED");
}

#[tokio::test]
async fn test_decision_by_other_user_is_forbidden() {
    let app = TestApp::new();
    let approver = Uuid::now_v7();
    app.add_rule(&[approver], RuleType::Sequential, Decimal::ONE_HUNDRED)
        .await;
    let submitter = app.token(Uuid::now_v7(), "employee");
    let intruder = app.token(Uuid::now_v7(), "manager");
    let expense_id = app.create_expense(&submitter).await;
    let (_, submitted) = app
        .send(
            Method::POST,
            &format!("/api/v1/expenses/{expense_id}/submit"),
            Some(&submitter),
            None,
        )
        .await;
    let task = submitted["workflow"]["approvals"][0]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/v1/approvals/{task}/approve"),
            Some(&intruder),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "NOT_ASSIGNED_APPROVER");
}

#[tokio::test]
async fn test_resubmission_conflicts() {
    let app = TestApp::new();
    let token = app.token(Uuid::now_v7(), "employee");
    let expense_id = app.create_expense(&token).await;
    let uri = format!("/api/v1/expenses/{expense_id}/submit");

    app.send(Method::POST, &uri, Some(&token), None).await;
    let (status, body) = app.send(Method::POST, &uri, Some(&token), None).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "EXPENSE_NOT_SUBMITTABLE");
}

#[tokio::test]
async fn test_list_own_expenses_filters_and_pages() {
    let app = TestApp::new();
    let me = app.token(Uuid::now_v7(), "employee");
    let colleague = app.token(Uuid::now_v7(), "employee");
    let submitted = app.create_expense(&me).await;
    app.create_expense(&me).await;
    app.create_expense(&me).await;
    app.create_expense(&colleague).await;
    app.send(
        Method::POST,
        &format!("/api/v1/expenses/{submitted}/submit"),
        Some(&me),
        None,
    )
    .await;

    let (status, body) = app
        .send(Method::GET, "/api/v1/expenses", Some(&me), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["total"], 3);
    assert_eq!(body["data"].as_array().unwrap().len(), 3);

    let (_, drafts) = app
        .send(
            Method::GET,
            "/api/v1/expenses?status=draft&page=2&per_page=1",
            Some(&me),
            None,
        )
        .await;
    assert_eq!(drafts["meta"]["total"], 2);
    assert_eq!(drafts["meta"]["page"], 2);
    assert_eq!(drafts["meta"]["total_pages"], 2);
    let data = drafts["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["status"], "draft");
}

#[tokio::test]
async fn test_company_listing_requires_manager() {
    let app = TestApp::new();
    let employee = app.token(Uuid::now_v7(), "employee");
    app.create_expense(&employee).await;
    let outsider = token_for(
        Uuid::now_v7(),
        Uuid::now_v7(),
        "employee",
        Utc::now() + Duration::hours(1),
    );
    app.create_expense(&outsider).await;

    let (status, body) = app
        .send(Method::GET, "/api/v1/expenses/company", Some(&employee), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "MANAGER_REQUIRED");

    for role in ["manager", "admin"] {
        let token = app.token(Uuid::now_v7(), role);
        let (status, body) = app
            .send(Method::GET, "/api/v1/expenses/company", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["meta"]["total"], 1);
    }
}

#[tokio::test]
async fn test_update_draft_expense() {
    let app = TestApp::new();
    let token = app.token(Uuid::now_v7(), "employee");
    let expense_id = app.create_expense(&token).await;

    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/api/v1/expenses/{expense_id}"),
            Some(&token),
            Some(json!({ "amount": "90.00", "currency": "gbp" })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["currency"], "GBP");
    assert_eq!(body["description"], "Taxi");
    assert_eq!(body["status"], "draft");
}

#[tokio::test]
async fn test_update_is_refused_for_others_and_after_submit() {
    let app = TestApp::new();
    let owner = app.token(Uuid::now_v7(), "employee");
    let colleague = app.token(Uuid::now_v7(), "employee");
    let expense_id = app.create_expense(&owner).await;
    let uri = format!("/api/v1/expenses/{expense_id}");

    let (status, body) = app
        .send(
            Method::PUT,
            &uri,
            Some(&owner),
            Some(json!({ "amount": "-1" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "VALIDATION_ERROR");

    let (status, body) = app
        .send(
            Method::PUT,
            &uri,
            Some(&colleague),
            Some(json!({ "description": "Mine now" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "FORBIDDEN");

    app.send(Method::POST, &format!("{uri}/submit"), Some(&owner), None)
        .await;
    let (status, body) = app
        .send(
            Method::PUT,
            &uri,
            Some(&owner),
            Some(json!({ "description": "Too late" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "EXPENSE_NOT_EDITABLE");
}
