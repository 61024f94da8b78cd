//! Database seeder for Expensa development and testing.
//!
//! Seeds a demo company with an admin, a manager, a finance approver, two
//! employees reporting to the manager, and one sequential approval rule
//! (manager first, then finance). Running it twice is harmless.
//!
//! Usage: cargo run --bin seeder

use anyhow::Context;
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use expensa_core::workflow::RuleType;
use expensa_db::repositories::{
    ApprovalRuleRepository, CompanyRepository, CreateApprovalRuleInput, CreateUserInput,
    UserRepository,
};
use expensa_shared::UserRole;
use expensa_shared::types::{CompanyId, UserId};

/// Demo company ID (consistent for all seeds)
const DEMO_COMPANY_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0001);
const ADMIN_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0010);
const MANAGER_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0011);
const FINANCE_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0012);
const EMPLOYEE_IDS: [Uuid; 2] = [
    Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0020),
    Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0021),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL must be set in environment")?;

    println!("Connecting to database...");
    let db = expensa_db::connect(&database_url)
        .await
        .context("Failed to connect to database")?;
    let company_id = CompanyId::from_uuid(DEMO_COMPANY_ID);

    println!("Seeding demo company...");
    if seed_company(&db, company_id).await? {
        println!("Seeding users...");
        seed_users(&db, company_id).await?;

        println!("Seeding approval rule...");
        seed_rule(&db, company_id).await?;
    } else {
        println!("  Demo company already exists, skipping...");
    }

    println!("Seeding complete!");
    Ok(())
}

/// Creates the demo company. Returns false if it already exists.
async fn seed_company(db: &DatabaseConnection, company_id: CompanyId) -> anyhow::Result<bool> {
    let companies = CompanyRepository::new(db.clone());
    if companies.find_by_id(company_id).await?.is_some() {
        return Ok(false);
    }
    companies.create(company_id, "Demo Company", "USD").await?;
    println!("  Created company: Demo Company");
    Ok(true)
}

async fn seed_users(db: &DatabaseConnection, company_id: CompanyId) -> anyhow::Result<()> {
    let users = UserRepository::new(db.clone());
    let manager = UserId::from_uuid(MANAGER_ID);

    let staff = [
        (ADMIN_ID, "admin@expensa.dev", "Ada Admin", UserRole::Admin, None),
        (MANAGER_ID, "manager@expensa.dev", "Max Manager", UserRole::Manager, None),
        (FINANCE_ID, "finance@expensa.dev", "Fay Finance", UserRole::Manager, None),
        (EMPLOYEE_IDS[0], "erin@expensa.dev", "Erin Employee", UserRole::Employee, Some(manager)),
        (EMPLOYEE_IDS[1], "eli@expensa.dev", "Eli Employee", UserRole::Employee, Some(manager)),
    ];

    for (id, email, full_name, role, reporting_manager_id) in staff {
        users
            .create(
                company_id,
                CreateUserInput {
                    id: Some(UserId::from_uuid(id)),
                    email: email.to_string(),
                    full_name: full_name.to_string(),
                    role,
                    reporting_manager_id,
                },
            )
            .await
            .with_context(|| format!("Failed to insert user {email}"))?;
        println!("  Created user: {email}");
    }
    Ok(())
}

async fn seed_rule(db: &DatabaseConnection, company_id: CompanyId) -> anyhow::Result<()> {
    let rule = ApprovalRuleRepository::new(db.clone())
        .create_rule(
            company_id,
            CreateApprovalRuleInput {
                name: "Manager then finance".to_string(),
                description: Some("Reporting manager approves first, finance second".to_string()),
                rule_type: RuleType::Sequential,
                minimum_approval_percentage: None,
                requires_manager_approval: true,
                approver_sequence_matters: true,
                approver_ids: vec![UserId::from_uuid(FINANCE_ID)],
            },
        )
        .await?;
    println!("  Created rule: {} ({})", rule.name, rule.id);
    Ok(())
}
