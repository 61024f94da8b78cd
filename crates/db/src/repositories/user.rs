//! User repository for database operations.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Unchanged, ColumnTrait, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, Set,
};

use expensa_shared::UserRole;
use expensa_shared::types::{CompanyId, UserId};

use crate::entities::users;

/// Input for creating a user.
#[derive(Debug, Clone)]
pub struct CreateUserInput {
    /// Fixed ID, or a fresh one when `None`.
    pub id: Option<UserId>,
    /// Unique email address.
    pub email: String,
    /// Display name.
    pub full_name: String,
    /// Role inside the company.
    pub role: UserRole,
    /// Reporting manager, used by rules that require manager approval.
    pub reporting_manager_id: Option<UserId>,
}

/// User repository for CRUD operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    db: DatabaseConnection,
}

impl UserRepository {
    /// Creates a new user repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Finds a user by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: UserId) -> Result<Option<users::Model>, DbErr> {
        users::Entity::find_by_id(id.into_inner()).one(&self.db).await
    }

    /// Finds a user by email.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<users::Model>, DbErr> {
        users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.db)
            .await
    }

    /// Creates a user inside a company.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails.
    pub async fn create(
        &self,
        company_id: CompanyId,
        input: CreateUserInput,
    ) -> Result<users::Model, DbErr> {
        let now = Utc::now().into();
        users::ActiveModel {
            id: Set(input.id.unwrap_or_else(UserId::new).into_inner()),
            company_id: Set(company_id.into_inner()),
            email: Set(input.email.to_lowercase()),
            full_name: Set(input.full_name),
            role: Set(input.role.into()),
            reporting_manager_id: Set(input.reporting_manager_id.map(UserId::into_inner)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await
    }

    /// Sets or clears the reporting manager of a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn set_reporting_manager(
        &self,
        user_id: UserId,
        manager_id: Option<UserId>,
    ) -> Result<users::Model, DbErr> {
        users::ActiveModel {
            id: Unchanged(user_id.into_inner()),
            reporting_manager_id: Set(manager_id.map(UserId::into_inner)),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        }
        .update(&self.db)
        .await
    }
}
