//! Company repository for database operations.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait, Set};

use expensa_shared::types::CompanyId;

use crate::entities::companies;

/// Company repository. Provisioning happens outside the approval flow; this
/// covers the seeder and tests.
#[derive(Debug, Clone)]
pub struct CompanyRepository {
    db: DatabaseConnection,
}

impl CompanyRepository {
    /// Creates a new company repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Finds a company by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: CompanyId) -> Result<Option<companies::Model>, DbErr> {
        companies::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
    }

    /// Creates a company.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails.
    pub async fn create(
        &self,
        id: CompanyId,
        name: &str,
        default_currency: &str,
    ) -> Result<companies::Model, DbErr> {
        let now = Utc::now().into();
        companies::ActiveModel {
            id: Set(id.into_inner()),
            name: Set(name.to_string()),
            default_currency: Set(default_currency.to_uppercase()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await
    }
}
