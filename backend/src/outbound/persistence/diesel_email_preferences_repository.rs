//! PostgreSQL-backed `EmailPreferencesRepository` implementation.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{EmailPreferencesRepository, EmailPreferencesRepositoryError};
use crate::domain::{EmailPreferences, UserId};

use super::diesel_basic_error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::models::EmailPreferencesRow;
use super::pool::DbPool;
use super::schema::email_preferences;

/// Diesel-backed implementation of the e-mail preferences port.
#[derive(Clone)]
pub struct DieselEmailPreferencesRepository {
    pool: DbPool,
}

impl DieselEmailPreferencesRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EmailPreferencesRepository for DieselEmailPreferencesRepository {
    async fn find(
        &self,
        user_id: UserId,
    ) -> Result<Option<EmailPreferences>, EmailPreferencesRepositoryError> {
        let mut conn = self.pool.get().await.map_err(|error| {
            map_basic_pool_error(error, EmailPreferencesRepositoryError::connection)
        })?;
        let row: Option<EmailPreferencesRow> = email_preferences::table
            .filter(email_preferences::user_id.eq(*user_id.as_uuid()))
            .select(EmailPreferencesRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|error| {
                map_basic_diesel_error(
                    error,
                    EmailPreferencesRepositoryError::query,
                    EmailPreferencesRepositoryError::connection,
                )
            })?;
        Ok(row.map(EmailPreferences::from))
    }
}
