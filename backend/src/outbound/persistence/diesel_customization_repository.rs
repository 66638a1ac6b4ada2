//! PostgreSQL-backed `CustomizationRepository` implementation.
//!
//! A brief is returned together with the newest row of
//! `customization_tweaks`, which overrides its free-text fields.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::domain::ports::{CustomizationRepository, CustomizationRepositoryError};
use crate::domain::{
    Customization, CustomizationBrief, CustomizationId, TweakAmendment, UserId,
};

use super::diesel_basic_error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::models::{CustomizationRow, CustomizationTweakRow, NewCustomizationRow};
use super::pool::{DbPool, PoolError};
use super::schema::{customization_tweaks, customizations};

/// Diesel-backed implementation of the customization repository port.
#[derive(Clone)]
pub struct DieselCustomizationRepository {
    pool: DbPool,
}

impl DieselCustomizationRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> CustomizationRepositoryError {
    map_basic_pool_error(error, CustomizationRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> CustomizationRepositoryError {
    map_basic_diesel_error(
        error,
        CustomizationRepositoryError::query,
        CustomizationRepositoryError::connection,
    )
}

async fn latest_tweak(
    conn: &mut AsyncPgConnection,
    id: CustomizationId,
) -> Result<Option<TweakAmendment>, CustomizationRepositoryError> {
    let row: Option<CustomizationTweakRow> = customization_tweaks::table
        .filter(customization_tweaks::customization_id.eq(*id.as_uuid()))
        .order_by(customization_tweaks::created_at.desc())
        .select(CustomizationTweakRow::as_select())
        .first(conn)
        .await
        .optional()
        .map_err(map_diesel_error)?;
    Ok(row.map(TweakAmendment::from))
}

async fn load(
    conn: &mut AsyncPgConnection,
    id: CustomizationId,
    owner: Option<UserId>,
) -> Result<Option<Customization>, CustomizationRepositoryError> {
    let row: Option<CustomizationRow> = customizations::table
        .filter(customizations::id.eq(*id.as_uuid()))
        .select(CustomizationRow::as_select())
        .first(conn)
        .await
        .optional()
        .map_err(map_diesel_error)?;
    let Some(row) = row.filter(|row| owner.is_none_or(|owner| *owner.as_uuid() == row.user_id))
    else {
        return Ok(None);
    };
    let tweak = latest_tweak(conn, id).await?;
    row.into_domain(tweak)
        .map(Some)
        .map_err(CustomizationRepositoryError::query)
}

#[async_trait]
impl CustomizationRepository for DieselCustomizationRepository {
    async fn create(
        &self,
        user_id: UserId,
        brief: &CustomizationBrief,
    ) -> Result<Customization, CustomizationRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: CustomizationRow = diesel::insert_into(customizations::table)
            .values(&NewCustomizationRow::from_brief(
                CustomizationId::random(),
                user_id,
                brief,
            ))
            .returning(CustomizationRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        row.into_domain(None)
            .map_err(CustomizationRepositoryError::query)
    }

    async fn find(
        &self,
        id: CustomizationId,
    ) -> Result<Option<Customization>, CustomizationRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        load(&mut conn, id, None).await
    }

    async fn find_owned(
        &self,
        id: CustomizationId,
        user_id: UserId,
    ) -> Result<Option<Customization>, CustomizationRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        load(&mut conn, id, Some(user_id)).await
    }
}
