//! PostgreSQL-backed `BundleRepository` implementation.
//!
//! Redemption is one statement: the oldest bundle with credit is locked with
//! `FOR UPDATE` and decremented with a guard on `quantity_remaining > 0`, so
//! two concurrent redemptions can never take the same last credit. A
//! redemption blocked on a locked row waits for it rather than skipping it;
//! if that row is emptied meanwhile the statement returns nothing and the
//! ledger retries against the next bundle.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sql_types::{Int4, Uuid as SqlUuid};
use diesel::{QueryableByName, sql_query};
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::domain::ports::{BundleRepository, BundleRepositoryError};
use crate::domain::{BundleId, UserId};

use super::diesel_basic_error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::pool::{DbPool, PoolError};
use super::schema::bundles;

const REDEEM_SQL: &str = r"
UPDATE bundles
SET quantity_remaining = quantity_remaining - 1
WHERE id = (
    SELECT id FROM bundles
    WHERE user_id = $1 AND quantity_remaining > 0
    ORDER BY created_at, id
    LIMIT 1
    FOR UPDATE
)
AND quantity_remaining > 0
RETURNING id, quantity_remaining
";

#[derive(Debug, QueryableByName)]
struct RedeemedRow {
    #[diesel(sql_type = SqlUuid)]
    id: Uuid,
    #[diesel(sql_type = Int4)]
    #[expect(dead_code, reason = "returned for log context only")]
    quantity_remaining: i32,
}

/// Diesel-backed implementation of the bundle repository port.
#[derive(Clone)]
pub struct DieselBundleRepository {
    pool: DbPool,
}

impl DieselBundleRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> BundleRepositoryError {
    map_basic_pool_error(error, BundleRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> BundleRepositoryError {
    map_basic_diesel_error(
        error,
        BundleRepositoryError::query,
        BundleRepositoryError::connection,
    )
}

#[async_trait]
impl BundleRepository for DieselBundleRepository {
    async fn balance(&self, user_id: UserId) -> Result<u32, BundleRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let total: Option<i64> = bundles::table
            .filter(bundles::user_id.eq(*user_id.as_uuid()))
            .select(diesel::dsl::sum(bundles::quantity_remaining))
            .first(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(total.map_or(0, |total| u32::try_from(total).unwrap_or(0)))
    }

    async fn redeem(&self, user_id: UserId) -> Result<Option<BundleId>, BundleRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<RedeemedRow> = sql_query(REDEEM_SQL)
            .bind::<SqlUuid, _>(*user_id.as_uuid())
            .get_result(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(|row| BundleId::from_uuid(row.id)))
    }

    async fn restore(&self, bundle_id: BundleId) -> Result<(), BundleRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::update(
            bundles::table
                .filter(bundles::id.eq(*bundle_id.as_uuid()))
                .filter(bundles::quantity_remaining.lt(bundles::quantity_total)),
        )
        .set(bundles::quantity_remaining.eq(bundles::quantity_remaining + 1))
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;
        Ok(())
    }
}
