//! PostgreSQL-backed `FailedJobRepository` implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{FailedJobRepository, FailedJobRepositoryError};
use crate::domain::{FailedJob, FailedJobId, NewFailedJob};

use super::diesel_basic_error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::models::{FailedJobRow, NewFailedJobRow};
use super::pool::{DbPool, PoolError};
use super::schema::failed_jobs;

/// Diesel-backed implementation of the failed-job repository port.
#[derive(Clone)]
pub struct DieselFailedJobRepository {
    pool: DbPool,
}

impl DieselFailedJobRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> FailedJobRepositoryError {
    map_basic_pool_error(error, FailedJobRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> FailedJobRepositoryError {
    map_basic_diesel_error(
        error,
        FailedJobRepositoryError::query,
        FailedJobRepositoryError::connection,
    )
}

fn decode(row: FailedJobRow) -> Result<FailedJob, FailedJobRepositoryError> {
    row.into_domain().map_err(FailedJobRepositoryError::query)
}

#[async_trait]
impl FailedJobRepository for DieselFailedJobRepository {
    async fn record(&self, job: &NewFailedJob) -> Result<FailedJobId, FailedJobRepositoryError> {
        let id = FailedJobId::random();
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::insert_into(failed_jobs::table)
            .values(&NewFailedJobRow {
                id: *id.as_uuid(),
                job_type: job.job_type.as_str(),
                event_data: &job.event_data,
                error_message: &job.error_message,
            })
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(id)
    }

    async fn list_open(&self) -> Result<Vec<FailedJob>, FailedJobRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<FailedJobRow> = failed_jobs::table
            .filter(failed_jobs::resolved_at.is_null())
            .order_by(failed_jobs::failed_at.desc())
            .select(FailedJobRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        rows.into_iter().map(decode).collect()
    }

    async fn find(&self, id: FailedJobId) -> Result<Option<FailedJob>, FailedJobRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<FailedJobRow> = failed_jobs::table
            .filter(failed_jobs::id.eq(*id.as_uuid()))
            .select(FailedJobRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(decode).transpose()
    }

    async fn resolve(
        &self,
        id: FailedJobId,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<bool, FailedJobRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let updated = diesel::update(
            failed_jobs::table
                .filter(failed_jobs::id.eq(*id.as_uuid()))
                .filter(failed_jobs::resolved_at.is_null()),
        )
        .set((
            failed_jobs::resolved_at.eq(Some(now)),
            failed_jobs::notes.eq(notes),
        ))
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;
        Ok(updated == 1)
    }
}
