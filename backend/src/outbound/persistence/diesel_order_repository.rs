//! PostgreSQL-backed `OrderRepository` implementation using Diesel ORM.
//!
//! Status transitions are single conditional `UPDATE`s: the `WHERE` clause
//! carries the expected current state, and the affected row count tells the
//! caller whether it won. Purchases and selection swaps run in transactions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use tracing::debug;

use crate::domain::ports::{OrderRepository, OrderRepositoryError, SelectionOutcome};
use crate::domain::{
    GenerationStatus, Order, OrderId, OrderStatus, OrderWithVariants, Purchase, PurchaseOutcome,
    ShareToken, SongVariant, UserId, VariantId, VariantResult,
};

use super::diesel_basic_error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::diesel_order_purchase::{PurchaseTxError, write_purchase};
use super::models::{OrderRow, SongVariantRow};
use super::pool::{DbPool, PoolError};
use super::schema::{orders, song_variants};

/// Diesel-backed implementation of the order repository port.
#[derive(Clone)]
pub struct DieselOrderRepository {
    pool: DbPool,
}

impl DieselOrderRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> OrderRepositoryError {
    map_basic_pool_error(error, OrderRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> OrderRepositoryError {
    map_basic_diesel_error(
        error,
        OrderRepositoryError::query,
        OrderRepositoryError::connection,
    )
}

fn map_tx_error(error: PurchaseTxError) -> OrderRepositoryError {
    match error {
        PurchaseTxError::Diesel(error) => map_diesel_error(error),
        PurchaseTxError::Decode(message) => OrderRepositoryError::query(message),
    }
}

fn decode_order(row: OrderRow) -> Result<Order, OrderRepositoryError> {
    row.into_domain().map_err(OrderRepositoryError::query)
}

fn decode_variants(rows: Vec<SongVariantRow>) -> Result<Vec<SongVariant>, OrderRepositoryError> {
    rows.into_iter()
        .map(|row| row.into_domain().map_err(OrderRepositoryError::query))
        .collect()
}

const TERMINAL_STATUSES: [&str; 2] = [
    OrderStatus::Completed.as_str(),
    OrderStatus::Failed.as_str(),
];

/// Filter matching variants a reset may move back to `pending`: failed
/// ones, and generating ones claimed before `stale_before` (or never
/// stamped).
macro_rules! resettable {
    ($stale_before:expr) => {
        song_variants::generation_status
            .eq(GenerationStatus::Failed.as_str())
            .or(song_variants::generation_status
                .eq(GenerationStatus::Generating.as_str())
                .and(
                    song_variants::generation_started_at
                        .is_null()
                        .or(song_variants::generation_started_at.lt($stale_before)),
                ))
    };
}

/// Filter matching variants that are being rendered right now: `generating`
/// and claimed at or after `stale_before`.
macro_rules! in_flight {
    ($stale_before:expr) => {
        song_variants::generation_status
            .eq(GenerationStatus::Generating.as_str())
            .and(song_variants::generation_started_at.ge($stale_before))
    };
}

/// Claim `variant_id` while holding its order's row lock, so two claims on
/// different variants of one order are serialised and the second sees the
/// first's committed `generating` row.
async fn claim_under_order_lock(
    conn: &mut AsyncPgConnection,
    variant_id: VariantId,
    now: DateTime<Utc>,
    stale_before: DateTime<Utc>,
) -> Result<bool, diesel::result::Error> {
    let variant = *variant_id.as_uuid();
    let Some(order_id) = song_variants::table
        .filter(song_variants::id.eq(variant))
        .select(song_variants::order_id)
        .first::<uuid::Uuid>(conn)
        .await
        .optional()?
    else {
        return Ok(false);
    };
    orders::table
        .filter(orders::id.eq(order_id))
        .select(orders::id)
        .for_update()
        .first::<uuid::Uuid>(conn)
        .await?;

    let sibling_in_flight: bool = diesel::select(diesel::dsl::exists(
        song_variants::table
            .filter(song_variants::order_id.eq(order_id))
            .filter(song_variants::id.ne(variant))
            .filter(in_flight!(stale_before)),
    ))
    .get_result(conn)
    .await?;
    if sibling_in_flight {
        return Ok(false);
    }

    let claimed = diesel::update(
        song_variants::table
            .filter(song_variants::id.eq(variant))
            .filter(song_variants::generation_status.eq(GenerationStatus::Pending.as_str())),
    )
    .set((
        song_variants::generation_status.eq(GenerationStatus::Generating.as_str()),
        song_variants::generation_started_at.eq(Some(now)),
    ))
    .execute(conn)
    .await?;
    Ok(claimed == 1)
}

/// Reset the matching variants of one order and reopen the order if it had
/// settled. Returns how many variants changed.
async fn reset_where(
    conn: &mut AsyncPgConnection,
    order_id: OrderId,
    variant_id: Option<VariantId>,
    stale_before: DateTime<Utc>,
) -> Result<usize, diesel::result::Error> {
    let mut target = song_variants::table
        .filter(song_variants::order_id.eq(*order_id.as_uuid()))
        .filter(resettable!(stale_before))
        .into_boxed();
    if let Some(variant_id) = variant_id {
        target = target.filter(song_variants::id.eq(*variant_id.as_uuid()));
    }
    let ids: Vec<uuid::Uuid> = target.select(song_variants::id).load(conn).await?;
    if ids.is_empty() {
        return Ok(0);
    }
    let reset = diesel::update(song_variants::table.filter(song_variants::id.eq_any(&ids)))
        .set((
            song_variants::generation_status.eq(GenerationStatus::Pending.as_str()),
            song_variants::generation_started_at.eq(None::<DateTime<Utc>>),
            song_variants::completed_at.eq(None::<DateTime<Utc>>),
        ))
        .execute(conn)
        .await?;
    diesel::update(
        orders::table
            .filter(orders::id.eq(*order_id.as_uuid()))
            .filter(orders::status.eq_any(TERMINAL_STATUSES)),
    )
    .set(orders::status.eq(OrderStatus::Paid.as_str()))
    .execute(conn)
    .await?;
    Ok(reset)
}

#[async_trait]
impl OrderRepository for DieselOrderRepository {
    async fn record_purchase(
        &self,
        purchase: &Purchase,
    ) -> Result<PurchaseOutcome, OrderRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let outcome = conn
            .transaction::<_, PurchaseTxError, _>(|conn| {
                async move { write_purchase(conn, purchase).await }.scope_boxed()
            })
            .await
            .map_err(map_tx_error)?;
        debug!(?outcome, order_type = %purchase.kind.order_type(), "purchase recorded");
        Ok(outcome)
    }

    async fn find(&self, order_id: OrderId) -> Result<Option<Order>, OrderRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<OrderRow> = orders::table
            .filter(orders::id.eq(*order_id.as_uuid()))
            .select(OrderRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(decode_order).transpose()
    }

    async fn find_owned(
        &self,
        order_id: OrderId,
        user_id: UserId,
    ) -> Result<Option<OrderWithVariants>, OrderRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<OrderRow> = orders::table
            .filter(orders::id.eq(*order_id.as_uuid()))
            .filter(orders::user_id.eq(*user_id.as_uuid()))
            .select(OrderRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        let Some(row) = row else {
            return Ok(None);
        };
        let variant_rows: Vec<SongVariantRow> = song_variants::table
            .filter(song_variants::order_id.eq(*order_id.as_uuid()))
            .order_by(song_variants::variant_number)
            .select(SongVariantRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(Some(OrderWithVariants {
            order: decode_order(row)?,
            variants: decode_variants(variant_rows)?,
        }))
    }

    async fn variants(&self, order_id: OrderId) -> Result<Vec<SongVariant>, OrderRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<SongVariantRow> = song_variants::table
            .filter(song_variants::order_id.eq(*order_id.as_uuid()))
            .order_by(song_variants::variant_number)
            .select(SongVariantRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        decode_variants(rows)
    }

    async fn claim_variant(
        &self,
        variant_id: VariantId,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<bool, OrderRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let claimed = conn
            .transaction::<_, diesel::result::Error, _>(|conn| {
                async move { claim_under_order_lock(conn, variant_id, now, stale_before).await }
                    .scope_boxed()
            })
            .await
            .map_err(map_diesel_error)?;
        debug!(%variant_id, claimed, "variant claim");
        Ok(claimed)
    }

    async fn finish_variant(
        &self,
        variant_id: VariantId,
        result: VariantResult,
        now: DateTime<Utc>,
    ) -> Result<bool, OrderRepositoryError> {
        let (status, duration_ms) = match result {
            VariantResult::Complete { duration_ms } => (
                GenerationStatus::Complete,
                Some(i32::try_from(duration_ms).unwrap_or(i32::MAX)),
            ),
            VariantResult::Failed => (GenerationStatus::Failed, None),
        };
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let finished = diesel::update(
            song_variants::table
                .filter(song_variants::id.eq(*variant_id.as_uuid()))
                .filter(song_variants::generation_status.eq(GenerationStatus::Generating.as_str())),
        )
        .set((
            song_variants::generation_status.eq(status.as_str()),
            song_variants::duration_ms.eq(duration_ms),
            song_variants::completed_at.eq(Some(now)),
        ))
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;
        Ok(finished == 1)
    }

    async fn mark_generating(&self, order_id: OrderId) -> Result<bool, OrderRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let updated = diesel::update(
            orders::table
                .filter(orders::id.eq(*order_id.as_uuid()))
                .filter(orders::status.eq(OrderStatus::Paid.as_str())),
        )
        .set(orders::status.eq(OrderStatus::Generating.as_str()))
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;
        Ok(updated == 1)
    }

    async fn settle(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<bool, OrderRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let updated = diesel::update(
            orders::table
                .filter(orders::id.eq(*order_id.as_uuid()))
                .filter(orders::status.ne_all(TERMINAL_STATUSES)),
        )
        .set(orders::status.eq(status.as_str()))
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;
        Ok(updated == 1)
    }

    async fn select_variant(
        &self,
        order_id: OrderId,
        variant_id: VariantId,
        user_id: UserId,
    ) -> Result<SelectionOutcome, OrderRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            async move {
                let owned: Option<uuid::Uuid> = orders::table
                    .filter(orders::id.eq(*order_id.as_uuid()))
                    .filter(orders::user_id.eq(*user_id.as_uuid()))
                    .for_update()
                    .select(orders::id)
                    .first(conn)
                    .await
                    .optional()?;
                if owned.is_none() {
                    return Ok(None);
                }
                let row: Option<SongVariantRow> = song_variants::table
                    .filter(song_variants::id.eq(*variant_id.as_uuid()))
                    .filter(song_variants::order_id.eq(*order_id.as_uuid()))
                    .select(SongVariantRow::as_select())
                    .first(conn)
                    .await
                    .optional()?;
                let Some(row) = row else {
                    return Ok(None);
                };
                if row.generation_status != GenerationStatus::Complete.as_str() {
                    return Ok(Some(row));
                }
                // Clear the old choice first; a partial unique index allows
                // one selected row per order.
                diesel::update(
                    song_variants::table
                        .filter(song_variants::order_id.eq(*order_id.as_uuid()))
                        .filter(song_variants::id.ne(*variant_id.as_uuid()))
                        .filter(song_variants::selected.eq(true)),
                )
                .set(song_variants::selected.eq(false))
                .execute(conn)
                .await?;
                let selected = diesel::update(
                    song_variants::table.filter(song_variants::id.eq(*variant_id.as_uuid())),
                )
                .set(song_variants::selected.eq(true))
                .returning(SongVariantRow::as_returning())
                .get_result(conn)
                .await?;
                Ok(Some(selected))
            }
            .scope_boxed()
        })
        .await
        .map_err(map_diesel_error)?
        .map_or(Ok(SelectionOutcome::NotFound), |row| {
            let variant = row.into_domain().map_err(OrderRepositoryError::query)?;
            Ok(if variant.generation_status == GenerationStatus::Complete {
                SelectionOutcome::Selected(variant)
            } else {
                SelectionOutcome::NotReady
            })
        })
    }

    async fn find_shared(
        &self,
        token: &ShareToken,
    ) -> Result<Option<SongVariant>, OrderRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<SongVariantRow> = song_variants::table
            .filter(song_variants::share_token.eq(token.as_str()))
            .filter(song_variants::selected.eq(true))
            .filter(song_variants::generation_status.eq(GenerationStatus::Complete.as_str()))
            .select(SongVariantRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(|row| row.into_domain().map_err(OrderRepositoryError::query))
            .transpose()
    }

    async fn reset_order_variants(
        &self,
        order_id: OrderId,
        owner: Option<UserId>,
        stale_before: DateTime<Utc>,
    ) -> Result<Option<u32>, OrderRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let reset = conn
            .transaction::<_, diesel::result::Error, _>(|conn| {
                async move {
                    let found: Option<uuid::Uuid> = orders::table
                        .filter(orders::id.eq(*order_id.as_uuid()))
                        .for_update()
                        .select(orders::user_id)
                        .first(conn)
                        .await
                        .optional()?;
                    let visible = found.is_some_and(|stored_owner| {
                        owner.is_none_or(|owner| *owner.as_uuid() == stored_owner)
                    });
                    if !visible {
                        return Ok(None);
                    }
                    reset_where(conn, order_id, None, stale_before)
                        .await
                        .map(Some)
                }
                .scope_boxed()
            })
            .await
            .map_err(map_diesel_error)?;
        Ok(reset.map(|count| u32::try_from(count).unwrap_or(u32::MAX)))
    }

    async fn reset_variant(
        &self,
        variant_id: VariantId,
        stale_before: DateTime<Utc>,
    ) -> Result<Option<(OrderId, bool)>, OrderRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            async move {
                let order_id: Option<uuid::Uuid> = song_variants::table
                    .filter(song_variants::id.eq(*variant_id.as_uuid()))
                    .select(song_variants::order_id)
                    .first(conn)
                    .await
                    .optional()?;
                let Some(order_id) = order_id.map(OrderId::from_uuid) else {
                    return Ok(None);
                };
                let changed = reset_where(conn, order_id, Some(variant_id), stale_before).await?;
                Ok(Some((order_id, changed > 0)))
            }
            .scope_boxed()
        })
        .await
        .map_err(map_diesel_error)
    }
}

#[cfg(test)]
mod tests {
    //! Database-free coverage: error mapping and the reset predicate's SQL.
    use super::*;
    use diesel::debug_query;
    use diesel::pg::Pg;
    use rstest::rstest;

    #[rstest]
    fn decode_errors_become_query_errors() {
        let error = map_tx_error(PurchaseTxError::Decode("column status: bad".to_owned()));
        assert!(matches!(error, OrderRepositoryError::Query { .. }));
    }

    #[rstest]
    fn pool_errors_become_connection_errors() {
        let error = map_pool_error(PoolError::checkout("timed out"));
        assert_eq!(
            error,
            OrderRepositoryError::connection("timed out".to_owned())
        );
    }

    #[rstest]
    fn reset_predicate_covers_failed_and_stale_rows() {
        let query = song_variants::table
            .filter(resettable!(Utc::now()))
            .select(song_variants::id);
        let sql = debug_query::<Pg, _>(&query).to_string();
        assert!(sql.contains("\"generation_status\" = $1"), "{sql}");
        assert!(sql.contains("IS NULL"), "{sql}");
        assert!(sql.contains("\"generation_started_at\" < $"), "{sql}");
    }

    #[rstest]
    fn in_flight_predicate_ignores_stale_claims() {
        let query = song_variants::table
            .filter(in_flight!(Utc::now()))
            .select(song_variants::id);
        let sql = debug_query::<Pg, _>(&query).to_string();
        assert!(sql.contains("\"generation_status\" = $1"), "{sql}");
        assert!(sql.contains("\"generation_started_at\" >= $2"), "{sql}");
    }
}
