//! Driven port for orders and their variants.
//!
//! Every state transition here is conditional at the storage layer. Methods
//! that return `bool` report whether the conditional write took effect.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    Order, OrderId, OrderStatus, OrderWithVariants, Purchase, PurchaseOutcome, ShareToken,
    SongVariant, UserId, VariantId, VariantResult,
};

use super::define_port_error;

define_port_error! {
    /// Persistence errors raised by order repository adapters.
    pub enum OrderRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "order repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "order repository query failed: {message}",
    }
}

/// Result of selecting a variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// The variant is now the only selected variant of its order.
    Selected(SongVariant),
    /// No such variant on an order owned by the caller.
    NotFound,
    /// The variant exists but has not completed.
    NotReady,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Write a purchase and its side effects in one transaction.
    ///
    /// A purchase whose `payment_session_id` is already recorded writes
    /// nothing and reports [`PurchaseOutcome::Duplicate`].
    async fn record_purchase(
        &self,
        purchase: &Purchase,
    ) -> Result<PurchaseOutcome, OrderRepositoryError>;

    /// Load an order regardless of owner.
    async fn find(&self, order_id: OrderId) -> Result<Option<Order>, OrderRepositoryError>;

    /// Load an order with its variants, only when `user_id` owns it.
    async fn find_owned(
        &self,
        order_id: OrderId,
        user_id: UserId,
    ) -> Result<Option<OrderWithVariants>, OrderRepositoryError>;

    /// Variants of an order sorted by `variant_number`.
    async fn variants(&self, order_id: OrderId) -> Result<Vec<SongVariant>, OrderRepositoryError>;

    /// Move `variant_id` from `pending` to `generating`, unless a sibling
    /// variant of the same order is already `generating` and started at or
    /// after `stale_before`.
    ///
    /// At most one concurrent caller observes `true`, and an order never has
    /// two fresh `generating` variants.
    async fn claim_variant(
        &self,
        variant_id: VariantId,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<bool, OrderRepositoryError>;

    /// Record the result of a claimed variant. Only `generating` rows change.
    async fn finish_variant(
        &self,
        variant_id: VariantId,
        result: VariantResult,
        now: DateTime<Utc>,
    ) -> Result<bool, OrderRepositoryError>;

    /// Move the order from `paid` to `generating`.
    async fn mark_generating(&self, order_id: OrderId) -> Result<bool, OrderRepositoryError>;

    /// Set a terminal status on an order that is still `paid` or
    /// `generating`.
    async fn settle(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<bool, OrderRepositoryError>;

    /// Make `variant_id` the only selected variant of an owned order.
    async fn select_variant(
        &self,
        order_id: OrderId,
        variant_id: VariantId,
        user_id: UserId,
    ) -> Result<SelectionOutcome, OrderRepositoryError>;

    /// A variant that is both selected and complete, by share token.
    async fn find_shared(
        &self,
        token: &ShareToken,
    ) -> Result<Option<SongVariant>, OrderRepositoryError>;

    /// Reset failed variants, and `generating` ones claimed before
    /// `stale_before`, back to `pending`. A terminal order returns to `paid`.
    ///
    /// Returns `None` when the order does not exist or is not owned by
    /// `owner` (when given), else the number of variants reset.
    async fn reset_order_variants(
        &self,
        order_id: OrderId,
        owner: Option<UserId>,
        stale_before: DateTime<Utc>,
    ) -> Result<Option<u32>, OrderRepositoryError>;

    /// Reset one variant under the same rules as
    /// [`OrderRepository::reset_order_variants`]. Returns the owning order
    /// and whether the variant changed, or `None` if it does not exist.
    async fn reset_variant(
        &self,
        variant_id: VariantId,
        stale_before: DateTime<Utc>,
    ) -> Result<Option<(OrderId, bool)>, OrderRepositoryError>;
}
