//! Driving port for the pollable order projection.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    Error, GenerationStatus, OrderId, OrderStatus, OrderWithVariants, UserId, VariantId,
};

/// One variant as shown to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantStatusView {
    pub id: VariantId,
    pub variant_number: u8,
    pub generation_status: GenerationStatus,
    pub storage_path: String,
    pub selected: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

/// An order and its variants as shown to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderStatusView {
    pub order_id: OrderId,
    pub order_status: OrderStatus,
    pub tweak_count: u8,
    pub variants: Vec<VariantStatusView>,
}

impl From<OrderWithVariants> for OrderStatusView {
    fn from(value: OrderWithVariants) -> Self {
        Self {
            order_id: value.order.id,
            order_status: value.order.status,
            tweak_count: value.order.tweak_count,
            variants: value
                .variants
                .into_iter()
                .map(|variant| VariantStatusView {
                    id: variant.id,
                    variant_number: variant.variant_number,
                    generation_status: variant.generation_status,
                    storage_path: variant.storage_path,
                    selected: variant.selected,
                    completed_at: variant.completed_at,
                })
                .collect(),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderStatusQuery: Send + Sync {
    /// Project an owned order. Foreign and missing orders are both
    /// `not_found`.
    async fn order_status(&self, order_id: OrderId, user_id: UserId)
    -> Result<OrderStatusView, Error>;

    /// Signed URL for a completed variant of an owned order.
    async fn variant_audio_url(
        &self,
        order_id: OrderId,
        variant_id: VariantId,
        user_id: UserId,
    ) -> Result<String, Error>;
}
