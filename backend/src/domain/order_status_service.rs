//! Owner-scoped order projection for client polling.

use std::sync::Arc;

use async_trait::async_trait;

use super::error_mapping::{map_order_error, map_storage_error};
use super::ports::{AudioStorage, OrderRepository, OrderStatusQuery, OrderStatusView};
use super::{Error, GenerationStatus, OrderId, UserId, VariantId};

/// Service implementing [`OrderStatusQuery`].
#[derive(Clone)]
pub struct OrderStatusService {
    orders: Arc<dyn OrderRepository>,
    storage: Arc<dyn AudioStorage>,
}

impl OrderStatusService {
    pub fn new(orders: Arc<dyn OrderRepository>, storage: Arc<dyn AudioStorage>) -> Self {
        Self { orders, storage }
    }
}

#[async_trait]
impl OrderStatusQuery for OrderStatusService {
    async fn order_status(
        &self,
        order_id: OrderId,
        user_id: UserId,
    ) -> Result<OrderStatusView, Error> {
        self.orders
            .find_owned(order_id, user_id)
            .await
            .map_err(map_order_error)?
            .map(OrderStatusView::from)
            .ok_or_else(|| Error::not_found("order not found"))
    }

    async fn variant_audio_url(
        &self,
        order_id: OrderId,
        variant_id: VariantId,
        user_id: UserId,
    ) -> Result<String, Error> {
        let owned = self
            .orders
            .find_owned(order_id, user_id)
            .await
            .map_err(map_order_error)?
            .ok_or_else(|| Error::not_found("order not found"))?;
        let variant = owned
            .variants
            .iter()
            .find(|variant| variant.id == variant_id)
            .ok_or_else(|| Error::not_found("variant not found"))?;
        if variant.generation_status != GenerationStatus::Complete {
            return Err(Error::conflict("variant is not ready"));
        }
        self.storage
            .signed_url(&variant.storage_path)
            .await
            .map_err(map_storage_error)
    }
}
