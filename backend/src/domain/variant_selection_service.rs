//! Choosing the favourite take of an order.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::error_mapping::{map_customization_error, map_order_error};
use super::ports::{
    CustomizationRepository, OrderRepository, SelectionOutcome, SelectionReceipt,
    VariantSelectionCommand,
};
use super::{Error, OrderId, UserId, VariantId};

/// Service implementing [`VariantSelectionCommand`].
///
/// The repository swaps the selection in one transaction, so an order never
/// has two selected variants.
#[derive(Clone)]
pub struct VariantSelectionService {
    orders: Arc<dyn OrderRepository>,
    customizations: Arc<dyn CustomizationRepository>,
}

impl VariantSelectionService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        customizations: Arc<dyn CustomizationRepository>,
    ) -> Self {
        Self {
            orders,
            customizations,
        }
    }
}

#[async_trait]
impl VariantSelectionCommand for VariantSelectionService {
    async fn select_variant(
        &self,
        order_id: OrderId,
        variant_id: VariantId,
        user_id: UserId,
    ) -> Result<SelectionReceipt, Error> {
        let variant = match self
            .orders
            .select_variant(order_id, variant_id, user_id)
            .await
            .map_err(map_order_error)?
        {
            SelectionOutcome::Selected(variant) => variant,
            SelectionOutcome::NotFound => return Err(Error::not_found("variant not found")),
            SelectionOutcome::NotReady => return Err(Error::conflict("variant is not ready")),
        };
        info!(%order_id, %variant_id, "variant selected");

        let customization_id = self
            .orders
            .find(order_id)
            .await
            .map_err(map_order_error)?
            .and_then(|order| order.customization_id)
            .ok_or_else(|| Error::internal(format!("order {order_id} has no customization")))?;
        let customization = self
            .customizations
            .find(customization_id)
            .await
            .map_err(map_customization_error)?
            .ok_or_else(|| Error::internal(format!("customization {customization_id} missing")))?;

        Ok(SelectionReceipt {
            variant_id: variant.id,
            share_token: variant.share_token,
            recipient_name: customization.brief.recipient_name,
            author_name: customization.brief.author_name,
            occasion: customization.brief.occasion,
        })
    }
}
