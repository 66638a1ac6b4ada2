//! Driving port for choosing the favourite take.

use async_trait::async_trait;

use crate::domain::{Error, Occasion, OrderId, ShareToken, UserId, VariantId};

/// What the UI needs right after a selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionReceipt {
    pub variant_id: VariantId,
    pub share_token: ShareToken,
    pub recipient_name: String,
    pub author_name: String,
    pub occasion: Occasion,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VariantSelectionCommand: Send + Sync {
    async fn select_variant(
        &self,
        order_id: OrderId,
        variant_id: VariantId,
        user_id: UserId,
    ) -> Result<SelectionReceipt, Error>;
}
