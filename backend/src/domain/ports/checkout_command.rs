//! Driving port for the four purchase flows and the free tweak.
//!
//! Errors returned here carry user-safe messages and are surfaced
//! verbatim.

use async_trait::async_trait;

use crate::domain::{CustomizationId, Error, OrderId, TweakAmendment, User};

/// Result of a base checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutResult {
    /// Pay on the processor's hosted page.
    Payment { url: String },
    /// A bundle credit paid for the order; go straight to generation.
    Redeemed { order_id: OrderId, redirect: String },
}

/// Hosted checkout page for a tweak, upsell or bundle purchase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutUrl {
    pub url: String,
}

/// The re-render order created by a free tweak.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeTweakReceipt {
    pub order_id: OrderId,
    pub redirect: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CheckoutCommand: Send + Sync {
    /// Buy a song for an owned customization, redeeming a credit when one
    /// is available.
    async fn create_checkout(
        &self,
        user: &User,
        customization_id: CustomizationId,
    ) -> Result<CheckoutResult, Error>;

    async fn create_bundle_checkout(&self, user: &User, tier_id: &str) -> Result<CheckoutUrl, Error>;

    /// Pay for the second tweak of an owned order.
    async fn create_tweak_checkout(
        &self,
        user: &User,
        order_id: OrderId,
        amendment: TweakAmendment,
    ) -> Result<CheckoutUrl, Error>;

    /// Pay for a fourth variant on an owned order.
    async fn create_upsell_checkout(&self, user: &User, order_id: OrderId)
    -> Result<CheckoutUrl, Error>;

    /// Use the free first tweak of an owned order.
    async fn apply_free_tweak(
        &self,
        user: &User,
        order_id: OrderId,
        amendment: TweakAmendment,
    ) -> Result<FreeTweakReceipt, Error>;
}
