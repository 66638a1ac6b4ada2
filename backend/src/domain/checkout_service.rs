//! Purchase flows: base song, bundle, paid tweak, upsell and free tweak.
//!
//! Prices always come from [`super::pricing`]. Every domain reference the
//! webhook needs later travels in [`CheckoutMetadata`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{error, info, warn};
use url::Url;

use super::error_mapping::{
    map_customization_error, map_gateway_error, map_order_error, map_purchase_rejection,
};
use super::order::MAX_VARIANTS_PER_ORDER;
use super::ports::{
    CheckoutCommand, CheckoutResult, CheckoutSessionRequest, CheckoutUrl, CustomizationRepository,
    EntitlementLedger, FreeTweakReceipt, OrderRepository, PaymentGateway, Redemption,
};
use super::pricing::{
    self, BASE_PRICE, CURRENCY, TWEAK_PRICE, UPSELL_PRICE, get_bundle_tier,
};
use super::{
    BundleId, CheckoutMetadata, Customization, CustomizationId, Error, OrderId,
    OrderWithVariants, PaymentMethod, Purchase, PurchaseKind, PurchaseOutcome, TweakAmendment,
    User,
};

/// Application URLs handed to the payment processor and returned to clients.
#[derive(Debug, Clone)]
pub struct CheckoutLinks {
    app_base: Url,
}

impl CheckoutLinks {
    pub fn new(app_base: Url) -> Self {
        Self { app_base }
    }

    /// Page that drives generation for `order_id`.
    pub fn generation_page(&self, order_id: OrderId) -> String {
        format!("{}/generate/{order_id}", self.base())
    }

    /// Processor redirect after payment; the placeholder is filled in by
    /// the processor.
    pub fn success(&self) -> String {
        format!("{}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}", self.base())
    }

    pub fn cancel(&self) -> String {
        format!("{}/checkout/cancelled", self.base())
    }

    fn base(&self) -> &str {
        self.app_base.as_str().trim_end_matches('/')
    }
}

/// Service implementing [`CheckoutCommand`].
#[derive(Clone)]
pub struct CheckoutService {
    customizations: Arc<dyn CustomizationRepository>,
    orders: Arc<dyn OrderRepository>,
    ledger: Arc<dyn EntitlementLedger>,
    gateway: Arc<dyn PaymentGateway>,
    links: CheckoutLinks,
}

impl CheckoutService {
    pub fn new(
        customizations: Arc<dyn CustomizationRepository>,
        orders: Arc<dyn OrderRepository>,
        ledger: Arc<dyn EntitlementLedger>,
        gateway: Arc<dyn PaymentGateway>,
        links: CheckoutLinks,
    ) -> Self {
        Self {
            customizations,
            orders,
            ledger,
            gateway,
            links,
        }
    }

    async fn owned_order(&self, user: &User, order_id: OrderId) -> Result<OrderWithVariants, Error> {
        self.orders
            .find_owned(order_id, user.id())
            .await
            .map_err(map_order_error)?
            .filter(|found| found.order.order_type.has_variants())
            .ok_or_else(|| Error::not_found("order not found"))
    }

    async fn open_session(
        &self,
        user: &User,
        product_name: String,
        amount_minor: i64,
        metadata: &CheckoutMetadata,
    ) -> Result<String, Error> {
        let request = CheckoutSessionRequest {
            product_name,
            amount_minor,
            currency: CURRENCY.to_owned(),
            customer_email: user.email().to_owned(),
            success_url: self.links.success(),
            cancel_url: self.links.cancel(),
            metadata: metadata.encode(),
        };
        let session = self
            .gateway
            .create_checkout_session(&request)
            .await
            .map_err(|err| {
                warn!(user_id = %user.id(), order_type = %metadata.order_type(), error = %err, "checkout session creation failed");
                map_gateway_error(err)
            })?;
        info!(
            user_id = %user.id(),
            order_type = %metadata.order_type(),
            session_id = %session.id,
            "created checkout session"
        );
        Ok(session.url)
    }

    /// Create the base order paid by `bundle_id`, handing the credit back
    /// if the order cannot be written.
    async fn redeem_base(
        &self,
        user: &User,
        customization: &Customization,
        bundle_id: BundleId,
    ) -> Result<CheckoutResult, Error> {
        let purchase = Purchase {
            user_id: user.id(),
            payment_session_id: None,
            amount_minor: 0,
            currency: CURRENCY.to_owned(),
            payment_method: PaymentMethod::BundleCredit,
            kind: PurchaseKind::Base {
                customization_id: customization.id,
                occasion_date: customization.brief.occasion_date,
            },
        };
        let failure = match self.orders.record_purchase(&purchase).await {
            Ok(PurchaseOutcome::Created { order_id, .. }) => {
                info!(%order_id, %bundle_id, user_id = %user.id(), "created order from bundle credit");
                return Ok(CheckoutResult::Redeemed {
                    order_id,
                    redirect: self.links.generation_page(order_id),
                });
            }
            Ok(PurchaseOutcome::Rejected(rejection)) => map_purchase_rejection(rejection),
            Ok(PurchaseOutcome::Duplicate { order_id, .. }) => {
                Error::internal(format!("credit purchase collided with order {order_id}"))
            }
            Err(err) => map_order_error(err),
        };
        if let Err(restore_error) = self.ledger.restore(bundle_id).await {
            error!(%bundle_id, user_id = %user.id(), error = %restore_error, "bundle credit lost after failed order");
        }
        Err(failure)
    }
}

fn checked(amount: i64, valid: bool) -> Result<i64, Error> {
    if valid {
        Ok(amount)
    } else {
        Err(Error::internal(format!("price table rejected amount {amount}")))
    }
}

#[async_trait]
impl CheckoutCommand for CheckoutService {
    async fn create_checkout(
        &self,
        user: &User,
        customization_id: CustomizationId,
    ) -> Result<CheckoutResult, Error> {
        let customization = self
            .customizations
            .find_owned(customization_id, user.id())
            .await
            .map_err(map_customization_error)?
            .ok_or_else(|| Error::not_found("customisation not found"))?;

        if self.ledger.balance(user.id()).await? > 0 {
            match self.ledger.redeem(user.id()).await? {
                Redemption::Redeemed(bundle_id) => {
                    return self.redeem_base(user, &customization, bundle_id).await;
                }
                Redemption::Unavailable => {
                    info!(user_id = %user.id(), "credit taken concurrently; using paid checkout");
                }
            }
        }

        let amount = checked(BASE_PRICE, pricing::validate_base_price(BASE_PRICE))?;
        let metadata = CheckoutMetadata::Base {
            user_id: user.id(),
            email: user.email().to_owned(),
            customization_id,
        };
        let product = format!(
            "Personalised {} song for {}",
            customization.brief.occasion.label(),
            customization.brief.recipient_name
        );
        let url = self.open_session(user, product, amount, &metadata).await?;
        Ok(CheckoutResult::Payment { url })
    }

    async fn create_bundle_checkout(&self, user: &User, tier_id: &str) -> Result<CheckoutUrl, Error> {
        let tier = get_bundle_tier(tier_id).ok_or_else(|| {
            Error::invalid_request("unknown bundle tier").with_details(json!({ "field": "tierId" }))
        })?;
        let amount = checked(tier.price, pricing::validate_bundle_price(tier.id, tier.price))?;
        let metadata = CheckoutMetadata::Bundle {
            user_id: user.id(),
            tier_id: tier.id.to_owned(),
            quantity: tier.quantity,
        };
        let product = format!("Song bundle ({} songs)", tier.quantity);
        let url = self.open_session(user, product, amount, &metadata).await?;
        Ok(CheckoutUrl { url })
    }

    async fn create_tweak_checkout(
        &self,
        user: &User,
        order_id: OrderId,
        amendment: TweakAmendment,
    ) -> Result<CheckoutUrl, Error> {
        let owned = self.owned_order(user, order_id).await?;
        if owned.order.tweak_count < 1 {
            return Err(Error::conflict("use your free tweak before buying another"));
        }
        let amount = checked(TWEAK_PRICE, pricing::validate_tweak_price(TWEAK_PRICE))?;
        let metadata = CheckoutMetadata::Tweak {
            user_id: user.id(),
            original_order_id: order_id,
            amendment,
        };
        let url = self
            .open_session(user, "Song tweak".to_owned(), amount, &metadata)
            .await?;
        Ok(CheckoutUrl { url })
    }

    async fn create_upsell_checkout(
        &self,
        user: &User,
        order_id: OrderId,
    ) -> Result<CheckoutUrl, Error> {
        let owned = self.owned_order(user, order_id).await?;
        if owned.variants.len() >= usize::from(MAX_VARIANTS_PER_ORDER) {
            return Err(Error::conflict(
                "this order already has the maximum number of variants",
            ));
        }
        let amount = checked(UPSELL_PRICE, pricing::validate_upsell_price(UPSELL_PRICE))?;
        let metadata = CheckoutMetadata::Upsell {
            user_id: user.id(),
            original_order_id: order_id,
            variant_number: MAX_VARIANTS_PER_ORDER,
        };
        let url = self
            .open_session(user, "Bonus song variant".to_owned(), amount, &metadata)
            .await?;
        Ok(CheckoutUrl { url })
    }

    async fn apply_free_tweak(
        &self,
        user: &User,
        order_id: OrderId,
        amendment: TweakAmendment,
    ) -> Result<FreeTweakReceipt, Error> {
        let owned = self.owned_order(user, order_id).await?;
        if owned.order.tweak_count != 0 {
            return Err(Error::conflict("the free tweak for this order has been used"));
        }
        let purchase = Purchase {
            user_id: user.id(),
            payment_session_id: None,
            amount_minor: 0,
            currency: CURRENCY.to_owned(),
            payment_method: PaymentMethod::Free,
            kind: PurchaseKind::Tweak {
                original_order_id: order_id,
                amendment,
                free: true,
            },
        };
        match self
            .orders
            .record_purchase(&purchase)
            .await
            .map_err(map_order_error)?
        {
            PurchaseOutcome::Created {
                order_id: tweak_order_id,
                ..
            } => {
                info!(original_order_id = %order_id, %tweak_order_id, "applied free tweak");
                Ok(FreeTweakReceipt {
                    order_id: tweak_order_id,
                    redirect: self.links.generation_page(tweak_order_id),
                })
            }
            PurchaseOutcome::Rejected(rejection) => Err(map_purchase_rejection(rejection)),
            PurchaseOutcome::Duplicate { order_id, .. } => Err(Error::internal(format!(
                "free tweak collided with order {order_id}"
            ))),
        }
    }
}

#[cfg(test)]
#[path = "checkout_service_tests.rs"]
mod tests;
