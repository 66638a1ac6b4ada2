//! Completed-checkout webhooks.
//!
//! Session metadata is the only link between a payment and the domain. A
//! delivery that cannot be turned into an order is recorded as a failed job
//! and acknowledged, so the processor stops retrying something that will
//! never succeed.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use super::error_mapping::{
    map_customization_error, map_failed_job_error, map_gateway_error, map_order_error,
    map_purchase_rejection,
};
use super::ports::{
    CustomizationRepository, FailedJobRepository, GenerationTrigger, OrderRepository,
    PaymentEventCommand, PaymentGateway, WebhookAck,
};
use super::pricing::{self, BASE_PRICE, CURRENCY, TWEAK_PRICE, UPSELL_PRICE, get_bundle_tier};
use super::{
    CheckoutMetadata, CompletedCheckout, Error, FailedJobType, NewFailedJob, OrderId,
    PaymentEventKind, PaymentMethod, Purchase, PurchaseKind, PurchaseOutcome,
};

/// Whether a checkout arrived from the processor or from an admin replay.
///
/// Webhook deliveries swallow unrecoverable failures into failed jobs;
/// replays report them to the administrator instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Webhook,
    Replay,
}

/// Service implementing [`PaymentEventCommand`].
#[derive(Clone)]
pub struct PaymentEventService {
    gateway: Arc<dyn PaymentGateway>,
    orders: Arc<dyn OrderRepository>,
    customizations: Arc<dyn CustomizationRepository>,
    failed_jobs: Arc<dyn FailedJobRepository>,
    trigger: Arc<dyn GenerationTrigger>,
}

impl PaymentEventService {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        orders: Arc<dyn OrderRepository>,
        customizations: Arc<dyn CustomizationRepository>,
        failed_jobs: Arc<dyn FailedJobRepository>,
        trigger: Arc<dyn GenerationTrigger>,
    ) -> Self {
        Self {
            gateway,
            orders,
            customizations,
            failed_jobs,
            trigger,
        }
    }

    async fn process(
        &self,
        checkout: &CompletedCheckout,
        delivery: Delivery,
    ) -> Result<WebhookAck, Error> {
        let metadata = match CheckoutMetadata::decode(&checkout.metadata) {
            Ok(metadata) => metadata,
            Err(err) => {
                let reason = err.to_string();
                return self
                    .escalate(
                        delivery,
                        FailedJobType::WebhookMetadata,
                        checkout,
                        &reason,
                        Error::invalid_request(reason.clone()),
                    )
                    .await;
            }
        };

        let purchase = match self.purchase_for(checkout, metadata).await? {
            Ok(purchase) => purchase,
            Err(failure) => {
                let reason = failure.message().to_owned();
                return self
                    .escalate(
                        delivery,
                        FailedJobType::WebhookProcessing,
                        checkout,
                        &reason,
                        failure,
                    )
                    .await;
            }
        };

        match self.orders.record_purchase(&purchase).await {
            Ok(PurchaseOutcome::Created { order_id, generate }) => {
                info!(
                    %order_id,
                    session_id = %checkout.session_id,
                    order_type = %purchase.kind.order_type(),
                    "recorded paid order"
                );
                if let Some(target) = generate {
                    self.dispatch(target).await;
                }
                Ok(WebhookAck::Processed { order_id })
            }
            Ok(PurchaseOutcome::Duplicate { order_id, generate }) => {
                info!(%order_id, session_id = %checkout.session_id, "checkout already recorded");
                if delivery == Delivery::Replay {
                    if let Some(target) = generate {
                        self.dispatch(target).await;
                    }
                }
                Ok(WebhookAck::Duplicate { order_id })
            }
            Ok(PurchaseOutcome::Rejected(rejection)) => {
                self.escalate(
                    delivery,
                    FailedJobType::WebhookProcessing,
                    checkout,
                    rejection.message(),
                    map_purchase_rejection(rejection),
                )
                .await
            }
            Err(err) => {
                error!(session_id = %checkout.session_id, error = %err, "failed to record paid order");
                if delivery == Delivery::Webhook {
                    self.record_failure(FailedJobType::WebhookProcessing, checkout, &err.to_string())
                        .await;
                }
                Err(map_order_error(err))
            }
        }
    }

    /// Turn decoded metadata into a purchase. The inner `Err` is a
    /// permanent problem with the delivery; the outer one is a storage
    /// failure.
    async fn purchase_for(
        &self,
        checkout: &CompletedCheckout,
        metadata: CheckoutMetadata,
    ) -> Result<Result<Purchase, Error>, Error> {
        let user_id = metadata.user_id();
        let kind = match metadata {
            CheckoutMetadata::Base {
                customization_id, ..
            } => {
                let occasion_date = self
                    .customizations
                    .find(customization_id)
                    .await
                    .map_err(map_customization_error)?
                    .filter(|customization| customization.user_id == user_id)
                    .and_then(|customization| customization.brief.occasion_date);
                PurchaseKind::Base {
                    customization_id,
                    occasion_date,
                }
            }
            CheckoutMetadata::Tweak {
                original_order_id,
                amendment,
                ..
            } => PurchaseKind::Tweak {
                original_order_id,
                amendment,
                free: false,
            },
            CheckoutMetadata::Upsell {
                original_order_id, ..
            } => PurchaseKind::Upsell { original_order_id },
            CheckoutMetadata::Bundle {
                tier_id, quantity, ..
            } => {
                let Some(tier) = get_bundle_tier(&tier_id) else {
                    return Ok(Err(Error::invalid_request(format!(
                        "unknown bundle tier `{tier_id}`"
                    ))));
                };
                if tier.quantity != quantity {
                    warn!(%tier_id, quantity, expected = tier.quantity, "bundle quantity differs from tier; using tier");
                }
                PurchaseKind::Bundle {
                    tier_id,
                    quantity: tier.quantity,
                }
            }
        };

        let amount_minor = checkout
            .amount_total
            .or_else(|| list_price(&kind))
            .unwrap_or_default();
        if !price_matches(&kind, amount_minor) {
            warn!(
                session_id = %checkout.session_id,
                amount_minor,
                order_type = %kind.order_type(),
                "paid amount does not match price table"
            );
        }
        Ok(Ok(Purchase {
            user_id,
            payment_session_id: Some(checkout.session_id.clone()),
            amount_minor,
            currency: checkout
                .currency
                .clone()
                .unwrap_or_else(|| CURRENCY.to_owned()),
            payment_method: PaymentMethod::Card,
            kind,
        }))
    }

    async fn escalate(
        &self,
        delivery: Delivery,
        job_type: FailedJobType,
        checkout: &CompletedCheckout,
        reason: &str,
        replay_error: Error,
    ) -> Result<WebhookAck, Error> {
        match delivery {
            Delivery::Webhook => {
                error!(session_id = %checkout.session_id, %job_type, reason, "dropping completed checkout");
                self.record_failure(job_type, checkout, reason).await;
                Ok(WebhookAck::Dropped)
            }
            Delivery::Replay => {
                warn!(session_id = %checkout.session_id, reason, "replay failed");
                Err(replay_error)
            }
        }
    }

    async fn record_failure(&self, job_type: FailedJobType, checkout: &CompletedCheckout, reason: &str) {
        let job = NewFailedJob {
            job_type,
            event_data: serde_json::to_value(checkout).unwrap_or_default(),
            error_message: reason.to_owned(),
        };
        match self.failed_jobs.record(&job).await {
            Ok(job_id) => info!(%job_id, session_id = %checkout.session_id, "recorded failed job"),
            Err(err) => error!(
                session_id = %checkout.session_id,
                error = %map_failed_job_error(err),
                "could not record failed job"
            ),
        }
    }

    async fn dispatch(&self, order_id: OrderId) {
        if let Err(err) = self.trigger.trigger(order_id).await {
            warn!(%order_id, error = %err, "failed to trigger generation; order needs a manual retry");
        }
    }
}

fn list_price(kind: &PurchaseKind) -> Option<i64> {
    match kind {
        PurchaseKind::Base { .. } => Some(BASE_PRICE),
        PurchaseKind::Tweak { .. } => Some(TWEAK_PRICE),
        PurchaseKind::Upsell { .. } => Some(UPSELL_PRICE),
        PurchaseKind::Bundle { tier_id, .. } => get_bundle_tier(tier_id).map(|tier| tier.price),
    }
}

fn price_matches(kind: &PurchaseKind, amount: i64) -> bool {
    match kind {
        PurchaseKind::Base { .. } => pricing::validate_base_price(amount),
        PurchaseKind::Tweak { .. } => pricing::validate_tweak_price(amount),
        PurchaseKind::Upsell { .. } => pricing::validate_upsell_price(amount),
        PurchaseKind::Bundle { tier_id, .. } => pricing::validate_bundle_price(tier_id, amount),
    }
}

#[async_trait]
impl PaymentEventCommand for PaymentEventService {
    async fn handle_event(&self, payload: &[u8], signature: &str) -> Result<WebhookAck, Error> {
        let event = self.gateway.verify_event(payload, signature).map_err(|err| {
            warn!(error = %err, "rejected webhook delivery");
            map_gateway_error(err)
        })?;
        match event.kind {
            PaymentEventKind::CheckoutCompleted(checkout) => {
                info!(event_id = %event.id, session_id = %checkout.session_id, "checkout completed");
                self.process(&checkout, Delivery::Webhook).await
            }
            PaymentEventKind::Other(kind) => {
                info!(event_id = %event.id, %kind, "ignoring payment event");
                Ok(WebhookAck::Ignored)
            }
        }
    }

    async fn replay(&self, checkout: &CompletedCheckout) -> Result<WebhookAck, Error> {
        info!(session_id = %checkout.session_id, "replaying completed checkout");
        self.process(checkout, Delivery::Replay).await
    }
}

#[cfg(test)]
#[path = "payment_event_service_tests.rs"]
mod tests;
