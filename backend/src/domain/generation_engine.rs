//! Variant generation state machine.
//!
//! Each call renders at most one variant. The claim on a `pending` variant
//! is a compare-and-swap in storage that also refuses while a sibling is
//! freshly `generating`, so overlapping triggers for the same order (a chain
//! link racing a user-triggered step) never render two variants at once.
//! Provider and storage failures end in the variant's `failed` state; only
//! storage failures on the order itself surface as errors.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::TimeDelta;
use mockable::Clock;
use tracing::{info, warn};

use super::error_mapping::map_order_error;
use super::ports::{
    AudioGenerator, AudioStorage, CustomizationRepository, GenerationCommand, GenerationOutcome,
    GenerationTrigger, OrderRepository,
};
use super::prompt::build_prompt;
use super::{
    CompletionNotifier, DEFAULT_STALE_AFTER, Error, GenerationStatus, Order, OrderId, OrderStatus,
    SongVariant, UserId, VariantResult, settled_status,
};

/// Collaborators of [`GenerationEngine`].
pub struct GenerationEngineDeps {
    pub orders: Arc<dyn OrderRepository>,
    pub customizations: Arc<dyn CustomizationRepository>,
    pub generator: Arc<dyn AudioGenerator>,
    pub storage: Arc<dyn AudioStorage>,
    pub trigger: Arc<dyn GenerationTrigger>,
    /// `None` disables completion e-mails.
    pub notifier: Option<CompletionNotifier>,
    pub clock: Arc<dyn Clock>,
}

/// Service implementing [`GenerationCommand`].
#[derive(Clone)]
pub struct GenerationEngine {
    orders: Arc<dyn OrderRepository>,
    customizations: Arc<dyn CustomizationRepository>,
    generator: Arc<dyn AudioGenerator>,
    storage: Arc<dyn AudioStorage>,
    trigger: Arc<dyn GenerationTrigger>,
    notifier: Option<CompletionNotifier>,
    clock: Arc<dyn Clock>,
    stale_after: TimeDelta,
}

impl GenerationEngine {
    pub fn new(deps: GenerationEngineDeps) -> Self {
        let GenerationEngineDeps {
            orders,
            customizations,
            generator,
            storage,
            trigger,
            notifier,
            clock,
        } = deps;
        Self {
            orders,
            customizations,
            generator,
            storage,
            trigger,
            notifier,
            clock,
            stale_after: DEFAULT_STALE_AFTER,
        }
    }

    /// Age after which a `generating` sibling no longer blocks the next
    /// claim.
    #[must_use]
    pub fn with_stale_after(mut self, stale_after: TimeDelta) -> Self {
        self.stale_after = stale_after;
        self
    }

    async fn variants(&self, order_id: OrderId) -> Result<Vec<SongVariant>, Error> {
        self.orders.variants(order_id).await.map_err(map_order_error)
    }

    /// Render one claimed variant. Never fails: every problem becomes
    /// [`VariantResult::Failed`] with a log line naming the variant.
    async fn render(&self, order: &Order, variant: &SongVariant) -> VariantResult {
        let order_id = order.id;
        let variant_number = variant.variant_number;
        let Some(customization_id) = order.customization_id else {
            warn!(%order_id, variant_number, "order has no customization to render");
            return VariantResult::Failed;
        };
        let customization = match self.customizations.find(customization_id).await {
            Ok(Some(customization)) => customization,
            Ok(None) => {
                warn!(%order_id, variant_number, %customization_id, "customization missing");
                return VariantResult::Failed;
            }
            Err(error) => {
                warn!(%order_id, variant_number, %error, "failed to load customization");
                return VariantResult::Failed;
            }
        };

        let prompt = build_prompt(&customization);
        let duration_ms = customization.brief.length.duration_ms();
        let audio = match self.generator.generate(&prompt, duration_ms).await {
            Ok(audio) if !audio.is_empty() => audio,
            Ok(_) => {
                warn!(%order_id, variant_number, "generation provider returned no audio");
                return VariantResult::Failed;
            }
            Err(error) => {
                warn!(%order_id, variant_number, %error, "generation failed");
                return VariantResult::Failed;
            }
        };

        match self.storage.upload(&variant.storage_path, audio).await {
            Ok(()) => VariantResult::Complete { duration_ms },
            Err(error) => {
                warn!(%order_id, variant_number, path = %variant.storage_path, %error, "audio upload failed");
                VariantResult::Failed
            }
        }
    }

    /// Settle the order once no variant is pending or generating.
    async fn settle_if_done(&self, order: &Order, variants: &[SongVariant]) -> Result<(), Error> {
        let statuses: Vec<GenerationStatus> =
            variants.iter().map(|variant| variant.generation_status).collect();
        let Some(status) = settled_status(&statuses) else {
            return Ok(());
        };
        let changed = self
            .orders
            .settle(order.id, status)
            .await
            .map_err(map_order_error)?;
        if !changed {
            return Ok(());
        }
        info!(order_id = %order.id, %status, "order settled");
        if status == OrderStatus::Completed {
            if let Some(notifier) = &self.notifier {
                notifier.order_completed(order, self.clock.utc()).await;
            }
        }
        Ok(())
    }
}

fn pending_count(variants: &[SongVariant]) -> u32 {
    let pending = variants
        .iter()
        .filter(|variant| variant.generation_status == GenerationStatus::Pending)
        .count();
    u32::try_from(pending).unwrap_or(u32::MAX)
}

#[async_trait]
impl GenerationCommand for GenerationEngine {
    async fn generate_next_variant(&self, order_id: OrderId) -> Result<GenerationOutcome, Error> {
        let order = self
            .orders
            .find(order_id)
            .await
            .map_err(map_order_error)?
            .ok_or_else(|| Error::not_found("order not found"))?;
        let variants = self.variants(order_id).await?;

        let Some(next) = variants
            .iter()
            .filter(|variant| variant.generation_status == GenerationStatus::Pending)
            .min_by_key(|variant| variant.variant_number)
        else {
            self.settle_if_done(&order, &variants).await?;
            return Ok(GenerationOutcome::NoPendingVariants { remaining: 0 });
        };

        let now = self.clock.utc();
        let claimed = self
            .orders
            .claim_variant(next.id, now, now - self.stale_after)
            .await
            .map_err(map_order_error)?;
        if !claimed {
            let remaining = pending_count(&self.variants(order_id).await?);
            info!(
                %order_id,
                variant_number = next.variant_number,
                "variant claimed elsewhere or a sibling is generating"
            );
            return Ok(GenerationOutcome::NoPendingVariants { remaining });
        }
        self.orders
            .mark_generating(order_id)
            .await
            .map_err(map_order_error)?;
        info!(%order_id, variant_number = next.variant_number, "generating variant");

        let result = self.render(&order, next).await;
        let recorded = self
            .orders
            .finish_variant(next.id, result, self.clock.utc())
            .await
            .map_err(map_order_error)?;
        if !recorded {
            warn!(%order_id, variant_number = next.variant_number, "variant was reset while generating; result discarded");
        }

        let variants = self.variants(order_id).await?;
        let remaining = pending_count(&variants);
        self.settle_if_done(&order, &variants).await?;
        let variant_status = variants
            .iter()
            .find(|variant| variant.id == next.id)
            .map_or(GenerationStatus::Pending, |variant| variant.generation_status);
        info!(%order_id, variant_number = next.variant_number, %variant_status, remaining, "variant finished");
        Ok(GenerationOutcome::Generated {
            variant_id: next.id,
            variant_status,
            remaining,
        })
    }

    async fn advance(&self, order_id: OrderId) -> Result<GenerationOutcome, Error> {
        let outcome = self.generate_next_variant(order_id).await?;
        if matches!(outcome, GenerationOutcome::Generated { remaining, .. } if remaining > 0) {
            if let Err(error) = self.trigger.trigger(order_id).await {
                warn!(%order_id, %error, "failed to chain next generation step; order needs a retry");
            }
        }
        Ok(outcome)
    }

    async fn advance_owned(
        &self,
        order_id: OrderId,
        user_id: UserId,
    ) -> Result<GenerationOutcome, Error> {
        self.orders
            .find_owned(order_id, user_id)
            .await
            .map_err(map_order_error)?
            .ok_or_else(|| Error::not_found("order not found"))?;
        self.advance(order_id).await
    }
}

#[cfg(test)]
#[path = "generation_engine_tests.rs"]
mod tests;
