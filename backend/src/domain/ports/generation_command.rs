//! Driving port for the variant generation state machine.

use async_trait::async_trait;

use crate::domain::{Error, GenerationStatus, OrderId, UserId, VariantId};

/// Result of one generation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// One variant was claimed and finished as `variant_status`.
    Generated {
        variant_id: VariantId,
        variant_status: GenerationStatus,
        remaining: u32,
    },
    /// Nothing was claimed: no variant was pending, or another caller
    /// claimed it first.
    NoPendingVariants { remaining: u32 },
}

impl GenerationOutcome {
    /// Pending variants left after this step.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        match self {
            Self::Generated { remaining, .. } | Self::NoPendingVariants { remaining } => *remaining,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationCommand: Send + Sync {
    /// Claim and render the lowest-numbered pending variant of an order.
    async fn generate_next_variant(&self, order_id: OrderId) -> Result<GenerationOutcome, Error>;

    /// One step, then schedule the next when variants remain.
    async fn advance(&self, order_id: OrderId) -> Result<GenerationOutcome, Error>;

    /// [`GenerationCommand::advance`] for an order owned by `user_id`.
    async fn advance_owned(
        &self,
        order_id: OrderId,
        user_id: UserId,
    ) -> Result<GenerationOutcome, Error>;
}
