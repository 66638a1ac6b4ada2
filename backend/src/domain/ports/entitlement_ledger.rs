//! Driving port for bundle credits.

use async_trait::async_trait;

use crate::domain::{BundleId, Error, UserId};

/// Result of a redemption attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redemption {
    /// One credit was taken from this bundle.
    Redeemed(BundleId),
    /// No credit was available; the caller falls through to paid checkout.
    Unavailable,
}

impl Redemption {
    #[must_use]
    pub fn redeemed(&self) -> bool {
        matches!(self, Self::Redeemed(_))
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EntitlementLedger: Send + Sync {
    /// Credits remaining across all of the user's bundles.
    async fn balance(&self, user_id: UserId) -> Result<u32, Error>;

    /// Atomically take one credit. Never oversells.
    async fn redeem(&self, user_id: UserId) -> Result<Redemption, Error>;

    /// Return a credit taken by [`EntitlementLedger::redeem`] whose order
    /// could not be created.
    async fn restore(&self, bundle_id: BundleId) -> Result<(), Error>;
}
