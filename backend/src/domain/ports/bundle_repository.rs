//! Driven port for prepaid credit packs.

use async_trait::async_trait;

use crate::domain::{BundleId, UserId};

use super::define_port_error;

define_port_error! {
    /// Persistence errors raised by bundle repository adapters.
    pub enum BundleRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "bundle repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "bundle repository query failed: {message}",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BundleRepository: Send + Sync {
    /// Sum of remaining credits across the user's bundles.
    async fn balance(&self, user_id: UserId) -> Result<u32, BundleRepositoryError>;

    /// Decrement one bundle with credit remaining, as a single conditional
    /// update. Returns the bundle charged, or `None` when no credit was
    /// available at the instant of the update.
    async fn redeem(&self, user_id: UserId) -> Result<Option<BundleId>, BundleRepositoryError>;

    /// Give back one credit taken by [`BundleRepository::redeem`].
    async fn restore(&self, bundle_id: BundleId) -> Result<(), BundleRepositoryError>;
}
