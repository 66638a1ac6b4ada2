//! Bundle credit ledger.
//!
//! Redemption is delegated to a single conditional decrement in the
//! repository; this service never reads a balance and then writes it. A
//! decrement can come back empty while credit remains (a concurrent
//! redemption held the chosen row and emptied it), so an empty result is
//! retried while the balance is still positive.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::error_mapping::map_bundle_error;
use super::ports::{BundleRepository, EntitlementLedger, Redemption};
use super::{BundleId, Error, UserId};

const REDEEM_ATTEMPTS: u32 = 3;

/// Ledger service implementing [`EntitlementLedger`].
pub struct EntitlementService<R: ?Sized> {
    bundles: Arc<R>,
}

impl<R: ?Sized> Clone for EntitlementService<R> {
    fn clone(&self) -> Self {
        Self {
            bundles: Arc::clone(&self.bundles),
        }
    }
}

impl<R: ?Sized> EntitlementService<R> {
    pub fn new(bundles: Arc<R>) -> Self {
        Self { bundles }
    }
}

#[async_trait]
impl<R> EntitlementLedger for EntitlementService<R>
where
    R: BundleRepository + ?Sized,
{
    async fn balance(&self, user_id: UserId) -> Result<u32, Error> {
        self.bundles.balance(user_id).await.map_err(map_bundle_error)
    }

    async fn redeem(&self, user_id: UserId) -> Result<Redemption, Error> {
        for attempt in 1..=REDEEM_ATTEMPTS {
            if let Some(bundle_id) = self.bundles.redeem(user_id).await.map_err(map_bundle_error)? {
                info!(%user_id, %bundle_id, attempt, "redeemed bundle credit");
                return Ok(Redemption::Redeemed(bundle_id));
            }
            let remaining = self.bundles.balance(user_id).await.map_err(map_bundle_error)?;
            if remaining == 0 {
                return Ok(Redemption::Unavailable);
            }
            debug!(%user_id, attempt, remaining, "credit contended; retrying redemption");
        }
        warn!(%user_id, attempts = REDEEM_ATTEMPTS, "credit remains but every redemption lost the race");
        Ok(Redemption::Unavailable)
    }

    async fn restore(&self, bundle_id: BundleId) -> Result<(), Error> {
        self.bundles.restore(bundle_id).await.map_err(|error| {
            warn!(%bundle_id, %error, "failed to restore bundle credit");
            map_bundle_error(error)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorCode;
    use crate::domain::ports::{BundleRepositoryError, MockBundleRepository};
    use crate::test_support::{InMemoryStore, fixtures};
    use mockall::Sequence;
    use rstest::rstest;

    fn ledger(repo: MockBundleRepository) -> EntitlementService<dyn BundleRepository> {
        let repo: Arc<dyn BundleRepository> = Arc::new(repo);
        EntitlementService::new(repo)
    }

    #[rstest]
    #[tokio::test]
    async fn no_credit_is_not_an_error() {
        let mut repo = MockBundleRepository::new();
        repo.expect_redeem().times(1).return_once(|_| Ok(None));
        repo.expect_balance().times(1).return_once(|_| Ok(0));

        let redemption = ledger(repo)
            .redeem(UserId::random())
            .await
            .expect("redeem runs");
        assert!(!redemption.redeemed());
    }

    #[rstest]
    #[tokio::test]
    async fn successful_decrement_names_the_bundle() {
        let bundle = BundleId::random();
        let mut repo = MockBundleRepository::new();
        repo.expect_redeem()
            .times(1)
            .return_once(move |_| Ok(Some(bundle)));
        repo.expect_balance().times(0);

        let redemption = ledger(repo)
            .redeem(UserId::random())
            .await
            .expect("redeem runs");
        assert_eq!(redemption, Redemption::Redeemed(bundle));
    }

    #[rstest]
    #[tokio::test]
    async fn an_empty_decrement_is_retried_while_credit_remains() {
        let bundle = BundleId::random();
        let mut seq = Sequence::new();
        let mut repo = MockBundleRepository::new();
        repo.expect_redeem()
            .times(1)
            .in_sequence(&mut seq)
            .return_once(|_| Ok(None));
        repo.expect_balance()
            .times(1)
            .in_sequence(&mut seq)
            .return_once(|_| Ok(4));
        repo.expect_redeem()
            .times(1)
            .in_sequence(&mut seq)
            .return_once(move |_| Ok(Some(bundle)));

        let redemption = ledger(repo)
            .redeem(UserId::random())
            .await
            .expect("redeem runs");
        assert_eq!(redemption, Redemption::Redeemed(bundle));
    }

    #[rstest]
    #[tokio::test]
    async fn retries_are_bounded() {
        let mut repo = MockBundleRepository::new();
        repo.expect_redeem()
            .times(REDEEM_ATTEMPTS as usize)
            .returning(|_| Ok(None));
        repo.expect_balance()
            .times(REDEEM_ATTEMPTS as usize)
            .returning(|_| Ok(1));

        let redemption = ledger(repo)
            .redeem(UserId::random())
            .await
            .expect("redeem runs");
        assert_eq!(redemption, Redemption::Unavailable);
    }

    #[rstest]
    #[tokio::test]
    async fn connection_failures_are_unavailable() {
        let mut repo = MockBundleRepository::new();
        repo.expect_balance()
            .return_once(|_| Err(BundleRepositoryError::connection("refused")));

        let error = ledger(repo)
            .balance(UserId::random())
            .await
            .expect_err("db down");
        assert_eq!(error.code(), ErrorCode::ServiceUnavailable);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_redemptions_share_the_last_credit() {
        let store = Arc::new(InMemoryStore::new());
        let user_id = fixtures::user().id();
        store.seed_bundle(user_id, 1);
        let ledger = EntitlementService::new(store.clone());

        let (first, second) = tokio::join!(
            tokio::spawn({
                let ledger = ledger.clone();
                async move { ledger.redeem(user_id).await }
            }),
            tokio::spawn({
                let ledger = ledger.clone();
                async move { ledger.redeem(user_id).await }
            }),
        );

        let redeemed = [first, second]
            .into_iter()
            .map(|joined| joined.expect("task joins").expect("redeem runs"))
            .filter(Redemption::redeemed)
            .count();
        assert_eq!(redeemed, 1);
        assert_eq!(ledger.balance(user_id).await.expect("balance"), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_redemptions_drain_a_pack_exactly() {
        let store = Arc::new(InMemoryStore::new());
        let user = fixtures::user();
        store.seed_bundle(user.id(), 5);
        let ledger = EntitlementService::new(store.clone());

        let results = futures::future::join_all((0..8).map(|_| {
            let ledger = ledger.clone();
            let user_id = user.id();
            tokio::spawn(async move { ledger.redeem(user_id).await })
        }))
        .await;

        let redeemed = results
            .into_iter()
            .map(|joined| joined.expect("task joins").expect("redeem runs"))
            .filter(Redemption::redeemed)
            .count();
        assert_eq!(redeemed, 5);
        assert_eq!(ledger.balance(user.id()).await.expect("balance"), 0);
    }
}
