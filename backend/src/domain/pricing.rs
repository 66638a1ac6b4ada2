//! Server-held price table.
//!
//! Amounts are integer minor units of [`CURRENCY`]. Checkout always charges
//! the amounts below; the `validate_*` functions are a second check so a
//! tampered or stale amount can never reach the payment processor.

use serde::Serialize;

/// ISO currency code for every price in this module.
pub const CURRENCY: &str = "gbp";
/// Price of a new song.
pub const BASE_PRICE: i64 = 2499;
/// Price of the second (paid) tweak.
pub const TWEAK_PRICE: i64 = 499;
/// Price of the fourth variant.
pub const UPSELL_PRICE: i64 = 799;

/// A prepaid credit pack on sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BundleTier {
    pub id: &'static str,
    pub price: i64,
    pub quantity: u32,
}

/// Every bundle tier on sale.
pub const BUNDLE_TIERS: &[BundleTier] = &[
    BundleTier {
        id: "bundle-3",
        price: 5999,
        quantity: 3,
    },
    BundleTier {
        id: "bundle-5",
        price: 8999,
        quantity: 5,
    },
];

/// Look up a bundle tier. Unknown ids are a client error.
///
/// # Examples
/// ```
/// use songsmith::domain::pricing::get_bundle_tier;
///
/// assert_eq!(get_bundle_tier("bundle-3").map(|t| t.quantity), Some(3));
/// assert!(get_bundle_tier("bundle-99").is_none());
/// ```
#[must_use]
pub fn get_bundle_tier(tier_id: &str) -> Option<BundleTier> {
    BUNDLE_TIERS.iter().copied().find(|tier| tier.id == tier_id)
}

#[must_use]
pub fn validate_base_price(amount: i64) -> bool {
    amount == BASE_PRICE
}

#[must_use]
pub fn validate_tweak_price(amount: i64) -> bool {
    amount == TWEAK_PRICE
}

#[must_use]
pub fn validate_upsell_price(amount: i64) -> bool {
    amount == UPSELL_PRICE
}

/// Whether `amount` is the price of the tier `tier_id`. Unknown tiers fail.
#[must_use]
pub fn validate_bundle_price(tier_id: &str, amount: i64) -> bool {
    get_bundle_tier(tier_id).is_some_and(|tier| tier.price == amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(TWEAK_PRICE, true)]
    #[case(TWEAK_PRICE - 1, false)]
    #[case(0, false)]
    fn tweak_price(#[case] amount: i64, #[case] ok: bool) {
        assert_eq!(validate_tweak_price(amount), ok);
    }

    #[rstest]
    #[case(UPSELL_PRICE, true)]
    #[case(-UPSELL_PRICE, false)]
    fn upsell_price(#[case] amount: i64, #[case] ok: bool) {
        assert_eq!(validate_upsell_price(amount), ok);
    }

    #[rstest]
    #[case("bundle-3", 5999, true)]
    #[case("bundle-5", 8999, true)]
    #[case("bundle-5", 5999, false)]
    #[case("bundle-7", 5999, false)]
    fn bundle_price(#[case] tier: &str, #[case] amount: i64, #[case] ok: bool) {
        assert_eq!(validate_bundle_price(tier, amount), ok);
    }

    #[rstest]
    fn tier_ids_are_unique() {
        for (i, tier) in BUNDLE_TIERS.iter().enumerate() {
            assert!(BUNDLE_TIERS.iter().skip(i + 1).all(|other| other.id != tier.id));
        }
    }
}
