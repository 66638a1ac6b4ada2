//! Purchases and the read model joining an order with its variants.

use chrono::{DateTime, NaiveDate, Utc};

use super::wire_enum::wire_enum;
use super::{
    CustomizationId, GenerationStatus, OrderId, SongVariant, TweakAmendment, UserId,
};

/// Variants created when a base or tweak order is paid.
pub const INITIAL_VARIANTS: u8 = 3;
/// Hard cap on variants per order, reached through the upsell.
pub const MAX_VARIANTS_PER_ORDER: u8 = 4;
/// Highest value `tweak_count` reaches: one free tweak then one paid tweak.
pub const MAX_TWEAK_COUNT: u8 = 2;

wire_enum! {
    /// Kind of purchase an order records.
    pub enum OrderType / ParseOrderTypeError ("order type") {
        Base => "base",
        Tweak => "tweak",
        Upsell => "upsell",
        Bundle => "bundle",
    }
}

impl OrderType {
    /// Whether orders of this type own generated variants.
    #[must_use]
    pub const fn has_variants(self) -> bool {
        matches!(self, Self::Base | Self::Tweak)
    }
}

wire_enum! {
    /// Order lifecycle: `paid → generating → completed | failed`.
    pub enum OrderStatus / ParseOrderStatusError ("order status") {
        Paid => "paid",
        Generating => "generating",
        Completed => "completed",
        Failed => "failed",
    }
}

impl OrderStatus {
    /// Whether clients can stop polling.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

wire_enum! {
    /// How an order was settled.
    pub enum PaymentMethod / ParsePaymentMethodError ("payment method") {
        Card => "card",
        BundleCredit => "bundle_credit",
        Free => "free",
    }
}

/// A stored order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub customization_id: Option<CustomizationId>,
    pub payment_session_id: Option<String>,
    pub amount_minor: i64,
    pub currency: String,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub tweak_count: u8,
    pub parent_order_id: Option<OrderId>,
    pub occasion_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// The order whose variants a purchase of this order generates.
    ///
    /// Upsells add a variant to their parent; bundles generate nothing.
    #[must_use]
    pub fn generation_target(&self) -> Option<OrderId> {
        match self.order_type {
            OrderType::Base | OrderType::Tweak => Some(self.id),
            OrderType::Upsell => self.parent_order_id,
            OrderType::Bundle => None,
        }
    }
}

/// Owner-scoped read model shared by every endpoint that shows an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderWithVariants {
    pub order: Order,
    /// Sorted by ascending `variant_number`.
    pub variants: Vec<SongVariant>,
}

/// Terminal status an order should take given its variants, if any.
///
/// Returns `None` while any variant is `pending` or `generating`. Once all
/// variants have finished the order is `completed` when at least one
/// variant completed and `failed` only when every variant failed.
///
/// # Examples
/// ```
/// use songsmith::domain::{settled_status, GenerationStatus::*, OrderStatus};
///
/// assert_eq!(settled_status(&[Complete, Failed, Failed]), Some(OrderStatus::Completed));
/// assert_eq!(settled_status(&[Failed, Failed]), Some(OrderStatus::Failed));
/// assert_eq!(settled_status(&[Complete, Pending]), None);
/// ```
#[must_use]
pub fn settled_status(statuses: &[GenerationStatus]) -> Option<OrderStatus> {
    if statuses.is_empty()
        || statuses
            .iter()
            .any(|s| matches!(s, GenerationStatus::Pending | GenerationStatus::Generating))
    {
        return None;
    }
    if statuses.contains(&GenerationStatus::Complete) {
        Some(OrderStatus::Completed)
    } else {
        Some(OrderStatus::Failed)
    }
}

/// A purchase to persist atomically together with its side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Purchase {
    pub user_id: UserId,
    /// Processor session reference; `None` for credit and free flows.
    pub payment_session_id: Option<String>,
    pub amount_minor: i64,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub kind: PurchaseKind,
}

/// Side effects of a purchase, keyed by order type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseKind {
    /// A new song: an order with three pending variants.
    Base {
        customization_id: CustomizationId,
        occasion_date: Option<NaiveDate>,
    },
    /// A re-render of an existing order with amended free text.
    ///
    /// Free tweaks move `tweak_count` from 0 to 1; paid tweaks require at
    /// least 1 and set it to 2.
    Tweak {
        original_order_id: OrderId,
        amendment: TweakAmendment,
        free: bool,
    },
    /// A fourth variant on an existing order.
    Upsell { original_order_id: OrderId },
    /// A prepaid credit pack.
    Bundle { tier_id: String, quantity: u32 },
}

impl PurchaseKind {
    /// Order type recorded for this purchase.
    #[must_use]
    pub const fn order_type(&self) -> OrderType {
        match self {
            Self::Base { .. } => OrderType::Base,
            Self::Tweak { .. } => OrderType::Tweak,
            Self::Upsell { .. } => OrderType::Upsell,
            Self::Bundle { .. } => OrderType::Bundle,
        }
    }
}

/// Outcome of recording a purchase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseOutcome {
    /// A new order row was written.
    Created {
        order_id: OrderId,
        generate: Option<OrderId>,
    },
    /// The payment session was already recorded; nothing was written.
    Duplicate {
        order_id: OrderId,
        generate: Option<OrderId>,
    },
    /// A precondition failed inside the transaction; nothing was written.
    Rejected(PurchaseRejection),
}

/// Reasons a purchase can be refused at write time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseRejection {
    CustomizationNotFound,
    OriginalOrderNotFound,
    TweakUnavailable,
    VariantLimitReached,
}

impl PurchaseRejection {
    /// User-safe description.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::CustomizationNotFound => "customisation not found",
            Self::OriginalOrderNotFound => "order not found",
            Self::TweakUnavailable => "no tweak is available for this order",
            Self::VariantLimitReached => "this order already has the maximum number of variants",
        }
    }
}
