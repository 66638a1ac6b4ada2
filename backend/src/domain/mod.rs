//! Domain primitives, pure workflow rules and the services implementing
//! the driving ports.
//!
//! Public surface:
//! - Error / ErrorCode: transport-agnostic failure payload.
//! - Customization, Order, SongVariant, FailedJob: workflow aggregates.
//! - pricing, checkout metadata and prompt builder: pure functions.
//! - One service per driving port (checkout, payment events, generation,
//!   status, selection, sharing, recovery, entitlements).

pub mod checkout_metadata;
pub mod customization;
pub mod error;
mod error_mapping;
pub mod failed_job;
pub mod ids;
pub mod notification;
pub mod order;
pub mod payment_event;
pub mod ports;
pub mod pricing;
pub mod prompt;
pub mod trace_id;
pub mod user;
pub mod variant;
mod wire_enum;

mod checkout_service;
mod customization_service;
mod entitlement_service;
mod failure_recovery_service;
mod generation_engine;
mod order_status_service;
mod payment_event_service;
mod shared_song_service;
mod variant_selection_service;

pub use self::checkout_metadata::{CheckoutMetadata, CheckoutMetadataError};
pub use self::customization::{
    Customization, CustomizationBrief, CustomizationDraft, CustomizationValidationError, Genre,
    Mood, Occasion, SongLength, TweakAmendment,
};
pub use self::error::{Error, ErrorCode};
pub use self::failed_job::{FailedJob, FailedJobType, NewFailedJob};
pub use self::ids::{BundleId, CustomizationId, FailedJobId, OrderId, UserId, VariantId};
pub use self::notification::{CompletionNotifier, EmailPreferences, next_anniversary};
pub use self::order::{
    Order, OrderStatus, OrderType, OrderWithVariants, PaymentMethod, Purchase, PurchaseKind,
    PurchaseOutcome, PurchaseRejection, settled_status,
};
pub use self::payment_event::{CompletedCheckout, PaymentEvent, PaymentEventKind};
pub use self::trace_id::{TRACE_ID_HEADER, TraceId};
pub use self::user::{User, UserValidationError};
pub use self::variant::{
    GenerationStatus, NewVariant, ShareToken, SongVariant, VariantResult, storage_path_for,
};

pub use self::checkout_service::{CheckoutLinks, CheckoutService};
pub use self::customization_service::CustomizationService;
pub use self::entitlement_service::EntitlementService;
pub use self::failure_recovery_service::{DEFAULT_STALE_AFTER, FailureRecoveryService};
pub use self::generation_engine::{GenerationEngine, GenerationEngineDeps};
pub use self::order_status_service::OrderStatusService;
pub use self::payment_event_service::PaymentEventService;
pub use self::shared_song_service::SharedSongService;
pub use self::variant_selection_service::VariantSelectionService;

/// Convenient API result alias.
///
/// # Examples
/// ```
/// use songsmith::domain::{ApiResult, Error};
///
/// fn lookup() -> ApiResult<u32> {
///     Err(Error::not_found("order not found"))
/// }
/// assert!(lookup().is_err());
/// ```
pub type ApiResult<T> = Result<T, Error>;
