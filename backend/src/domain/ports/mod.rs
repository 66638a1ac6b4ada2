//! Domain ports and supporting types for the hexagonal boundary.
//!
//! Driving ports are the use cases inbound adapters call. Driven ports are
//! implemented by outbound adapters (PostgreSQL, HTTP providers).

mod macros;
pub(crate) use macros::define_port_error;

mod audio_generator;
mod audio_storage;
mod bundle_repository;
mod checkout_command;
mod customization_command;
mod customization_repository;
mod email_preferences_repository;
mod email_sender;
mod entitlement_ledger;
mod failed_job_repository;
mod failure_recovery_command;
mod generation_command;
mod generation_trigger;
mod identity_provider;
mod order_repository;
mod order_status_query;
mod payment_event_command;
mod payment_gateway;
mod shared_song_query;
mod user_repository;
mod variant_selection_command;

#[cfg(test)]
pub use audio_generator::MockAudioGenerator;
pub use audio_generator::{AudioGenerator, AudioGeneratorError, FIXTURE_AUDIO, FixtureAudioGenerator};
#[cfg(test)]
pub use audio_storage::MockAudioStorage;
pub use audio_storage::{AudioStorage, AudioStorageError};
#[cfg(test)]
pub use bundle_repository::MockBundleRepository;
pub use bundle_repository::{BundleRepository, BundleRepositoryError};
#[cfg(test)]
pub use checkout_command::MockCheckoutCommand;
pub use checkout_command::{CheckoutCommand, CheckoutResult, CheckoutUrl, FreeTweakReceipt};
#[cfg(test)]
pub use customization_command::MockCustomizationCommand;
pub use customization_command::CustomizationCommand;
#[cfg(test)]
pub use customization_repository::MockCustomizationRepository;
pub use customization_repository::{CustomizationRepository, CustomizationRepositoryError};
#[cfg(test)]
pub use email_preferences_repository::MockEmailPreferencesRepository;
pub use email_preferences_repository::{
    EmailPreferencesRepository, EmailPreferencesRepositoryError,
};
#[cfg(test)]
pub use email_sender::MockEmailSender;
pub use email_sender::{DisabledEmailSender, EmailMessage, EmailSender, EmailSenderError};
#[cfg(test)]
pub use entitlement_ledger::MockEntitlementLedger;
pub use entitlement_ledger::{EntitlementLedger, Redemption};
#[cfg(test)]
pub use failed_job_repository::MockFailedJobRepository;
pub use failed_job_repository::{FailedJobRepository, FailedJobRepositoryError};
#[cfg(test)]
pub use failure_recovery_command::MockFailureRecoveryCommand;
pub use failure_recovery_command::FailureRecoveryCommand;
#[cfg(test)]
pub use generation_command::MockGenerationCommand;
pub use generation_command::{GenerationCommand, GenerationOutcome};
#[cfg(test)]
pub use generation_trigger::MockGenerationTrigger;
pub use generation_trigger::{GenerationTrigger, INTERNAL_SECRET_HEADER, JobDispatchError};
#[cfg(test)]
pub use identity_provider::MockIdentityProvider;
pub use identity_provider::{IdentityProvider, IdentityProviderError};
#[cfg(test)]
pub use order_repository::MockOrderRepository;
pub use order_repository::{OrderRepository, OrderRepositoryError, SelectionOutcome};
#[cfg(test)]
pub use order_status_query::MockOrderStatusQuery;
pub use order_status_query::{OrderStatusQuery, OrderStatusView, VariantStatusView};
#[cfg(test)]
pub use payment_event_command::MockPaymentEventCommand;
pub use payment_event_command::{PaymentEventCommand, WebhookAck};
#[cfg(test)]
pub use payment_gateway::MockPaymentGateway;
pub use payment_gateway::{
    CheckoutSession, CheckoutSessionRequest, PaymentGateway, PaymentGatewayError,
};
#[cfg(test)]
pub use shared_song_query::MockSharedSongQuery;
pub use shared_song_query::{SharedSong, SharedSongQuery};
#[cfg(test)]
pub use user_repository::MockUserRepository;
pub use user_repository::{UserPersistenceError, UserRepository};
#[cfg(test)]
pub use variant_selection_command::MockVariantSelectionCommand;
pub use variant_selection_command::{SelectionReceipt, VariantSelectionCommand};
