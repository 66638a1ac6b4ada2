//! Shared HTTP adapter state.
//!
//! HTTP handlers accept this state via `actix_web::web::Data` so they only
//! depend on domain ports (use-cases) and remain testable without I/O.

use std::collections::HashSet;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::domain::ports::{
    CheckoutCommand, CustomizationCommand, EntitlementLedger, FailureRecoveryCommand,
    GenerationCommand, IdentityProvider, OrderStatusQuery, PaymentEventCommand, SharedSongQuery,
    UserRepository, VariantSelectionCommand,
};

/// Parameter object bundling all port implementations for HTTP handlers.
#[derive(Clone)]
pub struct HttpStatePorts {
    pub customizations: Arc<dyn CustomizationCommand>,
    pub checkout: Arc<dyn CheckoutCommand>,
    pub entitlements: Arc<dyn EntitlementLedger>,
    pub payments: Arc<dyn PaymentEventCommand>,
    pub generation: Arc<dyn GenerationCommand>,
    pub status: Arc<dyn OrderStatusQuery>,
    pub selection: Arc<dyn VariantSelectionCommand>,
    pub sharing: Arc<dyn SharedSongQuery>,
    pub recovery: Arc<dyn FailureRecoveryCommand>,
    pub identity: Arc<dyn IdentityProvider>,
    pub users: Arc<dyn UserRepository>,
}

/// Who may call the administrative and internal endpoints.
#[derive(Clone)]
pub struct AccessPolicy {
    admin_emails: HashSet<String>,
    internal_secret: Zeroizing<String>,
}

impl AccessPolicy {
    /// Build a policy. E-mail addresses are compared case-insensitively.
    ///
    /// # Examples
    /// ```
    /// use songsmith::inbound::http::state::AccessPolicy;
    /// use zeroize::Zeroizing;
    ///
    /// let policy = AccessPolicy::new(["Ops@Example.com"], Zeroizing::new("s3cret".into()));
    /// assert!(policy.is_admin("ops@example.com"));
    /// assert!(policy.internal_secret_matches("s3cret"));
    /// ```
    pub fn new<I, S>(admin_emails: I, internal_secret: Zeroizing<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            admin_emails: admin_emails
                .into_iter()
                .map(|email| email.as_ref().trim().to_lowercase())
                .filter(|email| !email.is_empty())
                .collect(),
            internal_secret,
        }
    }

    pub fn is_admin(&self, email: &str) -> bool {
        self.admin_emails.contains(&email.trim().to_lowercase())
    }

    /// Compare a presented secret with the configured one.
    ///
    /// Digests are compared rather than the raw strings so the comparison
    /// time does not depend on how much of the secret matched. An empty
    /// configured secret matches nothing.
    pub fn internal_secret_matches(&self, presented: &str) -> bool {
        if self.internal_secret.is_empty() {
            return false;
        }
        Sha256::digest(presented.as_bytes()) == Sha256::digest(self.internal_secret.as_bytes())
    }
}

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub customizations: Arc<dyn CustomizationCommand>,
    pub checkout: Arc<dyn CheckoutCommand>,
    pub entitlements: Arc<dyn EntitlementLedger>,
    pub payments: Arc<dyn PaymentEventCommand>,
    pub generation: Arc<dyn GenerationCommand>,
    pub status: Arc<dyn OrderStatusQuery>,
    pub selection: Arc<dyn VariantSelectionCommand>,
    pub sharing: Arc<dyn SharedSongQuery>,
    pub recovery: Arc<dyn FailureRecoveryCommand>,
    pub identity: Arc<dyn IdentityProvider>,
    pub users: Arc<dyn UserRepository>,
    pub access: AccessPolicy,
}

impl HttpState {
    /// Construct state from the ports bundle and the access policy.
    pub fn new(ports: HttpStatePorts, access: AccessPolicy) -> Self {
        let HttpStatePorts {
            customizations,
            checkout,
            entitlements,
            payments,
            generation,
            status,
            selection,
            sharing,
            recovery,
            identity,
            users,
        } = ports;
        Self {
            customizations,
            checkout,
            entitlements,
            payments,
            generation,
            status,
            selection,
            sharing,
            recovery,
            identity,
            users,
            access,
        }
    }
}
