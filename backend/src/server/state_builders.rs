//! Builders wiring PostgreSQL repositories and provider adapters into the
//! services behind each HTTP port.

use std::sync::Arc;

use actix_web::web;
use mockable::{Clock, DefaultClock};
use tracing::{info, warn};

use songsmith::domain::ports::{
    AudioGenerator, AudioStorage, BundleRepository, CustomizationRepository,
    DisabledEmailSender, EmailPreferencesRepository, EmailSender, EntitlementLedger,
    FailedJobRepository, FixtureAudioGenerator, GenerationTrigger, IdentityProvider,
    OrderRepository, PaymentEventCommand, PaymentGateway, UserRepository,
};
use songsmith::domain::{
    CheckoutLinks, CheckoutService, CompletionNotifier, CustomizationService, EntitlementService,
    FailureRecoveryService, GenerationEngine, GenerationEngineDeps, OrderStatusService,
    PaymentEventService, SharedSongService, VariantSelectionService,
};
use songsmith::inbound::http::state::{AccessPolicy, HttpState, HttpStatePorts};
use songsmith::outbound::email::HttpEmailSender;
use songsmith::outbound::generation::HttpAudioGenerator;
use songsmith::outbound::identity::HttpIdentityProvider;
use songsmith::outbound::payments::HttpPaymentGateway;
use songsmith::outbound::persistence::{
    DbPool, DieselBundleRepository, DieselCustomizationRepository,
    DieselEmailPreferencesRepository, DieselFailedJobRepository, DieselOrderRepository,
    DieselUserRepository,
};
use songsmith::outbound::storage::HttpAudioStorage;
use songsmith::outbound::trigger::HttpGenerationTrigger;

use super::ServerConfig;

/// Map an adapter construction failure onto the server's error type.
fn startup_error(component: &str, err: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::other(format!("failed to build {component}: {err}"))
}

/// Repositories sharing one connection pool.
struct Repositories {
    users: Arc<dyn UserRepository>,
    customizations: Arc<dyn CustomizationRepository>,
    orders: Arc<dyn OrderRepository>,
    bundles: Arc<dyn BundleRepository>,
    failed_jobs: Arc<dyn FailedJobRepository>,
    preferences: Arc<dyn EmailPreferencesRepository>,
}

impl Repositories {
    fn new(pool: &DbPool) -> Self {
        Self {
            users: Arc::new(DieselUserRepository::new(pool.clone())),
            customizations: Arc::new(DieselCustomizationRepository::new(pool.clone())),
            orders: Arc::new(DieselOrderRepository::new(pool.clone())),
            bundles: Arc::new(DieselBundleRepository::new(pool.clone())),
            failed_jobs: Arc::new(DieselFailedJobRepository::new(pool.clone())),
            preferences: Arc::new(DieselEmailPreferencesRepository::new(pool.clone())),
        }
    }
}

/// Upstream HTTP adapters.
struct Providers {
    gateway: Arc<dyn PaymentGateway>,
    generator: Arc<dyn AudioGenerator>,
    storage: Arc<dyn AudioStorage>,
    identity: Arc<dyn IdentityProvider>,
    email: Arc<dyn EmailSender>,
    trigger: Arc<dyn GenerationTrigger>,
}

fn build_generator(config: &ServerConfig) -> std::io::Result<Arc<dyn AudioGenerator>> {
    match &config.providers.generation {
        Some(provider) => Ok(Arc::new(
            HttpAudioGenerator::new(provider.clone())
                .map_err(|err| startup_error("generation provider", err))?,
        )),
        None => {
            warn!("no generation provider configured; rendering fixture audio");
            Ok(Arc::new(FixtureAudioGenerator))
        }
    }
}

fn build_email(config: &ServerConfig) -> std::io::Result<Arc<dyn EmailSender>> {
    match &config.providers.email {
        Some(provider) => Ok(Arc::new(
            HttpEmailSender::new(provider.clone())
                .map_err(|err| startup_error("e-mail sender", err))?,
        )),
        None => {
            info!("no e-mail provider configured; completion e-mails are disabled");
            Ok(Arc::new(DisabledEmailSender))
        }
    }
}

fn build_providers(config: &ServerConfig, clock: Arc<dyn Clock>) -> std::io::Result<Providers> {
    let providers = &config.providers;
    Ok(Providers {
        gateway: Arc::new(
            HttpPaymentGateway::new(providers.payments.clone(), clock)
                .map_err(|err| startup_error("payment gateway", err))?,
        ),
        generator: build_generator(config)?,
        storage: Arc::new(
            HttpAudioStorage::new(providers.storage.clone())
                .map_err(|err| startup_error("audio storage", err))?,
        ),
        identity: Arc::new(
            HttpIdentityProvider::new(providers.identity.clone())
                .map_err(|err| startup_error("identity provider", err))?,
        ),
        email: build_email(config)?,
        trigger: Arc::new(
            HttpGenerationTrigger::new(
                config.internal_generate_url.clone(),
                config.internal_secret.clone(),
                config.http_timeout,
            )
            .map_err(|err| startup_error("generation trigger", err))?,
        ),
    })
}

/// Wire services over the given repositories and providers.
fn build_ports(
    config: &ServerConfig,
    repos: Repositories,
    providers: Providers,
    clock: Arc<dyn Clock>,
) -> HttpStatePorts {
    let Repositories {
        users,
        customizations,
        orders,
        bundles,
        failed_jobs,
        preferences,
    } = repos;
    let Providers {
        gateway,
        generator,
        storage,
        identity,
        email,
        trigger,
    } = providers;

    let ledger: Arc<dyn EntitlementLedger> = Arc::new(EntitlementService::new(bundles));
    let payments: Arc<dyn PaymentEventCommand> = Arc::new(PaymentEventService::new(
        gateway.clone(),
        orders.clone(),
        customizations.clone(),
        failed_jobs.clone(),
        trigger.clone(),
    ));
    let notifier = CompletionNotifier::new(
        users.clone(),
        preferences,
        email,
        config.app_base.clone(),
    );

    HttpStatePorts {
        customizations: Arc::new(CustomizationService::new(customizations.clone())),
        checkout: Arc::new(CheckoutService::new(
            customizations.clone(),
            orders.clone(),
            ledger.clone(),
            gateway,
            CheckoutLinks::new(config.app_base.clone()),
        )),
        entitlements: ledger,
        payments: payments.clone(),
        generation: Arc::new(GenerationEngine::new(GenerationEngineDeps {
            orders: orders.clone(),
            customizations: customizations.clone(),
            generator,
            storage: storage.clone(),
            trigger: trigger.clone(),
            notifier: Some(notifier),
            clock: clock.clone(),
        })
        .with_stale_after(config.stale_after)),
        status: Arc::new(OrderStatusService::new(orders.clone(), storage.clone())),
        selection: Arc::new(VariantSelectionService::new(
            orders.clone(),
            customizations.clone(),
        )),
        sharing: Arc::new(SharedSongService::new(
            orders.clone(),
            customizations,
            storage,
        )),
        recovery: Arc::new(
            FailureRecoveryService::new(orders, failed_jobs, payments, trigger, clock)
                .with_stale_after(config.stale_after),
        ),
        identity,
        users,
    }
}

/// Build the shared HTTP state backed by PostgreSQL and the configured
/// providers.
///
/// # Errors
///
/// Returns [`std::io::Error`] when a provider client cannot be constructed.
pub(super) fn build_http_state(
    config: &ServerConfig,
    pool: &DbPool,
) -> std::io::Result<web::Data<HttpState>> {
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let providers = build_providers(config, clock.clone())?;
    let ports = build_ports(config, Repositories::new(pool), providers, clock);
    let access = AccessPolicy::new(&config.admin_emails, config.internal_secret.clone());
    Ok(web::Data::new(HttpState::new(ports, access)))
}
