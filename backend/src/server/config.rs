//! Layered settings (CLI, `SONGSMITH_*` environment, config file) and the
//! resolved server configuration built from them.

use std::net::SocketAddr;
use std::time::Duration;

use chrono::TimeDelta;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;
use url::Url;
use zeroize::Zeroizing;

use songsmith::domain::DEFAULT_STALE_AFTER;
use songsmith::outbound::email::EmailProviderConfig;
use songsmith::outbound::generation::GenerationProviderConfig;
use songsmith::outbound::identity::IdentityProviderConfig;
use songsmith::outbound::payments::PaymentGatewayConfig;
use songsmith::outbound::persistence::PoolConfig;
use songsmith::outbound::storage::StorageConfig;

#[cfg(feature = "metrics")]
use actix_web_prom::PrometheusMetrics;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_POOL_SIZE: u32 = 10;
const DEFAULT_DB_CONNECT_TIMEOUT_SECS: u64 = 5;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 300;
const DEFAULT_SIGNED_URL_TTL_SECS: u64 = 3600;
const DEFAULT_BUCKET: &str = "songs";
const DEFAULT_PAYMENT_API: &str = "https://api.stripe.com/";
const INTERNAL_GENERATE_PATH: &str = "api/v1/internal/generate";

/// Raw settings as loaded by OrthoConfig. Every value is optional here;
/// [`ServerConfig::from_settings`] enforces what is required.
#[derive(Debug, Clone, Default, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "SONGSMITH")]
pub struct AppSettings {
    /// Socket address to listen on.
    pub bind_addr: Option<String>,
    /// PostgreSQL connection string.
    pub database_url: Option<String>,
    /// Maximum pooled connections.
    pub db_pool_size: Option<u32>,
    /// Seconds to wait for a pooled connection before failing the request.
    pub db_connect_timeout_secs: Option<u64>,
    /// Public URL of the web application, used in redirects and e-mails.
    pub app_base_url: Option<String>,
    /// URL this service is reachable at for generation chaining. Defaults
    /// to `app_base_url`.
    pub internal_base_url: Option<String>,
    /// Shared secret guarding the internal generation route.
    pub internal_secret: Option<String>,
    /// Comma-separated administrator e-mail addresses.
    pub admin_emails: Option<String>,
    /// Minutes after which a `generating` variant counts as stuck.
    pub stale_generation_minutes: Option<i64>,
    /// Timeout for short provider calls, in seconds.
    pub http_timeout_secs: Option<u64>,

    pub payment_api_base: Option<String>,
    pub payment_secret_key: Option<String>,
    pub payment_webhook_secret: Option<String>,

    /// Generation provider endpoint. When unset, a fixture generator
    /// returning a short silent clip is used.
    pub generation_api_base: Option<String>,
    pub generation_api_key: Option<String>,
    pub generation_timeout_secs: Option<u64>,

    pub storage_api_base: Option<String>,
    pub storage_service_key: Option<String>,
    pub storage_bucket: Option<String>,
    pub storage_signed_url_ttl_secs: Option<u64>,

    pub identity_api_base: Option<String>,
    pub identity_api_key: Option<String>,

    /// E-mail provider endpoint. When unset, e-mails are dropped.
    pub email_api_base: Option<String>,
    pub email_api_key: Option<String>,
    pub email_from: Option<String>,
}

/// Why settings could not be turned into a [`ServerConfig`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting SONGSMITH_{0}")]
    Missing(&'static str),
    #[error("invalid value for SONGSMITH_{key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

fn required<'a>(value: Option<&'a String>, key: &'static str) -> Result<&'a str, ConfigError> {
    value
        .map(|raw| raw.trim())
        .filter(|raw| !raw.is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn secret(value: Option<&String>, key: &'static str) -> Result<Zeroizing<String>, ConfigError> {
    required(value, key).map(|raw| Zeroizing::new(raw.to_owned()))
}

fn url(raw: &str, key: &'static str) -> Result<Url, ConfigError> {
    // A trailing slash keeps `Url::join` from dropping the last segment.
    let normalised = if raw.ends_with('/') {
        raw.to_owned()
    } else {
        format!("{raw}/")
    };
    Url::parse(&normalised).map_err(|err| ConfigError::Invalid {
        key,
        reason: err.to_string(),
    })
}

fn required_url(value: Option<&String>, key: &'static str) -> Result<Url, ConfigError> {
    url(required(value, key)?, key)
}

fn optional_url(value: Option<&String>, key: &'static str) -> Result<Option<Url>, ConfigError> {
    value
        .map(|raw| raw.trim())
        .filter(|raw| !raw.is_empty())
        .map(|raw| url(raw, key))
        .transpose()
}

/// Upstream providers resolved from settings.
pub struct ProviderConfig {
    pub payments: PaymentGatewayConfig,
    pub generation: Option<GenerationProviderConfig>,
    pub storage: StorageConfig,
    pub identity: IdentityProviderConfig,
    pub email: Option<EmailProviderConfig>,
}

/// Builder-style configuration for creating the HTTP server.
pub struct ServerConfig {
    pub(crate) bind_addr: SocketAddr,
    pub(crate) database: PoolConfig,
    pub(crate) app_base: Url,
    pub(crate) internal_generate_url: Url,
    pub(crate) internal_secret: Zeroizing<String>,
    pub(crate) admin_emails: Vec<String>,
    pub(crate) stale_after: TimeDelta,
    pub(crate) http_timeout: Duration,
    pub(crate) providers: ProviderConfig,
    #[cfg(feature = "metrics")]
    pub(crate) prometheus: Option<PrometheusMetrics>,
}

impl ServerConfig {
    /// Resolve and validate `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first missing or malformed setting.
    pub fn from_settings(settings: &AppSettings) -> Result<Self, ConfigError> {
        let bind_addr = settings
            .bind_addr
            .as_deref()
            .unwrap_or(DEFAULT_BIND_ADDR)
            .parse::<SocketAddr>()
            .map_err(|err| ConfigError::Invalid {
                key: "BIND_ADDR",
                reason: err.to_string(),
            })?;
        let database = PoolConfig::new(required(settings.database_url.as_ref(), "DATABASE_URL")?)
            .with_max_size(settings.db_pool_size.unwrap_or(DEFAULT_POOL_SIZE))
            .with_connection_timeout(Duration::from_secs(
                settings
                    .db_connect_timeout_secs
                    .unwrap_or(DEFAULT_DB_CONNECT_TIMEOUT_SECS),
            ));
        let app_base = required_url(settings.app_base_url.as_ref(), "APP_BASE_URL")?;
        let internal_base = optional_url(settings.internal_base_url.as_ref(), "INTERNAL_BASE_URL")?
            .unwrap_or_else(|| app_base.clone());
        let internal_generate_url =
            internal_base
                .join(INTERNAL_GENERATE_PATH)
                .map_err(|err| ConfigError::Invalid {
                    key: "INTERNAL_BASE_URL",
                    reason: err.to_string(),
                })?;
        let stale_after = match settings.stale_generation_minutes {
            None => DEFAULT_STALE_AFTER,
            Some(minutes) if minutes > 0 => TimeDelta::minutes(minutes),
            Some(minutes) => {
                return Err(ConfigError::Invalid {
                    key: "STALE_GENERATION_MINUTES",
                    reason: format!("{minutes} is not a positive number of minutes"),
                });
            }
        };
        let http_timeout =
            Duration::from_secs(settings.http_timeout_secs.unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS));

        Ok(Self {
            bind_addr,
            database,
            app_base,
            internal_generate_url,
            internal_secret: secret(settings.internal_secret.as_ref(), "INTERNAL_SECRET")?,
            admin_emails: parse_admin_emails(settings.admin_emails.as_deref()),
            stale_after,
            http_timeout,
            providers: providers(settings, http_timeout)?,
            #[cfg(feature = "metrics")]
            prometheus: None,
        })
    }

    /// Return the socket address the server will bind to.
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    /// Database pool settings, used for migrations before the pool exists.
    #[must_use]
    pub fn database(&self) -> &PoolConfig {
        &self.database
    }

    #[cfg(feature = "metrics")]
    /// Attach Prometheus middleware to the configuration.
    #[must_use]
    pub fn with_metrics(mut self, prometheus: Option<PrometheusMetrics>) -> Self {
        self.prometheus = prometheus;
        self
    }
}

fn parse_admin_emails(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .map(str::to_owned)
        .collect()
}

fn providers(settings: &AppSettings, http_timeout: Duration) -> Result<ProviderConfig, ConfigError> {
    let payments = PaymentGatewayConfig {
        api_base: match optional_url(settings.payment_api_base.as_ref(), "PAYMENT_API_BASE")? {
            Some(base) => base,
            None => url(DEFAULT_PAYMENT_API, "PAYMENT_API_BASE")?,
        },
        secret_key: secret(settings.payment_secret_key.as_ref(), "PAYMENT_SECRET_KEY")?,
        webhook_secret: secret(
            settings.payment_webhook_secret.as_ref(),
            "PAYMENT_WEBHOOK_SECRET",
        )?,
        timeout: http_timeout,
    };

    let generation = optional_url(settings.generation_api_base.as_ref(), "GENERATION_API_BASE")?
        .map(|api_base| {
            Ok::<_, ConfigError>(GenerationProviderConfig {
                api_base,
                api_key: secret(settings.generation_api_key.as_ref(), "GENERATION_API_KEY")?,
                timeout: Duration::from_secs(
                    settings
                        .generation_timeout_secs
                        .unwrap_or(DEFAULT_GENERATION_TIMEOUT_SECS),
                ),
            })
        })
        .transpose()?;

    let storage = StorageConfig {
        api_base: required_url(settings.storage_api_base.as_ref(), "STORAGE_API_BASE")?,
        service_key: secret(settings.storage_service_key.as_ref(), "STORAGE_SERVICE_KEY")?,
        bucket: settings
            .storage_bucket
            .clone()
            .unwrap_or_else(|| DEFAULT_BUCKET.to_owned()),
        signed_url_ttl: Duration::from_secs(
            settings
                .storage_signed_url_ttl_secs
                .unwrap_or(DEFAULT_SIGNED_URL_TTL_SECS),
        ),
        timeout: http_timeout,
    };

    let identity = IdentityProviderConfig {
        api_base: required_url(settings.identity_api_base.as_ref(), "IDENTITY_API_BASE")?,
        api_key: secret(settings.identity_api_key.as_ref(), "IDENTITY_API_KEY")?,
        timeout: http_timeout,
    };

    let email = optional_url(settings.email_api_base.as_ref(), "EMAIL_API_BASE")?
        .map(|api_base| {
            Ok::<_, ConfigError>(EmailProviderConfig {
                api_base,
                api_key: secret(settings.email_api_key.as_ref(), "EMAIL_API_KEY")?,
                from: required(settings.email_from.as_ref(), "EMAIL_FROM")?.to_owned(),
                timeout: http_timeout,
            })
        })
        .transpose()?;

    Ok(ProviderConfig {
        payments,
        generation,
        storage,
        identity,
        email,
    })
}

#[cfg(test)]
mod tests {
    //! Settings loading and resolution.

    use super::*;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::{fixture, rstest};

    #[fixture]
    fn complete() -> AppSettings {
        AppSettings {
            database_url: Some("postgres://localhost/songsmith".into()),
            app_base_url: Some("https://songs.example.com".into()),
            internal_secret: Some("s3cret".into()),
            admin_emails: Some(" ops@example.com, ,Boss@Example.com ".into()),
            payment_secret_key: Some("sk_test".into()),
            payment_webhook_secret: Some("whsec".into()),
            storage_api_base: Some("https://project.example.com".into()),
            storage_service_key: Some("service".into()),
            identity_api_base: Some("https://project.example.com".into()),
            identity_api_key: Some("anon".into()),
            ..AppSettings::default()
        }
    }

    #[rstest]
    fn defaults_fill_optional_settings(complete: AppSettings) {
        let config = ServerConfig::from_settings(&complete).expect("settings resolve");

        assert_eq!(config.bind_addr().to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(config.stale_after, DEFAULT_STALE_AFTER);
        assert_eq!(config.admin_emails, vec!["ops@example.com", "Boss@Example.com"]);
        assert_eq!(
            config.internal_generate_url.as_str(),
            "https://songs.example.com/api/v1/internal/generate"
        );
        assert!(config.providers.generation.is_none());
        assert!(config.providers.email.is_none());
        assert_eq!(config.providers.storage.bucket, DEFAULT_BUCKET);
    }

    #[rstest]
    #[case::database(|s: &mut AppSettings| s.database_url = None, "DATABASE_URL")]
    #[case::secret(|s: &mut AppSettings| s.internal_secret = Some("  ".into()), "INTERNAL_SECRET")]
    #[case::webhook(|s: &mut AppSettings| s.payment_webhook_secret = None, "PAYMENT_WEBHOOK_SECRET")]
    #[case::email_sender(
        |s: &mut AppSettings| s.email_api_base = Some("https://mail.example.com".into()),
        "EMAIL_API_KEY"
    )]
    fn missing_required_settings_are_named(
        mut complete: AppSettings,
        #[case] unset: fn(&mut AppSettings),
        #[case] key: &'static str,
    ) {
        unset(&mut complete);

        let err = ServerConfig::from_settings(&complete).err();

        assert_eq!(err, Some(ConfigError::Missing(key)));
    }

    #[rstest]
    #[case::bad_addr(|s: &mut AppSettings| s.bind_addr = Some("nowhere".into()), "BIND_ADDR")]
    #[case::bad_url(|s: &mut AppSettings| s.app_base_url = Some("not a url".into()), "APP_BASE_URL")]
    #[case::zero_stale(|s: &mut AppSettings| s.stale_generation_minutes = Some(0), "STALE_GENERATION_MINUTES")]
    fn malformed_settings_are_rejected(
        mut complete: AppSettings,
        #[case] corrupt: fn(&mut AppSettings),
        #[case] key: &'static str,
    ) {
        corrupt(&mut complete);

        let Err(ConfigError::Invalid { key: reported, .. }) = ServerConfig::from_settings(&complete)
        else {
            panic!("expected an invalid-setting error");
        };
        assert_eq!(reported, key);
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let _guard = lock_env([
            ("SONGSMITH_DATABASE_URL", Some("postgres://db/songs".to_owned())),
            ("SONGSMITH_STALE_GENERATION_MINUTES", Some("5".to_owned())),
            ("SONGSMITH_STORAGE_BUCKET", Some("renders".to_owned())),
        ]);

        let settings = AppSettings::load_from_iter([OsString::from("songsmith")])
            .expect("config should load");

        assert_eq!(settings.database_url.as_deref(), Some("postgres://db/songs"));
        assert_eq!(settings.stale_generation_minutes, Some(5));
        assert_eq!(settings.storage_bucket.as_deref(), Some("renders"));
    }
}
