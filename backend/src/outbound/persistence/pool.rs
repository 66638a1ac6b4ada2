//! PostgreSQL connection pool and embedded schema migrations.
//!
//! Repositories share one `bb8` pool of `diesel-async` connections. Pool
//! failures surface as [`PoolError`], which each repository folds into its
//! port's `Connection` variant. The migration harness is synchronous, so it
//! runs once at start-up on the blocking thread pool over its own
//! connection, before the pool exists.

use std::time::Duration;

use diesel::{Connection, PgConnection};
use diesel_async::AsyncPgConnection;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::info;
use url::Url;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

const DEFAULT_MAX_SIZE: u32 = 10;
const MIN_IDLE: u32 = 1;
const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a connection could not be provided.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("failed to get connection from pool: {message}")]
    Checkout { message: String },
    #[error("failed to build connection pool: {message}")]
    Build { message: String },
    #[error("failed to apply migrations: {message}")]
    Migration { message: String },
}

impl PoolError {
    pub fn checkout(message: impl Into<String>) -> Self {
        Self::Checkout {
            message: message.into(),
        }
    }

    pub fn build(message: impl Into<String>) -> Self {
        Self::Build {
            message: message.into(),
        }
    }

    pub fn migration(message: impl Into<String>) -> Self {
        Self::Migration {
            message: message.into(),
        }
    }
}

/// Connection string and sizing of the pool.
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use songsmith::outbound::persistence::PoolConfig;
///
/// let config = PoolConfig::new("postgres://app:hunter2@db/songsmith")
///     .with_max_size(20)
///     .with_connection_timeout(Duration::from_secs(2));
/// assert_eq!(config.redacted_url(), "postgres://app:***@db/songsmith");
/// ```
#[derive(Debug, Clone)]
pub struct PoolConfig {
    database_url: String,
    max_size: u32,
    connection_timeout: Duration,
}

impl PoolConfig {
    /// Ten connections, five second checkout timeout.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_size: DEFAULT_MAX_SIZE,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_max_size(mut self, max_size: u32) -> Self {
        self.max_size = max_size.max(1);
        self
    }

    #[must_use]
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// The connection string with any password masked, for logs.
    pub fn redacted_url(&self) -> String {
        match Url::parse(&self.database_url) {
            Ok(mut url) if url.password().is_some() => {
                if url.set_password(Some("***")).is_ok() {
                    url.to_string()
                } else {
                    "<redacted>".to_owned()
                }
            }
            Ok(url) => url.to_string(),
            Err(_) => "<unparseable database url>".to_owned(),
        }
    }
}

/// Shared pool handed to every Diesel repository.
#[derive(Clone)]
pub struct DbPool {
    inner: Pool<AsyncPgConnection>,
}

impl DbPool {
    /// Build the pool. Connections are opened lazily up to the minimum idle
    /// count.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Build`] when the pool cannot be constructed.
    pub async fn new(config: PoolConfig) -> Result<Self, PoolError> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(&config.database_url);
        let inner = Pool::builder()
            .max_size(config.max_size)
            .min_idle(Some(MIN_IDLE.min(config.max_size)))
            .connection_timeout(config.connection_timeout)
            .build(manager)
            .await
            .map_err(|err| PoolError::build(err.to_string()))?;
        info!(
            database = %config.redacted_url(),
            max_size = config.max_size,
            "database pool ready"
        );
        Ok(Self { inner })
    }

    /// Apply pending embedded migrations and return how many ran.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Migration`] when the database is unreachable or a
    /// migration fails.
    pub async fn run_migrations(config: &PoolConfig) -> Result<usize, PoolError> {
        let url = config.database_url.clone();
        let applied = tokio::task::spawn_blocking(move || {
            let mut connection = PgConnection::establish(&url)
                .map_err(|err| PoolError::migration(err.to_string()))?;
            connection
                .run_pending_migrations(MIGRATIONS)
                .map(|versions| versions.len())
                .map_err(|err| PoolError::migration(err.to_string()))
        })
        .await
        .map_err(|err| PoolError::migration(err.to_string()))??;
        info!(database = %config.redacted_url(), applied, "schema up to date");
        Ok(applied)
    }

    /// Check out a connection, waiting at most the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Checkout`] when no connection becomes available.
    pub async fn get(&self) -> Result<PooledConnection<'_, AsyncPgConnection>, PoolError> {
        self.inner
            .get()
            .await
            .map_err(|err| PoolError::checkout(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn defaults_suit_a_small_service() {
        let config = PoolConfig::new("postgres://localhost/songsmith");

        assert_eq!(config.database_url(), "postgres://localhost/songsmith");
        assert_eq!(config.max_size, DEFAULT_MAX_SIZE);
        assert_eq!(config.connection_timeout, DEFAULT_CONNECTION_TIMEOUT);
    }

    #[rstest]
    fn a_pool_always_has_room_for_one_connection() {
        let config = PoolConfig::new("postgres://localhost/songsmith").with_max_size(0);

        assert_eq!(config.max_size, 1);
    }

    #[rstest]
    #[case::password("postgres://app:s3cret@db:5432/songs", "postgres://app:***@db:5432/songs")]
    #[case::no_password("postgres://app@db/songs", "postgres://app@db/songs")]
    #[case::garbage("not a url", "<unparseable database url>")]
    fn redaction_hides_only_the_password(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(PoolConfig::new(raw).redacted_url(), expected);
    }

    #[rstest]
    fn migration_errors_say_what_failed() {
        let error = PoolError::migration("relation already exists");

        assert_eq!(
            error.to_string(),
            "failed to apply migrations: relation already exists"
        );
    }
}
