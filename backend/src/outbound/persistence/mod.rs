//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! Concrete implementations of the storage ports, backed by PostgreSQL via
//! `diesel-async` with `bb8` connection pooling.
//!
//! # Architecture
//!
//! - **Thin adapters**: repositories only translate between Diesel rows and
//!   domain types. Workflow rules live in the domain services.
//! - **Conditional writes**: every state transition is an `UPDATE ... WHERE`
//!   on the expected current state; purchases are single transactions.
//! - **Internal models**: row structs (`models.rs`) and table definitions
//!   (`schema.rs`) never leave this module.
//! - **Embedded migrations**: `DbPool::run_migrations` applies
//!   `backend/migrations` at start-up.
//!
//! # Example
//!
//! ```ignore
//! use songsmith::outbound::persistence::{DbPool, DieselOrderRepository, PoolConfig};
//!
//! let config = PoolConfig::new("postgres://localhost/songsmith");
//! DbPool::run_migrations(&config).await?;
//! let pool = DbPool::new(config).await?;
//! let orders = DieselOrderRepository::new(pool);
//! ```

mod diesel_basic_error_mapping;
mod diesel_bundle_repository;
mod diesel_customization_repository;
mod diesel_email_preferences_repository;
mod diesel_failed_job_repository;
mod diesel_order_purchase;
mod diesel_order_repository;
mod diesel_user_repository;
mod models;
mod pool;
mod schema;

pub use diesel_bundle_repository::DieselBundleRepository;
pub use diesel_customization_repository::DieselCustomizationRepository;
pub use diesel_email_preferences_repository::DieselEmailPreferencesRepository;
pub use diesel_failed_job_repository::DieselFailedJobRepository;
pub use diesel_order_repository::DieselOrderRepository;
pub use diesel_user_repository::DieselUserRepository;
pub use pool::{DbPool, PoolConfig, PoolError};
