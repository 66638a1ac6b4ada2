//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **persistence**: PostgreSQL-backed repositories using Diesel ORM
//! - **payments**: hosted checkout sessions and signed webhook events
//! - **generation**: the text-to-music provider
//! - **storage**: the blob store holding rendered audio
//! - **identity**: bearer-token resolution against the auth service
//! - **email**: transactional and scheduled e-mail
//! - **trigger**: fire-and-forget chaining of generation steps
//!
//! Adapters are thin translators that convert between domain types and
//! infrastructure-specific representations. They contain no business logic.

pub mod email;
pub mod generation;
mod http_support;
pub mod identity;
pub mod payments;
pub mod persistence;
pub mod storage;
pub mod trigger;
