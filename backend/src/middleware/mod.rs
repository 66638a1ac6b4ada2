//! Cross-cutting actix middleware. Authentication is an extractor
//! (`inbound::http::auth`), not a layer, so only request correlation lives
//! here.

pub mod trace;

pub use trace::Trace;
