//! Inbound adapters that translate external requests into domain service
//! calls while keeping framework details at the edge.
//!
//! HTTP handlers live under [`http`]; the payment processor's webhook and the
//! internal generation chain arrive through the same adapter.

pub mod http;
