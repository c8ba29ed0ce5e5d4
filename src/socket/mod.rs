//! Socket and connection management.
//!
//! Provides the capped, per-destination connection pool:
//! - [`dialer`]: Public dial entry point and the bounded wait loop
//! - [`pool`]: Per-destination pool and pool-aware connections
//! - [`tokens`]: Token bucket bounding open connections
//! - [`handoff`]: Rendezvous handoff of released connections to waiters
//! - [`connector`]: Underlying raw connect (TCP, Unix)
//! - [`destination`]: `(network, address)` keys
//! - [`stream`]: Opaque stream abstraction

pub mod connector;
pub mod destination;
pub mod dialer;
pub mod handoff;
pub mod pool;
pub mod stream;
pub mod tokens;
