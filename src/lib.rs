//! # connpool
//!
//! A capped, per-destination connection pool for Rust.
//!
//! `connpool` bounds the number of simultaneously open outbound connections
//! to any single remote address. Connections released while another task is
//! waiting are handed over directly instead of being closed, and dialers that
//! hit the cap wait up to a configured timeout before failing.
//!
//! ## Features
//!
//! - **Per-Destination Cap**: 10 connections per `(network, address)` by default
//! - **Direct Handoff**: Closing a connection serves a waiting dialer without reconnecting
//! - **Bounded Wait**: Dials at the cap time out with a retryable error
//! - **HTTP Integration**: Drop-in connector for `hyper-util`'s client
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use connpool::socket::dialer::Dialer;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let dialer = Dialer::builder()
//!         .max_conns_per_host(4)
//!         .timeout(Duration::from_secs(5))
//!         .build();
//!
//!     let conn = dialer.dial("tcp", "example.com:80").await.unwrap();
//!     // ... use conn as an AsyncRead + AsyncWrite ...
//!     conn.close().await.unwrap();
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Error definitions and context helpers
//! - [`socket`] - Dialer, destination pools, and pooled connections
//! - `client` - HTTP client built on the dialer (feature `http-client`)

pub mod base;
#[cfg(feature = "http-client")]
pub mod client;
pub mod socket;

pub use base::neterror::NetError;
pub use socket::destination::{Destination, Network};
pub use socket::dialer::{Dialer, DialerBuilder, DialerConfig, DEFAULT_MAX_CONNS_PER_HOST};
pub use socket::pool::{PoolStats, PooledConnection};
