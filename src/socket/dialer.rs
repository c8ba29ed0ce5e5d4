//! Capped dialer: the entry point callers use instead of a raw connect.
//!
//! The [`Dialer`] owns one [`DestinationPool`] per `(network, address)` pair,
//! created lazily on first use and kept for the dialer's lifetime. A dial
//! either opens a new connection (if the destination is below its cap) or
//! waits, bounded by the configured timeout, for one of two things: a
//! connection being handed over by a closing holder, or a token freeing up,
//! which is noticed by retrying on a short poll interval.

use crate::base::neterror::NetError;
use crate::socket::connector::{Connect, TcpConnector};
use crate::socket::destination::Destination;
use crate::socket::pool::{DestinationPool, PoolStats, PooledConnection};
use dashmap::DashMap;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default number of connections towards a single destination.
pub const DEFAULT_MAX_CONNS_PER_HOST: usize = 10;

/// Default bound on how long a dial may wait for a free connection.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(30);

/// Default interval between token retries while waiting.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Dialer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DialerConfig {
    /// Maximum parallel connections per destination (0 selects the default of 10)
    pub max_conns_per_host: usize,
    /// Wait deadline in milliseconds; also bounds each raw connect (default: 30000)
    pub timeout_ms: u64,
    /// Token retry interval in milliseconds while waiting (default: 10)
    pub poll_interval_ms: u64,
}

impl Default for DialerConfig {
    fn default() -> Self {
        Self {
            max_conns_per_host: DEFAULT_MAX_CONNS_PER_HOST,
            timeout_ms: DEFAULT_DIAL_TIMEOUT.as_millis() as u64,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
        }
    }
}

impl DialerConfig {
    /// Effective cap, with 0 meaning [`DEFAULT_MAX_CONNS_PER_HOST`].
    pub fn max_conns_per_host(&self) -> usize {
        if self.max_conns_per_host == 0 {
            DEFAULT_MAX_CONNS_PER_HOST
        } else {
            self.max_conns_per_host
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Poll interval, never shorter than one millisecond.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Dials connections while bounding parallel connections per destination.
///
/// Clones share the same pools.
#[derive(Clone)]
pub struct Dialer {
    config: DialerConfig,
    connector: Arc<dyn Connect>,
    pools: Arc<DashMap<Destination, Arc<DestinationPool>>>,
}

impl fmt::Debug for Dialer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dialer")
            .field("config", &self.config)
            .field("destinations", &self.pools.len())
            .finish()
    }
}

impl Default for Dialer {
    fn default() -> Self {
        Self::new()
    }
}

impl Dialer {
    /// Dialer with default limits over plain TCP.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> DialerBuilder {
        DialerBuilder::default()
    }

    /// Dialer with the given configuration over plain TCP.
    pub fn with_config(config: DialerConfig) -> Self {
        Self::builder().config(config).build()
    }

    pub fn config(&self) -> &DialerConfig {
        &self.config
    }

    /// Open or reuse a connection to `address` over `network`.
    ///
    /// `network` is one of `tcp`, `tcp4`, `tcp6` or `unix`. Blocks for at most
    /// the configured timeout when the destination is at its cap, then fails
    /// with [`NetError::DialTimeout`]. Errors from the underlying connect are
    /// returned as-is and are not retried.
    pub async fn dial(&self, network: &str, address: &str) -> Result<PooledConnection, NetError> {
        let destination = Destination::parse(network, address)?;
        self.dial_destination(&destination).await
    }

    /// Like [`dial`](Self::dial) with an already parsed destination.
    pub async fn dial_destination(
        &self,
        destination: &Destination,
    ) -> Result<PooledConnection, NetError> {
        let pool = self.pool(destination);
        if let Some(conn) = pool.try_dial(&*self.connector).await? {
            return Ok(conn);
        }

        let timeout = self.config.timeout();
        let poll_interval = self.config.poll_interval();
        tracing::debug!(destination = %destination, timeout = ?timeout, "destination at capacity, waiting");

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);
        let mut waiter = pool.wait_for_handoff();

        loop {
            tokio::select! {
                biased;

                handed = &mut waiter => match handed {
                    Some(mut conn) => {
                        conn.mark_reused();
                        tracing::debug!(destination = %destination, "received handed-off connection");
                        return Ok(conn);
                    }
                    // Handoff dropped under us; register again.
                    None => waiter = pool.wait_for_handoff(),
                },
                _ = &mut deadline => {
                    tracing::debug!(destination = %destination, "dial timed out waiting for a connection");
                    return Err(NetError::DialTimeout {
                        destination: destination.clone(),
                        timeout,
                    });
                }
                _ = tokio::time::sleep(poll_interval) => {
                    tracing::trace!(destination = %destination, "retrying dial");
                    if let Some(conn) = pool.try_dial(&*self.connector).await? {
                        return Ok(conn);
                    }
                }
            }
        }
    }

    /// Look up the pool for `destination`, creating it on first use.
    fn pool(&self, destination: &Destination) -> Arc<DestinationPool> {
        if let Some(pool) = self.pools.get(destination) {
            return Arc::clone(pool.value());
        }
        let entry = self.pools.entry(destination.clone()).or_insert_with(|| {
            tracing::debug!(destination = %destination, max = self.config.max_conns_per_host(), "creating destination pool");
            Arc::new(DestinationPool::new(destination.clone(), self.config.max_conns_per_host()))
        });
        Arc::clone(entry.value())
    }

    /// Token and waiter counts for a destination, if it was ever dialed.
    pub fn stats(&self, network: &str, address: &str) -> Option<PoolStats> {
        let destination = Destination::parse(network, address).ok()?;
        self.pools.get(&destination).map(|pool| pool.stats())
    }

    /// Number of destinations with a pool.
    pub fn destination_count(&self) -> usize {
        self.pools.len()
    }
}

/// Builder for creating a [`Dialer`].
#[derive(Default)]
pub struct DialerBuilder {
    config: DialerConfig,
    connector: Option<Arc<dyn Connect>>,
}

impl DialerBuilder {
    /// Replace the whole configuration.
    pub fn config(mut self, config: DialerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the per-destination cap (0 selects the default).
    pub fn max_conns_per_host(mut self, max: usize) -> Self {
        self.config.max_conns_per_host = max;
        self
    }

    /// Set the wait deadline and raw connect timeout.
    ///
    /// Stored in milliseconds; a non-zero value below one millisecond rounds up.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout_ms = ceil_millis(timeout);
        self
    }

    /// Set how often a waiting dial retries for a free token.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval_ms = ceil_millis(interval);
        self
    }

    /// Use a custom underlying connector instead of [`TcpConnector`].
    pub fn connector<C: Connect + 'static>(mut self, connector: C) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Build the dialer.
    pub fn build(self) -> Dialer {
        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(TcpConnector::with_timeout(self.config.timeout())));
        Dialer {
            config: self.config,
            connector,
            pools: Arc::new(DashMap::new()),
        }
    }
}

/// Milliseconds in `duration`, rounded up so a non-zero duration stays non-zero.
fn ceil_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX)
}
