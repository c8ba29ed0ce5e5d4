//! Underlying dial primitive used by the pool.
//!
//! The pool never opens sockets itself. It asks a [`Connect`] implementation
//! for a raw stream once a token has been reserved, and treats the call as an
//! opaque, possibly slow operation that yields a socket or an error.

use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use crate::socket::destination::{Destination, Network};
use crate::socket::stream::BoxedSocket;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;

/// Alias for the `Future` type returned by a connector.
pub type Connecting = Pin<Box<dyn Future<Output = Result<BoxedSocket, NetError>> + Send>>;

/// Trait for opening raw connections.
///
/// Implementations must be thread-safe; the pool calls `connect` from any task.
pub trait Connect: Send + Sync {
    /// Opens a new raw connection to `destination`.
    fn connect(&self, destination: &Destination) -> Connecting;
}

/// Blanket implementation for Arc-wrapped connectors.
impl<C: Connect + ?Sized> Connect for Arc<C> {
    fn connect(&self, destination: &Destination) -> Connecting {
        (**self).connect(destination)
    }
}

/// Adapter turning an async closure into a [`Connect`] implementation.
///
/// Created by [`connector_fn`].
#[derive(Clone)]
pub struct ConnectFn<F> {
    f: F,
}

/// Wraps `f` so it can be used wherever a [`Connect`] is expected.
///
/// ```rust,ignore
/// let connector = connector_fn(|dest: Destination| async move {
///     let stream = TcpStream::connect(dest.address()).await
///         .connection_context(&dest)?;
///     Ok(BoxedSocket::new(stream))
/// });
/// ```
pub fn connector_fn<F, Fut>(f: F) -> ConnectFn<F>
where
    F: Fn(Destination) -> Fut + Send + Sync,
    Fut: Future<Output = Result<BoxedSocket, NetError>> + Send + 'static,
{
    ConnectFn { f }
}

impl<F, Fut> Connect for ConnectFn<F>
where
    F: Fn(Destination) -> Fut + Send + Sync,
    Fut: Future<Output = Result<BoxedSocket, NetError>> + Send + 'static,
{
    fn connect(&self, destination: &Destination) -> Connecting {
        Box::pin((self.f)(destination.clone()))
    }
}

/// Opens plain TCP and Unix domain connections with tokio.
///
/// DNS resolution uses the system resolver; every resolved address that
/// matches the destination's network family is tried in order.
#[derive(Clone, Debug, Default)]
pub struct TcpConnector {
    timeout: Option<Duration>,
}

impl TcpConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound each connect attempt (resolution included) by `timeout`.
    /// A zero duration disables the bound.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: (!timeout.is_zero()).then_some(timeout),
        }
    }

    async fn connect_tcp(destination: &Destination) -> Result<BoxedSocket, NetError> {
        let addrs = tokio::net::lookup_host(destination.address())
            .await
            .connection_context(destination)?;

        let mut last_err = None;
        for addr in addrs.filter(|addr| family_matches(destination.network(), addr)) {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    stream.set_nodelay(true).connection_context(destination)?;
                    tracing::trace!(destination = %destination, addr = %addr, "tcp connected");
                    return Ok(BoxedSocket::new(stream));
                }
                Err(e) => {
                    tracing::trace!(destination = %destination, addr = %addr, error = %e, "tcp connect attempt failed");
                    last_err = Some(e);
                }
            }
        }

        let err = last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "no suitable address found")
        });
        Err(err).connection_context(destination)
    }

    #[cfg(unix)]
    async fn connect_unix(destination: &Destination) -> Result<BoxedSocket, NetError> {
        let stream = tokio::net::UnixStream::connect(destination.address())
            .await
            .connection_context(destination)?;
        Ok(BoxedSocket::new(stream))
    }

    #[cfg(not(unix))]
    async fn connect_unix(destination: &Destination) -> Result<BoxedSocket, NetError> {
        Err(NetError::UnsupportedNetwork(destination.network().to_string()))
    }
}

fn family_matches(network: Network, addr: &SocketAddr) -> bool {
    match network {
        Network::Tcp4 => addr.is_ipv4(),
        Network::Tcp6 => addr.is_ipv6(),
        _ => true,
    }
}

impl Connect for TcpConnector {
    fn connect(&self, destination: &Destination) -> Connecting {
        let destination = destination.clone();
        let timeout = self.timeout;
        Box::pin(async move {
            let connecting = async {
                match destination.network() {
                    Network::Tcp | Network::Tcp4 | Network::Tcp6 => {
                        Self::connect_tcp(&destination).await
                    }
                    Network::Unix => Self::connect_unix(&destination).await,
                }
            };

            match timeout {
                Some(timeout) => tokio::time::timeout(timeout, connecting)
                    .await
                    .map_err(|_| NetError::ConnectTimedOut {
                        destination: destination.clone(),
                    })?,
                None => connecting.await,
            }
        })
    }
}
