use crate::base::neterror::NetError;
use crate::socket::connector::Connect;
use crate::socket::destination::Destination;
use crate::socket::handoff::{Handoff, Waiter};
use crate::socket::stream::BoxedSocket;
use crate::socket::tokens::{Permit, TokenBucket};
use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};

/// Snapshot of one destination pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Maximum number of open connections.
    pub capacity: usize,
    /// Tokens free for opening a new connection.
    pub available: usize,
    /// Dialers blocked waiting for a connection.
    pub waiters: usize,
}

/// Per-destination state: the token bucket plus the handoff point for
/// connections being released while someone is waiting.
pub struct DestinationPool {
    destination: Destination,
    tokens: Arc<TokenBucket>,
    handoff: Handoff<PooledConnection>,
}

impl fmt::Debug for DestinationPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestinationPool")
            .field("destination", &self.destination)
            .field("tokens", &self.tokens)
            .field("waiters", &self.handoff.waiters())
            .finish()
    }
}

impl DestinationPool {
    pub fn new(destination: Destination, max_conns: usize) -> Self {
        Self {
            destination,
            tokens: Arc::new(TokenBucket::new(max_conns)),
            handoff: Handoff::new(),
        }
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            capacity: self.tokens.capacity(),
            available: self.tokens.available(),
            waiters: self.handoff.waiters(),
        }
    }

    /// Open a new connection if a token is free.
    ///
    /// Returns `Ok(None)` immediately when the destination is at its cap; the
    /// caller decides whether to wait. A failed dial gives its token back
    /// before the error is returned. Never retries.
    pub async fn try_dial(
        self: &Arc<Self>,
        connector: &dyn Connect,
    ) -> Result<Option<PooledConnection>, NetError> {
        let Some(permit) = self.tokens.try_acquire() else {
            return Ok(None);
        };

        match connector.connect(&self.destination).await {
            Ok(socket) => {
                tracing::debug!(destination = %self.destination, "opened new connection");
                Ok(Some(PooledConnection::new(socket, permit, self)))
            }
            Err(e) => {
                drop(permit);
                tracing::debug!(destination = %self.destination, error = %e, "dial failed");
                Err(e)
            }
        }
    }

    /// Register for the next connection released on this destination.
    pub fn wait_for_handoff(&self) -> Waiter<PooledConnection> {
        self.handoff.wait()
    }

    fn offer(&self, conn: PooledConnection) -> Result<(), PooledConnection> {
        self.handoff.offer(conn)
    }
}

// Field order matters: the socket drops before the permit.
struct Inner {
    socket: BoxedSocket,
    permit: Permit,
    shut_down: bool,
}

/// A connection checked out of a [`DestinationPool`].
///
/// Reads and writes go straight to the underlying socket. [`close`] first
/// tries to hand the connection, token included, to a dialer waiting on the
/// same destination; only when nobody is waiting is the socket torn down and
/// the token released. Dropping the connection behaves like `close` without
/// reporting errors.
///
/// [`close`]: PooledConnection::close
pub struct PooledConnection {
    inner: Option<Inner>,
    pool: Weak<DestinationPool>,
    destination: Destination,
    reused: bool,
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("destination", &self.destination)
            .field("reused", &self.reused)
            .finish()
    }
}

impl PooledConnection {
    fn new(socket: BoxedSocket, permit: Permit, pool: &Arc<DestinationPool>) -> Self {
        Self {
            inner: Some(Inner {
                socket,
                permit,
                shut_down: false,
            }),
            pool: Arc::downgrade(pool),
            destination: pool.destination.clone(),
            reused: false,
        }
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// True if this connection was handed over by a previous holder rather
    /// than freshly dialed.
    pub fn is_reused(&self) -> bool {
        self.reused
    }

    pub(crate) fn mark_reused(&mut self) {
        self.reused = true;
    }

    /// Give the connection back.
    ///
    /// If another task is waiting in [`Dialer::dial`] for this destination the
    /// connection is transferred to it unclosed and `Ok(())` is returned.
    /// Otherwise the socket is shut down and then the token is released,
    /// returning whatever error the shutdown produced.
    ///
    /// [`Dialer::dial`]: crate::socket::dialer::Dialer::dial
    pub async fn close(mut self) -> io::Result<()> {
        let handoff_pool = match &self.inner {
            Some(inner) if !inner.shut_down => self.pool.upgrade(),
            _ => None,
        };

        if let Some(pool) = handoff_pool {
            match pool.offer(self) {
                Ok(()) => {
                    tracing::debug!(destination = %pool.destination, "connection handed off to waiter");
                    return Ok(());
                }
                Err(conn) => self = conn,
            }
        }

        let Some(mut inner) = self.inner.take() else {
            return Ok(());
        };
        tracing::debug!(destination = %self.destination, "closing connection");
        let result = inner.socket.shutdown().await;
        // The token is held until the socket is gone, even if shutdown failed.
        drop(inner.socket);
        drop(inner.permit);
        result
    }

    fn inner_mut(&mut self) -> io::Result<&mut Inner> {
        self.inner
            .as_mut()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(inner) = self.inner.take() else {
            return;
        };
        if inner.shut_down {
            return;
        }
        let Some(pool) = self.pool.upgrade() else {
            return;
        };

        let conn = PooledConnection {
            inner: Some(inner),
            pool: self.pool.clone(),
            destination: self.destination.clone(),
            reused: self.reused,
        };
        match pool.offer(conn) {
            Ok(()) => {
                tracing::debug!(destination = %self.destination, "dropped connection handed off to waiter");
            }
            Err(mut conn) => {
                // Closes the socket, then releases the token, without re-entering this path.
                drop(conn.inner.take());
            }
        }
    }
}

impl AsyncRead for PooledConnection {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let inner = self.inner_mut()?;
        Pin::new(&mut inner.socket).poll_read(cx, buf)
    }
}

impl AsyncWrite for PooledConnection {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let inner = self.inner_mut()?;
        Pin::new(&mut inner.socket).poll_write(cx, buf)
    }

    fn poll_write_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        let inner = self.inner_mut()?;
        Pin::new(&mut inner.socket).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.as_ref().is_some_and(|inner| inner.socket.is_write_vectored())
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let inner = self.inner_mut()?;
        Pin::new(&mut inner.socket).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let inner = self.inner_mut()?;
        // A half-closed stream is useless to the next holder.
        inner.shut_down = true;
        Pin::new(&mut inner.socket).poll_shutdown(cx)
    }
}
