//! HTTP client backed by the capped dialer.
//!
//! Plugs [`Dialer`] into `hyper-util`'s client so that no more than
//! `max_conn_per_host` connections are ever open towards one host, however
//! many requests are in flight.
//!
//! # Example
//!
//! ```rust,ignore
//! use connpool::client::new_http_client;
//! use http_body_util::Empty;
//! use bytes::Bytes;
//!
//! let client = new_http_client::<Empty<Bytes>>(4, Duration::from_secs(5));
//! let resp = client.get("http://example.com/".parse()?).await?;
//! ```

use crate::base::neterror::NetError;
use crate::socket::dialer::Dialer;
use crate::socket::pool::PooledConnection;
use http::Uri;
use hyper_util::client::legacy::connect::{Connected, Connection};
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioIo};
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

/// `tower` connector resolving request URIs to pooled connections.
#[derive(Clone, Debug)]
pub struct PoolConnector {
    dialer: Dialer,
}

impl PoolConnector {
    pub fn new(dialer: Dialer) -> Self {
        Self { dialer }
    }

    pub fn dialer(&self) -> &Dialer {
        &self.dialer
    }
}

/// A [`PooledConnection`] adapted to hyper's I/O traits.
#[derive(Debug)]
pub struct PooledIo {
    inner: TokioIo<PooledConnection>,
}

impl PooledIo {
    pub fn new(conn: PooledConnection) -> Self {
        Self {
            inner: TokioIo::new(conn),
        }
    }
}

impl hyper::rt::Read for PooledIo {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: hyper::rt::ReadBufCursor<'_>,
    ) -> Poll<io::Result<()>> {
        hyper::rt::Read::poll_read(Pin::new(&mut self.inner), cx, buf)
    }
}

impl hyper::rt::Write for PooledIo {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        hyper::rt::Write::poll_write(Pin::new(&mut self.inner), cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        hyper::rt::Write::poll_flush(Pin::new(&mut self.inner), cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        hyper::rt::Write::poll_shutdown(Pin::new(&mut self.inner), cx)
    }

    fn is_write_vectored(&self) -> bool {
        hyper::rt::Write::is_write_vectored(&self.inner)
    }

    fn poll_write_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        hyper::rt::Write::poll_write_vectored(Pin::new(&mut self.inner), cx, bufs)
    }
}

impl Connection for PooledIo {
    fn connected(&self) -> Connected {
        Connected::new()
    }
}

impl tower_service::Service<Uri> for PoolConnector {
    type Response = PooledIo;
    type Error = NetError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        let dialer = self.dialer.clone();
        Box::pin(async move {
            let address = uri_address(&uri)?;
            let conn = dialer.dial("tcp", &address).await?;
            Ok(PooledIo::new(conn))
        })
    }
}

/// Map an `http://host[:port]` URI to a `host:port` dial address.
fn uri_address(uri: &Uri) -> Result<String, NetError> {
    match uri.scheme_str() {
        Some("http") => {}
        Some(other) => return Err(NetError::DisallowedUrlScheme(other.to_string())),
        None => return Err(NetError::InvalidUrl),
    }
    let host = uri.host().ok_or(NetError::InvalidUrl)?;
    let port = uri.port_u16().unwrap_or(80);
    Ok(format!("{host}:{port}"))
}

/// Create an HTTP client that never opens more than `max_conn_per_host`
/// connections towards a host.
///
/// Requests that find their host at the cap wait up to `timeout` for a
/// connection before failing with a timeout error.
pub fn new_http_client<B>(max_conn_per_host: usize, timeout: Duration) -> Client<PoolConnector, B>
where
    B: http_body::Body + Send,
    B::Data: Send,
{
    let dialer = Dialer::builder()
        .max_conns_per_host(max_conn_per_host)
        .timeout(timeout)
        .build();
    Client::builder(TokioExecutor::new())
        .pool_max_idle_per_host(dialer.config().max_conns_per_host())
        .build(PoolConnector::new(dialer))
}
