//! Ergonomic error context helpers.
//!
//! Provides extension traits for adding context to `Result` types,
//! converting IO errors into context-rich `NetError` variants.

use crate::base::neterror::NetError;
use crate::socket::destination::Destination;
use std::io;

/// Extension trait for adding context to IO Results.
pub trait IoResultExt<T> {
    /// Add connection context to an IO error.
    ///
    /// # Example
    /// ```ignore
    /// use connpool::base::context::IoResultExt;
    ///
    /// let stream = TcpStream::connect(addr).await
    ///     .connection_context(&destination)?;
    /// // Error: "Connection to tcp/example.com:443 failed: connection refused"
    /// ```
    fn connection_context(self, destination: &Destination) -> Result<T, NetError>;
}

impl<T> IoResultExt<T> for Result<T, io::Error> {
    fn connection_context(self, destination: &Destination) -> Result<T, NetError> {
        self.map_err(|e| match e.kind() {
            io::ErrorKind::TimedOut => NetError::ConnectTimedOut {
                destination: destination.clone(),
            },
            _ => NetError::connect_failed(destination, e),
        })
    }
}
