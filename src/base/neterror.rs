use crate::socket::destination::Destination;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum NetError {
    // Connection Errors
    #[error("Connection to {destination} failed: {source}")]
    ConnectFailed {
        destination: Destination,
        #[source]
        source: Arc<io::Error>,
    },
    #[error("Connection to {destination} timed out")]
    ConnectTimedOut { destination: Destination },
    #[error("Dial timeout: no connection to {destination} available after {timeout:?}")]
    DialTimeout {
        destination: Destination,
        timeout: Duration,
    },
    #[error("Address invalid: {0}")]
    AddressInvalid(String),
    #[error("Unsupported network: {0}")]
    UnsupportedNetwork(String),

    // HTTP Errors
    #[error("Invalid URL")]
    InvalidUrl,
    #[error("Disallowed URL scheme: {0}")]
    DisallowedUrlScheme(String),
}

impl NetError {
    /// Chromium-compatible numeric code for this error.
    pub fn as_i32(&self) -> i32 {
        match self {
            NetError::ConnectFailed { .. } => -104,
            NetError::AddressInvalid(_) => -108,
            NetError::ConnectTimedOut { .. } => -118,
            NetError::DialTimeout { .. } => -118,
            NetError::UnsupportedNetwork(_) => -302,
            NetError::InvalidUrl => -300,
            NetError::DisallowedUrlScheme(_) => -301,
        }
    }

    /// Returns true if the error was caused by a deadline elapsing.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            NetError::DialTimeout { .. } | NetError::ConnectTimedOut { .. }
        )
    }

    /// Returns true if retrying the same operation later may succeed.
    ///
    /// Timeouts are always temporary. Connect failures are temporary when the
    /// OS reports a transient condition (refused, reset, interrupted).
    pub fn is_temporary(&self) -> bool {
        match self {
            NetError::DialTimeout { .. } | NetError::ConnectTimedOut { .. } => true,
            NetError::ConnectFailed { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::Interrupted
                    | io::ErrorKind::TimedOut
                    | io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }

    /// Helper to create a connect error carrying its I/O source.
    pub fn connect_failed(destination: &Destination, source: io::Error) -> Self {
        NetError::ConnectFailed {
            destination: destination.clone(),
            source: Arc::new(source),
        }
    }

    /// The destination this error refers to, if any.
    pub fn destination(&self) -> Option<&Destination> {
        match self {
            NetError::ConnectFailed { destination, .. }
            | NetError::ConnectTimedOut { destination }
            | NetError::DialTimeout { destination, .. } => Some(destination),
            _ => None,
        }
    }
}

impl From<NetError> for io::Error {
    fn from(err: NetError) -> Self {
        let kind = match &err {
            NetError::DialTimeout { .. } | NetError::ConnectTimedOut { .. } => {
                io::ErrorKind::TimedOut
            }
            NetError::ConnectFailed { source, .. } => source.kind(),
            NetError::AddressInvalid(_) | NetError::InvalidUrl => io::ErrorKind::InvalidInput,
            NetError::UnsupportedNetwork(_) | NetError::DisallowedUrlScheme(_) => {
                io::ErrorKind::Unsupported
            }
        };
        io::Error::new(kind, err)
    }
}
