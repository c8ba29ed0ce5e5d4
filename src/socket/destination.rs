//! Destination keys identifying a remote endpoint class.
//!
//! Every distinct (network, address) pair gets its own connection cap.

use crate::base::neterror::NetError;
use std::fmt;
use std::str::FromStr;

/// Network kind a destination is dialed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    /// TCP over IPv4 or IPv6.
    Tcp,
    /// TCP restricted to IPv4 addresses.
    Tcp4,
    /// TCP restricted to IPv6 addresses.
    Tcp6,
    /// Unix domain stream socket.
    Unix,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Tcp => "tcp",
            Network::Tcp4 => "tcp4",
            Network::Tcp6 => "tcp6",
            Network::Unix => "unix",
        }
    }
}

impl FromStr for Network {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(Network::Tcp),
            "tcp4" => Ok(Network::Tcp4),
            "tcp6" => Ok(Network::Tcp6),
            "unix" => Ok(Network::Unix),
            other => Err(NetError::UnsupportedNetwork(other.to_string())),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies a connection group: one network kind plus one address.
///
/// Equality is structural, so `tcp/example.com:80` and `tcp4/example.com:80`
/// are separate destinations with separate caps.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination {
    network: Network,
    address: Box<str>,
}

impl Destination {
    pub fn new(network: Network, address: impl Into<Box<str>>) -> Self {
        Self {
            network,
            address: address.into(),
        }
    }

    /// Parse a `(network, address)` pair as given to [`Dialer::dial`].
    ///
    /// [`Dialer::dial`]: crate::socket::dialer::Dialer::dial
    pub fn parse(network: &str, address: &str) -> Result<Self, NetError> {
        let network = network.parse::<Network>()?;
        if address.is_empty() {
            return Err(NetError::AddressInvalid(address.to_string()));
        }
        Ok(Self::new(network, address))
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_parse_known_networks() {
        for (name, network) in [
            ("tcp", Network::Tcp),
            ("tcp4", Network::Tcp4),
            ("tcp6", Network::Tcp6),
            ("unix", Network::Unix),
        ] {
            let dest = Destination::parse(name, "host:1").unwrap();
            assert_eq!(dest.network(), network);
            assert_eq!(dest.address(), "host:1");
        }
    }

    #[test]
    fn test_parse_rejects_unknown_network() {
        let err = Destination::parse("udp", "host:53").unwrap_err();
        assert!(matches!(err, NetError::UnsupportedNetwork(n) if n == "udp"));
    }

    #[test]
    fn test_parse_rejects_empty_address() {
        assert!(matches!(
            Destination::parse("tcp", ""),
            Err(NetError::AddressInvalid(_))
        ));
    }

    #[test]
    fn test_structural_equality() {
        let mut set = HashSet::new();
        set.insert(Destination::new(Network::Tcp, "a:1"));
        set.insert(Destination::new(Network::Tcp, "a:1"));
        set.insert(Destination::new(Network::Tcp4, "a:1"));
        set.insert(Destination::new(Network::Tcp, "b:1"));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Destination::new(Network::Unix, "/tmp/s.sock").to_string(),
            "unix//tmp/s.sock"
        );
    }
}
