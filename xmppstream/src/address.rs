//! Resolved network addresses.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use crate::error::*;

/// A resolved host address together with a port.
///
/// Name resolution is not part of this crate; the address must already be an
/// IP address.
///
/// ```
/// use xmppstream::HostAddressPort;
///
/// let address: HostAddressPort = "127.0.0.1:5222".parse().unwrap();
/// assert_eq!(address.port(), 5222);
/// assert_eq!(address.to_string(), "127.0.0.1:5222");
///
/// let address: HostAddressPort = "[::1]:5222".parse().unwrap();
/// assert_eq!(address.to_string(), "[::1]:5222");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostAddressPort {
    address: IpAddr,
    port: u16,
}

impl HostAddressPort {
    pub const fn new(address: IpAddr, port: u16) -> Self {
        HostAddressPort { address, port }
    }

    pub const fn address(&self) -> IpAddr {
        self.address
    }

    pub const fn port(&self) -> u16 {
        self.port
    }

    pub const fn to_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }
}

impl From<SocketAddr> for HostAddressPort {
    fn from(addr: SocketAddr) -> Self {
        HostAddressPort::new(addr.ip(), addr.port())
    }
}

impl From<HostAddressPort> for SocketAddr {
    fn from(addr: HostAddressPort) -> Self {
        addr.to_socket_addr()
    }
}

impl FromStr for HostAddressPort {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.parse::<SocketAddr>()
            .map(HostAddressPort::from)
            .map_err(|e| Error::with_source(ErrorKind::InvalidAddress(s.into()), e))
    }
}

impl fmt::Display for HostAddressPort {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.to_socket_addr(), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_parse_and_convert() {
        let address: HostAddressPort = "10.0.0.1:5269".parse().unwrap();
        assert_eq!(address.address(), IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(address.port(), 5269);

        let socket: SocketAddr = address.into();
        assert_eq!(HostAddressPort::from(socket), address);
    }

    #[test]
    fn test_invalid_address() {
        let e = "example.org:5222".parse::<HostAddressPort>().unwrap_err();
        assert_eq!(
            *e.kind(),
            ErrorKind::InvalidAddress("example.org:5222".into())
        );
        assert!("127.0.0.1".parse::<HostAddressPort>().is_err());
    }
}
