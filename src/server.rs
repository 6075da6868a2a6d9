use std::fmt;
use std::slice;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use crate::network::DNS_PORT;

/// Most nameservers asked in one round. Transaction ids are handed out in
/// blocks of this size.
pub const MAX_SERVERS: usize = 8;

/// A nameserver: IPv4 address and UDP port.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub struct Endpoint(SocketAddrV4);

impl Endpoint {
    pub fn new(addr: Ipv4Addr, port: u16) -> Endpoint {
        Endpoint(SocketAddrV4::new(addr, port))
    }

    pub fn addr(&self) -> Ipv4Addr {
        *self.0.ip()
    }

    pub fn port(&self) -> u16 {
        self.0.port()
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::V4(self.0)
    }
}

impl From<Ipv4Addr> for Endpoint {
    fn from(addr: Ipv4Addr) -> Endpoint {
        Endpoint::new(addr, DNS_PORT)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The nameservers asked in parallel for one name.
///
/// Holds between one and [`MAX_SERVERS`] endpoints. Order matters: an
/// endpoint's position is the offset added to the round's base transaction
/// id, and it is the responder index reported back to the caller.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct ServerDirectory {
    servers: Vec<Endpoint>,
}

impl ServerDirectory {
    /// Returns `None` for an empty list. Endpoints past [`MAX_SERVERS`] are
    /// dropped.
    pub fn new(mut servers: Vec<Endpoint>) -> Option<ServerDirectory> {
        if servers.is_empty() {
            return None;
        }
        if servers.len() > MAX_SERVERS {
            warn!("only the first {} of {} nameservers are used", MAX_SERVERS, servers.len());
            servers.truncate(MAX_SERVERS);
        }

        Some(ServerDirectory { servers: servers })
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn get(&self, index: usize) -> Option<&Endpoint> {
        self.servers.get(index)
    }

    pub fn iter(&self) -> slice::Iter<Endpoint> {
        self.servers.iter()
    }
}

impl<'a> IntoIterator for &'a ServerDirectory {
    type Item = &'a Endpoint;
    type IntoIter = slice::Iter<'a, Endpoint>;

    fn into_iter(self) -> slice::Iter<'a, Endpoint> {
        self.servers.iter()
    }
}

impl fmt::Display for ServerDirectory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let servers: Vec<String> = self.servers.iter().map(|s| s.to_string()).collect();
        write!(f, "[{}]", servers.join(", "))
    }
}

#[cfg(test)]
mod test {
    use std::net::Ipv4Addr;
    use super::*;

    fn endpoints(n: u8) -> Vec<Endpoint> {
        (0..n).map(|i| Endpoint::from(Ipv4Addr::new(10, 0, 0, i))).collect()
    }

    #[test]
    fn empty_directory_is_refused() {
        assert!(ServerDirectory::new(vec![]).is_none());
    }

    #[test]
    fn directory_keeps_order_and_bound() {
        let dir = ServerDirectory::new(endpoints(10)).unwrap();
        assert_eq!(dir.len(), MAX_SERVERS);
        for (i, server) in dir.iter().enumerate() {
            assert_eq!(server.addr(), Ipv4Addr::new(10, 0, 0, i as u8));
            assert_eq!(server.port(), 53);
        }
        assert!(dir.get(MAX_SERVERS).is_none());
    }

    #[test]
    fn display() {
        let dir = ServerDirectory::new(vec![Endpoint::new(Ipv4Addr::new(192, 0, 2, 1), 5353)])
            .unwrap();
        assert_eq!(dir.to_string(), "[192.0.2.1:5353]");
    }
}
