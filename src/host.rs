//! Host lookups in the shape a name-service switch module expects.
//!
//! A name-service module gets a name and an address family, and answers
//! with a host entry or one of two coarse statuses plus `errno`/`h_errno`.
//! Laying the entry out in the caller's buffer is left to the module; what
//! is checked here is that the buffer it was handed is large enough.
use std::fmt;
use std::mem;
use std::io;
use std::path::Path;
use std::net::{IpAddr, Ipv4Addr};

use crate::resolver::{Error, Options, ResolveResult, Resolver};
use crate::routing::RoutingTable;

/// `h_errno` for failures that retrying will not fix.
pub const NO_RECOVERY: i32 = 3;

pub const CANONICAL_PREFIX: &str = "dnspq-";

/// Room an entry needs in the caller's buffer: the address, the canonical
/// name with its terminator, a two-slot address list and a one-slot alias
/// list.
pub const MIN_BUFFER_LEN: usize = 4 + 8 + 3 * mem::size_of::<usize>();

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum AddressFamily {
    Inet,
    Inet6,
}

impl AddressFamily {
    pub fn from_raw(af: libc::c_int) -> Option<AddressFamily> {
        match af {
            libc::AF_INET => Some(AddressFamily::Inet),
            libc::AF_INET6 => Some(AddressFamily::Inet6),
            _ => None,
        }
    }
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Status {
    Success,
    Unavailable,
}

#[derive(PartialEq, Eq, Clone, Debug)]
pub struct HostEntry {
    /// `dnspq-<n>`, naming the server that answered.
    pub name: String,
    pub aliases: Vec<String>,
    pub addr_list: Vec<Ipv4Addr>,
    pub ttl: u32,
}

impl HostEntry {
    fn from_result(r: &ResolveResult) -> HostEntry {
        HostEntry {
            name: format!("{}{}", CANONICAL_PREFIX, r.responder),
            aliases: vec![],
            addr_list: vec![r.addr],
            ttl: r.ttl,
        }
    }

    pub fn status(&self) -> Status {
        Status::Success
    }
}

/// A failed host lookup. `cause` is set when the lookup got as far as
/// routing or resolving.
pub struct HostError {
    pub errno: i32,
    pub h_errno: i32,
    pub cause: Option<Error>,
}

impl HostError {
    fn unavailable(cause: Option<Error>) -> HostError {
        HostError {
            errno: libc::EINVAL,
            h_errno: NO_RECOVERY,
            cause: cause,
        }
    }

    pub fn status(&self) -> Status {
        Status::Unavailable
    }
}

impl From<Error> for HostError {
    fn from(e: Error) -> HostError {
        HostError::unavailable(Some(e))
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.cause {
            Some(ref e) => write!(f, "unavailable: {:?}", e),
            None => write!(f, "unavailable"),
        }
    }
}

impl fmt::Debug for HostError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} (errno {}, h_errno {})", self, self.errno, self.h_errno)
    }
}

/// Routing table and query engine together.
pub struct HostResolver {
    table: RoutingTable,
    resolver: Resolver,
}

impl HostResolver {
    pub fn new(table: RoutingTable, resolver: Resolver) -> HostResolver {
        HostResolver {
            table: table,
            resolver: resolver,
        }
    }

    pub fn from_config<P: AsRef<Path>>(path: P, options: Options) -> io::Result<HostResolver> {
        let table = RoutingTable::from_file(path)?;
        Ok(HostResolver::new(table, Resolver::with_options(options)))
    }

    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    /// Finds the servers for `name` and asks them. Without servers the query
    /// engine is not involved at all.
    pub fn resolve(&mut self, name: &str) -> Result<ResolveResult, Error> {
        let servers = self.table.lookup(name)?;
        self.resolver.resolve(servers, name)
    }

    pub fn gethostbyname(&mut self,
                         name: &str,
                         family: AddressFamily,
                         buflen: usize)
                         -> Result<HostEntry, HostError> {
        if family != AddressFamily::Inet {
            debug!("{:?} lookups are not supported", family);
            return Err(HostError::unavailable(None));
        }
        if buflen < MIN_BUFFER_LEN {
            debug!("buffer of {} bytes too small, need {}", buflen, MIN_BUFFER_LEN);
            return Err(HostError::unavailable(None));
        }

        let r = self.resolve(name)?;
        Ok(HostEntry::from_result(&r))
    }

    /// Reverse lookups are not offered.
    pub fn gethostbyaddr(&self, _addr: IpAddr) -> Result<HostEntry, HostError> {
        Err(HostError::unavailable(None))
    }
}

#[cfg(test)]
mod test {
    use std::thread;
    use std::net::{Ipv4Addr, UdpSocket};
    use std::time::Duration;

    use super::*;
    use crate::config::parse_config;
    use crate::resolver::{Error, Options, Resolver};
    use crate::routing::RoutingTable;

    fn options() -> Options {
        Options {
            retries: 0,
            timeout: Duration::from_millis(200),
            round_timeout: Duration::from_millis(200),
        }
    }

    fn host_resolver(conf: &str) -> HostResolver {
        let table = RoutingTable::new(parse_config(conf.as_bytes()).unwrap());
        HostResolver::new(table, Resolver::with_options(options()))
    }

    // Answers one query with 192.0.2.7, TTL 60.
    fn one_shot_server() -> (u16, thread::JoinHandle<()>) {
        let sock = UdpSocket::bind("127.0.0.1:0").unwrap();
        sock.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let port = sock.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let mut buf = [0u8; 512];
            if let Ok((len, from)) = sock.recv_from(&mut buf) {
                let mut data = buf[..len].to_vec();
                data[2] = 0x80;
                data[7] = 1;
                data.extend_from_slice(&[0xc0, 0x0c, 0, 1, 0, 1, 0, 0, 0, 60, 0, 4, 192, 0, 2, 7]);
                sock.send_to(&data, from).unwrap();
            }
        });
        (port, handle)
    }

    #[test]
    fn host_entry_from_answer() {
        let (port, server) = one_shot_server();
        let conf = format!(".example 127.0.0.1:{}\n", port);
        let mut hosts = host_resolver(&conf);

        let entry = hosts.gethostbyname("www.example", AddressFamily::Inet, 1024).unwrap();
        assert_eq!(entry,
                   HostEntry {
                       name: "dnspq-0".to_string(),
                       aliases: vec![],
                       addr_list: vec![Ipv4Addr::new(192, 0, 2, 7)],
                       ttl: 60,
                   });
        assert_eq!(entry.status(), Status::Success);
        server.join().unwrap();
    }

    #[test]
    fn unsupported_requests() {
        let mut hosts = host_resolver("nameserver 127.0.0.1\n");

        let err = hosts.gethostbyname("www.example", AddressFamily::Inet6, 1024).unwrap_err();
        assert_eq!(err.status(), Status::Unavailable);
        assert_eq!(err.errno, libc::EINVAL);
        assert_eq!(err.h_errno, NO_RECOVERY);
        assert!(err.cause.is_none());

        let err = hosts.gethostbyname("www.example", AddressFamily::Inet, MIN_BUFFER_LEN - 1)
            .unwrap_err();
        assert!(err.cause.is_none());

        let err = hosts.gethostbyaddr(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))).unwrap_err();
        assert_eq!(err.status(), Status::Unavailable);
    }

    #[test]
    fn no_servers_short_circuits() {
        let mut hosts = host_resolver(".example 10.0.0.1\n");
        let err = hosts.gethostbyname("www.example.org", AddressFamily::Inet, 1024).unwrap_err();
        assert!(matches!(err.cause, Some(Error::NoServersAvailable)));
        assert_eq!(err.errno, libc::EINVAL);
    }

    #[test]
    fn families() {
        assert_eq!(AddressFamily::from_raw(libc::AF_INET), Some(AddressFamily::Inet));
        assert_eq!(AddressFamily::from_raw(libc::AF_INET6), Some(AddressFamily::Inet6));
        assert_eq!(AddressFamily::from_raw(-1), None);
    }
}
