//! Resolve a hostname to an IPv4 address by asking several nameservers at
//! once over UDP and taking the first well-formed answer.
//!
//! The pieces, leaves first:
//!
//! * [`parser`] encodes the question and decodes the first address record of
//!   a response.
//! * [`ServerDirectory`] is the ordered set of nameservers asked in one call.
//! * [`Resolver`] fans the question out to a directory, and validates and
//!   selects responses under a deadline, retrying whole rounds.
//! * [`RoutingTable`] picks the directory for a name by domain suffix.
//! * [`HostResolver`] ties the table and the engine together behind a
//!   `gethostbyname`-shaped interface.
//!
//! ```no_run
//! use dnspq::{Endpoint, Resolver, ServerDirectory};
//!
//! let servers = ServerDirectory::new(vec![
//!     Endpoint::new([192, 0, 2, 1].into(), 53),
//!     Endpoint::new([192, 0, 2, 2].into(), 53),
//! ]).unwrap();
//! let mut resolver = Resolver::new();
//! match resolver.resolve(&servers, "www.example.com") {
//!     Ok(r) => println!("{} ({}s/{})", r.addr, r.ttl, r.responder),
//!     Err(e) => println!("error: {} ({})", e, e.code()),
//! }
//! ```
#[macro_use]
extern crate try_opt;
#[macro_use]
extern crate log;
extern crate byteorder;
extern crate libc;
extern crate mio;
extern crate rand;

#[allow(dead_code, non_snake_case)]
mod QType {
    pub const A: u16 = 1;
}

#[allow(dead_code, non_snake_case)]
mod QClass {
    pub const IN: u16 = 1;
}

#[macro_use]
pub mod network;
pub mod parser;
pub mod server;
pub mod resolver;
pub mod config;
pub mod routing;
pub mod host;

pub use config::GroupRecord;
pub use host::{AddressFamily, HostEntry, HostError, HostResolver, Status};
pub use resolver::{Error, IdGenerator, Options, ResolveResult, Resolver};
pub use routing::RoutingTable;
pub use server::{Endpoint, ServerDirectory, MAX_SERVERS};

/// Version string printed by the front end.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
