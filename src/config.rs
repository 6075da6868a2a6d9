//! The configuration file lists nameservers per domain suffix:
//!
//! ```text
//! # pools answered by their own load balancers
//! .pool-a.example  10.0.0.1 10.0.0.2:5353
//! .pool-a.example  10.0.1.1 10.0.1.2
//! .pool-b.example  10.0.2.1
//! nameserver 192.0.2.53
//! ```
//!
//! A `.suffix` line adds one shard of servers for names ending in that
//! suffix; repeating a suffix adds more, interchangeable, shards. `nameserver`
//! lines, as found in `/etc/resolv.conf`, make up the catch-all group used
//! for every other name. Anything else is ignored.
use std::io;
use std::fs::File;
use std::path::Path;
use std::io::{BufRead, BufReader};

use crate::network::*;
use crate::server::{Endpoint, MAX_SERVERS};

pub const DEFAULT_CONF: &str = "/etc/resolv-dnspq.conf";

const NAMESERVER: &str = "nameserver";

/// One group line: the suffix it serves, `None` for the catch-all, and its
/// servers in the order listed.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct GroupRecord {
    pub suffix: Option<String>,
    pub servers: Vec<Endpoint>,
}

fn parse_servers<'a, I: Iterator<Item = &'a str>>(fields: I) -> Vec<Endpoint> {
    fields.take(MAX_SERVERS)
        .filter_map(|field| {
            let server = str2endpoint(field);
            if server.is_none() {
                warn!("ignoring malformed nameserver address {}", field);
            }
            server
        })
        .collect()
}

/// Turns configuration text into group records, in file order with the
/// catch-all group last.
pub fn parse_config<R: BufRead>(reader: R) -> io::Result<Vec<GroupRecord>> {
    let mut records = vec![];
    let mut fallback = vec![];

    handle_every_line(reader,
                      &mut |line: &str| {
        let mut fields = line.split_whitespace();
        match fields.next() {
            Some(NAMESERVER) => {
                if fallback.len() == MAX_SERVERS {
                    warn!("more than {} nameserver lines, ignoring {}", MAX_SERVERS, line);
                    return;
                }
                fallback.extend(parse_servers(fields.take(1)));
            }
            Some(first) if first.starts_with('.') && first.len() > 1 => {
                let servers = parse_servers(fields);
                if servers.is_empty() {
                    warn!("no usable nameservers for {}, ignoring it", first);
                    return;
                }
                records.push(GroupRecord {
                    suffix: Some(first[1..].to_string()),
                    servers: servers,
                });
            }
            _ => {}
        }
    })?;

    if !fallback.is_empty() {
        records.push(GroupRecord {
            suffix: None,
            servers: fallback,
        });
    }

    Ok(records)
}

pub fn load_config<P: AsRef<Path>>(path: P) -> io::Result<Vec<GroupRecord>> {
    let f = File::open(path)?;
    parse_config(BufReader::new(f))
}

fn handle_every_line<R: BufRead>(reader: R, func: &mut dyn FnMut(&str)) -> io::Result<()> {
    for line in reader.lines() {
        let line = line?;
        func(line.trim());
    }
    Ok(())
}
