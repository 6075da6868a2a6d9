#[macro_use]
extern crate log;
extern crate clap;
extern crate dnspq;
extern crate env_logger;

use std::process;
use std::path::PathBuf;
use std::net::Ipv4Addr;

use clap::Parser;
use dnspq::network::str2endpoint;
use dnspq::{Endpoint, Error, ResolveResult, Resolver, RoutingTable, ServerDirectory};

/// Resolve names by asking several nameservers in parallel.
#[derive(Parser, Debug)]
#[command(name = "dnspq", version)]
struct Args {
    /// Configuration with `nameserver <ip>` and `.<suffix> <ip[:port]>...` lines
    #[arg(short, long, default_value = "/etc/resolv.conf")]
    config: PathBuf,

    /// Nameserver to ask instead of the configured ones; may be repeated
    #[arg(short, long, value_name = "IP[:PORT]", value_parser = parse_endpoint)]
    server: Vec<Endpoint>,

    /// Resolve the names round-robin this many times and count how often an
    /// address repeats the previous one
    #[arg(short = 'n', long, default_value_t = 1)]
    count: usize,

    /// Log every round
    #[arg(short, long)]
    verbose: bool,

    names: Vec<String>,
}

fn parse_endpoint(s: &str) -> Result<Endpoint, String> {
    str2endpoint(s).ok_or_else(|| format!("not an IPv4 address: {}", s))
}

enum Servers {
    Fixed(ServerDirectory),
    Routed(RoutingTable),
}

impl Servers {
    fn resolve(&mut self, resolver: &mut Resolver, name: &str) -> Result<ResolveResult, Error> {
        match *self {
            Servers::Fixed(ref dir) => resolver.resolve(dir, name),
            Servers::Routed(ref mut table) => {
                let dir = table.lookup(name)?;
                resolver.resolve(dir, name)
            }
        }
    }
}

fn main() {
    let args = Args::parse();

    if args.names.is_empty() {
        println!("DNS Parallel Query v{}", dnspq::VERSION);
        return;
    }

    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut servers = match ServerDirectory::new(args.server.clone()) {
        Some(dir) => Servers::Fixed(dir),
        None => {
            match RoutingTable::from_file(&args.config) {
                Ok(table) => Servers::Routed(table),
                Err(e) => {
                    eprintln!("cannot read {}: {}", args.config.display(), e);
                    process::exit(1);
                }
            }
        }
    };

    let mut resolver = Resolver::new();
    let mut status = 0;
    let mut dups = 0;
    let mut last_addr: Option<Ipv4Addr> = None;

    // a single pass prints every answer; repeated passes only count
    let repeat = args.count > 1;
    let total = if repeat { args.count } else { args.names.len() };

    for i in 0..total {
        let name = &args.names[i % args.names.len()];
        match servers.resolve(&mut resolver, name) {
            Ok(r) => {
                if !repeat {
                    println!("{} ({}s/{})", r.addr, r.ttl, r.responder);
                } else {
                    debug!("{} => {} ({}s/{})", name, r.addr, r.ttl, r.responder);
                }
                if last_addr == Some(r.addr) {
                    dups += 1;
                }
                last_addr = Some(r.addr);
            }
            Err(e) => {
                println!("error resolving {}: {} (code {})", name, e, e.code());
                status = e.code();
            }
        }
    }

    if repeat {
        println!("dups: {}", dups);
    }
    process::exit(status);
}
