use std::io;
use std::fmt;
use std::error;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};

use mio::{Events, Interest, Poll, Token};
use mio::net::UdpSocket;

use crate::parser::*;
use crate::server::{ServerDirectory, MAX_SERVERS};

/// Rounds tried after the first one times out.
pub const MAX_RETRIES: usize = 1;
/// The most a whole call may take.
pub const MAX_TIMEOUT: Duration = Duration::from_millis(500);
/// The most one round waits for answers.
pub const RETRY_TIMEOUT: Duration = Duration::from_millis(300);

const TOKEN: Token = Token(0);

pub enum Error {
    QueryTooLong,
    SocketCreateFailed(io::Error),
    SendFailed(io::Error),
    Timeout,
    TruncatedHeader,
    InvalidId(u16),
    NotAResponse,
    UnsupportedOpcode,
    ServerRejected(u8),
    NameDoesNotExist,
    ReservedResponseCode(u8),
    EmptyAnswer,
    IncompleteMessage,
    WrongRecordType,
    WrongRecordClass,
    WrongAddressLength,
    NoServersAvailable,
    IO(io::Error),
}

impl Error {
    /// Stable non-zero number for each kind of error, for front ends and
    /// exit statuses.
    pub fn code(&self) -> i32 {
        match *self {
            Error::QueryTooLong => 1,
            Error::SendFailed(_) => 2,
            Error::SocketCreateFailed(_) => 3,
            Error::TruncatedHeader => 4,
            Error::Timeout => 5,
            Error::NoServersAvailable => 6,
            Error::InvalidId(_) => 7,
            Error::NotAResponse => 8,
            Error::UnsupportedOpcode => 9,
            Error::ServerRejected(_) => 10,
            Error::ReservedResponseCode(_) => 11,
            Error::EmptyAnswer => 12,
            Error::NameDoesNotExist => 13,
            Error::IncompleteMessage => 14,
            Error::WrongAddressLength => 15,
            Error::WrongRecordType => 16,
            Error::WrongRecordClass => 17,
            Error::IO(_) => 18,
        }
    }

    /// Whether the call has to stop here instead of starting another round.
    pub fn is_terminal(&self) -> bool {
        match *self {
            Error::QueryTooLong |
            Error::SocketCreateFailed(_) |
            Error::SendFailed(_) |
            Error::NameDoesNotExist |
            Error::NoServersAvailable |
            Error::IO(_) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::QueryTooLong => write!(f, "query name too long"),
            Error::SocketCreateFailed(ref e) => write!(f, "cannot create socket: {}", e),
            Error::SendFailed(ref e) => write!(f, "send failed: {}", e),
            Error::Timeout => write!(f, "timeout"),
            Error::TruncatedHeader => write!(f, "response shorter than a header"),
            Error::InvalidId(id) => write!(f, "response id {} does not match any query", id),
            Error::NotAResponse => write!(f, "message is not a response"),
            Error::UnsupportedOpcode => write!(f, "response is not for a standard query"),
            Error::ServerRejected(rcode) => write!(f, "server rejected query (rcode {})", rcode),
            Error::NameDoesNotExist => write!(f, "name does not exist"),
            Error::ReservedResponseCode(rcode) => write!(f, "reserved response code {}", rcode),
            Error::EmptyAnswer => write!(f, "no answer records"),
            Error::IncompleteMessage => write!(f, "response ends prematurely"),
            Error::WrongRecordType => write!(f, "answer is not an address record"),
            Error::WrongRecordClass => write!(f, "answer is not of class IN"),
            Error::WrongAddressLength => write!(f, "answer address is not 4 octets"),
            Error::NoServersAvailable => write!(f, "no nameservers available for this name"),
            Error::IO(ref e) => write!(f, "{}", e),
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} (code {})", self, self.code())
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::SocketCreateFailed(ref e) |
            Error::SendFailed(ref e) |
            Error::IO(ref e) => Some(e),
            _ => None,
        }
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> io::Error {
        let errmsg = format!("dns resolve error: {:?}", e);
        io::Error::new(io::ErrorKind::Other, errmsg)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Error {
        Error::IO(e)
    }
}

/// Timing and retry knobs of a [`Resolver`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Options {
    /// Extra rounds after the first one fails.
    pub retries: usize,
    /// Budget for the whole call.
    pub timeout: Duration,
    /// Ceiling on how long one round waits for answers.
    pub round_timeout: Duration,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            retries: MAX_RETRIES,
            timeout: MAX_TIMEOUT,
            round_timeout: RETRY_TIMEOUT,
        }
    }
}

/// Hands out blocks of transaction ids, one block per round.
///
/// A round asking `n` servers uses `base..base + n`. The base never is zero
/// and never comes close enough to `u16::MAX` for the block to wrap.
#[derive(Clone, Debug)]
pub struct IdGenerator {
    counter: u16,
}

impl IdGenerator {
    /// Starts at a random point so that separate processes do not walk the
    /// same id sequence.
    pub fn new() -> IdGenerator {
        IdGenerator::starting_at(rand::random::<u16>())
    }

    /// The first round gets the id after `counter`.
    pub fn starting_at(counter: u16) -> IdGenerator {
        IdGenerator { counter: counter }
    }

    /// Base id for the next round.
    pub fn next_round(&mut self) -> u16 {
        self.counter = self.counter.wrapping_add(1);
        if self.counter == 0 {
            self.counter += 1;
        }
        if u16::max_value() - (MAX_SERVERS as u16) < self.counter {
            self.counter = 1;
        }
        self.counter
    }
}

impl Default for IdGenerator {
    fn default() -> IdGenerator {
        IdGenerator::new()
    }
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct ResolveResult {
    pub addr: Ipv4Addr,
    pub ttl: u32,
    /// Position in the directory of the server whose answer was taken.
    pub responder: usize,
}

/// The parallel query engine.
///
/// Every call sends the same question to all servers of a directory, each
/// under its own transaction id, and takes the first response that passes
/// validation. A round that produces no usable answer is repeated with a
/// fresh socket and fresh ids while retries and time remain.
///
/// Resolving takes `&mut self` because of the id counter: share one
/// resolver between threads by putting it behind a `Mutex`.
pub struct Resolver {
    options: Options,
    ids: IdGenerator,
}

impl Resolver {
    pub fn new() -> Resolver {
        Resolver::with_options(Options::default())
    }

    pub fn with_options(options: Options) -> Resolver {
        Resolver {
            options: options,
            ids: IdGenerator::new(),
        }
    }

    pub fn with_ids(options: Options, ids: IdGenerator) -> Resolver {
        Resolver {
            options: options,
            ids: ids,
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Resolves `name` within the configured overall timeout.
    pub fn resolve(&mut self, servers: &ServerDirectory, name: &str) -> Result<ResolveResult, Error> {
        let deadline = Instant::now() + self.options.timeout;
        self.resolve_until(servers, name, deadline)
    }

    /// Resolves `name`, giving up at `deadline`. A deadline already in the
    /// past fails with `Timeout` before anything is sent.
    pub fn resolve_until(&mut self,
                         servers: &ServerDirectory,
                         name: &str,
                         deadline: Instant)
                         -> Result<ResolveResult, Error> {
        let res = self.do_resolve(servers, name, deadline);
        if let Err(ref e) = res {
            info!("error while resolving {}: {:?}", name, e);
        }
        res
    }

    fn do_resolve(&mut self,
                  servers: &ServerDirectory,
                  name: &str,
                  deadline: Instant)
                  -> Result<ResolveResult, Error> {
        let mut query = Query::new(name)?;
        let mut retries = self.options.retries;
        let mut err = Error::Timeout;

        loop {
            if Instant::now() >= deadline {
                return Err(err);
            }

            match self.round(servers, &mut query, deadline) {
                Ok(r) => return Ok(r),
                Err(e) => {
                    if e.is_terminal() {
                        return Err(e);
                    }
                    err = e;
                }
            }

            if retries == 0 {
                return Err(err);
            }
            retries -= 1;
            debug!("retrying {} due to error: {:?}, retries left: {}", name, err, retries);
        }
    }

    // One send-to-all-then-wait cycle. Socket and poll are dropped on return.
    fn round(&mut self,
             servers: &ServerDirectory,
             query: &mut Query,
             deadline: Instant)
             -> Result<ResolveResult, Error> {
        let nums = servers.len();
        let base = self.ids.next_round();

        let local = SocketAddr::from(([0u8; 4], 0));
        let mut sock = UdpSocket::bind(local).map_err(Error::SocketCreateFailed)?;
        let mut poll = Poll::new().map_err(Error::SocketCreateFailed)?;
        poll.registry()
            .register(&mut sock, TOKEN, Interest::READABLE)
            .map_err(Error::SocketCreateFailed)?;

        for (i, server) in servers.iter().enumerate() {
            query.set_id(base + i as u16);
            let sent = sock.send_to(query.as_bytes(), server.socket_addr())
                .map_err(Error::SendFailed)?;
            if sent != query.len() {
                return Err(Error::SendFailed(io::Error::new(io::ErrorKind::Other,
                                                            "short UDP send")));
            }
        }

        let round_deadline = ::std::cmp::min(Instant::now() + self.options.round_timeout,
                                             deadline);
        debug!("sent ids {}..{} to {}, waiting {:?}",
               base,
               base as usize + nums,
               servers,
               round_deadline.saturating_duration_since(Instant::now()));

        let mut err = Error::Timeout;
        let mut heard = [false; MAX_SERVERS];
        let mut nheard = 0;
        let mut events = Events::with_capacity(8);
        let mut buf = [0u8; MAX_MESSAGE_SIZE];

        loop {
            let now = Instant::now();
            if now >= round_deadline || nheard >= nums {
                return Err(err);
            }

            if let Err(e) = poll.poll(&mut events, Some(round_deadline - now)) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(Error::IO(e));
            }
            if events.is_empty() {
                continue;
            }

            // edge triggered: drain the socket
            loop {
                if Instant::now() >= round_deadline {
                    break;
                }
                let len = match sock.recv_from(&mut buf) {
                    Ok((len, _)) => len,
                    Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                    Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    // e.g. ICMP port unreachable reported on the socket
                    Err(ref e) if e.kind() == io::ErrorKind::ConnectionRefused => continue,
                    Err(e) => return Err(Error::IO(e)),
                };

                match check_datagram(&buf[..len], base, nums, query.len()) {
                    Ok((responder, Ok(answer))) => {
                        return Ok(ResolveResult {
                            addr: answer.addr,
                            ttl: answer.ttl,
                            responder: responder,
                        });
                    }
                    Ok((_, Err(Error::NameDoesNotExist))) => return Err(Error::NameDoesNotExist),
                    Ok((responder, Err(e))) => {
                        trace!("discarding response from server {}: {:?}", responder, e);
                        // a query-shaped datagram is nobody's answer
                        if !heard[responder] && !matches!(e, Error::NotAResponse) {
                            heard[responder] = true;
                            nheard += 1;
                        }
                        err = e;
                    }
                    Err(e) => {
                        trace!("discarding datagram: {:?}", e);
                        err = e;
                    }
                }
            }
        }
    }
}

impl Default for Resolver {
    fn default() -> Resolver {
        Resolver::new()
    }
}

// Matches one datagram against the round's id block. Datagrams that cannot
// be tied to a server fail outright; otherwise the responder index comes back
// with the outcome of decoding.
fn check_datagram(data: &[u8],
                  base: u16,
                  nums: usize,
                  question_len: usize)
                  -> Result<(usize, Result<Answer, Error>), Error> {
    let header = Header::parse(data)?;
    if header.id < base || (header.id - base) as usize >= nums {
        return Err(Error::InvalidId(header.id));
    }

    let responder = (header.id - base) as usize;
    Ok((responder, parse_answer(&header, data, question_len)))
}
