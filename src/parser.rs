//! All communications inside of the domain protocol are carried in a single
//! format called a message.  The top level format of message is divided
//! into 5 sections (some of which are empty in certain cases) shown below:
//!
//! ```text
//!     +---------------------+
//!     |        Header       |
//!     +---------------------+
//!     |       Question      | the question for the name server
//!     +---------------------+
//!     |        Answer       | RRs answering the question
//!     +---------------------+
//!     |      Authority      | RRs pointing toward an authority
//!     +---------------------+
//!     |      Additional     | RRs holding additional information
//!     +---------------------+
//! ```
//!
//! Only what an IPv4 lookup needs is handled here: a query carries exactly
//! one question for an `A` record of class `IN`, and from a response only
//! the first answer record is read. The header section format:
//!
//! ```text
//!                                     1  1  1  1  1  1
//!       0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
//!     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
//!     |                      ID                       |
//!     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
//!     |QR|   Opcode  |AA|TC|RD|RA|   Z    |   RCODE   |
//!     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
//!     |                    QDCOUNT                    |
//!     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
//!     |                    ANCOUNT                    |
//!     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
//!     |                    NSCOUNT                    |
//!     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
//!     |                    ARCOUNT                    |
//!     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
//! ```
use std::io;
use std::io::Cursor;
use std::net::Ipv4Addr;

use crate::network::*;
use crate::resolver::Error;
use crate::{QClass, QType};

pub const HEADER_SIZE: usize = 12;
/// Largest message sent or received over UDP.
pub const MAX_MESSAGE_SIZE: usize = 512;
/// Longest encoded name, terminating zero label included.
pub const MAX_NAME_SIZE: usize = 255;

pub const OPCODE_QUERY: u8 = 0;

pub mod rcode {
    pub const NO_ERROR: u8 = 0;
    pub const FORMAT_ERROR: u8 = 1;
    pub const SERVER_FAILURE: u8 = 2;
    pub const NAME_ERROR: u8 = 3;
    pub const NOT_IMPLEMENTED: u8 = 4;
    pub const REFUSED: u8 = 5;
}

/// The fixed 12-octet header of every message.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default)]
pub struct Header {
    pub id: u16,
    pub qr: bool,
    pub opcode: u8,
    pub aa: bool,
    pub tc: bool,
    pub rd: bool,
    pub ra: bool,
    pub z: u8,
    pub rcode: u8,
    pub qdcount: u16,
    pub ancount: u16,
    pub nscount: u16,
    pub arcount: u16,
}

impl Header {
    /// A standard query carrying one question. The id is left zero, it is
    /// filled in per destination.
    pub fn query() -> Header {
        Header {
            opcode: OPCODE_QUERY,
            qdcount: 1,
            ..Header::default()
        }
    }

    fn flags(&self) -> u16 {
        (self.qr as u16) << 15 | ((self.opcode & 0x0F) as u16) << 11 |
        (self.aa as u16) << 10 | (self.tc as u16) << 9 | (self.rd as u16) << 8 |
        (self.ra as u16) << 7 | ((self.z & 0x07) as u16) << 4 | (self.rcode & 0x0F) as u16
    }

    pub fn write(&self, buf: &mut Vec<u8>) -> io::Result<()> {
        try_pack!(u16, buf, self.id);
        try_pack!(u16, buf, self.flags());
        try_pack!(u16, buf, self.qdcount);
        try_pack!(u16, buf, self.ancount);
        try_pack!(u16, buf, self.nscount);
        try_pack!(u16, buf, self.arcount);
        Ok(())
    }

    pub fn parse(data: &[u8]) -> Result<Header, Error> {
        if data.len() < HEADER_SIZE {
            return Err(Error::TruncatedHeader);
        }

        let mut r = Cursor::new(data);
        let id = try_unpack!(u16, r, Error::TruncatedHeader);
        let flags = try_unpack!(u16, r, Error::TruncatedHeader);
        let qdcount = try_unpack!(u16, r, Error::TruncatedHeader);
        let ancount = try_unpack!(u16, r, Error::TruncatedHeader);
        let nscount = try_unpack!(u16, r, Error::TruncatedHeader);
        let arcount = try_unpack!(u16, r, Error::TruncatedHeader);

        Ok(Header {
            id: id,
            qr: flags & 0x8000 != 0,
            opcode: ((flags >> 11) & 0x0F) as u8,
            aa: flags & 0x0400 != 0,
            tc: flags & 0x0200 != 0,
            rd: flags & 0x0100 != 0,
            ra: flags & 0x0080 != 0,
            z: ((flags >> 4) & 0x07) as u8,
            rcode: (flags & 0x0F) as u8,
            qdcount: qdcount,
            ancount: ancount,
            nscount: nscount,
            arcount: arcount,
        })
    }

    /// Checks the header of a response to one of our queries and maps its
    /// response code onto the error taxonomy.
    pub fn check_response(&self) -> Result<(), Error> {
        if !self.qr {
            return Err(Error::NotAResponse);
        }
        if self.opcode != OPCODE_QUERY {
            return Err(Error::UnsupportedOpcode);
        }
        match self.rcode {
            rcode::NO_ERROR => {}
            rcode::FORMAT_ERROR |
            rcode::SERVER_FAILURE |
            rcode::NOT_IMPLEMENTED |
            rcode::REFUSED => return Err(Error::ServerRejected(self.rcode)),
            rcode::NAME_ERROR => return Err(Error::NameDoesNotExist),
            _ => return Err(Error::ReservedResponseCode(self.rcode)),
        }
        if self.ancount < 1 {
            return Err(Error::EmptyAnswer);
        }
        Ok(())
    }
}

// For detail, see page 7 of RFC 1035
fn build_name(name: &str) -> Result<Vec<u8>, Error> {
    let mut v = vec![];
    for label in name.as_bytes().split(|ch| *ch == b'.') {
        match label.len() {
            0 => continue,
            n if n > 255 => return Err(Error::QueryTooLong),
            n => {
                v.push(n as u8);
                v.extend_from_slice(label);
            }
        }
    }

    v.push(0);
    if v.len() > MAX_NAME_SIZE {
        return Err(Error::QueryTooLong);
    }
    Ok(v)
}

/// An encoded query, ready to be stamped with a transaction id and sent.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Query {
    buf: Vec<u8>,
}

impl Query {
    // For detail, see page 24 of RFC 1035
    pub fn new(name: &str) -> Result<Query, Error> {
        // The header section:
        //
        //     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
        //     |         filled in per destination             |
        //     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
        //     | 0|     0     | 0| 0| 0| 0|   0    |     0     |
        //     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
        //     |                       1                       |
        //     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
        //     |                       0                       |
        //     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
        //     |                       0                       |
        //     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
        //     |                       0                       |
        //     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
        let qname = build_name(name)?;
        let mut buf = Vec::with_capacity(HEADER_SIZE + qname.len() + 4);
        Header::query().write(&mut buf)?;
        buf.extend(qname);
        try_pack!(u16, buf, QType::A);
        try_pack!(u16, buf, QClass::IN);

        Ok(Query { buf: buf })
    }

    /// Length of header plus question. A response echoes both, so this is
    /// also where its answer section starts.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn set_id(&mut self, id: u16) {
        self.buf[0] = (id >> 8) as u8;
        self.buf[1] = id as u8;
    }
}

/// A question section entry.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Question {
    pub labels: Vec<String>,
    pub qtype: u16,
    pub qclass: u16,
}

impl Question {
    /// Reads a question written with literal labels, starting at `offset`.
    /// Every length octet is taken as a plain length, as `Query` writes them.
    pub fn parse(data: &[u8], offset: usize) -> Option<Question> {
        let mut p = offset;
        let mut labels = vec![];
        loop {
            let l = *try_opt!(data.get(p)) as usize;
            if l == 0 {
                p += 1;
                break;
            }
            let label = try_opt!(data.get(p + 1..p + 1 + l));
            labels.push(try_opt!(String::from_utf8(label.to_vec()).ok()));
            p += 1 + l;
        }

        let mut r = Cursor::new(try_opt!(data.get(p..)));
        let qtype = unpack!(u16, r);
        let qclass = unpack!(u16, r);

        Some(Question {
            labels: labels,
            qtype: qtype,
            qclass: qclass,
        })
    }
}

/// The address record picked out of a response.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct Answer {
    pub addr: Ipv4Addr,
    pub ttl: u32,
}

// Returns the offset just past the owner name that starts at `p`. A
// compression pointer is stepped over, not followed.
fn skip_name(data: &[u8], mut p: usize) -> Result<usize, Error> {
    loop {
        let l = *data.get(p).ok_or(Error::IncompleteMessage)?;
        if l & 0xC0 == 0xC0 {
            //    +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
            //    | 1  1|                OFFSET                   |
            //    +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
            return Ok(p + 2);
        }
        if l == 0 {
            return Ok(p + 1);
        }
        p += 1 + l as usize;
    }
}

/// Decodes the first answer of a response to a query `question_len` octets
/// long. The header is checked first, then the echoed question is skipped
/// without looking at it.
// For detail, see page 27, 28 of RFC 1035
pub fn parse_answer(header: &Header, data: &[u8], question_len: usize) -> Result<Answer, Error> {
    header.check_response()?;
    if data.len() <= question_len {
        return Err(Error::IncompleteMessage);
    }

    //                                    1  1  1  1  1  1
    //      0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
    //    +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    //    |                                               |
    //    /                                               /
    //    /                      NAME                     /
    //    |                                               |
    //    +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    //    |                      TYPE                     |
    //    +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    //    |                     CLASS                     |
    //    +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    //    |                      TTL                      |
    //    |                                               |
    //    +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    //    |                   RDLENGTH                    |
    //    +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--|
    //    /                     RDATA                     /
    //    /                                               /
    //    +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    let p = skip_name(data, question_len)?;
    let mut r = Cursor::new(data.get(p..).ok_or(Error::IncompleteMessage)?);

    if try_unpack!(u16, r, Error::IncompleteMessage) != QType::A {
        return Err(Error::WrongRecordType);
    }
    if try_unpack!(u16, r, Error::IncompleteMessage) != QClass::IN {
        return Err(Error::WrongRecordClass);
    }
    let ttl = try_unpack!(u32, r, Error::IncompleteMessage);
    if try_unpack!(u16, r, Error::IncompleteMessage) != 4 {
        return Err(Error::WrongAddressLength);
    }

    let rdata = p + 10;
    let addr = data.get(rdata..)
        .and_then(slice2ip4)
        .ok_or(Error::IncompleteMessage)?;

    Ok(Answer {
        addr: addr,
        ttl: ttl,
    })
}

/// Header check and answer decode in one step.
pub fn parse_response(data: &[u8], question_len: usize) -> Result<Answer, Error> {
    let header = Header::parse(data)?;
    parse_answer(&header, data, question_len)
}
