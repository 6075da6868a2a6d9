use std::io;
use std::io::Cursor;
use std::str::FromStr;
use std::net::Ipv4Addr;

use byteorder::{NetworkEndian, ReadBytesExt, WriteBytesExt};

use crate::server::Endpoint;

pub const DNS_PORT: u16 = 53;

macro_rules! slice2sized {
    ($bytes:expr, $l: expr) => (
        {
            let mut arr = [0u8; $l];
            for i in 0..$l {
                arr[i] = $bytes[i];
            }

            arr
        }
    )
}

/// Reads an IPv4 address from the first four octets of `data`.
pub fn slice2ip4(data: &[u8]) -> Option<Ipv4Addr> {
    if data.len() >= 4 {
        Some(Ipv4Addr::from(slice2sized!(data, 4)))
    } else {
        None
    }
}

/// Parses `ip` or `ip:port`. Only the leading digits of the port count; a
/// missing port, a zero port or a port without leading digits all mean the
/// default DNS port.
pub fn str2endpoint(s: &str) -> Option<Endpoint> {
    let mut parts = s.splitn(2, ':');
    let ip = try_opt!(parts.next());
    let addr = try_opt!(Ipv4Addr::from_str(ip).ok());
    let port = parts.next().and_then(leading_port).unwrap_or(0);

    Some(Endpoint::new(addr, if port == 0 { DNS_PORT } else { port }))
}

fn leading_port(s: &str) -> Option<u16> {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    u16::from_str(&s[..end]).ok()
}

pub trait NetworkWriteBytes: WriteBytesExt {
    fn put_u8(&mut self, num: u8) -> io::Result<()> {
        self.write_u8(num)
    }

    fn put_u16(&mut self, num: u16) -> io::Result<()> {
        self.write_u16::<NetworkEndian>(num)
    }

    fn put_u32(&mut self, num: u32) -> io::Result<()> {
        self.write_u32::<NetworkEndian>(num)
    }
}

impl NetworkWriteBytes for Vec<u8> {}

pub trait NetworkReadBytes: ReadBytesExt {
    fn get_u8(&mut self) -> io::Result<u8> {
        self.read_u8()
    }

    fn get_u16(&mut self) -> io::Result<u16> {
        self.read_u16::<NetworkEndian>()
    }

    fn get_u32(&mut self) -> io::Result<u32> {
        self.read_u32::<NetworkEndian>()
    }
}

impl<'a> NetworkReadBytes for Cursor<&'a [u8]> {}

#[macro_export]
macro_rules! unpack {
    (u32, $r:expr) => ( try_opt!($r.get_u32().ok()) );
    (u16, $r:expr) => ( try_opt!($r.get_u16().ok()) );
    (u8, $r:expr) => ( try_opt!($r.get_u8().ok()) );
}

#[macro_export]
macro_rules! try_pack {
    (u32, $r:expr, $v:expr) => ( $r.put_u32($v)? );
    (u16, $r:expr, $v:expr) => ( $r.put_u16($v)? );
    (u8, $r:expr, $v:expr) => ( $r.put_u8($v)? );
}

/// Reads a big-endian integer, turning a short read into `$e`.
#[macro_export]
macro_rules! try_unpack {
    (u32, $r:expr, $e:expr) => ( $r.get_u32().map_err(|_| $e)? );
    (u16, $r:expr, $e:expr) => ( $r.get_u16().map_err(|_| $e)? );
    (u8, $r:expr, $e:expr) => ( $r.get_u8().map_err(|_| $e)? );
}
