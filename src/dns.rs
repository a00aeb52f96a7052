//! DNS: Domain Name System
//!
//! Just enough of a stub resolver to turn a host name into an IPv4 address: one A query, whose
//! response is scanned for the first A record
//!
//! # References
//!
//! - [RFC 1035: Domain names - implementation and specification][rfc]
//!
//! [rfc]: https://tools.ietf.org/html/rfc1035

use core::fmt;
use core::ops::Range;

use as_slice::{AsMutSlice, AsSlice};
use byteorder::{ByteOrder, NetworkEndian as NE};
use cast::usize;

use crate::{config::Config, fmt::Hex, ipv4};

/* Message structure */
const ID: Range<usize> = 0..2;
const FLAGS: Range<usize> = 2..4;
const QDCOUNT: Range<usize> = 4..6;
const ANCOUNT: Range<usize> = 6..8;
const NSCOUNT: Range<usize> = 8..10;
const ARCOUNT: Range<usize> = 10..12;

/// Size of the DNS header
pub const HEADER_SIZE: u16 = ARCOUNT.end as u16;

/// Server port
pub const PORT: u16 = 53;

/// Source port of our queries
pub const SOURCE_PORT: u16 = 0xABCD;

/// Transaction ID of our queries
pub const TRANSACTION_ID: u16 = 0xBAAB;

/// Flags of our queries: a standard query with recursion desired
pub const QUERY_FLAGS: u16 = 0x0100;

// QR bit
const RESPONSE: u16 = 1 << 15;
// RA bit and RCODE
const RA_RCODE_MASK: u16 = 0x008F;
const RA: u16 = 0x0080;

// Resource record type A and class IN
const TYPE_A: u16 = 1;
const CLASS_IN: u16 = 1;

// Ethernet + IPv4 + UDP
const HEADERS: usize = 14 + 20 + 8;

// Bytes that follow the name in a resource record: type, class, TTL and RDLENGTH
const RR_FIXED_SIZE: usize = 10;

// Longest label and name
const MAX_LABEL_LEN: usize = 63;
const MAX_NAME_LEN: usize = 253;

/// DNS errors
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Error {
    /// The host name can't be encoded as a sequence of labels
    InvalidName,
    /// The query doesn't fit in the buffer
    Truncated,
    /// The response is an error, carries no usable A record or is malformed
    Rejected,
}

/// DNS message
pub struct Message<BUFFER>
where
    BUFFER: AsSlice<Element = u8>,
{
    buffer: BUFFER,
}

impl<B> Message<B>
where
    B: AsSlice<Element = u8>,
{
    /* Constructors */
    /// Parses bytes into a DNS message
    pub fn parse(bytes: B) -> Result<Self, B> {
        if bytes.as_slice().len() < usize(HEADER_SIZE) {
            Err(bytes)
        } else {
            Ok(Message { buffer: bytes })
        }
    }

    /* Getters */
    /// Returns the ID field of the header
    pub fn get_id(&self) -> u16 {
        NE::read_u16(&self.as_slice()[ID])
    }

    /// Returns the flags (QR, Opcode, AA, TC, RD, RA, Z and RCODE) of the header
    pub fn get_flags(&self) -> u16 {
        NE::read_u16(&self.as_slice()[FLAGS])
    }

    /// Returns the QDCOUNT (question count) field of the header
    pub fn get_qdcount(&self) -> u16 {
        NE::read_u16(&self.as_slice()[QDCOUNT])
    }

    /// Returns the ANCOUNT (answer count) field of the header
    pub fn get_ancount(&self) -> u16 {
        NE::read_u16(&self.as_slice()[ANCOUNT])
    }

    /// Returns the byte representation of this message
    pub fn as_bytes(&self) -> &[u8] {
        self.as_slice()
    }

    /* Private */
    fn as_slice(&self) -> &[u8] {
        self.buffer.as_slice()
    }
}

impl<B> Message<B>
where
    B: AsSlice<Element = u8> + AsMutSlice<Element = u8>,
{
    /* Constructors */
    /// Transforms the buffer into a DNS query header: ID, flags and a question count of one
    ///
    /// # Panics
    ///
    /// This constructor panics if the buffer can't hold the header
    pub fn query(buffer: B) -> Self {
        assert!(buffer.as_slice().len() >= usize(HEADER_SIZE));

        let mut message = Message { buffer };
        let header = message.buffer.as_mut_slice();
        NE::write_u16(&mut header[ID], TRANSACTION_ID);
        NE::write_u16(&mut header[FLAGS], QUERY_FLAGS);
        NE::write_u16(&mut header[QDCOUNT], 1);
        NE::write_u16(&mut header[ANCOUNT], 0);
        NE::write_u16(&mut header[NSCOUNT], 0);
        NE::write_u16(&mut header[ARCOUNT], 0);
        message
    }
}

impl<B> fmt::Debug for Message<B>
where
    B: AsSlice<Element = u8>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("dns::Message")
            .field("id", &Hex(self.get_id()))
            .field("flags", &Hex(self.get_flags()))
            .field("qdcount", &self.get_qdcount())
            .field("ancount", &self.get_ancount())
            .finish()
    }
}

/// Encodes `name` as a sequence of length prefixed labels, terminated by the root label
///
/// A single trailing dot is accepted. Returns the number of bytes written to `buffer`.
pub fn encode_name(name: &str, buffer: &mut [u8]) -> Result<usize, Error> {
    let name = name.strip_suffix('.').unwrap_or(name);
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(Error::InvalidName);
    }

    let mut cursor = 0;
    for label in name.split('.') {
        let len = label.len();
        if len == 0 || len > MAX_LABEL_LEN {
            return Err(Error::InvalidName);
        }

        let end = cursor + 1 + len;
        // leave room for the root label
        if end >= buffer.len() {
            return Err(Error::Truncated);
        }

        buffer[cursor] = len as u8;
        buffer[cursor + 1..end].copy_from_slice(label.as_bytes());
        cursor = end;
    }

    buffer[cursor] = 0;
    Ok(cursor + 1)
}

/// Builds an A query for `name`, addressed to `config.dns`, in `buffer`
///
/// Returns the length of the frame
pub fn query(buffer: &mut [u8], config: &Config, name: &str) -> Result<u16, Error> {
    if buffer.len() < HEADERS + usize(HEADER_SIZE) {
        return Err(Error::Truncated);
    }

    let mut result = Ok(());
    let len = ipv4::frame(buffer, config, config.dns, |ip| {
        ip.udp(|udp| {
            udp.set_source(SOURCE_PORT);
            udp.set_destination(PORT);

            match question(udp.payload_mut(), name) {
                Ok(len) => udp.truncate(len as u16),
                Err(e) => result = Err(e),
            }
        })
    });

    result.map(|()| len)
}

// writes the header and the question; returns the length of the message
fn question(payload: &mut [u8], name: &str) -> Result<usize, Error> {
    let start = usize(HEADER_SIZE);
    Message::query(&mut payload[..start]);

    let end = start + encode_name(name, &mut payload[start..])?;
    let tail = payload.get_mut(end..end + 4).ok_or(Error::Truncated)?;
    NE::write_u16(&mut tail[..2], TYPE_A);
    NE::write_u16(&mut tail[2..], CLASS_IN);

    Ok(end + 4)
}

/// Extracts the address of the first A record of a response to our query
///
/// `message` is the payload of the UDP datagram. The response must carry our transaction ID,
/// have the QR and RA bits set and have an RCODE of zero. An all-zero address is treated as a
/// negative answer.
pub fn answer(message: &[u8]) -> Result<ipv4::Addr, Error> {
    let message = Message::parse(message).map_err(|_| Error::Rejected)?;

    let flags = message.get_flags();
    if message.get_id() != TRANSACTION_ID
        || flags & RESPONSE == 0
        || flags & RA_RCODE_MASK != RA
    {
        return Err(Error::Rejected);
    }

    let bytes = message.as_bytes();
    let mut cursor = usize(HEADER_SIZE);

    // the echoed question(s): name, type and class
    for _ in 0..message.get_qdcount() {
        cursor = skip_name(bytes, cursor)? + 4;
    }

    for _ in 0..message.get_ancount() {
        cursor = skip_name(bytes, cursor)?;

        let rr = bytes
            .get(cursor..cursor + RR_FIXED_SIZE)
            .ok_or(Error::Rejected)?;
        let type_ = NE::read_u16(&rr[..2]);
        let rdlength = usize(NE::read_u16(&rr[8..]));
        cursor += RR_FIXED_SIZE;

        if type_ == TYPE_A && rdlength == 4 {
            let rdata = bytes.get(cursor..cursor + 4).ok_or(Error::Rejected)?;

            let mut addr = ipv4::Addr::UNSPECIFIED;
            addr.0.copy_from_slice(rdata);
            return if addr.is_unspecified() {
                Err(Error::Rejected)
            } else {
                Ok(addr)
            };
        }

        cursor += rdlength;
    }

    Err(Error::Rejected)
}

// returns the position right after the name that starts at `cursor`
fn skip_name(bytes: &[u8], mut cursor: usize) -> Result<usize, Error> {
    loop {
        let len = *bytes.get(cursor).ok_or(Error::Rejected)?;

        if len & 0xC0 == 0xC0 {
            // compression pointer; it always ends the name
            return Ok(cursor + 2);
        }

        cursor += 1;
        if len == 0 {
            return Ok(cursor);
        }

        cursor += usize(len);
    }
}
