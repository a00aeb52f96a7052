//! IPv4: Internet Protocol v4
//!
//! # References
//!
//! - [RFC 791: Internet protocol][rfc]
//!
//! [rfc]: https://tools.ietf.org/html/rfc791

use core::fmt;
use core::marker::PhantomData;
use core::ops::Range;

use as_slice::{AsMutSlice, AsSlice};
use byteorder::{ByteOrder, NetworkEndian as NE};
use cast::{u16, usize};
use hash32_derive::Hash32;

use crate::{
    checksum::{self, Kind},
    config::Config,
    ether,
    fmt::Hex,
    icmp, mac, tcp,
    traits::Resize,
    udp, Invalid, Valid,
};

/* Packet structure */
const VERSION_IHL: usize = 0;
mod ihl {
    pub const MASK: u8 = (1 << SIZE) - 1;
    pub const OFFSET: usize = 0;
    pub const SIZE: usize = 4;
}
mod version {
    pub const MASK: u8 = (1 << SIZE) - 1;
    pub const OFFSET: usize = super::ihl::OFFSET + super::ihl::SIZE;
    pub const SIZE: usize = 4;
}

const TOTAL_LENGTH: Range<usize> = 2..4;
const IDENTIFICATION: Range<usize> = 4..6;

const FLAGS: usize = 6;
mod mf {
    pub const MASK: u8 = (1 << SIZE) - 1;
    pub const OFFSET: usize = 5;
    pub const SIZE: usize = 1;
}
mod df {
    pub const MASK: u8 = (1 << SIZE) - 1;
    pub const OFFSET: usize = super::mf::OFFSET + super::mf::SIZE;
    pub const SIZE: usize = 1;
}

const FRAGMENT_OFFSET: Range<usize> = 6..8;
const TTL: usize = 8;
const PROTOCOL: usize = 9;
const CHECKSUM: Range<usize> = 10..12;
const SOURCE: Range<usize> = 12..16;
const DESTINATION: Range<usize> = 16..20;

/// Size of the IPv4 header; options are neither sent nor accepted
pub const HEADER_SIZE: u16 = DESTINATION.end as u16;

/// Identification of every packet this stack originates
pub const IDENTIFICATION_VALUE: u16 = 2;

/// IPv4 packet
pub struct Packet<BUFFER, CHECKSUM>
where
    BUFFER: AsSlice<Element = u8>,
{
    buffer: BUFFER,
    _checksum: PhantomData<CHECKSUM>,
}

impl<B> Packet<B, Valid>
where
    B: AsSlice<Element = u8> + Resize,
{
    /* Constructors */
    /// Parses bytes into an IPv4 packet
    ///
    /// The buffer is truncated to the Total Length field, which drops any Ethernet padding
    pub fn parse(bytes: B) -> Result<Self, B> {
        let nbytes = bytes.as_slice().len();
        if nbytes < usize(HEADER_SIZE) {
            // input doesn't contain a complete header
            return Err(bytes);
        }

        let mut packet = Packet {
            buffer: bytes,
            _checksum: PhantomData,
        };

        let header_len = u16(packet.header_len());
        let total_len = packet.get_total_length();

        if packet.get_version() != 4
            || header_len < HEADER_SIZE
            || total_len < header_len
            || usize(total_len) > nbytes
            || !checksum::verify(packet.header(), Kind::Ip)
        {
            Err(packet.buffer)
        } else {
            packet.buffer.truncate(total_len);
            Ok(packet)
        }
    }
}

impl<B, C> Packet<B, C>
where
    B: AsSlice<Element = u8>,
{
    /* Getters */
    /// Returns the version field of the header
    pub fn get_version(&self) -> u8 {
        get!(self.as_slice()[VERSION_IHL], version)
    }

    /// Returns the IHL (Internet Header Length) field of the header
    pub fn get_ihl(&self) -> u8 {
        get!(self.as_slice()[VERSION_IHL], ihl)
    }

    /// Returns the total length field of the header
    pub fn get_total_length(&self) -> u16 {
        NE::read_u16(&self.as_slice()[TOTAL_LENGTH])
    }

    /// Returns the length (header + data) of this packet
    ///
    /// This returns the same value as the `get_total_length` method
    pub fn len(&self) -> u16 {
        self.get_total_length()
    }

    /// Returns the identification field of the header
    pub fn get_identification(&self) -> u16 {
        NE::read_u16(&self.as_slice()[IDENTIFICATION])
    }

    /// Returns the DF (Don't Fragment) field of the header
    pub fn get_df(&self) -> bool {
        get!(self.as_slice()[FLAGS], df) == 1
    }

    /// Returns the MF (More Fragments) field of the header
    pub fn get_mf(&self) -> bool {
        get!(self.as_slice()[FLAGS], mf) == 1
    }

    /// Returns the TTL (Time To Live) field of the header
    pub fn get_ttl(&self) -> u8 {
        self.as_slice()[TTL]
    }

    /// Returns the protocol field of the header
    pub fn get_protocol(&self) -> Protocol {
        self.as_slice()[PROTOCOL].into()
    }

    /// Returns the Source (IP address) field of the header
    pub fn get_source(&self) -> Addr {
        addr(&self.as_slice()[SOURCE])
    }

    /// Returns the Destination (IP address) field of the header
    pub fn get_destination(&self) -> Addr {
        addr(&self.as_slice()[DESTINATION])
    }

    /// Returns the header length in bytes
    pub fn header_len(&self) -> u8 {
        self.get_ihl() * 4
    }

    /* Miscellaneous */
    /// View into the payload
    pub fn payload(&self) -> &[u8] {
        let start = usize(self.header_len());
        let end = usize(self.get_total_length());
        &self.as_slice()[start..end]
    }

    /// Returns the byte representation of this packet
    pub fn as_bytes(&self) -> &[u8] {
        self.as_slice()
    }

    /// Frees the underlying buffer
    pub fn free(self) -> B {
        self.buffer
    }

    /* Private */
    fn as_slice(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    fn get_header_checksum(&self) -> u16 {
        NE::read_u16(&self.as_slice()[CHECKSUM])
    }

    fn payload_len(&self) -> u16 {
        self.get_total_length() - u16(self.header_len())
    }

    fn header(&self) -> &[u8] {
        &self.as_slice()[..usize(self.header_len())]
    }

    fn invalidate_header_checksum(self) -> Packet<B, Invalid> {
        Packet {
            buffer: self.buffer,
            _checksum: PhantomData,
        }
    }
}

impl<B, C> Packet<B, C>
where
    B: AsSlice<Element = u8> + AsMutSlice<Element = u8>,
{
    /* Miscellaneous */
    /// Mutable view into the payload
    pub fn payload_mut(&mut self) -> &mut [u8] {
        let start = usize(self.header_len());
        let end = usize(self.get_total_length());
        &mut self.as_mut_slice()[start..end]
    }

    /// Turns this packet around: it will be sent back to its source, from `own`
    pub fn reply_from(self, own: Addr) -> Packet<B, Invalid> {
        let source = self.get_source();

        let mut packet = self.invalidate_header_checksum();
        packet.set_destination(source);
        packet.set_source(own);
        packet
    }

    /* Private */
    fn as_mut_slice(&mut self) -> &mut [u8] {
        self.buffer.as_mut_slice()
    }
}

impl<B, C> Packet<B, C>
where
    B: AsSlice<Element = u8> + Resize,
{
    /* Miscellaneous */
    /// Returns the payload of this packet
    pub fn into_payload(self) -> B {
        let offset = u16(self.header_len());
        let mut buffer = self.buffer;
        buffer.slice_from(offset);
        buffer
    }
}

impl<B> Packet<B, Invalid>
where
    B: AsSlice<Element = u8> + AsMutSlice<Element = u8> + Resize,
{
    /* Constructors */
    /// Transforms the given buffer into an IPv4 packet
    ///
    /// Most of the header will be filled with sensible defaults:
    ///
    /// - Version = 4
    /// - IHL = 5
    /// - Total Length = `cmp::min(buffer.len(), u16::MAX)`
    /// - Identification = 0
    /// - DF = true
    /// - MF = false
    /// - Fragment Offset = 0
    /// - TTL = 64
    ///
    /// The fields that are left unpopulated are:
    ///
    /// - Protocol
    /// - Checksum
    /// - Source
    /// - Destination
    ///
    /// # Panics
    ///
    /// This constructor panics if the given `buffer` is smaller than `HEADER_SIZE`
    pub fn new(buffer: B) -> Self {
        let len = buffer.as_slice().len();
        assert!(len >= usize(HEADER_SIZE));

        let mut packet: Self = Packet {
            buffer,
            _checksum: PhantomData,
        };

        let total_len = u16(len).unwrap_or(u16::max_value());
        // version 4, IHL 5; DSCP and ECN 0
        packet.as_mut_slice()[VERSION_IHL] = 0x45;
        packet.as_mut_slice()[VERSION_IHL + 1] = 0;

        packet.set_total_length(total_len);
        packet.buffer.truncate(total_len);

        packet.set_identification(0);

        // DF set; MF and fragment offset cleared
        NE::write_u16(&mut packet.as_mut_slice()[FRAGMENT_OFFSET], 0);
        packet.set_df(true);

        packet.set_ttl(64); // cf. RFC 1700

        packet
    }

    /// Fills the payload with an ICMP message
    pub fn icmp<F>(&mut self, f: F)
    where
        F: FnOnce(&mut icmp::Message<&mut [u8]>),
    {
        self.set_protocol(Protocol::Icmp);
        let len = {
            let mut icmp = icmp::Message::new(self.payload_mut());
            f(&mut icmp);
            icmp.len()
        };
        self.truncate(len);
    }

    /// Fills the payload with an UDP packet
    ///
    /// The checksum is computed by `update_payload_checksum`
    pub fn udp<F>(&mut self, f: F)
    where
        F: FnOnce(&mut udp::Packet<&mut [u8]>),
    {
        self.set_protocol(Protocol::Udp);
        let len = {
            let mut udp = udp::Packet::new(self.payload_mut());
            f(&mut udp);
            udp.len()
        };
        self.truncate(len);
    }

    /// Fills the payload with a TCP segment
    ///
    /// The checksum is computed by `update_payload_checksum`
    pub fn tcp<F>(&mut self, f: F)
    where
        F: FnOnce(&mut tcp::Segment<&mut [u8]>),
    {
        self.set_protocol(Protocol::Tcp);
        let len = {
            let mut tcp = tcp::Segment::new(self.payload_mut());
            f(&mut tcp);
            tcp.len()
        };
        self.truncate(len);
    }

    /// Truncates the *payload* to the specified length
    pub fn truncate(&mut self, len: u16) {
        if self.payload_len() > len {
            let total_len = u16(self.header_len()) + len;
            self.set_total_length(total_len);
            self.buffer.truncate(total_len);
        }
    }
}

impl<B> Packet<B, Invalid>
where
    B: AsSlice<Element = u8> + AsMutSlice<Element = u8>,
{
    /// Wraps a buffer that already holds an IPv4 header, e.g. a received packet that will be
    /// rewritten into a reply
    ///
    /// # Panics
    ///
    /// This constructor panics if the buffer doesn't hold the whole header and payload
    pub fn in_place(buffer: B) -> Self {
        let packet: Self = Packet {
            buffer,
            _checksum: PhantomData,
        };

        let len = packet.as_slice().len();
        assert!(len >= usize(HEADER_SIZE));
        assert!(len >= usize(packet.header_len()));
        assert!(len >= usize(packet.get_total_length()));

        packet
    }

    /* Setters */
    /// Sets the identification field of the header
    pub fn set_identification(&mut self, id: u16) {
        NE::write_u16(&mut self.as_mut_slice()[IDENTIFICATION], id)
    }

    /// Sets the DF (Don't Fragment) field of the header
    pub fn set_df(&mut self, df: bool) {
        set!(self.as_mut_slice()[FLAGS], df, if df { 1 } else { 0 });
    }

    /// Sets the TTL (Time To Live) field of the header
    pub fn set_ttl(&mut self, ttl: u8) {
        self.as_mut_slice()[TTL] = ttl;
    }

    /// Sets the Protocol field of the header
    pub fn set_protocol(&mut self, proto: Protocol) {
        self.as_mut_slice()[PROTOCOL] = proto.into();
    }

    /// Sets the Source (IP address) field of the header
    pub fn set_source(&mut self, addr: Addr) {
        self.as_mut_slice()[SOURCE].copy_from_slice(&addr.0)
    }

    /// Sets the Destination (IP address) field of the header
    pub fn set_destination(&mut self, addr: Addr) {
        self.as_mut_slice()[DESTINATION].copy_from_slice(&addr.0)
    }

    /// Sets the Total Length to `header + len` where `len` is the new length of the payload
    ///
    /// # Panics
    ///
    /// This method panics if the packet doesn't fit in the buffer
    pub fn set_payload_len(&mut self, len: u16) {
        let total_len = u16(self.header_len()) + len;
        assert!(usize(total_len) <= self.as_slice().len());

        self.set_total_length(total_len);
    }

    /* Miscellaneous */
    /// Recomputes the checksum of the ICMP, UDP or TCP payload
    ///
    /// UDP and TCP checksums include the pseudo header so this must be called after the Source
    /// and Destination fields have been set. Payloads of other protocols are left untouched.
    pub fn update_payload_checksum(&mut self) {
        let header_len = usize(self.header_len());
        let total_len = usize(self.get_total_length());

        // (position of the checksum field, start of the checksummed bytes, kind)
        let (at, start, kind) = match self.get_protocol() {
            Protocol::Icmp => (header_len + 2, header_len, Kind::Icmp),
            Protocol::Udp => (header_len + 6, SOURCE.start, Kind::Udp),
            Protocol::Tcp => (header_len + 16, SOURCE.start, Kind::Tcp),
            Protocol::Unknown(_) => return,
        };

        if at + 2 > total_len {
            return;
        }

        debug_assert!(kind == Kind::Icmp || header_len == usize(HEADER_SIZE));
        let bytes = &mut self.as_mut_slice()[..total_len];
        bytes[at] = 0;
        bytes[at + 1] = 0;

        let mut sum = checksum::compute(&bytes[start..], kind);
        if kind == Kind::Udp && sum == 0 {
            // zero means "no checksum" in UDP
            sum = 0xffff;
        }
        NE::write_u16(&mut bytes[at..at + 2], sum);
    }

    /// Updates the Checksum field of the header
    pub fn update_checksum(mut self) -> Packet<B, Valid> {
        NE::write_u16(&mut self.as_mut_slice()[CHECKSUM], 0);
        let sum = checksum::compute(self.header(), Kind::Ip);
        NE::write_u16(&mut self.as_mut_slice()[CHECKSUM], sum);

        Packet {
            buffer: self.buffer,
            _checksum: PhantomData,
        }
    }

    /* Private */
    fn set_total_length(&mut self, len: u16) {
        NE::write_u16(&mut self.as_mut_slice()[TOTAL_LENGTH], len)
    }
}

impl<B> Packet<B, Valid>
where
    B: AsSlice<Element = u8> + AsMutSlice<Element = u8>,
{
    /* Setters */
    /// Sets the TTL (Time To Live) field of the header
    pub fn set_ttl(self, ttl: u8) -> Packet<B, Invalid> {
        let mut packet = self.invalidate_header_checksum();
        packet.set_ttl(ttl);
        packet
    }

    /// Sets the Source (IP address) field of the header
    pub fn set_source(self, addr: Addr) -> Packet<B, Invalid> {
        let mut packet = self.invalidate_header_checksum();
        packet.set_source(addr);
        packet
    }

    /// Sets the Destination (IP address) field of the header
    pub fn set_destination(self, addr: Addr) -> Packet<B, Invalid> {
        let mut packet = self.invalidate_header_checksum();
        packet.set_destination(addr);
        packet
    }
}

/// NOTE excludes the payload
impl<B, C> fmt::Debug for Packet<B, C>
where
    B: AsSlice<Element = u8>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ipv4::Packet")
            .field("version", &self.get_version())
            .field("ihl", &self.get_ihl())
            .field("total_length", &self.get_total_length())
            .field("identification", &self.get_identification())
            .field("df", &self.get_df())
            .field("mf", &self.get_mf())
            .field("ttl", &self.get_ttl())
            .field("protocol", &self.get_protocol())
            .field("checksum", &Hex(self.get_header_checksum()))
            .field("source", &self.get_source())
            .field("destination", &self.get_destination())
            .finish()
    }
}

/// Builds an IPv4 frame in `buffer` and returns the length of the frame
///
/// The Ethernet header goes from this device to the router (or to everyone if `destination` is
/// the broadcast address). The IPv4 header is filled from `config`; `f` fills the payload and may
/// override any header field. Both checksums are computed after `f` returns.
///
/// # Panics
///
/// This function panics if `buffer` can't hold the Ethernet and IPv4 headers
pub fn frame<F>(buffer: &mut [u8], config: &Config, destination: Addr, f: F) -> u16
where
    F: FnOnce(&mut Packet<&mut [u8], Invalid>),
{
    let mut eth = ether::Frame::new(buffer);
    eth.set_destination(if destination == Addr::BROADCAST {
        mac::Addr::BROADCAST
    } else {
        config.router_mac
    });
    eth.set_source(config.mac);

    eth.ipv4(|ip| {
        ip.set_identification(IDENTIFICATION_VALUE);
        ip.set_ttl(config.ttl);
        ip.set_source(config.ip);
        ip.set_destination(destination);
        f(ip);
    });

    eth.len()
}

fn addr(bytes: &[u8]) -> Addr {
    let mut addr = Addr::UNSPECIFIED;
    addr.0.copy_from_slice(bytes);
    addr
}

/// IPv4 address
#[derive(Clone, Copy, Eq, Hash32, PartialEq)]
pub struct Addr(pub [u8; 4]);

impl Addr {
    /// Limited broadcast address
    pub const BROADCAST: Self = Addr([255; 4]);

    /// Loopback address
    pub const LOOPBACK: Self = Addr([127, 0, 0, 1]);

    /// Unspecified address
    pub const UNSPECIFIED: Self = Addr([0; 4]);

    /// Checks if this is the unspecified address
    pub fn is_unspecified(&self) -> bool {
        *self == Self::UNSPECIFIED
    }
}

impl fmt::Debug for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ipv4::Addr({})", self)
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use core::fmt::Write;

        let mut is_first = true;
        for byte in &self.0 {
            if is_first {
                is_first = false;
            } else {
                f.write_char('.')?;
            }

            write!(f, "{}", byte)?;
        }

        Ok(())
    }
}

full_range!(
    u8,
    /// IP protocol
    #[derive(Clone, Copy, Debug, PartialEq)]
    pub enum Protocol {
        /// ICMP
        Icmp = 0x01,
        /// TCP
        Tcp = 0x06,
        /// UDP
        Udp = 0x11,
    }
);
