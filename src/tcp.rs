//! TCP: Transmission Control Protocol
//!
//! This is not a TCP implementation. Segments are answered one at a time by rewriting them in
//! place; there's no retransmission, no window management and no reassembly. Only one inbound
//! and one outbound connection can be served at any time.
//!
//! # References
//!
//! - [RFC 793: Transmission Control Protocol][rfc]
//!
//! [rfc]: https://tools.ietf.org/html/rfc793

use core::fmt;
use core::ops::Range;

use as_slice::{AsMutSlice, AsSlice};
use bitflags::bitflags;
use byteorder::{ByteOrder, NetworkEndian as NE};
use cast::usize;
use log::debug;

use crate::{config::Config, ether, fmt::Hex, ipv4, traits::Resize};

/* Segment structure */
const SOURCE: Range<usize> = 0..2;
const DESTINATION: Range<usize> = 2..4;
const SEQUENCE_NUMBER: Range<usize> = 4..8;
const ACKNOWLEDGMENT_NUMBER: Range<usize> = 8..12;

const DATA_OFFSET: usize = 12;
mod data_offset {
    pub const MASK: u8 = (1 << SIZE) - 1;
    pub const OFFSET: usize = 4;
    pub const SIZE: usize = 4;
}

const FLAGS: usize = 13;
const WINDOW: Range<usize> = 14..16;
const CHECKSUM: Range<usize> = 16..18;
const URGENT_POINTER: Range<usize> = 18..20;

/// Size of the TCP header without options
pub const HEADER_SIZE: u16 = URGENT_POINTER.end as u16;

/// Maximum Segment Size advertised in SYN segments
pub const MSS: u16 = 300;

/// The MSS option as it appears on the wire
pub const MSS_OPTION: [u8; 4] = [2, 4, (MSS >> 8) as u8, MSS as u8];

/// Window advertised by the HTTP client
pub const WINDOW_SIZE: u16 = MSS;

/// Initial sequence number of the HTTP client
pub const CLIENT_ISN: [u8; 4] = [0x00, 0x00, 0x10, 0x00];

// Ethernet + IPv4 + TCP, without options
const HEADERS: usize = 14 + 20 + 20;

bitflags! {
    /// Control bits
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Flags: u8 {
        /// No more data from sender
        const FIN = 1 << 0;
        /// Synchronize sequence numbers
        const SYN = 1 << 1;
        /// Reset the connection
        const RST = 1 << 2;
        /// Push function
        const PSH = 1 << 3;
        /// Acknowledgment field significant
        const ACK = 1 << 4;
        /// Urgent pointer field significant
        const URG = 1 << 5;
        /// ECN echo
        const ECE = 1 << 6;
        /// Congestion window reduced
        const CWR = 1 << 7;
    }
}

/// TCP segment
pub struct Segment<BUFFER>
where
    BUFFER: AsSlice<Element = u8>,
{
    buffer: BUFFER,
}

impl<B> Segment<B>
where
    B: AsSlice<Element = u8>,
{
    /* Constructors */
    /// Parses bytes into a TCP segment
    ///
    /// NOTE the segment spans all of `bytes`; TCP has no length field
    pub fn parse(bytes: B) -> Result<Self, B> {
        let nbytes = bytes.as_slice().len();
        if nbytes < usize(HEADER_SIZE) {
            return Err(bytes);
        }

        let segment = Segment { buffer: bytes };
        let header_len = usize(segment.header_len());
        if header_len < usize(HEADER_SIZE) || header_len > nbytes {
            Err(segment.buffer)
        } else {
            Ok(segment)
        }
    }

    /* Getters */
    /// Returns the Source (port) field of the header
    pub fn get_source(&self) -> u16 {
        NE::read_u16(&self.as_slice()[SOURCE])
    }

    /// Returns the Destination (port) field of the header
    pub fn get_destination(&self) -> u16 {
        NE::read_u16(&self.as_slice()[DESTINATION])
    }

    /// Returns the Sequence Number field of the header
    pub fn get_sequence_number(&self) -> [u8; 4] {
        let mut seq = [0; 4];
        seq.copy_from_slice(&self.as_slice()[SEQUENCE_NUMBER]);
        seq
    }

    /// Returns the Acknowledgment Number field of the header
    pub fn get_acknowledgment_number(&self) -> [u8; 4] {
        let mut ack = [0; 4];
        ack.copy_from_slice(&self.as_slice()[ACKNOWLEDGMENT_NUMBER]);
        ack
    }

    /// Returns the Data Offset field of the header
    pub fn get_data_offset(&self) -> u8 {
        get!(self.as_slice()[DATA_OFFSET], data_offset)
    }

    /// Returns the control bits
    pub fn get_flags(&self) -> Flags {
        Flags::from_bits_truncate(self.as_slice()[FLAGS])
    }

    /// Returns the Window field of the header
    pub fn get_window(&self) -> u16 {
        NE::read_u16(&self.as_slice()[WINDOW])
    }

    /// Returns the header length (options included) in bytes
    pub fn header_len(&self) -> u8 {
        self.get_data_offset() * 4
    }

    /// View into the options
    pub fn options(&self) -> &[u8] {
        &self.as_slice()[usize(HEADER_SIZE)..usize(self.header_len())]
    }

    /// View into the payload
    pub fn payload(&self) -> &[u8] {
        &self.as_slice()[usize(self.header_len())..]
    }

    /// Returns the length (header + data) of this segment
    pub fn len(&self) -> u16 {
        self.as_slice().len() as u16
    }

    /// Returns the byte representation of this segment
    pub fn as_bytes(&self) -> &[u8] {
        self.as_slice()
    }

    /* Private */
    fn as_slice(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    fn get_checksum(&self) -> u16 {
        NE::read_u16(&self.as_slice()[CHECKSUM])
    }
}

impl<B> Segment<B>
where
    B: AsSlice<Element = u8> + AsMutSlice<Element = u8>,
{
    /* Setters */
    /// Sets the Source (port) field of the header
    pub fn set_source(&mut self, port: u16) {
        NE::write_u16(&mut self.as_mut_slice()[SOURCE], port)
    }

    /// Sets the Destination (port) field of the header
    pub fn set_destination(&mut self, port: u16) {
        NE::write_u16(&mut self.as_mut_slice()[DESTINATION], port)
    }

    /// Sets the Sequence Number field of the header
    pub fn set_sequence_number(&mut self, seq: [u8; 4]) {
        self.as_mut_slice()[SEQUENCE_NUMBER].copy_from_slice(&seq)
    }

    /// Sets the Acknowledgment Number field of the header
    pub fn set_acknowledgment_number(&mut self, ack: [u8; 4]) {
        self.as_mut_slice()[ACKNOWLEDGMENT_NUMBER].copy_from_slice(&ack)
    }

    /// Sets the control bits
    pub fn set_flags(&mut self, flags: Flags) {
        self.as_mut_slice()[FLAGS] = flags.bits();
    }

    /// Sets the Window field of the header
    pub fn set_window(&mut self, window: u16) {
        NE::write_u16(&mut self.as_mut_slice()[WINDOW], window)
    }

    /// Writes `options` right after the fixed header and updates the Data Offset field
    ///
    /// This overwrites the start of the payload
    ///
    /// # Panics
    ///
    /// This method panics if the length of `options` is not a multiple of 4, exceeds 40 bytes or
    /// doesn't fit in the segment
    pub fn set_options(&mut self, options: &[u8]) {
        assert!(options.len() % 4 == 0 && options.len() <= 40);

        let start = usize(HEADER_SIZE);
        self.as_mut_slice()[start..start + options.len()].copy_from_slice(options);
        let offset = 5 + (options.len() / 4) as u8;
        set!(self.as_mut_slice()[DATA_OFFSET], data_offset, offset);
    }

    /// Mutable view into the payload
    pub fn payload_mut(&mut self) -> &mut [u8] {
        let start = usize(self.header_len());
        &mut self.as_mut_slice()[start..]
    }

    /* Private */
    fn as_mut_slice(&mut self) -> &mut [u8] {
        self.buffer.as_mut_slice()
    }
}

impl<B> Segment<B>
where
    B: AsSlice<Element = u8> + AsMutSlice<Element = u8> + Resize,
{
    /* Constructors */
    /// Transforms the given buffer into a TCP segment
    ///
    /// The segment spans the whole buffer. Data Offset is set to 5; the control bits, Checksum and
    /// Urgent Pointer are zeroed.
    ///
    /// # Panics
    ///
    /// This constructor panics if the buffer can't hold the header
    pub fn new(buffer: B) -> Self {
        assert!(buffer.as_slice().len() >= usize(HEADER_SIZE));

        let mut segment = Segment { buffer };
        let header = segment.as_mut_slice();
        header[DATA_OFFSET] = 5 << data_offset::OFFSET;
        header[FLAGS] = 0;
        NE::write_u16(&mut header[CHECKSUM], 0);
        NE::write_u16(&mut header[URGENT_POINTER], 0);

        segment
    }

    /// Fills the payload with the given data and shrinks the segment to fit it
    ///
    /// # Panics
    ///
    /// This method panics if `data` doesn't fit in the buffer
    pub fn set_payload(&mut self, data: &[u8]) {
        let len = u16::from(self.header_len()) + data.len() as u16;
        assert!(usize(len) <= self.as_slice().len());

        self.buffer.truncate(len);
        self.payload_mut().copy_from_slice(data);
    }
}

/// NOTE excludes the options and the payload
impl<B> fmt::Debug for Segment<B>
where
    B: AsSlice<Element = u8>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("tcp::Segment")
            .field("source", &self.get_source())
            .field("destination", &self.get_destination())
            .field("sequence_number", &self.get_sequence_number())
            .field("acknowledgment_number", &self.get_acknowledgment_number())
            .field("data_offset", &self.get_data_offset())
            .field("flags", &self.get_flags())
            .field("window", &self.get_window())
            .field("checksum", &Hex(self.get_checksum()))
            .finish()
    }
}

/// Adds `n` to a big endian 32-bit number; the addition wraps around
pub fn add32(value: &mut [u8; 4], n: u16) {
    let sum = NE::read_u32(value).wrapping_add(u32::from(n));
    NE::write_u32(value, sum);
}

/// Returns the source address and the TCP segment carried by `frame`, if any
pub fn segment(frame: &[u8]) -> Option<(ipv4::Addr, Segment<&[u8]>)> {
    let eth = ether::Frame::parse(frame).ok()?;
    if eth.get_type() != ether::Type::Ipv4 {
        return None;
    }

    let ip = ipv4::Packet::parse(eth.into_payload()).ok()?;
    if ip.get_protocol() != ipv4::Protocol::Tcp {
        return None;
    }

    let source = ip.get_source();
    let tcp = Segment::parse(ip.into_payload()).ok()?;
    Some((source, tcp))
}

/// Rewrites the segment at the start of `frame` into its acknowledgment
///
/// The outgoing segment always has ACK set; `flags` adds SYN, PSH, FIN and RST (other bits are
/// ignored). A SYN carries the MSS option. Returns the length of the acknowledgment, or `None`
/// if `frame` doesn't hold a TCP segment.
///
/// The acknowledgment number is the sequence number of the inbound segment plus:
///
/// - 1 if the inbound segment had SYN set, or FIN set without PSH
/// - otherwise its payload length
/// - plus 1 more if it had PSH set and was sent to `config.client_port`
pub fn ack(frame: &mut [u8], config: &Config, flags: Flags) -> Option<u16> {
    answer(frame, config, flags, &[])
}

/// Rewrites the request at the start of `frame` into a segment that carries `data` and closes
/// the connection (PSH + ACK + FIN)
///
/// Returns `None` if `frame` doesn't hold a TCP segment or `data` doesn't fit in `frame`
pub fn respond(frame: &mut [u8], config: &Config, data: &[u8]) -> Option<u16> {
    answer(frame, config, Flags::PSH | Flags::FIN, data)
}

/// Rewrites the pure ACK at the start of `frame`, previously built by `ack`, into a PSH + ACK
/// that carries `data`
///
/// Sequence and acknowledgment numbers are kept. Returns `None` if `frame` doesn't hold a TCP
/// segment or `data` doesn't fit in `frame`.
pub fn push(frame: &mut [u8], data: &[u8]) -> Option<u16> {
    let header_len = usize(segment(frame)?.1.header_len());

    if 14 + 20 + header_len + data.len() > frame.len() {
        return None;
    }

    let mut eth = ether::Frame::new(frame);
    let mut ip = ipv4::Packet::in_place(eth.payload_mut());
    ip.set_payload_len((header_len + data.len()) as u16);
    {
        let mut tcp = Segment {
            buffer: ip.payload_mut(),
        };
        tcp.set_flags(Flags::PSH | Flags::ACK);
        tcp.payload_mut().copy_from_slice(data);
    }
    ip.update_payload_checksum();
    let len = ip.update_checksum().len();

    Some(ether::HEADER_SIZE + len)
}

/// Builds the SYN that opens the HTTP client connection to `server`
///
/// Returns the length of the frame
pub fn syn(buffer: &mut [u8], config: &Config, server: ipv4::Addr) -> u16 {
    ipv4::frame(buffer, config, server, |ip| {
        ip.tcp(|tcp| {
            tcp.set_source(config.client_port);
            tcp.set_destination(config.remote_http_port);
            tcp.set_sequence_number(CLIENT_ISN);
            tcp.set_acknowledgment_number([0; 4]);
            tcp.set_flags(Flags::SYN);
            tcp.set_window(WINDOW_SIZE);
            tcp.set_options(&MSS_OPTION);
            tcp.set_payload(&[]);
        })
    })
}

fn answer(frame: &mut [u8], config: &Config, flags: Flags, data: &[u8]) -> Option<u16> {
    // everything needed from the inbound segment is read before the buffer is rewritten
    let (source, destination, seq, ack, inbound, payload_len) = {
        let (_, tcp) = segment(frame)?;
        (
            tcp.get_source(),
            tcp.get_destination(),
            tcp.get_sequence_number(),
            tcp.get_acknowledgment_number(),
            tcp.get_flags(),
            tcp.payload().len() as u16,
        )
    };

    let options: &[u8] = if flags.contains(Flags::SYN) {
        &MSS_OPTION
    } else {
        &[]
    };

    if HEADERS + options.len() + data.len() > frame.len() {
        return None;
    }

    // acknowledge what the inbound segment consumed
    let mut number = seq;
    if inbound.contains(Flags::SYN)
        || (inbound.contains(Flags::FIN) && !inbound.contains(Flags::PSH))
    {
        add32(&mut number, 1);
    } else {
        add32(&mut number, payload_len);
    }

    if inbound.contains(Flags::PSH) && destination == config.client_port {
        add32(&mut number, 1);
    }

    debug!(
        "tcp: {} -> {} {:?} ({} bytes); answering with {:?}",
        source,
        destination,
        inbound,
        payload_len,
        Flags::ACK | flags
    );

    let mut eth = ether::Frame::new(frame);
    eth.reply_from(config.mac);

    let mut ip = ipv4::Packet::in_place(eth.payload_mut()).reply_from(config.ip);
    ip.set_payload_len((usize(HEADER_SIZE) + options.len() + data.len()) as u16);
    {
        let mut tcp = Segment {
            buffer: ip.payload_mut(),
        };
        tcp.set_source(destination);
        tcp.set_destination(source);
        tcp.set_sequence_number(ack);
        tcp.set_acknowledgment_number(number);
        tcp.set_flags(Flags::ACK | (flags & (Flags::SYN | Flags::PSH | Flags::FIN | Flags::RST)));
        tcp.set_options(options);
        NE::write_u16(&mut tcp.as_mut_slice()[URGENT_POINTER], 0);
        tcp.payload_mut().copy_from_slice(data);
    }
    ip.update_payload_checksum();
    let len = ip.update_checksum().len();

    Some(ether::HEADER_SIZE + len)
}

#[cfg(test)]
mod tests {
    use rand::{self, RngCore};

    use crate::{checksum, config::Config, ether, ipv4, mac, tcp};

    use super::Flags;

    const MAC: mac::Addr = mac::Addr([0x00, 0x04, 0xa3, 0x12, 0x34, 0x56]);
    const IP: ipv4::Addr = ipv4::Addr([192, 168, 1, 55]);
    const PEER_MAC: mac::Addr = mac::Addr([0x20, 0x18, 0x03, 0x01, 0x00, 0x00]);
    const PEER: ipv4::Addr = ipv4::Addr([192, 168, 1, 33]);

    const SIZE: usize = 14 + 20 + 24;

    const SYN: &[u8; SIZE] = &[
        0x20, 0x18, 0x03, 0x01, 0x00, 0x00, // eth: destination
        0x00, 0x04, 0xa3, 0x12, 0x34, 0x56, // eth: source
        0x08, 0x00, // eth: type
        0x45, // ip: version & IHL
        0x00, // ip: DSCP & ECN
        0x00, 0x2c, // ip: total length
        0x00, 0x02, // ip: identification
        0x40, 0x00, // ip: flags & fragment offset
        0x80, // ip: TTL
        0x06, // ip: protocol
        0x77, 0x21, // ip: checksum
        192, 168, 1, 55, // ip: source
        192, 168, 1, 33, // ip: destination
        0x3e, 0x6b, // tcp: source
        0x00, 0x50, // tcp: destination
        0x00, 0x00, 0x10, 0x00, // tcp: sequence number
        0x00, 0x00, 0x00, 0x00, // tcp: acknowledgment number
        0x60, // tcp: data offset
        0x02, // tcp: flags
        0x01, 0x2c, // tcp: window
        0xc9, 0x1e, // tcp: checksum
        0x00, 0x00, // tcp: urgent pointer
        0x02, 0x04, 0x01, 0x2c, // tcp: MSS option
    ];

    fn config() -> Config {
        let mut config = Config::new(MAC, IP);
        config.router_mac = PEER_MAC;
        config
    }

    fn peer() -> Config {
        let mut peer = Config::new(PEER_MAC, PEER);
        peer.router_mac = MAC;
        peer
    }

    // a segment from the peer's port 80 to `port`
    fn inbound(
        buffer: &mut [u8],
        port: u16,
        seq: [u8; 4],
        ack: [u8; 4],
        flags: Flags,
        data: &[u8],
    ) -> u16 {
        ipv4::frame(buffer, &peer(), IP, |ip| {
            ip.tcp(|tcp| {
                tcp.set_source(80);
                tcp.set_destination(port);
                tcp.set_sequence_number(seq);
                tcp.set_acknowledgment_number(ack);
                tcp.set_flags(flags);
                tcp.set_window(1024);
                tcp.set_payload(data);
            })
        })
    }

    #[test]
    fn add32() {
        let mut n = [0x00, 0x00, 0x00, 0xff];
        tcp::add32(&mut n, 1);
        assert_eq!(n, [0x00, 0x00, 0x01, 0x00]);

        let mut n = [0xff, 0xff, 0xff, 0xff];
        tcp::add32(&mut n, 1);
        assert_eq!(n, [0x00, 0x00, 0x00, 0x00]);

        let mut n = [0x00, 0xff, 0xff, 0xf0];
        tcp::add32(&mut n, 0x20);
        assert_eq!(n, [0x01, 0x00, 0x00, 0x10]);
    }

    #[test]
    fn flags() {
        let mut array = [0; 64];
        inbound(&mut array, 80, [0; 4], [0; 4], Flags::PSH | Flags::ACK, &[]);
        assert_eq!(array[14 + 20 + 13], 0x18);

        let (_, tcp) = tcp::segment(&array).unwrap();
        assert_eq!(tcp.get_flags(), Flags::PSH | Flags::ACK);
        assert_eq!(tcp.get_data_offset(), 5);
    }

    #[test]
    fn syn() {
        // NOTE start with randomized array to make sure we set *everything* correctly
        let mut array = [0; 128];
        rand::thread_rng().fill_bytes(&mut array);

        let len = tcp::syn(&mut array, &config(), PEER);
        assert_eq!(len, SIZE as u16);
        assert_eq!(&array[..SIZE], &SYN[..]);

        let (source, tcp) = tcp::segment(&array[..SIZE]).unwrap();
        assert_eq!(source, IP);
        assert_eq!(tcp.options(), &tcp::MSS_OPTION);
        assert!(tcp.payload().is_empty());
    }

    #[test]
    fn syn_ack() {
        let mut array = [0; 128];
        let seq = [0x12, 0x34, 0x56, 0x78];
        let len = inbound(&mut array, 80, seq, [0; 4], Flags::SYN, &[]);
        assert_eq!(len, 54);

        let len = tcp::ack(&mut array, &config(), Flags::SYN).unwrap();
        assert_eq!(len, 58);

        let eth = ether::Frame::parse(&array[..usize::from(len)]).unwrap();
        assert_eq!(eth.get_destination(), PEER_MAC);
        assert_eq!(eth.get_source(), MAC);

        let ip = ipv4::Packet::parse(eth.payload()).unwrap();
        assert_eq!(ip.get_source(), IP);
        assert_eq!(ip.get_destination(), PEER);
        assert_eq!(ip.get_total_length(), 44);
        assert!(checksum::verify(&ip.as_bytes()[12..], checksum::Kind::Tcp));

        let tcp = tcp::Segment::parse(ip.payload()).unwrap();
        assert_eq!(tcp.get_source(), 80);
        assert_eq!(tcp.get_destination(), 80);
        assert_eq!(tcp.get_sequence_number(), [0; 4]);
        assert_eq!(tcp.get_acknowledgment_number(), [0x12, 0x34, 0x56, 0x79]);
        assert_eq!(tcp.get_flags(), Flags::SYN | Flags::ACK);
        assert_eq!(tcp.header_len(), 24);
        assert_eq!(tcp.options(), &[2, 4, 0x01, 0x2c]);
    }

    #[test]
    fn data_is_acked_by_its_length() {
        let mut array = [0; 128];
        let seq = [0x00, 0x00, 0x00, 0xf8];
        let ack = [0x00, 0x00, 0x20, 0x01];
        inbound(
            &mut array,
            80,
            seq,
            ack,
            Flags::PSH | Flags::ACK,
            b"GET / HTTP/1",
        );

        let len = tcp::ack(&mut array, &config(), Flags::empty()).unwrap();
        assert_eq!(len, 54);

        let (_, tcp) = tcp::segment(&array[..54]).unwrap();
        assert_eq!(tcp.get_sequence_number(), ack);
        assert_eq!(tcp.get_acknowledgment_number(), [0x00, 0x00, 0x01, 0x04]);
        assert_eq!(tcp.get_flags(), Flags::ACK);
        assert_eq!(tcp.header_len(), 20);
        assert!(tcp.payload().is_empty());
    }

    #[test]
    fn fin_consumes_one() {
        let mut array = [0; 128];
        let seq = [0x00, 0x00, 0x00, 0x10];
        inbound(&mut array, 80, seq, [0; 4], Flags::FIN | Flags::ACK, &[]);

        tcp::ack(&mut array, &config(), Flags::empty()).unwrap();
        let (_, tcp) = tcp::segment(&array[..54]).unwrap();
        assert_eq!(tcp.get_acknowledgment_number(), [0x00, 0x00, 0x00, 0x11]);
    }

    #[test]
    fn pushed_data_to_the_client_port() {
        let mut array = [0; 128];
        let seq = [0x00, 0x00, 0x00, 0x10];
        let client_port = config().client_port;
        inbound(
            &mut array,
            client_port,
            seq,
            [0; 4],
            Flags::PSH | Flags::ACK,
            b"HTTP/1.0 200",
        );

        tcp::ack(&mut array, &config(), Flags::empty()).unwrap();
        let (_, tcp) = tcp::segment(&array[..54]).unwrap();
        // 12 bytes of payload plus one
        assert_eq!(tcp.get_acknowledgment_number(), [0x00, 0x00, 0x00, 0x1d]);
        assert_eq!(tcp.get_source(), client_port);
    }

    #[test]
    fn respond() {
        let mut array = [0; 128];
        let seq = [0x00, 0x00, 0x00, 0x01];
        let ack = [0x00, 0x00, 0x00, 0x02];
        inbound(&mut array, 80, seq, ack, Flags::PSH | Flags::ACK, b"GET /");

        let len = tcp::respond(&mut array, &config(), b"HTTP/1.0 200 OK\r\n\r\n").unwrap();
        assert_eq!(len, 54 + 19);

        let (_, tcp) = tcp::segment(&array[..usize::from(len)]).unwrap();
        assert_eq!(tcp.get_sequence_number(), ack);
        assert_eq!(tcp.get_acknowledgment_number(), [0x00, 0x00, 0x00, 0x06]);
        assert_eq!(tcp.get_flags(), Flags::PSH | Flags::ACK | Flags::FIN);
        assert_eq!(tcp.payload(), b"HTTP/1.0 200 OK\r\n\r\n");

        // too large for the buffer
        let mut array = [0; 60];
        inbound(&mut array, 80, seq, ack, Flags::PSH | Flags::ACK, b"GET /");
        assert_eq!(tcp::respond(&mut array, &config(), &[0; 7]), None);
    }

    #[test]
    fn push() {
        let mut array = [0; 128];
        let client_port = config().client_port;
        let seq = [0x00, 0x00, 0x50, 0x00];
        let ack = [0x00, 0x00, 0x10, 0x01];
        inbound(&mut array, client_port, seq, ack, Flags::SYN | Flags::ACK, &[]);

        tcp::ack(&mut array, &config(), Flags::empty()).unwrap();
        let len = tcp::push(&mut array, b"GET / HTTP/1.0\r\n\r\n").unwrap();
        assert_eq!(len, 54 + 18);

        let (source, tcp) = tcp::segment(&array[..usize::from(len)]).unwrap();
        assert_eq!(source, IP);
        assert_eq!(tcp.get_source(), client_port);
        assert_eq!(tcp.get_destination(), 80);
        assert_eq!(tcp.get_sequence_number(), ack);
        assert_eq!(tcp.get_acknowledgment_number(), [0x00, 0x00, 0x50, 0x01]);
        assert_eq!(tcp.get_flags(), Flags::PSH | Flags::ACK);
        assert_eq!(tcp.payload(), b"GET / HTTP/1.0\r\n\r\n");
    }
}
