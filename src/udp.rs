//! UDP: User Datagram Protocol

use core::fmt;
use core::ops::{Range, RangeFrom};

use as_slice::{AsMutSlice, AsSlice};
use byteorder::{ByteOrder, NetworkEndian as NE};
use cast::{u16, usize};

use crate::{config::Config, ether, fmt::Hex, ipv4, traits::Resize};

/* Packet structure */
const SOURCE: Range<usize> = 0..2;
const DESTINATION: Range<usize> = 2..4;
const LENGTH: Range<usize> = 4..6;
const CHECKSUM: Range<usize> = 6..8;
const PAYLOAD: RangeFrom<usize> = 8..;

/// Size of the UDP header
pub const HEADER_SIZE: u16 = PAYLOAD.start as u16;

// Ethernet + IPv4 + UDP
const HEADERS: usize = 14 + 20 + 8;

/// UDP packet
pub struct Packet<BUFFER>
where
    BUFFER: AsSlice<Element = u8>,
{
    buffer: BUFFER,
}

impl<B> Packet<B>
where
    B: AsSlice<Element = u8>,
{
    /* Constructors */
    /// Parses the bytes as an UDP packet
    pub fn parse(bytes: B) -> Result<Self, B> {
        let nbytes = bytes.as_slice().len();
        if nbytes < usize(HEADER_SIZE) {
            return Err(bytes);
        }

        let packet = Packet { buffer: bytes };
        let len = packet.get_length();

        if len < HEADER_SIZE || usize(len) > nbytes {
            Err(packet.buffer)
        } else {
            Ok(packet)
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

    /// Returns the Length field of the header
    pub fn get_length(&self) -> u16 {
        NE::read_u16(&self.as_slice()[LENGTH])
    }

    fn get_checksum(&self) -> u16 {
        NE::read_u16(&self.as_slice()[CHECKSUM])
    }

    /// Returns the length (header + data) of this packet
    pub fn len(&self) -> u16 {
        self.get_length()
    }

    /* Miscellaneous */
    /// View into the payload
    pub fn payload(&self) -> &[u8] {
        &self.as_slice()[usize(HEADER_SIZE)..usize(self.get_length())]
    }

    /// Returns the byte representation of this UDP packet
    pub fn as_bytes(&self) -> &[u8] {
        self.as_slice()
    }

    /* Private */
    fn as_slice(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    fn payload_len(&self) -> u16 {
        self.get_length() - HEADER_SIZE
    }
}

impl<B> Packet<B>
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

    fn set_length(&mut self, len: u16) {
        NE::write_u16(&mut self.as_mut_slice()[LENGTH], len)
    }

    /* Miscellaneous */
    /// Mutable view into the payload
    pub fn payload_mut(&mut self) -> &mut [u8] {
        let end = usize(self.get_length());
        &mut self.as_mut_slice()[usize(HEADER_SIZE)..end]
    }

    /* Private */
    fn as_mut_slice(&mut self) -> &mut [u8] {
        self.buffer.as_mut_slice()
    }
}

impl<B> Packet<B>
where
    B: AsSlice<Element = u8> + AsMutSlice<Element = u8> + Resize,
{
    /* Constructors */
    /// Transforms the given buffer into an UDP packet
    ///
    /// NOTE The UDP packet will span the whole buffer and the Checksum field will be zeroed.
    ///
    /// # Panics
    ///
    /// This constructor panics if the given `buffer` is not large enough to contain the UDP header.
    pub fn new(mut buffer: B) -> Self {
        assert!(buffer.as_slice().len() >= usize(HEADER_SIZE));

        let len = u16(buffer.as_slice().len()).unwrap_or(u16::MAX);
        buffer.truncate(len);
        let mut packet = Packet { buffer };

        NE::write_u16(&mut packet.as_mut_slice()[CHECKSUM], 0);
        packet.set_length(len);

        packet
    }

    /* Setters */
    /// Fills the payload with the given data and adjusts the length of the UDP packet
    ///
    /// # Panics
    ///
    /// This method panics if `data` doesn't fit in the packet
    pub fn set_payload(&mut self, data: &[u8]) {
        let len = data.len() as u16;
        assert!(self.payload_len() >= len);

        self.truncate(len);
        self.payload_mut().copy_from_slice(data);
    }

    /* Miscellaneous */
    /// Truncates the *payload* to the specified length
    pub fn truncate(&mut self, len: u16) {
        if len < self.payload_len() {
            let total_len = len + HEADER_SIZE;
            self.buffer.truncate(total_len);
            self.set_length(total_len);
        }
    }
}

/// NOTE excludes the payload
impl<B> fmt::Debug for Packet<B>
where
    B: AsSlice<Element = u8>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("udp::Packet")
            .field("source", &self.get_source())
            .field("destination", &self.get_destination())
            .field("length", &self.get_length())
            .field("checksum", &Hex(self.get_checksum()))
            .finish()
    }
}

/// Returns the source address and the UDP packet carried by `frame`, if any
pub fn datagram(frame: &[u8]) -> Option<(ipv4::Addr, Packet<&[u8]>)> {
    let eth = ether::Frame::parse(frame).ok()?;
    if eth.get_type() != ether::Type::Ipv4 {
        return None;
    }

    let ip = ipv4::Packet::parse(eth.into_payload()).ok()?;
    if ip.get_protocol() != ipv4::Protocol::Udp {
        return None;
    }

    let source = ip.get_source();
    let udp = Packet::parse(ip.into_payload()).ok()?;
    Some((source, udp))
}

/// Builds a datagram from `config.udp_port` to `destination:port` in `buffer`
///
/// Returns the length of the frame, or `None` if `payload` doesn't fit in `buffer`
pub fn send(
    buffer: &mut [u8],
    config: &Config,
    destination: ipv4::Addr,
    port: u16,
    payload: &[u8],
) -> Option<u16> {
    if HEADERS + payload.len() > buffer.len() {
        return None;
    }

    Some(ipv4::frame(buffer, config, destination, |ip| {
        ip.udp(|udp| {
            udp.set_source(config.udp_port);
            udp.set_destination(port);
            udp.set_payload(payload);
        })
    }))
}

/// Rewrites the datagram at the start of `frame` into a reply that carries `data`
///
/// `frame` may be longer than the received datagram; the reply can use all of it. Returns the
/// length of the reply, or `None` if `frame` doesn't hold a datagram or `data` doesn't fit.
pub fn reply(frame: &mut [u8], config: &Config, data: &[u8]) -> Option<u16> {
    let (source, destination) = {
        let (_, udp) = datagram(frame)?;
        (udp.get_source(), udp.get_destination())
    };

    if HEADERS + data.len() > frame.len() {
        return None;
    }

    let mut eth = ether::Frame::new(frame);
    eth.reply_from(config.mac);

    let mut ip = ipv4::Packet::in_place(eth.payload_mut()).reply_from(config.ip);
    ip.set_payload_len(HEADER_SIZE + data.len() as u16);
    {
        let mut udp = Packet::new(ip.payload_mut());
        udp.set_source(destination);
        udp.set_destination(source);
        udp.payload_mut().copy_from_slice(data);
    }
    ip.update_payload_checksum();
    let len = ip.update_checksum().len();

    Some(ether::HEADER_SIZE + len)
}

#[cfg(test)]
mod tests {
    use rand::{self, RngCore};

    use crate::{checksum, config::Config, ether, ipv4, mac, udp};

    const MAC: mac::Addr = mac::Addr([0x00, 0x04, 0xa3, 0x12, 0x34, 0x56]);
    const IP: ipv4::Addr = ipv4::Addr([192, 168, 1, 55]);
    const PEER_MAC: mac::Addr = mac::Addr([0x20, 0x18, 0x03, 0x01, 0x00, 0x00]);
    const PEER: ipv4::Addr = ipv4::Addr([192, 168, 1, 33]);

    fn config() -> Config {
        let mut config = Config::new(MAC, IP);
        config.router_mac = PEER_MAC;
        config
    }

    #[test]
    fn send() {
        // NOTE start with randomized array to make sure we set *everything* correctly
        let mut array = [0; 128];
        rand::thread_rng().fill_bytes(&mut array);

        let len = udp::send(&mut array, &config(), PEER, 5000, b"Invoke.").unwrap();
        assert_eq!(len, 14 + 20 + 8 + 7);

        let (source, udp) = udp::datagram(&array[..]).unwrap();
        assert_eq!(source, IP);
        assert_eq!(udp.get_source(), 1200);
        assert_eq!(udp.get_destination(), 5000);
        assert_eq!(udp.get_length(), 15);
        assert_eq!(udp.payload(), b"Invoke.");

        let ip = &array[14..usize::from(len)];
        assert!(checksum::verify(&ip[12..], checksum::Kind::Udp));
    }

    #[test]
    fn send_too_large() {
        let mut array = [0; 64];
        assert_eq!(udp::send(&mut array, &config(), PEER, 5000, &[0; 23]), None);
        assert!(udp::send(&mut array, &config(), PEER, 5000, &[0; 22]).is_some());
    }

    #[test]
    fn parse() {
        let bytes = [
            0x04, 0xb0, // source
            0x13, 0x88, // destination
            0x00, 0x0a, // length
            0x00, 0x00, // checksum
            b'h', b'i', // payload
            0x00, 0x00, // padding
        ];

        let udp = udp::Packet::parse(&bytes[..]).unwrap();
        assert_eq!(udp.get_source(), 1200);
        assert_eq!(udp.get_destination(), 5000);
        assert_eq!(udp.len(), 10);
        assert_eq!(udp.payload(), b"hi");

        // length exceeds the buffer
        assert!(udp::Packet::parse(&bytes[..9]).is_err());
    }

    #[test]
    fn reply() {
        let mut array = [0; 128];
        let peer = {
            let mut peer = Config::new(PEER_MAC, PEER);
            peer.router_mac = MAC;
            peer.udp_port = 5000;
            peer
        };
        udp::send(&mut array, &peer, IP, 1200, b"Invoke.").unwrap();

        let len = udp::reply(&mut array, &config(), b"Hello World\0").unwrap();
        assert_eq!(len, 14 + 20 + 8 + 12);

        let eth = ether::Frame::parse(&array[..usize::from(len)]).unwrap();
        assert_eq!(eth.get_destination(), PEER_MAC);
        assert_eq!(eth.get_source(), MAC);

        let ip = ipv4::Packet::parse(eth.payload()).unwrap();
        assert_eq!(ip.get_source(), IP);
        assert_eq!(ip.get_destination(), PEER);
        assert_eq!(ip.get_total_length(), 40);
        assert!(checksum::verify(&ip.as_bytes()[12..], checksum::Kind::Udp));

        let udp = udp::Packet::parse(ip.payload()).unwrap();
        assert_eq!(udp.get_source(), 1200);
        assert_eq!(udp.get_destination(), 5000);
        assert_eq!(udp.payload(), b"Hello World\0");
    }

    #[test]
    fn reply_does_not_fit() {
        let mut array = [0; 128];
        let mut peer = Config::new(PEER_MAC, PEER);
        peer.router_mac = MAC;
        let len = udp::send(&mut array, &peer, IP, 1200, b"hi").unwrap();

        let frame = &mut array[..usize::from(len)];
        assert_eq!(udp::reply(frame, &config(), b"Hello World\0"), None);
    }
}
