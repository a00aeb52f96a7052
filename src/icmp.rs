//! ICMP: Internet Control Message Protocol
//!
//! Only the echo messages are supported
//!
//! # References
//!
//! - [RFC 792: Internet Control Message Protocol][rfc]
//!
//! [rfc]: https://tools.ietf.org/html/rfc792

use core::fmt;
use core::ops::{Range, RangeFrom};

use as_slice::{AsMutSlice, AsSlice};
use byteorder::{ByteOrder, NetworkEndian as NE};
use cast::usize;
use log::debug;

use crate::{
    checksum::{self, Kind},
    config::Config,
    ether,
    fmt::Hex,
    ipv4,
    traits::Resize,
};

/* Message structure */
const TYPE: usize = 0;
const CODE: usize = 1;
const CHECKSUM: Range<usize> = 2..4;
const IDENTIFIER: Range<usize> = 4..6;
const SEQUENCE_NUMBER: Range<usize> = 6..8;
const PAYLOAD: RangeFrom<usize> = 8..;

/// Size of the ICMP (echo) header
pub const HEADER_SIZE: u16 = PAYLOAD.start as u16;

/// Identifier of the echo requests sent by `echo_request`
pub const PING_IDENTIFIER: u16 = 1;

/// Sequence number of the echo requests sent by `echo_request`
pub const PING_SEQUENCE_NUMBER: u16 = 76;

/// Payload of the echo requests sent by `echo_request`
pub const PING_PAYLOAD: [u8; 18] = *b"ABCDEFGHIJKLMNOPQR";

/// ICMP message
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
    /// Parses bytes into an ICMP message, verifying its checksum
    pub fn parse(bytes: B) -> Result<Self, B> {
        let slice = bytes.as_slice();
        if slice.len() < usize(HEADER_SIZE) || !checksum::verify(slice, Kind::Icmp) {
            Err(bytes)
        } else {
            Ok(Message { buffer: bytes })
        }
    }

    /* Getters */
    /// Returns the Type field of the header
    pub fn get_type(&self) -> Type {
        self.as_slice()[TYPE].into()
    }

    /// Returns the Code field of the header
    pub fn get_code(&self) -> u8 {
        self.as_slice()[CODE]
    }

    /// Returns the Identifier field of the header
    pub fn get_identifier(&self) -> u16 {
        NE::read_u16(&self.as_slice()[IDENTIFIER])
    }

    /// Returns the Sequence Number field of the header
    pub fn get_sequence_number(&self) -> u16 {
        NE::read_u16(&self.as_slice()[SEQUENCE_NUMBER])
    }

    /// View into the payload
    pub fn payload(&self) -> &[u8] {
        &self.as_slice()[PAYLOAD]
    }

    /// Returns the length (header + data) of this message
    pub fn len(&self) -> u16 {
        self.as_slice().len() as u16
    }

    /// Returns the byte representation of this message
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

impl<B> Message<B>
where
    B: AsSlice<Element = u8> + AsMutSlice<Element = u8>,
{
    /* Setters */
    /// Sets the Type field of the header
    pub fn set_type(&mut self, type_: Type) {
        self.as_mut_slice()[TYPE] = type_.into();
    }

    /// Sets the Code field of the header
    pub fn set_code(&mut self, code: u8) {
        self.as_mut_slice()[CODE] = code;
    }

    /// Sets the Identifier field of the header
    pub fn set_identifier(&mut self, id: u16) {
        NE::write_u16(&mut self.as_mut_slice()[IDENTIFIER], id)
    }

    /// Sets the Sequence Number field of the header
    pub fn set_sequence_number(&mut self, seq: u16) {
        NE::write_u16(&mut self.as_mut_slice()[SEQUENCE_NUMBER], seq)
    }

    /// Mutable view into the payload
    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.as_mut_slice()[PAYLOAD]
    }

    /// Updates the Checksum field of the header
    pub fn update_checksum(&mut self) {
        NE::write_u16(&mut self.as_mut_slice()[CHECKSUM], 0);
        let sum = checksum::compute(self.as_slice(), Kind::Icmp);
        NE::write_u16(&mut self.as_mut_slice()[CHECKSUM], sum);
    }

    /* Private */
    fn as_mut_slice(&mut self) -> &mut [u8] {
        self.buffer.as_mut_slice()
    }
}

impl<B> Message<B>
where
    B: AsSlice<Element = u8> + AsMutSlice<Element = u8> + Resize,
{
    /// Transforms the given buffer into an ICMP message
    ///
    /// The header is zeroed and the message spans the whole buffer
    ///
    /// # Panics
    ///
    /// This constructor panics if the buffer can't hold the header
    pub fn new(buffer: B) -> Self {
        assert!(buffer.as_slice().len() >= usize(HEADER_SIZE));

        let mut message = Message { buffer };
        for byte in &mut message.as_mut_slice()[..usize(HEADER_SIZE)] {
            *byte = 0;
        }
        message
    }

    /// Fills the payload with the given data and shrinks the message to fit it
    ///
    /// # Panics
    ///
    /// This method panics if `data` doesn't fit in the buffer
    pub fn set_payload(&mut self, data: &[u8]) {
        let len = HEADER_SIZE + data.len() as u16;
        assert!(usize(len) <= self.as_slice().len());

        self.buffer.truncate(len);
        self.payload_mut().copy_from_slice(data);
    }
}

/// NOTE excludes the payload
impl<B> fmt::Debug for Message<B>
where
    B: AsSlice<Element = u8>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("icmp::Message")
            .field("type", &self.get_type())
            .field("code", &self.get_code())
            .field("checksum", &Hex(self.get_checksum()))
            .field("identifier", &self.get_identifier())
            .field("sequence_number", &self.get_sequence_number())
            .finish()
    }
}

full_range!(
    u8,
    /// ICMP type
    #[derive(Clone, Copy, Debug, PartialEq)]
    pub enum Type {
        /// Echo Reply
        EchoReply = 0,
        /// Destination Unreachable
        DestinationUnreachable = 3,
        /// Echo Request
        EchoRequest = 8,
    }
);

/// Returns the echo request carried by `frame`, if any
pub fn request(frame: &[u8]) -> Option<Message<&[u8]>> {
    let eth = ether::Frame::parse(frame).ok()?;
    if eth.get_type() != ether::Type::Ipv4 {
        return None;
    }

    let ip = ipv4::Packet::parse(eth.into_payload()).ok()?;
    if ip.get_protocol() != ipv4::Protocol::Icmp {
        return None;
    }

    let icmp = Message::parse(ip.into_payload()).ok()?;
    if icmp.get_type() == Type::EchoRequest {
        Some(icmp)
    } else {
        None
    }
}

/// Rewrites the echo request in `frame` into its echo reply
///
/// Returns the length of the reply, which is the length of the request, or `None` if `frame`
/// doesn't hold an echo request
pub fn echo_reply(frame: &mut [u8], config: &Config) -> Option<u16> {
    if let Some(icmp) = request(frame) {
        debug!(
            "echo request: id={} seq={}",
            icmp.get_identifier(),
            icmp.get_sequence_number()
        );
    } else {
        return None;
    }

    let mut eth = ether::Frame::new(frame);
    eth.reply_from(config.mac);

    let mut ip = ipv4::Packet::in_place(eth.payload_mut()).reply_from(config.ip);
    ip.payload_mut()[TYPE] = Type::EchoReply.into();
    ip.update_payload_checksum();
    let len = ip.update_checksum().len();

    Some(ether::HEADER_SIZE + len)
}

/// Builds an echo request to `target` in `buffer` and returns the length of the frame
pub fn echo_request(buffer: &mut [u8], config: &Config, target: ipv4::Addr) -> u16 {
    ipv4::frame(buffer, config, target, |ip| {
        ip.icmp(|icmp| {
            icmp.set_type(Type::EchoRequest);
            icmp.set_identifier(PING_IDENTIFIER);
            icmp.set_sequence_number(PING_SEQUENCE_NUMBER);
            icmp.set_payload(&PING_PAYLOAD);
        })
    })
}
