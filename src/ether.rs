//! Ethernet II

use core::{
    fmt,
    ops::{Range, RangeFrom},
};

use as_slice::{AsMutSlice, AsSlice};
use byteorder::{ByteOrder, NetworkEndian as NE};
use cast::usize;

use crate::{arp, ipv4, mac, traits::Resize, Invalid};

/* Frame format */
const DESTINATION: Range<usize> = 0..6;
const SOURCE: Range<usize> = 6..12;
const TYPE: Range<usize> = 12..14;
const PAYLOAD: RangeFrom<usize> = 14..;

/// Size of the MAC header
pub const HEADER_SIZE: u16 = TYPE.end as u16;

/// Layer 2 Ethernet frame
///
/// # Structure
///
/// - MAC destination. 6 bytes
/// - MAC source. 6 bytes
/// - Ethertype. 2 bytes
/// - Payload. 46-1500 bytes (\*)
/// - Frame check sequence. 4 bytes (\*)
///
/// (\*) The frame check sequence is appended, and short frames padded, by the ENC28J60 so this
/// representation includes neither.
#[derive(Clone, Copy)]
pub struct Frame<BUFFER>
where
    BUFFER: AsSlice<Element = u8>,
{
    buffer: BUFFER,
}

impl<B> Frame<B>
where
    B: AsSlice<Element = u8>,
{
    /* Constructors */
    /// Creates a new Ethernet frame from the given buffer
    ///
    /// # Panics
    ///
    /// This constructor panics if the buffer can't hold the MAC header
    pub fn new(buffer: B) -> Self {
        assert!(buffer.as_slice().len() >= usize(HEADER_SIZE));

        Frame { buffer }
    }

    /// Parses bytes into an Ethernet frame
    pub fn parse(bytes: B) -> Result<Self, B> {
        if bytes.as_slice().len() < usize(HEADER_SIZE) {
            Err(bytes)
        } else {
            Ok(Frame { buffer: bytes })
        }
    }

    /* Getters */
    /// Returns the Destination field of the header
    pub fn get_destination(&self) -> mac::Addr {
        let mut addr = mac::Addr::ZERO;
        addr.0.copy_from_slice(&self.as_slice()[DESTINATION]);
        addr
    }

    /// Returns the Source field of the header
    pub fn get_source(&self) -> mac::Addr {
        let mut addr = mac::Addr::ZERO;
        addr.0.copy_from_slice(&self.as_slice()[SOURCE]);
        addr
    }

    /// Returns the Type field of the header
    pub fn get_type(&self) -> Type {
        NE::read_u16(&self.as_slice()[TYPE]).into()
    }

    /// View into the payload
    pub fn payload(&self) -> &[u8] {
        &self.as_slice()[PAYLOAD]
    }

    /* Miscellaneous */
    /// Returns the byte representation of this frame
    pub fn as_bytes(&self) -> &[u8] {
        self.as_slice()
    }

    /// Frees the underlying buffer
    pub fn free(self) -> B {
        self.buffer
    }

    /// Returns the length (header + data) of this frame
    pub fn len(&self) -> u16 {
        self.as_bytes().len() as u16
    }

    /* Private */
    fn as_slice(&self) -> &[u8] {
        self.buffer.as_slice()
    }
}

impl<B> Frame<B>
where
    B: AsSlice<Element = u8> + AsMutSlice<Element = u8>,
{
    /* Setters */
    /// Sets the destination field of the header
    pub fn set_destination(&mut self, addr: mac::Addr) {
        self.as_mut_slice()[DESTINATION].copy_from_slice(&addr.0)
    }

    /// Sets the source field of the header
    pub fn set_source(&mut self, addr: mac::Addr) {
        self.as_mut_slice()[SOURCE].copy_from_slice(&addr.0)
    }

    /// Sets the type field of the header
    pub fn set_type(&mut self, type_: Type) {
        NE::write_u16(&mut self.as_mut_slice()[TYPE], type_.into())
    }

    /* Miscellaneous */
    /// Mutable view into the payload
    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.as_mut_slice()[PAYLOAD]
    }

    /// Turns this frame around: it will be sent back to its source, from `mac`
    pub fn reply_from(&mut self, mac: mac::Addr) {
        let source = self.get_source();
        self.set_destination(source);
        self.set_source(mac);
    }

    /* Private */
    fn as_mut_slice(&mut self) -> &mut [u8] {
        self.buffer.as_mut_slice()
    }
}

impl<B> Frame<B>
where
    B: AsSlice<Element = u8> + Resize,
{
    /// Returns the payload of this frame
    pub fn into_payload(self) -> B {
        let mut buffer = self.buffer;
        buffer.slice_from(HEADER_SIZE);
        buffer
    }
}

impl<B> Frame<B>
where
    B: AsSlice<Element = u8> + AsMutSlice<Element = u8> + Resize,
{
    /// Fills the payload with an ARP packet
    ///
    /// This method sets the Type field of this frame to ARP, and truncates the length of the frame
    /// to fit the ARP packet.
    ///
    /// The ARP packet will have its SHA set to the Ethernet frame Source address
    pub fn arp<F>(&mut self, f: F)
    where
        F: FnOnce(&mut arp::Packet<&mut [u8]>),
    {
        self.set_type(Type::Arp);
        let sha = self.get_source();
        let len = {
            let mut arp = arp::Packet::new(self.payload_mut());
            arp.set_sha(sha);
            f(&mut arp);
            arp.len()
        };
        self.buffer.truncate(HEADER_SIZE + len);
    }

    /// Fills the payload with an IPv4 packet
    ///
    /// This method sets the Type field of this frame to IPv4, recomputes the checksum of the
    /// transport payload and the header checksum, and truncates the length of the frame to fit
    /// the IPv4 packet.
    pub fn ipv4<F>(&mut self, f: F)
    where
        F: FnOnce(&mut ipv4::Packet<&mut [u8], Invalid>),
    {
        self.set_type(Type::Ipv4);
        let len = {
            let mut ip = ipv4::Packet::new(self.payload_mut());
            f(&mut ip);
            ip.update_payload_checksum();
            ip.update_checksum().len()
        };
        self.buffer.truncate(HEADER_SIZE + len);
    }
}

/// NOTE excludes the payload
impl<B> fmt::Debug for Frame<B>
where
    B: AsSlice<Element = u8>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ether::Frame")
            .field("destination", &self.get_destination())
            .field("source", &self.get_source())
            .field("type", &self.get_type())
            .finish()
    }
}

full_range!(
    u16,
    /// Ether Type
    #[derive(Clone, Copy, Debug, PartialEq)]
    pub enum Type {
        /// IPv4
        Ipv4 = 0x0800,

        /// ARP
        Arp = 0x0806,
    }
);
