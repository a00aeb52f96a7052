//! ARP: Address Resolution Protocol
//!
//! Only Ethernet / IPv4 packets are supported
//!
//! # References
//!
//! - [RFC 826: An Ethernet Address Resolution Protocol][rfc]
//!
//! [rfc]: https://tools.ietf.org/html/rfc826

use core::fmt;
use core::ops::Range;

use as_slice::{AsMutSlice, AsSlice};
use byteorder::{ByteOrder, NetworkEndian as NE};
use cast::usize;
use log::debug;

use crate::{config::Config, ether, ipv4, mac, traits::Resize};

/* Packet structure */
const HTYPE: Range<usize> = 0..2;
const PTYPE: Range<usize> = 2..4;
const HLEN: usize = 4;
const PLEN: usize = 5;
const OPER: Range<usize> = 6..8;
const SHA: Range<usize> = 8..14;
const SPA: Range<usize> = 14..18;
const THA: Range<usize> = 18..24;
const TPA: Range<usize> = 24..28;

/// Size of an Ethernet / IPv4 ARP packet
pub const SIZE: u16 = TPA.end as u16;

/// ARP packet
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
    /// Parses bytes into an ARP packet
    ///
    /// Packets whose hardware type isn't Ethernet or whose protocol type isn't IPv4 are rejected
    pub fn parse(bytes: B) -> Result<Self, B> {
        if bytes.as_slice().len() < usize(SIZE) {
            return Err(bytes);
        }

        let packet = Packet { buffer: bytes };
        if packet.get_htype() == HardwareType::Ethernet
            && packet.get_ptype() == ether::Type::Ipv4
            && packet.get_hlen() == 6
            && packet.get_plen() == 4
        {
            Ok(packet)
        } else {
            Err(packet.buffer)
        }
    }

    /* Getters */
    /// Returns the HTYPE (Hardware TYPE) field of the header
    pub fn get_htype(&self) -> HardwareType {
        NE::read_u16(&self.as_slice()[HTYPE]).into()
    }

    /// Returns the PTYPE (Protocol TYPE) field of the header
    pub fn get_ptype(&self) -> ether::Type {
        NE::read_u16(&self.as_slice()[PTYPE]).into()
    }

    /// Returns the HLEN (Hardware LENgth) field of the header
    pub fn get_hlen(&self) -> u8 {
        self.as_slice()[HLEN]
    }

    /// Returns the PLEN (Protocol LENgth) field of the header
    pub fn get_plen(&self) -> u8 {
        self.as_slice()[PLEN]
    }

    /// Returns the OPER (OPERation) field of the header
    pub fn get_oper(&self) -> Operation {
        NE::read_u16(&self.as_slice()[OPER]).into()
    }

    /// Returns the SHA (Sender Hardware Address) field of the payload
    pub fn get_sha(&self) -> mac::Addr {
        let mut addr = mac::Addr::ZERO;
        addr.0.copy_from_slice(&self.as_slice()[SHA]);
        addr
    }

    /// Returns the SPA (Sender Protocol Address) field of the payload
    pub fn get_spa(&self) -> ipv4::Addr {
        let mut addr = ipv4::Addr::UNSPECIFIED;
        addr.0.copy_from_slice(&self.as_slice()[SPA]);
        addr
    }

    /// Returns the THA (Target Hardware Address) field of the payload
    pub fn get_tha(&self) -> mac::Addr {
        let mut addr = mac::Addr::ZERO;
        addr.0.copy_from_slice(&self.as_slice()[THA]);
        addr
    }

    /// Returns the TPA (Target Protocol Address) field of the payload
    pub fn get_tpa(&self) -> ipv4::Addr {
        let mut addr = ipv4::Addr::UNSPECIFIED;
        addr.0.copy_from_slice(&self.as_slice()[TPA]);
        addr
    }

    /// Returns the length of this packet
    ///
    /// NOTE this may include padding bytes at the end
    pub fn len(&self) -> u16 {
        self.as_slice().len() as u16
    }

    /// Frees the underlying buffer
    pub fn free(self) -> B {
        self.buffer
    }

    /* Private */
    fn as_slice(&self) -> &[u8] {
        self.buffer.as_slice()
    }
}

impl<B> Packet<B>
where
    B: AsSlice<Element = u8> + AsMutSlice<Element = u8>,
{
    /* Setters */
    /// Sets the OPER (OPERation) field of the header
    pub fn set_oper(&mut self, oper: Operation) {
        NE::write_u16(&mut self.as_mut_slice()[OPER], oper.into())
    }

    /// Sets the SHA (Sender Hardware Address) field of the payload
    pub fn set_sha(&mut self, sha: mac::Addr) {
        self.as_mut_slice()[SHA].copy_from_slice(&sha.0);
    }

    /// Sets the SPA (Sender Protocol Address) field of the payload
    pub fn set_spa(&mut self, spa: ipv4::Addr) {
        self.as_mut_slice()[SPA].copy_from_slice(&spa.0);
    }

    /// Sets the THA (Target Hardware Address) field of the payload
    pub fn set_tha(&mut self, tha: mac::Addr) {
        self.as_mut_slice()[THA].copy_from_slice(&tha.0);
    }

    /// Sets the TPA (Target Protocol Address) field of the payload
    pub fn set_tpa(&mut self, tpa: ipv4::Addr) {
        self.as_mut_slice()[TPA].copy_from_slice(&tpa.0);
    }

    /// Turns a request into the reply from `sha` (a hardware address) to its sender
    pub fn reply_from(&mut self, sha: mac::Addr) {
        let (tha, tpa) = (self.get_sha(), self.get_spa());
        let spa = self.get_tpa();

        self.set_oper(Operation::Reply);
        self.set_sha(sha);
        self.set_spa(spa);
        self.set_tha(tha);
        self.set_tpa(tpa);
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
    /// Transforms the given buffer into an ARP packet
    ///
    /// This function populates the following header fields:
    ///
    /// - HTYPE = Ethernet
    /// - PTYPE = IPv4
    /// - HLEN = 6
    /// - PLEN = 4
    /// - OPER = Request
    ///
    /// The buffer is truncated to `SIZE` bytes
    ///
    /// # Panics
    ///
    /// This constructor panics if the buffer is smaller than `SIZE`
    pub fn new(mut buffer: B) -> Self {
        assert!(buffer.as_slice().len() >= usize(SIZE));
        buffer.truncate(SIZE);

        let mut packet = Packet { buffer };
        let header = packet.as_mut_slice();
        NE::write_u16(&mut header[HTYPE], HardwareType::Ethernet.into());
        NE::write_u16(&mut header[PTYPE], ether::Type::Ipv4.into());
        header[HLEN] = 6;
        header[PLEN] = 4;
        packet.set_oper(Operation::Request);

        packet
    }
}

impl<B> fmt::Debug for Packet<B>
where
    B: AsSlice<Element = u8>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("arp::Packet")
            .field("oper", &self.get_oper())
            .field("sha", &self.get_sha())
            .field("spa", &self.get_spa())
            .field("tha", &self.get_tha())
            .field("tpa", &self.get_tpa())
            .finish()
    }
}

full_range!(
    u16,
    /// Hardware type
    #[derive(Clone, Copy, Debug, PartialEq)]
    pub enum HardwareType {
        /// Ethernet
        Ethernet = 1,
    }
);

full_range!(
    u16,
    /// ARP operation
    #[derive(Clone, Copy, Debug, PartialEq)]
    pub enum Operation {
        /// Request operation
        Request = 1,
        /// Reply operation
        Reply = 2,
    }
);

/// Returns the ARP packet carried by `frame`, if any
pub fn packet(frame: &[u8]) -> Option<Packet<&[u8]>> {
    let eth = ether::Frame::parse(frame).ok()?;
    if eth.get_type() == ether::Type::Arp {
        Packet::parse(eth.into_payload()).ok()
    } else {
        None
    }
}

/// Builds an ARP request for `target` in `buffer` and returns the length of the frame
pub fn request(buffer: &mut [u8], config: &Config, target: ipv4::Addr) -> u16 {
    let mut eth = ether::Frame::new(buffer);
    eth.set_destination(mac::Addr::BROADCAST);
    eth.set_source(config.mac);

    eth.arp(|arp| {
        arp.set_oper(Operation::Request);
        arp.set_spa(config.ip);
        arp.set_tha(mac::Addr::ZERO);
        arp.set_tpa(target);
    });

    eth.len()
}

/// Rewrites the ARP request in `frame` into its reply
///
/// Returns the length of the reply, or `None` if `frame` is not a request for this device's
/// address
pub fn reply(frame: &mut [u8], config: &Config) -> Option<u16> {
    match packet(frame) {
        Some(ref arp) if arp.get_oper() == Operation::Request && arp.get_tpa() == config.ip => {
            debug!("who has {}? tell {}", arp.get_tpa(), arp.get_spa());
        }
        _ => return None,
    }

    let mut eth = ether::Frame::new(frame);
    eth.reply_from(config.mac);

    let mut arp = Packet {
        buffer: &mut eth.payload_mut()[..usize(SIZE)],
    };
    arp.reply_from(config.mac);

    Some(ether::HEADER_SIZE + SIZE)
}

/// Returns the hardware address of `from` if `frame` is its ARP reply
pub fn resolved(frame: &[u8], from: ipv4::Addr) -> Option<mac::Addr> {
    let arp = packet(frame)?;
    if arp.get_oper() == Operation::Reply && arp.get_spa() == from {
        Some(arp.get_sha())
    } else {
        None
    }
}
