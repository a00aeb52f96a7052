//! DHCP: Dynamic Host Configuration Protocol (client side)
//!
//! # References
//!
//! - [RFC 2131: Dynamic Host Configuration Protocol][rfc2131]
//! - [RFC 2132: DHCP Options and BOOTP Vendor Extensions][rfc2132]
//!
//! [rfc2131]: https://tools.ietf.org/html/rfc2131
//! [rfc2132]: https://tools.ietf.org/html/rfc2132

use core::fmt;
use core::ops::{Range, RangeFrom};

use as_slice::{AsMutSlice, AsSlice};
use byteorder::{ByteOrder, NetworkEndian as NE};
use cast::usize;
use log::{debug, info, warn};

use crate::{config::Config, ether, fmt::Hex, ipv4, mac, traits::Resize, udp};

/* Message structure */
const OP: usize = 0;
const HTYPE: usize = 1;
const HLEN: usize = 2;
const HOPS: usize = 3;
const XID: Range<usize> = 4..8;
const SECS: Range<usize> = 8..10;
const FLAGS: Range<usize> = 10..12;
const CIADDR: Range<usize> = 12..16;
const YIADDR: Range<usize> = 16..20;
const SIADDR: Range<usize> = 20..24;
const GIADDR: Range<usize> = 24..28;
const CHADDR: Range<usize> = 28..44;
// SNAME: 44..108, FILE: 108..236
const MAGIC_COOKIE: Range<usize> = 236..240;
const OPTIONS: RangeFrom<usize> = 240..;

/// Size of the fixed part of a DHCP message, magic cookie included
pub const FIXED_SIZE: u16 = OPTIONS.start as u16;

/// UDP port of the client
pub const CLIENT_PORT: u16 = 68;

/// UDP port of the server
pub const SERVER_PORT: u16 = 67;

/// Transaction ID of our DISCOVER messages
pub const TRANSACTION_ID: u32 = 0xaa55_aa55;

const COOKIE: [u8; 4] = [99, 130, 83, 99];

/* Options */
const OPTION_PAD: u8 = 0;
const OPTION_REQUESTED_IP: u8 = 50;
const OPTION_MESSAGE_TYPE: u8 = 53;
const OPTION_SERVER_ID: u8 = 54;
const OPTION_END: u8 = 255;

// hardware type: Ethernet
const HTYPE_ETHERNET: u8 = 1;

// Ethernet + IPv4 + UDP
const HEADERS: usize = 14 + 20 + 8;

/// DHCP (BOOTP) message
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
    /// Parses bytes into a DHCP message
    ///
    /// BOOTP messages without the DHCP magic cookie are rejected
    pub fn parse(bytes: B) -> Result<Self, B> {
        let slice = bytes.as_slice();
        if slice.len() < usize(FIXED_SIZE) || slice[MAGIC_COOKIE] != COOKIE {
            Err(bytes)
        } else {
            Ok(Message { buffer: bytes })
        }
    }

    /* Getters */
    /// Returns the op field
    pub fn get_op(&self) -> Op {
        self.as_slice()[OP].into()
    }

    /// Returns the htype (hardware type) field
    pub fn get_htype(&self) -> u8 {
        self.as_slice()[HTYPE]
    }

    /// Returns the hlen (hardware address length) field
    pub fn get_hlen(&self) -> u8 {
        self.as_slice()[HLEN]
    }

    /// Returns the xid (transaction ID) field
    pub fn get_xid(&self) -> u32 {
        NE::read_u32(&self.as_slice()[XID])
    }

    /// Returns the ciaddr (client IP address) field
    pub fn get_ciaddr(&self) -> ipv4::Addr {
        self.addr(CIADDR)
    }

    /// Returns the yiaddr ('your' IP address) field
    pub fn get_yiaddr(&self) -> ipv4::Addr {
        self.addr(YIADDR)
    }

    /// Returns the siaddr (next server IP address) field
    pub fn get_siaddr(&self) -> ipv4::Addr {
        self.addr(SIADDR)
    }

    /// Returns the client hardware address, assuming it's a MAC address
    pub fn get_chaddr(&self) -> mac::Addr {
        let mut addr = mac::Addr::ZERO;
        addr.0
            .copy_from_slice(&self.as_slice()[CHADDR.start..CHADDR.start + 6]);
        addr
    }

    /// View into the options
    pub fn options(&self) -> &[u8] {
        &self.as_slice()[OPTIONS]
    }

    /// Returns the value of the first option with the given `code`
    pub fn option(&self, code: u8) -> Option<&[u8]> {
        let options = self.options();

        let mut cursor = 0;
        loop {
            match *options.get(cursor)? {
                OPTION_END => return None,
                OPTION_PAD => cursor += 1,
                c => {
                    let len = usize(*options.get(cursor + 1)?);
                    let value = options.get(cursor + 2..cursor + 2 + len)?;
                    if c == code {
                        return Some(value);
                    }
                    cursor += 2 + len;
                }
            }
        }
    }

    /// Returns the DHCP message type option
    pub fn message_type(&self) -> Option<MessageType> {
        match self.option(OPTION_MESSAGE_TYPE)? {
            [type_] => Some((*type_).into()),
            _ => None,
        }
    }

    /// Returns the length of this message
    pub fn len(&self) -> u16 {
        self.as_slice().len() as u16
    }

    /* Private */
    fn as_slice(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    fn addr(&self, range: Range<usize>) -> ipv4::Addr {
        let mut addr = ipv4::Addr::UNSPECIFIED;
        addr.0.copy_from_slice(&self.as_slice()[range]);
        addr
    }
}

impl<B> Message<B>
where
    B: AsSlice<Element = u8> + AsMutSlice<Element = u8>,
{
    /* Setters */
    /// Sets the op field
    pub fn set_op(&mut self, op: Op) {
        self.as_mut_slice()[OP] = op.into();
    }

    /// Sets the xid (transaction ID) field
    pub fn set_xid(&mut self, xid: u32) {
        NE::write_u32(&mut self.as_mut_slice()[XID], xid)
    }

    /// Sets the yiaddr ('your' IP address) field
    pub fn set_yiaddr(&mut self, addr: ipv4::Addr) {
        self.as_mut_slice()[YIADDR].copy_from_slice(&addr.0)
    }

    /// Sets the client hardware address (and the hardware type / length to Ethernet's)
    pub fn set_chaddr(&mut self, addr: mac::Addr) {
        let bytes = self.as_mut_slice();
        bytes[HTYPE] = HTYPE_ETHERNET;
        bytes[HLEN] = 6;
        bytes[CHADDR.start..CHADDR.start + 6].copy_from_slice(&addr.0);
    }

    /// Mutable view into the options
    pub fn options_mut(&mut self) -> &mut [u8] {
        &mut self.as_mut_slice()[OPTIONS]
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
    /* Constructors */
    /// Transforms the given buffer into a DHCP message
    ///
    /// The fixed part is zeroed except for the hardware type and length (Ethernet) and the magic
    /// cookie. The message spans the whole buffer until `set_options` is called.
    ///
    /// # Panics
    ///
    /// This constructor panics if the buffer can't hold the fixed part
    pub fn new(buffer: B) -> Self {
        assert!(buffer.as_slice().len() >= usize(FIXED_SIZE));

        let mut message = Message { buffer };
        let bytes = message.as_mut_slice();
        for byte in &mut bytes[..usize(FIXED_SIZE)] {
            *byte = 0;
        }
        bytes[HTYPE] = HTYPE_ETHERNET;
        bytes[HLEN] = 6;
        bytes[HOPS] = 0;
        NE::write_u16(&mut bytes[SECS], 0);
        NE::write_u16(&mut bytes[FLAGS], 0);
        bytes[MAGIC_COOKIE].copy_from_slice(&COOKIE);

        message
    }

    /// Copies the (already encoded) `options` after the magic cookie and shrinks the message to
    /// fit them
    ///
    /// # Panics
    ///
    /// This method panics if the options don't fit in the buffer
    pub fn set_options(&mut self, options: &[u8]) {
        let len = FIXED_SIZE + options.len() as u16;
        assert!(usize(len) <= self.as_slice().len());

        self.buffer.truncate(len);
        self.options_mut().copy_from_slice(options);
    }
}

/// NOTE excludes the server name, file and options
impl<B> fmt::Debug for Message<B>
where
    B: AsSlice<Element = u8>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut giaddr = ipv4::Addr::UNSPECIFIED;
        giaddr.0.copy_from_slice(&self.as_slice()[GIADDR]);

        f.debug_struct("dhcp::Message")
            .field("op", &self.get_op())
            .field("xid", &Hex(self.get_xid()))
            .field("ciaddr", &self.get_ciaddr())
            .field("yiaddr", &self.get_yiaddr())
            .field("siaddr", &self.get_siaddr())
            .field("giaddr", &giaddr)
            .field("chaddr", &self.get_chaddr())
            .field("message_type", &self.message_type())
            .finish()
    }
}

full_range!(
    u8,
    /// BOOTP operation
    #[derive(Clone, Copy, Debug, PartialEq)]
    pub enum Op {
        /// Sent by the client
        BootRequest = 1,
        /// Sent by the server
        BootReply = 2,
    }
);

full_range!(
    u8,
    /// DHCP message type (option 53)
    #[derive(Clone, Copy, Debug, PartialEq)]
    pub enum MessageType {
        /// DHCPDISCOVER
        Discover = 1,
        /// DHCPOFFER
        Offer = 2,
        /// DHCPREQUEST
        Request = 3,
        /// DHCPDECLINE
        Decline = 4,
        /// DHCPACK
        Ack = 5,
        /// DHCPNAK
        Nak = 6,
        /// DHCPRELEASE
        Release = 7,
    }
);

/// State of the client, as named in RFC 2131
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum State {
    /// Initial state; no address was ever requested
    InitReboot,
    /// Waiting for the answer to the first DISCOVER
    Rebooting,
    /// The server refused us; a new DISCOVER is due
    Init,
    /// Waiting for an OFFER
    Selecting,
    /// Waiting for the ACK to our REQUEST
    Requesting,
    /// Holding a lease
    Bound,
    /// Extending the lease with the server that granted it
    Renewing,
    /// Extending the lease with any server
    Rebinding,
}

/// DHCP client
///
/// The client builds messages but never sends them; after a message has been transmitted the
/// caller reports it with `transmitted`, which advances the state machine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Client {
    state: State,
    xid: Option<u32>,
    lease: Option<ipv4::Addr>,
}

impl Default for Client {
    fn default() -> Self {
        Client::new()
    }
}

impl Client {
    /// Creates a client in the `InitReboot` state
    pub fn new() -> Self {
        Client {
            state: State::InitReboot,
            xid: None,
            lease: None,
        }
    }

    /// Current state
    pub fn state(&self) -> State {
        self.state
    }

    /// Leased address
    pub fn lease(&self) -> Option<ipv4::Addr> {
        self.lease
    }

    /// Transaction ID of the outstanding exchange
    pub fn xid(&self) -> Option<u32> {
        self.xid
    }

    /// Builds a DISCOVER broadcast in `buffer` and returns the length of the frame
    ///
    /// # Panics
    ///
    /// This method panics if `buffer` can't hold the message
    pub fn discover(&mut self, buffer: &mut [u8], config: &Config) -> u16 {
        self.xid = Some(TRANSACTION_ID);

        let options = [
            OPTION_MESSAGE_TYPE,
            1,
            MessageType::Discover.into(),
            OPTION_END,
        ];

        ipv4::frame(buffer, config, ipv4::Addr::BROADCAST, |ip| {
            ip.set_source(ipv4::Addr::UNSPECIFIED);
            ip.udp(|udp| {
                udp.set_source(CLIENT_PORT);
                udp.set_destination(SERVER_PORT);

                let len = {
                    let mut dhcp = Message::new(udp.payload_mut());
                    dhcp.set_op(Op::BootRequest);
                    dhcp.set_xid(TRANSACTION_ID);
                    dhcp.set_chaddr(config.mac);
                    dhcp.set_options(&options);
                    dhcp.len()
                };
                udp.truncate(len);
            })
        })
    }

    /// Rewrites the OFFER at the start of `frame` into a REQUEST for the offered address
    ///
    /// The REQUEST goes back to the server that sent the offer, from the offered address, and
    /// keeps the offer's transaction ID. Returns the length of the frame, or `None` if `frame`
    /// doesn't hold a DHCP message or the request doesn't fit in it.
    pub fn request(&mut self, frame: &mut [u8], config: &Config) -> Option<u16> {
        let (xid, offered, server) = {
            let (source, udp) = udp::datagram(frame)?;
            let dhcp = Message::parse(udp.payload()).ok()?;

            let server = match dhcp.option(OPTION_SERVER_ID) {
                Some(id) if id.len() == 4 => {
                    let mut addr = ipv4::Addr::UNSPECIFIED;
                    addr.0.copy_from_slice(id);
                    addr
                }
                _ => source,
            };

            (dhcp.get_xid(), dhcp.get_yiaddr(), server)
        };

        let [o0, o1, o2, o3] = offered.0;
        let [s0, s1, s2, s3] = server.0;
        let options = [
            OPTION_MESSAGE_TYPE,
            1,
            MessageType::Request.into(),
            OPTION_REQUESTED_IP,
            4,
            o0,
            o1,
            o2,
            o3,
            OPTION_SERVER_ID,
            4,
            s0,
            s1,
            s2,
            s3,
            OPTION_END,
        ];

        let dhcp_len = usize(FIXED_SIZE) + options.len();
        if HEADERS + dhcp_len > frame.len() {
            return None;
        }

        self.xid = Some(xid);

        let mut eth = ether::Frame::new(frame);
        eth.reply_from(config.mac);

        let mut ip = ipv4::Packet::in_place(eth.payload_mut()).reply_from(offered);
        ip.set_ttl(config.ttl);
        ip.set_payload_len((usize(udp::HEADER_SIZE) + dhcp_len) as u16);
        {
            let mut udp = udp::Packet::new(ip.payload_mut());
            udp.set_source(CLIENT_PORT);
            udp.set_destination(SERVER_PORT);

            let mut dhcp = Message {
                buffer: udp.payload_mut(),
            };
            dhcp.set_op(Op::BootRequest);
            dhcp.set_yiaddr(ipv4::Addr::UNSPECIFIED);
            dhcp.options_mut().copy_from_slice(&options);
        }
        ip.update_payload_checksum();
        let len = ip.update_checksum().len();

        Some(ether::HEADER_SIZE + len)
    }

    /// Advances the state machine after `sent` (a DISCOVER or a REQUEST) has been transmitted
    ///
    /// Both messages move INIT-REBOOT to REBOOTING and INIT to SELECTING. A REQUEST sent while
    /// SELECTING also moves to REQUESTING. That step is not part of the discover rule: without
    /// it a client answering an OFFER would stay in SELECTING and never bind.
    pub fn transmitted(&mut self, sent: MessageType) {
        let next = match (self.state, sent) {
            (State::InitReboot, _) => State::Rebooting,
            (State::Init, _) => State::Selecting,
            (State::Selecting, MessageType::Request) => State::Requesting,
            (state, _) => state,
        };

        if next != self.state {
            debug!("dhcp: {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    /// Processes the DHCP message at the start of `frame`
    ///
    /// Messages that are not replies to the outstanding transaction are ignored. A reply with
    /// an all-zero 'your' address is a NAK; any other reply is an ACK (or an OFFER). On ACK the
    /// leased address becomes `config.ip`.
    ///
    /// Returns the length of a REQUEST, built in `frame`, that must be transmitted (and then
    /// reported with `transmitted`)
    pub fn process(&mut self, frame: &mut [u8], config: &mut Config) -> Option<u16> {
        let offered = {
            let (_, udp) = udp::datagram(frame)?;
            if udp.get_destination() != CLIENT_PORT {
                return None;
            }

            let dhcp = match Message::parse(udp.payload()) {
                Ok(dhcp) => dhcp,
                Err(_) => {
                    warn!("dhcp: malformed message");
                    return None;
                }
            };

            if dhcp.get_op() != Op::BootReply || Some(dhcp.get_xid()) != self.xid {
                debug!("dhcp: ignoring {:?}", dhcp);
                return None;
            }

            dhcp.get_yiaddr()
        };

        let nak = offered.is_unspecified();
        match self.state {
            State::Rebooting | State::Requesting | State::Rebinding | State::Renewing => {
                if nak {
                    debug!("dhcp: NAK in {:?}", self.state);
                    self.state = State::Init;
                } else {
                    info!("dhcp: bound to {}", offered);
                    self.lease = Some(offered);
                    config.ip = offered;
                    self.state = State::Bound;
                }
                None
            }
            State::Selecting if !nak => self.request(frame, config),
            _ => None,
        }
    }
}
