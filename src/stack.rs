//! The stack: frame dispatcher and outbound flows

use cast::usize;
use log::{debug, error, info, warn};

use crate::{
    app::Application,
    arp,
    config::Config,
    dhcp, dns, ether, icmp, ipv4,
    link::Link,
    mac,
    retry::Budget,
    tcp::{self, Flags},
    udp,
};

/// Size of the frame buffer
pub const MAX_PACKET_LEN: usize = 600;

// HTTP client responses shorter than this are not handed to the application
const MIN_RESPONSE_LEN: usize = 12;

/// Stack errors
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Error<E> {
    /// The link reported an error
    Link(E),
    /// The link is down
    LinkDown,
    /// No reply arrived within the retry budget
    Timeout,
    /// The peer answered negatively or with a malformed message
    Rejected,
    /// What was to be sent doesn't fit in the frame buffer
    Truncated,
    /// The host name can't be put in a DNS query
    InvalidName,
}

impl<E> From<dns::Error> for Error<E> {
    fn from(e: dns::Error) -> Self {
        match e {
            dns::Error::InvalidName => Error::InvalidName,
            dns::Error::Truncated => Error::Truncated,
            dns::Error::Rejected => Error::Rejected,
        }
    }
}

/// State of the HTTP client connection
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ClientStatus {
    /// Nothing to do
    Idle,
    /// `fetch` succeeded; the idle loop will open the connection
    Pending,
    /// The SYN has been sent
    SynSent,
    /// The request has been sent; response data is being received
    Established,
}

/// A single threaded IPv4 stack that owns one frame buffer
pub struct Stack<L, A> {
    app: A,
    buffer: [u8; MAX_PACKET_LEN],
    client: ClientStatus,
    config: Config,
    dhcp: dhcp::Client,
    link: L,
    server: Option<ipv4::Addr>,
}

impl<L, A> Stack<L, A>
where
    L: Link,
    A: Application,
{
    /// Creates a new stack
    ///
    /// Call `start` before anything else to resolve the router
    pub fn new(link: L, app: A, config: Config) -> Self {
        Stack {
            app,
            buffer: [0; MAX_PACKET_LEN],
            client: ClientStatus::Idle,
            config,
            dhcp: dhcp::Client::new(),
            link,
            server: None,
        }
    }

    /// Network context
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// DHCP client
    pub fn dhcp(&self) -> &dhcp::Client {
        &self.dhcp
    }

    /// State of the HTTP client connection
    pub fn client_status(&self) -> ClientStatus {
        self.client
    }

    /// Address of the server the HTTP client talks to
    pub fn server(&self) -> Option<ipv4::Addr> {
        self.server
    }

    /// The frame buffer; after `poll` reports a match it holds the matched frame
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// The application
    pub fn app(&mut self) -> &mut A {
        &mut self.app
    }

    /// The link
    pub fn link(&mut self) -> &mut L {
        &mut self.link
    }

    /// Releases the link and the application
    pub fn free(self) -> (L, A) {
        (self.link, self.app)
    }

    /// Checks the link and resolves the MAC address of the router
    ///
    /// Every frame received until the router answers, or until `config.arp_attempts` receive
    /// attempts have been made, is discarded
    pub fn start(&mut self) -> Result<mac::Addr, Error<L::Error>> {
        self.check_link()?;

        let router = self.config.router;
        self.send_arp_request(router)?;

        let mut budget = Budget::new(self.config.arp_attempts);
        while budget.consume() {
            let len = self.receive()?;
            if len == 0 {
                continue;
            }

            if let Some(mac) = arp::resolved(&self.buffer[..usize(len)], router) {
                info!("router {} is at {:?}", router, mac);
                self.config.router_mac = mac;
                return Ok(mac);
            }

            debug!("start: discarding frame ({} bytes)", len);
        }

        warn!("router {} didn't answer", router);
        Err(Error::Timeout)
    }

    /// Broadcasts an ARP request for `target`
    pub fn send_arp_request(&mut self, target: ipv4::Addr) -> Result<(), Error<L::Error>> {
        let len = arp::request(&mut self.buffer, &self.config, target);
        self.transmit(len)
    }

    /// Sends an echo request to `target`
    pub fn send_ping(&mut self, target: ipv4::Addr) -> Result<(), Error<L::Error>> {
        let len = icmp::echo_request(&mut self.buffer, &self.config, target);
        self.transmit(len)
    }

    /// Sends `payload` to `destination:port`, from `config.udp_port`
    pub fn udp_send(
        &mut self,
        destination: ipv4::Addr,
        port: u16,
        payload: &[u8],
    ) -> Result<(), Error<L::Error>> {
        match udp::send(&mut self.buffer, &self.config, destination, port, payload) {
            Some(len) => self.transmit(len),
            None => Err(Error::Truncated),
        }
    }

    /// Broadcasts a DHCP discover
    ///
    /// The server's answers are handled by `poll`; the lease is in `dhcp().lease()` and in
    /// `config().ip` once the client is bound
    pub fn dhcp_discover(&mut self) -> Result<(), Error<L::Error>> {
        let len = self.dhcp.discover(&mut self.buffer, &self.config);
        self.transmit(len)?;
        self.dhcp.transmitted(dhcp::MessageType::Discover);
        Ok(())
    }

    /// Resolves `name` into an IPv4 address using `config.dns`
    ///
    /// Other frames are serviced by `poll` while waiting. Gives up after `config.dns_attempts`
    /// receive attempts.
    pub fn resolve(&mut self, name: &str) -> Result<ipv4::Addr, Error<L::Error>> {
        let len = dns::query(&mut self.buffer, &self.config, name)?;
        self.transmit(len)?;

        let mut budget = Budget::new(self.config.dns_attempts);
        while budget.consume() {
            let len = match self.poll(Some(ipv4::Protocol::Udp))? {
                Some(len) => len,
                None => continue,
            };

            match udp::datagram(&self.buffer[..usize(len)]) {
                Some((_, ref udp))
                    if udp.get_source() == dns::PORT
                        && udp.get_destination() == dns::SOURCE_PORT =>
                {
                    let addr = dns::answer(udp.payload()).map_err(|e| {
                        warn!("dns: {} was rejected", name);
                        e
                    })?;

                    info!("{} is at {}", name, addr);
                    return Ok(addr);
                }
                _ => debug!("resolve: discarding frame ({} bytes)", len),
            }
        }

        warn!("dns: no response for {}", name);
        Err(Error::Timeout)
    }

    /// Resolves `host` and schedules an HTTP request to it
    ///
    /// The connection is opened by the next call to `idle`
    pub fn fetch(&mut self, host: &str) -> Result<(), Error<L::Error>> {
        let server = self.resolve(host)?;
        self.server = Some(server);
        self.client = ClientStatus::Pending;
        Ok(())
    }

    /// Body of the idle loop: checks the link, services one frame and opens the pending HTTP
    /// client connection, if any
    pub fn idle(&mut self) -> Result<(), Error<L::Error>> {
        if let Err(e) = self.check_link() {
            error!("link is down");
            return Err(e);
        }

        self.poll(None)?;

        if self.client == ClientStatus::Pending {
            if let Some(server) = self.server {
                let len = tcp::syn(&mut self.buffer, &self.config, server);
                self.transmit(len)?;
                self.client = ClientStatus::SynSent;
            }
        }

        Ok(())
    }

    /// Receives one frame and services it
    ///
    /// ARP requests, echo requests and TCP segments for the HTTP listener and client are
    /// answered, and answered frames are never reported. Any other IPv4 frame whose protocol is
    /// `wanted` is left in the buffer and its length is returned. Otherwise UDP datagrams are
    /// passed on to the DHCP client or the application and the frame length is returned as well.
    pub fn poll(
        &mut self,
        wanted: Option<ipv4::Protocol>,
    ) -> Result<Option<u16>, Error<L::Error>> {
        let len = self.receive()?;
        if len == 0 {
            return Ok(None);
        }

        let type_ = match ether::Frame::parse(&self.buffer[..usize(len)]) {
            Ok(eth) => eth.get_type(),
            Err(_) => {
                warn!("runt frame ({} bytes)", len);
                return Ok(None);
            }
        };

        match type_ {
            ether::Type::Arp => {
                if let Some(len) = arp::reply(&mut self.buffer, &self.config) {
                    self.transmit(len)?;
                }

                Ok(None)
            }
            ether::Type::Ipv4 => self.ipv4(len, wanted),
            _ => {
                debug!("ignoring {:?} frame", type_);
                Ok(None)
            }
        }
    }

    /* Private */
    fn ipv4(
        &mut self,
        len: u16,
        wanted: Option<ipv4::Protocol>,
    ) -> Result<Option<u16>, Error<L::Error>> {
        let (protocol, source) = {
            let packet = &self.buffer[usize(ether::HEADER_SIZE)..usize(len)];
            match ipv4::Packet::parse(packet) {
                Ok(ref ip) if usize(ip.header_len()) == usize(ipv4::HEADER_SIZE) => {
                    (ip.get_protocol(), ip.get_source())
                }
                Ok(_) => {
                    debug!("dropping IPv4 packet with options");
                    return Ok(None);
                }
                Err(_) => {
                    warn!("malformed IPv4 packet");
                    return Ok(None);
                }
            }
        };

        match protocol {
            ipv4::Protocol::Icmp => {
                if let Some(len) = icmp::echo_reply(&mut self.buffer, &self.config) {
                    self.transmit(len)?;
                    return Ok(None);
                }
            }
            ipv4::Protocol::Tcp => {
                if self.tcp(source)? {
                    return Ok(None);
                }
            }
            _ => {}
        }

        if Some(protocol) == wanted {
            return Ok(Some(len));
        }

        if protocol == ipv4::Protocol::Udp {
            self.udp()?;
            return Ok(Some(len));
        }

        Ok(None)
    }

    // returns `true` if the segment was consumed by the HTTP listener
    fn tcp(&mut self, source: ipv4::Addr) -> Result<bool, Error<L::Error>> {
        let (source_port, destination_port, flags, payload_len) = match tcp::segment(&self.buffer)
        {
            Some((_, tcp)) => (
                tcp.get_source(),
                tcp.get_destination(),
                tcp.get_flags(),
                tcp.payload().len(),
            ),
            None => {
                warn!("malformed TCP segment");
                return Ok(false);
            }
        };

        if destination_port == self.config.http_port {
            self.http_server(flags)?;
            return Ok(true);
        }

        if destination_port == self.config.client_port
            && source_port == self.config.remote_http_port
            && Some(source) == self.server
        {
            self.http_client(flags, payload_len)?;
        }

        Ok(false)
    }

    fn http_server(&mut self, flags: Flags) -> Result<(), Error<L::Error>> {
        if flags.contains(Flags::SYN) {
            self.ack(Flags::SYN)
        } else if flags.contains(Flags::PSH | Flags::ACK) {
            let response = match tcp::segment(&self.buffer) {
                Some((_, tcp)) => self.app.http_request(tcp.payload()),
                None => return Ok(()),
            };

            match response {
                Some(data) => match tcp::respond(&mut self.buffer, &self.config, data) {
                    Some(len) => self.transmit(len),
                    None => {
                        warn!("HTTP response doesn't fit in the frame buffer");
                        Err(Error::Truncated)
                    }
                },
                None => self.ack(Flags::empty()),
            }
        } else if flags.contains(Flags::FIN) {
            self.ack(Flags::empty())
        } else {
            Ok(())
        }
    }

    fn http_client(&mut self, flags: Flags, payload_len: usize) -> Result<(), Error<L::Error>> {
        if flags.contains(Flags::SYN | Flags::ACK) {
            self.ack(Flags::empty())?;

            let request = self.app.http_client_request();
            match tcp::push(&mut self.buffer, request) {
                Some(len) => self.transmit(len)?,
                None => {
                    warn!("HTTP request doesn't fit in the frame buffer");
                    return Err(Error::Truncated);
                }
            }

            info!("connected to {:?}", self.server);
            self.client = ClientStatus::Established;
            return Ok(());
        }

        if self.client == ClientStatus::Established && payload_len > MIN_RESPONSE_LEN {
            if let Some((_, tcp)) = tcp::segment(&self.buffer) {
                self.app.http_response(tcp.payload());
            }
        }

        if flags.contains(Flags::FIN) {
            self.ack(Flags::FIN)?;
            debug!("HTTP client connection closed");
            self.client = ClientStatus::Idle;
        } else if payload_len > 0 && self.client != ClientStatus::Idle {
            self.ack(Flags::empty())?;
        }

        Ok(())
    }

    fn udp(&mut self) -> Result<(), Error<L::Error>> {
        let destination = match udp::datagram(&self.buffer) {
            Some((_, udp)) => udp.get_destination(),
            None => {
                warn!("malformed UDP datagram");
                return Ok(());
            }
        };

        if destination == dhcp::CLIENT_PORT {
            if let Some(len) = self.dhcp.process(&mut self.buffer, &mut self.config) {
                self.transmit(len)?;
                self.dhcp.transmitted(dhcp::MessageType::Request);
            }

            return Ok(());
        }

        let reply = match udp::datagram(&self.buffer) {
            Some((_, udp)) => self.app.udp_command(udp.payload()),
            None => return Ok(()),
        };

        if let Some(data) = reply {
            match udp::reply(&mut self.buffer, &self.config, data) {
                Some(len) => self.transmit(len)?,
                None => warn!("UDP reply doesn't fit in the frame buffer"),
            }
        }

        Ok(())
    }

    fn ack(&mut self, flags: Flags) -> Result<(), Error<L::Error>> {
        match tcp::ack(&mut self.buffer, &self.config, flags) {
            Some(len) => self.transmit(len),
            None => Ok(()),
        }
    }

    fn check_link(&mut self) -> Result<(), Error<L::Error>> {
        if self.link.is_link_up().map_err(Error::Link)? {
            Ok(())
        } else {
            Err(Error::LinkDown)
        }
    }

    fn receive(&mut self) -> Result<u16, Error<L::Error>> {
        self.link.receive(&mut self.buffer).map_err(Error::Link)
    }

    fn transmit(&mut self, len: u16) -> Result<(), Error<L::Error>> {
        self.link
            .transmit(&self.buffer[..usize(len)])
            .map_err(Error::Link)
    }
}
