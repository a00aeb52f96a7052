//! Network context

use crate::{ipv4, mac};

/// Addresses, ports and retry budgets shared by every part of the stack
///
/// The bootstrap code creates one of these with [`Config::new`], overrides whatever it needs and
/// hands it to the stack. Afterwards only the stack writes to it: the router MAC is filled in by
/// [`Stack::start`](crate::Stack::start) and the device IP by an acquired DHCP lease.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    /// MAC address of this device
    pub mac: mac::Addr,
    /// IPv4 address of this device
    pub ip: ipv4::Addr,
    /// IPv4 address of the gateway
    pub router: ipv4::Addr,
    /// MAC address of the gateway; all outbound frames go here
    pub router_mac: mac::Addr,
    /// IPv4 address of the DNS server
    pub dns: ipv4::Addr,
    /// TCP port of the HTTP listener
    pub http_port: u16,
    /// Local TCP port used by the HTTP client
    pub client_port: u16,
    /// Local UDP port; source port of datagrams sent with `Stack::udp_send`
    pub udp_port: u16,
    /// TCP port of the remote HTTP server
    pub remote_http_port: u16,
    /// TTL of outbound IPv4 packets
    pub ttl: u8,
    /// Receive attempts while waiting for the router's ARP reply
    pub arp_attempts: u32,
    /// Receive attempts while waiting for a DNS response
    pub dns_attempts: u32,
}

impl Config {
    /// Gateway and DNS server used when none is specified
    pub const DEFAULT_ROUTER: ipv4::Addr = ipv4::Addr([192, 168, 1, 1]);

    /// Creates a network context with the default ports and budgets
    pub fn new(mac: mac::Addr, ip: ipv4::Addr) -> Self {
        Config {
            mac,
            ip,
            router: Self::DEFAULT_ROUTER,
            router_mac: mac::Addr::BROADCAST,
            dns: Self::DEFAULT_ROUTER,
            http_port: 80,
            client_port: 15979,
            udp_port: 1200,
            remote_http_port: 80,
            ttl: 128,
            arp_attempts: 0x5fff,
            dns_attempts: 9000,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{ipv4, mac};

    use super::Config;

    #[test]
    fn defaults() {
        let config = Config::new(
            mac::Addr([0x00, 0x04, 0xa3, 0x12, 0x34, 0x56]),
            ipv4::Addr([192, 168, 1, 55]),
        );

        assert_eq!(config.router, ipv4::Addr([192, 168, 1, 1]));
        assert_eq!(config.dns, config.router);
        assert!(config.router_mac.is_broadcast());
        assert_eq!(config.http_port, 80);
        assert_eq!(config.client_port, 15979);
        assert_eq!(config.udp_port, 1200);
        assert_eq!(config.ttl, 128);
        assert_eq!(config.arp_attempts, 0x5fff);
        assert_eq!(config.dns_attempts, 9000);
    }
}
