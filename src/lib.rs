//! encnet: a minimal IPv4 stack for the ENC28J60
//!
//! The crate has two layers:
//!
//! - Wire formats (`ether`, `arp`, `ipv4`, `icmp`, `udp`, `tcp`, `dns`, `dhcp`). Each one is an
//!   API to access or mutate the header and payload of a frame / packet *in place*, plus free
//!   functions that build the few messages this stack sends, either from scratch or by rewriting
//!   a received frame into its reply.
//!
//! - The [`Stack`], which owns a single frame buffer and a [`link::Link`] (the `enc28j60` driver
//!   implements it) and dispatches received frames to the wire format handlers and to an
//!   [`app::Application`].
//!
//! There's no TCP state machine. The stack serves one inbound HTTP connection and one outbound
//! HTTP request at a time by answering each segment as it arrives.
//!
//! # Examples
//!
//! - Parsing an ARP packet
//!
//! ```
//! use encnet::{arp, ether};
//!
//! let bytes = &[
//!     255, 255, 255, 255, 255, 255, // eth: destination
//!     120, 68, 118, 217, 106, 124, // eth: source
//!     8, 6, // eth: type
//!     0, 1, // arp: HTYPE = Ethernet
//!     8, 0, // arp: PTYPE = IPv4
//!     6, // arp: HLEN
//!     4, // arp: PLEN
//!     0, 2, // arp: OPER = Reply
//!     120, 68, 118, 217, 106, 124, // arp: SHA
//!     192, 168, 1, 1, // arp: SPA
//!     32, 24, 3, 1, 0, 0, // arp: THA
//!     192, 168, 1, 33, // arp: TPA
//!     0, 0, 0, 0, // eth: padding
//! ];
//!
//! let eth = ether::Frame::parse(&bytes[..]).unwrap();
//! let arp = arp::Packet::parse(eth.payload()).unwrap();
//!
//! assert_eq!(arp.get_htype(), arp::HardwareType::Ethernet);
//! assert_eq!(arp.get_ptype(), ether::Type::Ipv4);
//! assert_eq!(arp.get_oper(), arp::Operation::Reply);
//! ```
//!
//! - Constructing an UDP datagram
//!
//! Builders start with an (oversized) buffer and shrink the frame to the length of its contents.
//!
//! ```
//! use encnet::{config::Config, ipv4, mac, udp};
//!
//! let config = Config::new(
//!     mac::Addr([0x20, 0x18, 0x03, 0x01, 0x00, 0x00]),
//!     ipv4::Addr([192, 168, 1, 55]),
//! );
//!
//! let mut buffer = [0; 128];
//! let len = udp::send(&mut buffer, &config, ipv4::Addr([192, 168, 1, 33]), 5000, b"Invoke.")
//!     .unwrap();
//!
//! // Ethernet + IPv4 + UDP headers and the payload
//! assert_eq!(len, 49);
//! ```

#![deny(rust_2018_compatibility)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![no_std]

#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;

#[macro_use]
mod macros;

mod fmt;
mod traits;

pub mod checksum;
pub mod config;
pub mod retry;

// Medium Access Control layer
pub mod ether;
pub mod mac;

pub mod arp;

// Network layer
pub mod ipv4;

pub mod icmp;

// Transport layer
pub mod tcp;
pub mod udp;

// Application layer
pub mod dhcp;
pub mod dns;

pub mod app;
pub mod link;
pub mod stack;

pub use crate::stack::{Error, Stack};

/// [Type State] Valid checksum
pub enum Valid {}

/// [Type State] Invalid checksum
pub enum Invalid {}
