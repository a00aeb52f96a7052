//! Internet checksum
//!
//! # References
//!
//! - [RFC 1071: Computing the Internet Checksum][rfc]
//!
//! [rfc]: https://tools.ietf.org/html/rfc1071

use byteorder::{ByteOrder, NetworkEndian as NE};

use crate::ipv4::Protocol;

/// What's being checksummed
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Kind {
    /// IPv4 header
    Ip,
    /// ICMP message
    Icmp,
    /// UDP datagram, preceded by the IPv4 source and destination addresses
    Udp,
    /// TCP segment, preceded by the IPv4 source and destination addresses
    Tcp,
}

/// Computes the one's complement checksum of `bytes`
///
/// For `Kind::Udp` and `Kind::Tcp`, `bytes` must start at the Source field of the IPv4 header; the
/// rest of the pseudo header (protocol and transport length) is added here. The checksum field
/// itself must be zeroed before calling this function.
pub fn compute(bytes: &[u8], kind: Kind) -> u16 {
    let mut sum = match kind {
        Kind::Ip | Kind::Icmp => 0,
        Kind::Udp => pseudo_header(Protocol::Udp, bytes),
        Kind::Tcp => pseudo_header(Protocol::Tcp, bytes),
    };

    let mut words = bytes.chunks_exact(2);
    for word in &mut words {
        sum = sum.wrapping_add(u32::from(NE::read_u16(word)));
    }

    // odd length: pad with a zero byte
    if let [last] = words.remainder() {
        sum = sum.wrapping_add(u32::from(*last) << 8);
    }

    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }

    !(sum as u16)
}

/// Verifies the checksum of `bytes`, checksum field included
pub fn verify(bytes: &[u8], kind: Kind) -> bool {
    compute(bytes, kind) == 0
}

// protocol number + transport length; the addresses are part of `bytes`
fn pseudo_header(protocol: Protocol, bytes: &[u8]) -> u32 {
    u32::from(u8::from(protocol)) + (bytes.len() as u32).saturating_sub(8)
}

#[cfg(test)]
mod tests {
    use byteorder::{ByteOrder, NetworkEndian as NE};
    use rand::{self, Rng, RngCore};

    use super::Kind;

    const HEADER: [u8; 20] = [
        0x45, 0x00, 0x00, 0x73, 0x00, 0x00, 0x40, 0x00, 0x40, 0x11, 0x00, 0x00, 0xc0, 0xa8, 0x00,
        0x01, 0xc0, 0xa8, 0x00, 0xc7,
    ];

    // straightforward RFC 1071 implementation; every word is summed in a `u64`
    fn reference(bytes: &[u8]) -> u16 {
        let mut sum = 0u64;
        for (i, byte) in bytes.iter().enumerate() {
            sum += if i % 2 == 0 {
                u64::from(*byte) << 8
            } else {
                u64::from(*byte)
            };
        }

        while sum > 0xffff {
            sum = (sum & 0xffff) + (sum >> 16);
        }

        !(sum as u16)
    }

    #[test]
    fn ip() {
        assert_eq!(super::compute(&HEADER, Kind::Ip), 0xb861);

        let mut header = HEADER;
        NE::write_u16(&mut header[10..12], 0xb861);
        assert!(super::verify(&header, Kind::Ip));
    }

    #[test]
    fn odd_length() {
        // the trailing byte is the high byte of a zero padded word
        assert_eq!(super::compute(&[0x01], Kind::Icmp), !0x0100);
        assert_eq!(super::compute(&[0x01, 0x02, 0x03], Kind::Icmp), !0x0402);
    }

    #[test]
    fn pseudo_header() {
        // source, destination, UDP header (length = 10, checksum = 0) and 2 bytes of payload
        let bytes = [
            192, 168, 1, 55, // source
            192, 168, 1, 1, // destination
            0x04, 0xb0, // source port
            0x04, 0xb0, // destination port
            0, 10, // length
            0, 0, // checksum
            b'h', b'i', // payload
        ];

        let mut pseudo = [0; 22];
        pseudo[..18].copy_from_slice(&bytes);

        pseudo[18..].copy_from_slice(&[0, 17, 0, 10]);
        assert_eq!(super::compute(&bytes, Kind::Udp), reference(&pseudo));

        pseudo[18..].copy_from_slice(&[0, 6, 0, 10]);
        assert_eq!(super::compute(&bytes, Kind::Tcp), reference(&pseudo));
    }

    #[test]
    fn random() {
        let mut rng = rand::thread_rng();

        for _ in 0..100 {
            let mut bytes = [0; 600];
            rng.fill_bytes(&mut bytes);
            let bytes = &bytes[..rng.gen_range(0..600)];

            assert_eq!(super::compute(bytes, Kind::Ip), reference(bytes));
        }
    }

    #[test]
    fn recompute() {
        let mut rng = rand::thread_rng();

        for _ in 0..100 {
            let len = 2 * rng.gen_range(1..300);
            let mut array = [0; 600];
            rng.fill_bytes(&mut array);
            let bytes = &mut array[..len];

            // field at a random even offset
            let at = 2 * rng.gen_range(0..len / 2);
            bytes[at] = 0;
            bytes[at + 1] = 0;
            let sum = super::compute(bytes, Kind::Icmp);
            NE::write_u16(&mut bytes[at..at + 2], sum);
            assert!(super::verify(bytes, Kind::Icmp));

            // zeroing the field and recomputing reproduces it
            bytes[at] = 0;
            bytes[at + 1] = 0;
            assert_eq!(super::compute(bytes, Kind::Icmp), sum);
        }
    }
}
