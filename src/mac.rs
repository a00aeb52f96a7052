//! MAC: Medium Access Control

use core::fmt;

use hash32_derive::Hash32;

/// MAC address
#[derive(Clone, Copy, Eq, Hash32, PartialEq)]
pub struct Addr(pub [u8; 6]);

impl Addr {
    /// Broadcast address
    pub const BROADCAST: Self = Addr([0xff; 6]);

    /// All zeros; the target of an ARP request
    pub const ZERO: Self = Addr([0; 6]);

    /// Checks if this is the broadcast address
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Checks if this is a multicast address
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 1 == 1
    }
}

impl fmt::Debug for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mac::Addr({})", self)
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut is_first = true;
        for byte in &self.0 {
            if is_first {
                is_first = false;
            } else {
                f.write_str(":")?;
            }

            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}
