//! Formatting helpers

use core::fmt;

/// Formats an integer as zero padded hexadecimal
pub struct Hex<T>(pub T);

macro_rules! hex {
    ($($uxx:ty => $width:expr),+) => {
        $(
            impl fmt::Debug for Hex<$uxx> {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "0x{:01$x}", self.0, $width)
                }
            }
        )+
    };
}

hex!(u16 => 4, u32 => 8);
