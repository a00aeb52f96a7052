//! Link layer transport

use embedded_hal::{blocking, digital::v2::OutputPin};
use enc28j60::Enc28j60;

/// Moves Ethernet frames on and off the wire
pub trait Link {
    /// Transport error
    type Error;

    /// Checks whether the link is up
    fn is_link_up(&mut self) -> Result<bool, Self::Error>;

    /// Transmits `frame`, which excludes the frame check sequence
    fn transmit(&mut self, frame: &[u8]) -> Result<(), Self::Error>;

    /// Copies the next received frame into `buffer`
    ///
    /// Returns the length of the frame, or 0 if none was pending
    fn receive(&mut self, buffer: &mut [u8]) -> Result<u16, Self::Error>;
}

impl<E, SPI, NCS> Link for Enc28j60<SPI, NCS>
where
    SPI: blocking::spi::Transfer<u8, Error = E> + blocking::spi::Write<u8, Error = E>,
    NCS: OutputPin,
{
    type Error = enc28j60::Error<E>;

    fn is_link_up(&mut self) -> Result<bool, Self::Error> {
        Enc28j60::is_link_up(self)
    }

    fn transmit(&mut self, frame: &[u8]) -> Result<(), Self::Error> {
        Enc28j60::transmit(self, frame)
    }

    fn receive(&mut self, buffer: &mut [u8]) -> Result<u16, Self::Error> {
        Enc28j60::receive(self, buffer)
    }
}
