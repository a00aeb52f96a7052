//! ENC28J60
//!
//! Blocking driver for the Microchip ENC28J60 stand-alone Ethernet controller
//!
//! # References
//!
//! - [ENC28J60 data sheet][ds]
//! - [ENC28J60 silicon errata][errata]
//!
//! [ds]: http://ww1.microchip.com/downloads/en/DeviceDoc/39662e.pdf
//! [errata]: http://ww1.microchip.com/downloads/en/DeviceDoc/80349c.pdf

#![deny(rust_2018_compatibility)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_code)]
#![no_std]

use core::cmp;

use byteorder::{ByteOrder, LE};
use embedded_hal::{
    blocking::{self, delay::DelayMs},
    digital::v2::OutputPin,
    spi::{Mode, Phase, Polarity},
};
use log::{debug, info, warn};

pub mod reg;

use crate::reg::{Phy, Register};

/// SPI mode = (0, 0)
pub const MODE: Mode = Mode {
    phase: Phase::CaptureOnFirstTransition,
    polarity: Polarity::IdleLow,
};

/// First address of the receive ring buffer
pub const RXSTART: u16 = 0x0000;

/// Last address of the receive ring buffer
pub const RXEND: u16 = 0x0fff;

/// Where outgoing frames are staged
pub const TXSTART: u16 = 0x1000;

/// Largest frame the MAC accepts, CRC included
pub const MAX_FRAME_LEN: u16 = 1518;

// size of the transmit status vector
const TSV_SIZE: usize = 7;

// size of the receive status header (next packet pointer + status vector)
const RSV_SIZE: usize = 6;

// frame check sequence appended to every received frame
const CRC_SIZE: u16 = 4;

/* Instruction set */
const RCR: u8 = 0x00;
const WCR: u8 = 0x40;
const BFS: u8 = 0x80;
const BFC: u8 = 0xA0;
const RBM: u8 = 0x3A;
const WBM: u8 = 0x7A;
const SRC: u8 = 0xFF;

/// Driver error
#[derive(Debug, PartialEq)]
pub enum Error<E> {
    /// SPI transport error
    Spi(E),
    /// The chip select pin could not be driven
    Ncs,
    /// EREVID reads as zero; there's probably nothing on the bus
    ErevidIsZero,
    /// The PHY reports no link
    LinkDown,
    /// The transmission was aborted by the MAC
    TxAborted {
        /// The abort was caused by a late collision; the frame was re-queued once
        late_collision: bool,
    },
}

impl<E> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Error::Spi(e)
    }
}

/// ENC28J60 driver
pub struct Enc28j60<SPI, NCS> {
    bank: u8,
    ncs: NCS,
    next_packet: u16,
    spi: SPI,
}

impl<E, SPI, NCS> Enc28j60<SPI, NCS>
where
    SPI: blocking::spi::Transfer<u8, Error = E> + blocking::spi::Write<u8, Error = E>,
    NCS: OutputPin,
{
    /// Resets and initializes the chip
    ///
    /// The receive ring buffer spans `RXSTART..=RXEND`; frames are staged for transmission at
    /// `TXSTART`. Unicast frames addressed to `mac` pass the receive filter, as do broadcast ARP
    /// frames.
    pub fn new<D>(spi: SPI, mut ncs: NCS, delay: &mut D, mac: [u8; 6]) -> Result<Self, Error<E>>
    where
        D: DelayMs<u8>,
    {
        ncs.set_high().map_err(|_| Error::Ncs)?;

        let mut enc28j60 = Enc28j60 {
            bank: 0,
            ncs,
            next_packet: RXSTART,
            spi,
        };

        // ESTAT.CLKRDY is not reliable right after a reset (errata #2); wait at least 1 ms
        enc28j60.soft_reset()?;
        delay.delay_ms(1);

        if enc28j60.revision()? == 0 {
            return Err(Error::ErevidIsZero);
        }

        /* Memory layout */
        enc28j60.write_control16(reg::ERXSTL, reg::ERXSTH, RXSTART)?;
        enc28j60.write_control16(reg::ERXNDL, reg::ERXNDH, RXEND)?;
        enc28j60.write_control16(reg::ERXRDPTL, reg::ERXRDPTH, RXSTART)?;
        enc28j60.write_control16(reg::ETXSTL, reg::ETXSTH, TXSTART)?;

        /* Receive filter */
        // unicast to us, valid CRC, plus the pattern match below
        enc28j60.write_control(
            reg::ERXFCON,
            reg::ERXFCON_UCEN | reg::ERXFCON_CRCEN | reg::ERXFCON_PMEN,
        )?;

        // pattern match: broadcast destination (bytes 0..6) and EtherType ARP (bytes 12..14)
        enc28j60.write_control(reg::EPMM0, 0x3f)?;
        enc28j60.write_control(reg::EPMM1, 0x30)?;
        enc28j60.write_control16(reg::EPMCSL, reg::EPMCSH, 0xf7f9)?;

        /* MAC */
        // NOTE the bit field instructions don't work on MAC registers
        enc28j60.write_control(reg::MACON1, reg::MACON1_MARXEN)?;
        // pad short frames, append the CRC and check the type / length field
        enc28j60.write_control(
            reg::MACON3,
            reg::MACON3_PADCFG0 | reg::MACON3_TXCRCEN | reg::MACON3_FRMLNEN,
        )?;
        enc28j60.write_control16(reg::MAMXFLL, reg::MAMXFLH, MAX_FRAME_LEN)?;

        // inter-packet gaps recommended by the data sheet (half duplex)
        enc28j60.write_control(reg::MABBIPG, 0x12)?;
        enc28j60.write_control(reg::MAIPGL, 0x12)?;
        enc28j60.write_control(reg::MAIPGH, 0x0c)?;

        enc28j60.write_control(reg::MAADR1, mac[0])?;
        enc28j60.write_control(reg::MAADR2, mac[1])?;
        enc28j60.write_control(reg::MAADR3, mac[2])?;
        enc28j60.write_control(reg::MAADR4, mac[3])?;
        enc28j60.write_control(reg::MAADR5, mac[4])?;
        enc28j60.write_control(reg::MAADR6, mac[5])?;

        /* PHY */
        enc28j60.write_phy(reg::PHCON1, 0)?;
        // don't loop transmitted frames back in half duplex mode
        enc28j60.write_phy(reg::PHCON2, reg::PHCON2_HDLDIS)?;

        enc28j60.bit_field_set(reg::ECON1, reg::ECON1_RXEN)?;

        info!("ENC28J60 initialized");

        Ok(enc28j60)
    }

    /* Getters */
    /// Returns the silicon revision (EREVID)
    pub fn revision(&mut self) -> Result<u8, Error<E>> {
        self.read_control(reg::EREVID)
    }

    /// Checks the PHY link status
    pub fn is_link_up(&mut self) -> Result<bool, Error<E>> {
        Ok(self.read_phy(reg::PHSTAT2)? & reg::PHSTAT2_LSTAT != 0)
    }

    /// Number of frames waiting in the receive buffer
    pub fn pending_packets(&mut self) -> Result<u8, Error<E>> {
        self.read_control(reg::EPKTCNT)
    }

    /* I/O */
    /// Transmits `frame` and waits until the MAC is done with it
    ///
    /// `frame` must not include the frame check sequence; the MAC appends it.
    ///
    /// # Panics
    ///
    /// This method panics if `frame` is longer than `MAX_FRAME_LEN` minus the CRC
    pub fn transmit(&mut self, frame: &[u8]) -> Result<(), Error<E>> {
        assert!(frame.len() <= usize::from(MAX_FRAME_LEN - CRC_SIZE));

        if !self.is_link_up()? {
            return Err(Error::LinkDown);
        }

        self.write_control16(reg::ETXSTL, reg::ETXSTH, TXSTART)?;
        self.write_control16(reg::EWRPTL, reg::EWRPTH, TXSTART)?;

        // per packet control byte (0: use the MACON3 settings) followed by the frame
        self.with_ncs_low(|spi| {
            spi.write(&[WBM, 0])?;
            spi.write(frame)
        })?;

        // ETXND points to the last byte of the frame
        let end = TXSTART + frame.len() as u16;
        self.write_control16(reg::ETXNDL, reg::ETXNDH, end)?;

        self.bit_field_clear(reg::EIR, reg::EIR_TXIF)?;
        self.bit_field_set(reg::EIE, reg::EIE_TXIE | reg::EIE_INTIE)?;

        // errata #12: reset the transmit logic before every transmission
        self.bit_field_set(reg::ECON1, reg::ECON1_TXRST)?;
        self.bit_field_clear(reg::ECON1, reg::ECON1_TXRST)?;
        self.bit_field_clear(reg::EIR, reg::EIR_TXERIF | reg::EIR_TXIF)?;

        self.bit_field_set(reg::ECON1, reg::ECON1_TXRTS)?;
        while self.read_control(reg::EIR)? & (reg::EIR_TXIF | reg::EIR_TXERIF) == 0 {}
        self.bit_field_clear(reg::ECON1, reg::ECON1_TXRTS)?;

        // the status vector is written right after the frame
        let mut tsv = [0; TSV_SIZE];
        self.write_control16(reg::ERDPTL, reg::ERDPTH, end + 1)?;
        self.read_buffer(&mut tsv)?;

        if self.read_control(reg::ESTAT)? & reg::ESTAT_TXABRT != 0 {
            let late_collision = tsv[3] & reg::TSV_LATE_COLLISION != 0;

            if late_collision {
                // re-queue the frame
                self.bit_field_clear(reg::ECON1, reg::ECON1_TXRTS)?;
                self.bit_field_set(reg::ECON1, reg::ECON1_TXRTS)?;
                self.bit_field_clear(reg::ESTAT, reg::ESTAT_TXABRT | reg::ESTAT_LATECOL)?;
            }

            self.bit_field_clear(reg::EIR, reg::EIR_TXERIF | reg::EIR_TXIF)?;
            self.bit_field_clear(reg::ESTAT, reg::ESTAT_TXABRT)?;

            warn!("transmission aborted (late collision: {})", late_collision);

            return Err(Error::TxAborted { late_collision });
        }

        Ok(())
    }

    /// Copies the next received frame into `buffer`
    ///
    /// Returns the number of bytes copied, which excludes the frame check sequence. Frames that
    /// don't fit are truncated to `buffer.len()`. Returns 0 if there's no pending frame or if the
    /// next frame was received with errors; the latter is dropped.
    pub fn receive(&mut self, buffer: &mut [u8]) -> Result<u16, Error<E>> {
        if !self.is_link_up()? {
            return Err(Error::LinkDown);
        }

        if self.pending_packets()? == 0 {
            return Ok(0);
        }

        self.write_control16(reg::ERDPTL, reg::ERDPTH, self.next_packet)?;

        let mut header = [0; RSV_SIZE];
        self.read_buffer(&mut header)?;

        let next_packet = LE::read_u16(&header[0..2]);
        let byte_count = LE::read_u16(&header[2..4]).saturating_sub(CRC_SIZE);
        let len = cmp::min(usize::from(byte_count), buffer.len());
        let rx_ok = header[4] & reg::RSV_RXOK != 0;

        if rx_ok {
            self.read_buffer(&mut buffer[..len])?;
        } else {
            warn!("dropping frame received with errors");
        }

        // free the space used by this frame
        self.next_packet = next_packet;
        self.write_control16(reg::ERXRDPTL, reg::ERXRDPTH, rx_read_pointer(next_packet))?;
        self.bit_field_set(reg::ECON2, reg::ECON2_PKTDEC)?;

        if rx_ok {
            debug!("received {} bytes", len);
            Ok(len as u16)
        } else {
            Ok(0)
        }
    }

    /* Private */
    fn soft_reset(&mut self) -> Result<(), Error<E>> {
        self.with_ncs_low(|spi| spi.write(&[SRC]))
    }

    fn read_control(&mut self, reg: Register) -> Result<u8, Error<E>> {
        self.select_bank(reg)?;

        self.with_ncs_low(|spi| {
            spi.write(&[RCR | reg.addr()])?;

            if reg.is_mac() {
                let mut buf = [0; 2];
                spi.transfer(&mut buf)?;
                Ok(buf[1])
            } else {
                let mut buf = [0; 1];
                spi.transfer(&mut buf)?;
                Ok(buf[0])
            }
        })
    }

    fn write_control(&mut self, reg: Register, value: u8) -> Result<(), Error<E>> {
        self.select_bank(reg)?;

        self.with_ncs_low(|spi| spi.write(&[WCR | reg.addr(), value]))
    }

    // writes the low byte first; some pointer registers latch on the high byte write
    fn write_control16(
        &mut self,
        low: Register,
        high: Register,
        value: u16,
    ) -> Result<(), Error<E>> {
        self.write_control(low, value as u8)?;
        self.write_control(high, (value >> 8) as u8)
    }

    // NOTE only valid for ETH registers
    fn bit_field_set(&mut self, reg: Register, mask: u8) -> Result<(), Error<E>> {
        debug_assert!(!reg.is_mac());

        self.select_bank(reg)?;
        self.with_ncs_low(|spi| spi.write(&[BFS | reg.addr(), mask]))
    }

    // NOTE only valid for ETH registers
    fn bit_field_clear(&mut self, reg: Register, mask: u8) -> Result<(), Error<E>> {
        debug_assert!(!reg.is_mac());

        self.select_bank(reg)?;
        self.with_ncs_low(|spi| spi.write(&[BFC | reg.addr(), mask]))
    }

    fn read_buffer(&mut self, buf: &mut [u8]) -> Result<(), Error<E>> {
        self.with_ncs_low(|spi| {
            spi.write(&[RBM])?;
            spi.transfer(buf)?;
            Ok(())
        })
    }

    fn read_phy(&mut self, phy: Phy) -> Result<u16, Error<E>> {
        self.write_control(reg::MIREGADR, phy.addr())?;
        self.write_control(reg::MICMD, reg::MICMD_MIIRD)?;
        self.wait_mii()?;
        self.write_control(reg::MICMD, 0)?;

        let low = self.read_control(reg::MIRDL)?;
        let high = self.read_control(reg::MIRDH)?;

        Ok(u16::from(high) << 8 | u16::from(low))
    }

    fn write_phy(&mut self, phy: Phy, value: u16) -> Result<(), Error<E>> {
        self.write_control(reg::MIREGADR, phy.addr())?;
        // writing MIWRH starts the MII transaction
        self.write_control16(reg::MIWRL, reg::MIWRH, value)?;
        self.wait_mii()
    }

    fn wait_mii(&mut self) -> Result<(), Error<E>> {
        while self.read_control(reg::MISTAT)? & reg::MISTAT_BUSY != 0 {}

        Ok(())
    }

    fn select_bank(&mut self, reg: Register) -> Result<(), Error<E>> {
        match reg.bank() {
            Some(bank) if bank != self.bank => {
                self.with_ncs_low(|spi| spi.write(&[BFC | reg::ECON1.addr(), reg::ECON1_BSEL]))?;

                if bank != 0 {
                    self.with_ncs_low(|spi| spi.write(&[BFS | reg::ECON1.addr(), bank]))?;
                }

                self.bank = bank;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn with_ncs_low<F, R>(&mut self, f: F) -> Result<R, Error<E>>
    where
        F: FnOnce(&mut SPI) -> Result<R, E>,
    {
        self.ncs.set_low().map_err(|_| Error::Ncs)?;
        let ret = f(&mut self.spi);
        self.ncs.set_high().map_err(|_| Error::Ncs)?;
        Ok(ret?)
    }
}

/// Computes the ERXRDPT value that frees up the frame that ends right before `next_packet`
///
/// The hardware read pointer must always be odd (errata #14). `next_packet` is always even so
/// `next_packet - 1` is odd, except when it falls before the start of the receive buffer: then the
/// pointer wraps around to `RXEND`.
pub fn rx_read_pointer(next_packet: u16) -> u16 {
    let ptr = next_packet.wrapping_sub(1);

    if !(RXSTART..=RXEND).contains(&ptr) {
        RXEND
    } else {
        ptr | 1
    }
}
