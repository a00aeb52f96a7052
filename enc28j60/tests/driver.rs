use std::{cell::RefCell, convert::Infallible, rc::Rc};

use embedded_hal::{
    blocking::{
        delay::DelayMs,
        spi::{Transfer, Write},
    },
    digital::v2::OutputPin,
};
use enc28j60::{Enc28j60, Error, RXEND, TXSTART};
use pretty_assertions::assert_eq;

const MAC: [u8; 6] = [0x20, 0x19, 0x01, 0x30, 0x23, 0x59];

/* Register addresses, as seen by the simulated chip */
const ERDPTL: u8 = 0x00;
const EWRPTL: u8 = 0x02;
const ETXSTL: u8 = 0x04;
const ETXNDL: u8 = 0x06;
const ERXSTL: u8 = 0x08;
const ERXNDL: u8 = 0x0A;
const ERXRDPTL: u8 = 0x0C;
const ERXFCON: u8 = 0x18;
const EPKTCNT: u8 = 0x19;
const MACON1: u8 = 0x00;
const MACON3: u8 = 0x02;
const MAMXFLL: u8 = 0x0A;
const MICMD: u8 = 0x12;
const MIREGADR: u8 = 0x14;
const MIWRL: u8 = 0x16;
const MIWRH: u8 = 0x17;
const MIRDL: u8 = 0x18;
const MISTAT: u8 = 0x0A;
const EREVID: u8 = 0x12;
const EIR: u8 = 0x1C;
const ESTAT: u8 = 0x1D;
const ECON2: u8 = 0x1E;
const ECON1: u8 = 0x1F;

const PHCON2: usize = 0x10;
const PHSTAT2: usize = 0x11;

const TXRTS: u8 = 1 << 3;
const RXEN: u8 = 1 << 2;
const TXIF: u8 = 1 << 3;
const TXERIF: u8 = 1 << 1;
const TXABRT: u8 = 1 << 1;
const LATECOL: u8 = 1 << 4;
const PKTDEC: u8 = 1 << 6;

/// Simulated ENC28J60: banked registers, buffer memory, receive ring and PHY
struct Chip {
    banks: [[u8; 0x1B]; 4],
    // EIE, EIR, ESTAT, ECON2, ECON1
    common: [u8; 5],
    memory: Vec<u8>,
    phy: [u16; 0x20],

    link_up: bool,
    revision: u8,
    // number of upcoming transmissions that abort with a late collision
    aborts: usize,
    rx_write: u16,
    transmitted: Vec<Vec<u8>>,

    // current SPI transaction
    opcode: Option<u8>,
    exchanged: usize,
}

impl Chip {
    fn new() -> Rc<RefCell<Chip>> {
        Rc::new(RefCell::new(Chip {
            banks: [[0; 0x1B]; 4],
            common: [0; 5],
            memory: vec![0; 0x2000],
            phy: [0; 0x20],
            link_up: true,
            revision: 6,
            aborts: 0,
            rx_write: 0,
            transmitted: vec![],
            opcode: None,
            exchanged: 0,
        }))
    }

    fn soft_reset(&mut self) {
        self.banks = [[0; 0x1B]; 4];
        self.common = [0; 5];
        // ESTAT.CLKRDY
        self.common[2] = 1;
        // ECON2.AUTOINC
        self.common[3] = 1 << 7;
        self.banks[3][usize::from(EREVID)] = self.revision;
        self.rx_write = 0;
    }

    /* Register file */
    fn bank(&self) -> usize {
        usize::from(self.common[4] & 0b11)
    }

    fn read(&self, addr: u8) -> u8 {
        if addr >= 0x1B {
            self.common[usize::from(addr - 0x1B)]
        } else {
            self.banks[self.bank()][usize::from(addr)]
        }
    }

    fn reg(&self, bank: usize, addr: u8) -> u8 {
        if addr >= 0x1B {
            self.common[usize::from(addr - 0x1B)]
        } else {
            self.banks[bank][usize::from(addr)]
        }
    }

    fn reg16(&self, bank: usize, low: u8) -> u16 {
        u16::from(self.reg(bank, low)) | u16::from(self.reg(bank, low + 1)) << 8
    }

    fn set_reg16(&mut self, bank: usize, low: u8, value: u16) {
        self.banks[bank][usize::from(low)] = value as u8;
        self.banks[bank][usize::from(low + 1)] = (value >> 8) as u8;
    }

    fn is_mac(&self, addr: u8) -> bool {
        match self.bank() {
            2 => addr < 0x1B,
            3 => addr <= 0x05 || addr == MISTAT,
            _ => false,
        }
    }

    fn write(&mut self, addr: u8, value: u8) {
        if addr >= 0x1B {
            let old = self.common[usize::from(addr - 0x1B)];
            self.common[usize::from(addr - 0x1B)] = value;

            match addr {
                ECON1 if old & TXRTS == 0 && value & TXRTS != 0 => self.send(),
                ECON2 if value & PKTDEC != 0 => {
                    self.banks[1][usize::from(EPKTCNT)] -= 1;
                    // PKTDEC always reads as zero
                    self.common[3] &= !PKTDEC;
                }
                _ => {}
            }

            return;
        }

        let bank = self.bank();
        self.banks[bank][usize::from(addr)] = value;

        if bank == 2 {
            let phy = usize::from(self.banks[2][usize::from(MIREGADR)]);

            match addr {
                MICMD if value & 1 != 0 => {
                    let value = if phy == PHSTAT2 {
                        if self.link_up {
                            1 << 10
                        } else {
                            0
                        }
                    } else {
                        self.phy[phy]
                    };

                    self.set_reg16(2, MIRDL, value);
                }
                MIWRH => {
                    self.phy[phy] =
                        u16::from(self.banks[2][usize::from(MIWRL)]) | u16::from(value) << 8;
                }
                _ => {}
            }
        }
    }

    /* SPI */
    fn exchange(&mut self, byte: u8) -> u8 {
        let opcode = match self.opcode {
            None => {
                self.opcode = Some(byte);
                if byte == 0xFF {
                    self.soft_reset();
                }
                return 0;
            }
            Some(opcode) => opcode,
        };

        self.exchanged += 1;
        let addr = opcode & 0x1F;

        match opcode {
            // RBM
            0x3A => {
                let ptr = self.reg16(0, ERDPTL);
                let byte = self.memory[usize::from(ptr)];
                let next = if ptr == self.reg16(0, ERXNDL) {
                    self.reg16(0, ERXSTL)
                } else {
                    (ptr + 1) & 0x1FFF
                };
                self.set_reg16(0, ERDPTL, next);
                byte
            }
            // WBM
            0x7A => {
                let ptr = self.reg16(0, EWRPTL);
                self.memory[usize::from(ptr)] = byte;
                self.set_reg16(0, EWRPTL, (ptr + 1) & 0x1FFF);
                0
            }
            _ => match opcode >> 5 {
                // RCR
                0b000 => {
                    if self.is_mac(addr) && self.exchanged == 1 {
                        // dummy byte
                        0
                    } else {
                        self.read(addr)
                    }
                }
                // WCR
                0b010 => {
                    self.write(addr, byte);
                    0
                }
                // BFS
                0b100 => {
                    let value = self.read(addr) | byte;
                    self.write(addr, value);
                    0
                }
                // BFC
                0b101 => {
                    let value = self.read(addr) & !byte;
                    self.write(addr, value);
                    0
                }
                _ => panic!("unknown opcode: {:#04x}", opcode),
            },
        }
    }

    fn deselect(&mut self) {
        self.opcode = None;
        self.exchanged = 0;
    }

    /* MAC */
    fn send(&mut self) {
        let start = usize::from(self.reg16(0, ETXSTL));
        let end = usize::from(self.reg16(0, ETXNDL));

        // skip the per packet control byte
        let frame = self.memory[start + 1..=end].to_vec();
        let late_collision = self.aborts > 0;
        if late_collision {
            self.aborts -= 1;
        }

        let mut tsv = [0; 7];
        tsv[0] = frame.len() as u8;
        tsv[1] = (frame.len() >> 8) as u8;
        if late_collision {
            tsv[3] |= 1 << 5;
        }
        self.memory[end + 1..end + 8].copy_from_slice(&tsv);

        self.transmitted.push(frame);

        self.common[1] |= TXIF;
        if late_collision {
            self.common[1] |= TXERIF;
            self.common[2] |= TXABRT | LATECOL;
        }

        // the hardware clears TXRTS once it's done
        self.common[4] &= !TXRTS;
    }

    /// Queues a frame into the receive ring
    fn push(&mut self, frame: &[u8], rx_ok: bool) {
        let rx_start = self.reg16(0, ERXSTL);
        let rx_end = self.reg16(0, ERXNDL);
        let size = rx_end - rx_start + 1;

        let byte_count = frame.len() as u16 + 4;
        let mut next = self.rx_write + 6 + byte_count;
        if next % 2 == 1 {
            next += 1;
        }
        if next > rx_end {
            next -= size;
        }

        let mut bytes = vec![];
        bytes.extend_from_slice(&next.to_le_bytes());
        bytes.extend_from_slice(&byte_count.to_le_bytes());
        bytes.push(if rx_ok { 0x80 } else { 0x10 });
        bytes.push(0);
        bytes.extend_from_slice(frame);
        bytes.extend_from_slice(&[0xAA; 4]);

        let mut ptr = self.rx_write;
        for byte in bytes {
            self.memory[usize::from(ptr)] = byte;
            ptr = if ptr == rx_end { rx_start } else { ptr + 1 };
        }

        self.rx_write = next;
        self.banks[1][usize::from(EPKTCNT)] += 1;
    }
}

struct Spi(Rc<RefCell<Chip>>);

impl Transfer<u8> for Spi {
    type Error = Infallible;

    fn transfer<'w>(&mut self, words: &'w mut [u8]) -> Result<&'w [u8], Infallible> {
        let mut chip = self.0.borrow_mut();
        for word in words.iter_mut() {
            *word = chip.exchange(*word);
        }
        Ok(&*words)
    }
}

impl Write<u8> for Spi {
    type Error = Infallible;

    fn write(&mut self, words: &[u8]) -> Result<(), Infallible> {
        let mut chip = self.0.borrow_mut();
        for word in words {
            chip.exchange(*word);
        }
        Ok(())
    }
}

struct Ncs(Rc<RefCell<Chip>>);

impl OutputPin for Ncs {
    type Error = Infallible;

    fn set_low(&mut self) -> Result<(), Infallible> {
        self.0.borrow_mut().deselect();
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.0.borrow_mut().deselect();
        Ok(())
    }
}

struct Delay;

impl DelayMs<u8> for Delay {
    fn delay_ms(&mut self, _: u8) {}
}

fn init(chip: &Rc<RefCell<Chip>>) -> Enc28j60<Spi, Ncs> {
    match Enc28j60::new(Spi(chip.clone()), Ncs(chip.clone()), &mut Delay, MAC) {
        Ok(enc28j60) => enc28j60,
        Err(e) => panic!("initialization failed: {:?}", e),
    }
}

fn frame(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(7) ^ seed).collect()
}

#[test]
fn initialization() {
    let chip = Chip::new();
    let mut enc28j60 = init(&chip);

    assert_eq!(enc28j60.revision(), Ok(6));

    let chip = chip.borrow();
    assert_eq!(chip.reg16(0, ERXSTL), 0x0000);
    assert_eq!(chip.reg16(0, ERXNDL), RXEND);
    assert_eq!(chip.reg16(0, ERXRDPTL), 0x0000);
    assert_eq!(chip.reg16(0, ETXSTL), TXSTART);
    assert_eq!(chip.reg(1, ERXFCON), 0b1011_0000);
    assert_eq!(chip.reg(2, MACON1), 1);
    assert_eq!(chip.reg(2, MACON3), 0b0011_0010);
    assert_eq!(chip.reg16(2, MAMXFLL), 1518);
    assert_eq!(
        [
            chip.reg(3, 0x04),
            chip.reg(3, 0x05),
            chip.reg(3, 0x02),
            chip.reg(3, 0x03),
            chip.reg(3, 0x00),
            chip.reg(3, 0x01),
        ],
        MAC
    );
    assert_eq!(chip.phy[0x00], 0);
    assert_eq!(chip.phy[PHCON2], 1 << 8);
    assert_eq!(chip.reg(0, ECON1) & RXEN, RXEN);
}

#[test]
fn no_chip_on_the_bus() {
    let chip = Chip::new();
    chip.borrow_mut().revision = 0;

    let res = Enc28j60::new(Spi(chip.clone()), Ncs(chip.clone()), &mut Delay, MAC);

    assert_eq!(res.err(), Some(Error::ErevidIsZero));
}

#[test]
fn link_status() {
    let chip = Chip::new();
    let mut enc28j60 = init(&chip);

    assert_eq!(enc28j60.is_link_up(), Ok(true));

    chip.borrow_mut().link_up = false;
    assert_eq!(enc28j60.is_link_up(), Ok(false));
    assert_eq!(enc28j60.transmit(&frame(60, 0)), Err(Error::LinkDown));
    assert_eq!(enc28j60.receive(&mut [0; 64]), Err(Error::LinkDown));
}

#[test]
fn transmit() {
    let chip = Chip::new();
    let mut enc28j60 = init(&chip);

    let first = frame(60, 1);
    let second = frame(42, 2);
    assert_eq!(enc28j60.transmit(&first), Ok(()));
    assert_eq!(enc28j60.transmit(&second), Ok(()));

    let chip = chip.borrow();
    assert_eq!(chip.transmitted, vec![first, second]);
    assert_eq!(chip.reg16(0, ETXNDL), TXSTART + 42);
    // per packet control byte
    assert_eq!(chip.memory[usize::from(TXSTART)], 0);
    assert_eq!(chip.reg(0, ECON1) & TXRTS, 0);
    assert_eq!(chip.reg(0, ESTAT) & TXABRT, 0);
}

#[test]
fn late_collision_is_retried_once() {
    let chip = Chip::new();
    let mut enc28j60 = init(&chip);
    chip.borrow_mut().aborts = 1;

    let bytes = frame(60, 3);
    assert_eq!(
        enc28j60.transmit(&bytes),
        Err(Error::TxAborted {
            late_collision: true
        })
    );

    {
        let chip = chip.borrow();
        assert_eq!(chip.transmitted, vec![bytes.clone(), bytes]);
        assert_eq!(chip.reg(0, ESTAT) & (TXABRT | LATECOL), 0);
        assert_eq!(chip.reg(0, EIR) & (TXIF | TXERIF), 0);
    }

    // the driver is still usable
    assert_eq!(enc28j60.transmit(&frame(60, 4)), Ok(()));
    assert_eq!(chip.borrow().transmitted.len(), 3);
}

#[test]
fn receive() {
    let chip = Chip::new();
    let mut enc28j60 = init(&chip);

    let mut buffer = [0; 600];
    assert_eq!(enc28j60.receive(&mut buffer), Ok(0));

    let bytes = frame(64, 5);
    chip.borrow_mut().push(&bytes, true);
    assert_eq!(enc28j60.pending_packets(), Ok(1));

    assert_eq!(enc28j60.receive(&mut buffer), Ok(64));
    assert_eq!(&buffer[..64], &bytes[..]);
    assert_eq!(enc28j60.pending_packets(), Ok(0));

    // header (6) + frame (64) + CRC (4) = 74
    assert_eq!(chip.borrow().reg16(0, ERXRDPTL), 73);
}

#[test]
fn receive_truncates_to_the_buffer() {
    let chip = Chip::new();
    let mut enc28j60 = init(&chip);

    let long = frame(100, 6);
    let short = frame(40, 7);
    chip.borrow_mut().push(&long, true);
    chip.borrow_mut().push(&short, true);

    let mut buffer = [0; 50];
    assert_eq!(enc28j60.receive(&mut buffer), Ok(50));
    assert_eq!(&buffer[..], &long[..50]);

    // the next frame is located through the next packet pointer, not the copied length
    assert_eq!(enc28j60.receive(&mut buffer), Ok(40));
    assert_eq!(&buffer[..40], &short[..]);
}

#[test]
fn frames_with_errors_are_dropped() {
    let chip = Chip::new();
    let mut enc28j60 = init(&chip);

    chip.borrow_mut().push(&frame(64, 8), false);

    let mut buffer = [0; 128];
    assert_eq!(enc28j60.receive(&mut buffer), Ok(0));
    assert_eq!(&buffer[..], &[0; 128][..]);
    assert_eq!(enc28j60.pending_packets(), Ok(0));
    assert_eq!(chip.borrow().reg16(0, ERXRDPTL), 73);
}

#[test]
fn read_pointer_wraps_to_the_end_of_the_ring() {
    let chip = Chip::new();
    let mut enc28j60 = init(&chip);

    // each frame takes exactly 1 KiB of the ring: 6 + 1014 + 4
    let mut buffer = [0; 1024];
    for (i, ptr) in [0x03ff, 0x07ff, 0x0bff, RXEND].iter().enumerate() {
        let bytes = frame(1014, i as u8);
        chip.borrow_mut().push(&bytes, true);

        assert_eq!(enc28j60.receive(&mut buffer), Ok(1014));
        assert_eq!(&buffer[..1014], &bytes[..]);
        assert_eq!(chip.borrow().reg16(0, ERXRDPTL), *ptr);
    }

    // and the ring keeps working from its start
    let bytes = frame(64, 9);
    chip.borrow_mut().push(&bytes, true);
    assert_eq!(enc28j60.receive(&mut buffer), Ok(64));
    assert_eq!(&buffer[..64], &bytes[..]);
    assert_eq!(chip.borrow().reg16(0, ERXRDPTL), 73);
}

#[test]
fn frames_can_straddle_the_end_of_the_ring() {
    let chip = Chip::new();
    let mut enc28j60 = init(&chip);

    let mut buffer = [0; 1200];
    for i in 0..3 {
        chip.borrow_mut().push(&frame(1014, i), true);
        assert_eq!(enc28j60.receive(&mut buffer), Ok(1014));
    }

    // starts at 0x0c00 and wraps around
    let bytes = frame(1100, 10);
    chip.borrow_mut().push(&bytes, true);
    assert_eq!(enc28j60.receive(&mut buffer), Ok(1100));
    assert_eq!(&buffer[..1100], &bytes[..]);

    let ptr = chip.borrow().reg16(0, ERXRDPTL);
    assert_eq!(ptr, 0x0c00 + 6 + 1104 - 0x1000 - 1);
    assert_eq!(ptr % 2, 1);
}
