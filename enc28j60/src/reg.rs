//! Register map

/// A control register
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Register {
    addr: u8,
    bank: Option<u8>,
    mac: bool,
}

impl Register {
    /// ETH register that lives in `bank`
    const fn eth(bank: u8, addr: u8) -> Self {
        Register {
            addr,
            bank: Some(bank),
            mac: false,
        }
    }

    /// MAC or MII register; reads return a dummy byte first
    const fn mac(bank: u8, addr: u8) -> Self {
        Register {
            addr,
            bank: Some(bank),
            mac: true,
        }
    }

    /// Register mapped into every bank
    const fn common(addr: u8) -> Self {
        Register {
            addr,
            bank: None,
            mac: false,
        }
    }

    /// 5-bit address of the register within its bank
    pub fn addr(&self) -> u8 {
        self.addr
    }

    /// Bank the register lives in; `None` for the common registers
    pub fn bank(&self) -> Option<u8> {
        self.bank
    }

    /// Whether reading the register shifts out a dummy byte first
    pub fn is_mac(&self) -> bool {
        self.mac
    }
}

/* Bank 0 */
pub const ERDPTL: Register = Register::eth(0, 0x00);
pub const ERDPTH: Register = Register::eth(0, 0x01);
pub const EWRPTL: Register = Register::eth(0, 0x02);
pub const EWRPTH: Register = Register::eth(0, 0x03);
pub const ETXSTL: Register = Register::eth(0, 0x04);
pub const ETXSTH: Register = Register::eth(0, 0x05);
pub const ETXNDL: Register = Register::eth(0, 0x06);
pub const ETXNDH: Register = Register::eth(0, 0x07);
pub const ERXSTL: Register = Register::eth(0, 0x08);
pub const ERXSTH: Register = Register::eth(0, 0x09);
pub const ERXNDL: Register = Register::eth(0, 0x0A);
pub const ERXNDH: Register = Register::eth(0, 0x0B);
pub const ERXRDPTL: Register = Register::eth(0, 0x0C);
pub const ERXRDPTH: Register = Register::eth(0, 0x0D);

/* Bank 1 */
pub const EPMM0: Register = Register::eth(1, 0x08);
pub const EPMM1: Register = Register::eth(1, 0x09);
pub const EPMCSL: Register = Register::eth(1, 0x10);
pub const EPMCSH: Register = Register::eth(1, 0x11);
pub const ERXFCON: Register = Register::eth(1, 0x18);
pub const EPKTCNT: Register = Register::eth(1, 0x19);

/* Bank 2 */
pub const MACON1: Register = Register::mac(2, 0x00);
pub const MACON3: Register = Register::mac(2, 0x02);
pub const MABBIPG: Register = Register::mac(2, 0x04);
pub const MAIPGL: Register = Register::mac(2, 0x06);
pub const MAIPGH: Register = Register::mac(2, 0x07);
pub const MAMXFLL: Register = Register::mac(2, 0x0A);
pub const MAMXFLH: Register = Register::mac(2, 0x0B);
pub const MICMD: Register = Register::mac(2, 0x12);
pub const MIREGADR: Register = Register::mac(2, 0x14);
pub const MIWRL: Register = Register::mac(2, 0x16);
pub const MIWRH: Register = Register::mac(2, 0x17);
pub const MIRDL: Register = Register::mac(2, 0x18);
pub const MIRDH: Register = Register::mac(2, 0x19);

/* Bank 3 */
pub const MAADR5: Register = Register::mac(3, 0x00);
pub const MAADR6: Register = Register::mac(3, 0x01);
pub const MAADR3: Register = Register::mac(3, 0x02);
pub const MAADR4: Register = Register::mac(3, 0x03);
pub const MAADR1: Register = Register::mac(3, 0x04);
pub const MAADR2: Register = Register::mac(3, 0x05);
pub const MISTAT: Register = Register::mac(3, 0x0A);
pub const EREVID: Register = Register::eth(3, 0x12);

/* Common */
pub const EIE: Register = Register::common(0x1B);
pub const EIR: Register = Register::common(0x1C);
pub const ESTAT: Register = Register::common(0x1D);
pub const ECON2: Register = Register::common(0x1E);
pub const ECON1: Register = Register::common(0x1F);

pub const EIE_INTIE: u8 = 1 << 7;
pub const EIE_TXIE: u8 = 1 << 3;

pub const EIR_TXIF: u8 = 1 << 3;
pub const EIR_TXERIF: u8 = 1 << 1;

pub const ESTAT_LATECOL: u8 = 1 << 4;
pub const ESTAT_TXABRT: u8 = 1 << 1;
pub const ESTAT_CLKRDY: u8 = 1 << 0;

pub const ECON2_PKTDEC: u8 = 1 << 6;

pub const ECON1_TXRST: u8 = 1 << 7;
pub const ECON1_TXRTS: u8 = 1 << 3;
pub const ECON1_RXEN: u8 = 1 << 2;
pub const ECON1_BSEL: u8 = 0b11;

pub const ERXFCON_UCEN: u8 = 1 << 7;
pub const ERXFCON_CRCEN: u8 = 1 << 5;
pub const ERXFCON_PMEN: u8 = 1 << 4;

pub const MACON1_MARXEN: u8 = 1 << 0;

pub const MACON3_PADCFG0: u8 = 1 << 5;
pub const MACON3_TXCRCEN: u8 = 1 << 4;
pub const MACON3_FRMLNEN: u8 = 1 << 1;

pub const MICMD_MIIRD: u8 = 1 << 0;

pub const MISTAT_BUSY: u8 = 1 << 0;

/// A PHY register, reached through the MII interface
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Phy(u8);

impl Phy {
    /// Address written to MIREGADR
    pub fn addr(&self) -> u8 {
        self.0
    }
}

pub const PHCON1: Phy = Phy(0x00);
pub const PHCON2: Phy = Phy(0x10);
pub const PHSTAT2: Phy = Phy(0x11);

pub const PHCON2_HDLDIS: u16 = 1 << 8;

pub const PHSTAT2_LSTAT: u16 = 1 << 10;

/* Receive status vector, byte 4 */
pub const RSV_RXOK: u8 = 1 << 7;

/* Transmit status vector, byte 3 */
pub const TSV_LATE_COLLISION: u8 = 1 << 5;
