//! FRAM Click Driver
//!
//! This module provides a driver for the FRAM Click, built around a Fujitsu
//! MB85RS256 256-Kbit SPI ferroelectric RAM with a 2-byte address.
//!
//! The SPI FRAM command set shared with FRAM 2 lives in [`SpiFram`]. Every
//! write, including status register writes, is preceded by its own WREN
//! transaction because the device clears the write enable latch at the end
//! of each write.
//!
//! [`Fram::new`] leaves the pins alone; WP and HOLD are active low and stay
//! wherever the board left them until [`Fram::default_cfg`] drives both
//! high.
//!
//! Datasheet: <https://www.fujitsu.com/uk/Images/MB85RS256B-DS501-00021-2v0-E.pdf>

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::catalog::{ClickDescriptor, Interface};
use crate::config::default_config;
use crate::error::{Error, Result};
use crate::hw_trait::{OutputPin, SpiDevice, SpiOperation};
use crate::tracing::prelude::*;

/// SPI FRAM opcodes
pub mod opcode {
    pub const WREN: u8 = 0x06;
    pub const WRDI: u8 = 0x04;
    pub const RDSR: u8 = 0x05;
    pub const WRSR: u8 = 0x01;
    pub const READ: u8 = 0x03;
    pub const WRITE: u8 = 0x02;
    pub const FSTRD: u8 = 0x0B;
    pub const SLEEP: u8 = 0xB9;
    pub const RDID: u8 = 0x9F;
}

bitflags! {
    /// Status register bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Status: u8 {
        /// Status register write protect, honored while WP is low
        const WPEN = 0x80;
        const BP1 = 0x08;
        const BP0 = 0x04;
        /// Write enable latch
        const WEL = 0x02;
    }
}

/// Protected upper portion of the array, selected by BP1:BP0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockProtect {
    None,
    UpperQuarter,
    UpperHalf,
    All,
}

impl BlockProtect {
    pub(crate) fn bits(self) -> Status {
        match self {
            BlockProtect::None => Status::empty(),
            BlockProtect::UpperQuarter => Status::BP0,
            BlockProtect::UpperHalf => Status::BP1,
            BlockProtect::All => Status::BP0 | Status::BP1,
        }
    }
}

/// Command layer common to the SPI FRAM boards.
pub struct SpiFram<SPI> {
    spi: SPI,
    capacity: u32,
    addr_len: usize,
}

impl<SPI: SpiDevice> SpiFram<SPI> {
    pub fn new(spi: SPI, capacity: u32, addr_len: usize) -> Self {
        Self {
            spi,
            capacity,
            addr_len,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn command(&mut self, op: u8) -> Result<()> {
        self.spi.write(&[op]).map_err(Error::spi)
    }

    pub fn write_enable(&mut self) -> Result<()> {
        self.command(opcode::WREN)
    }

    pub fn write_disable(&mut self) -> Result<()> {
        self.command(opcode::WRDI)
    }

    pub fn read_status(&mut self) -> Result<Status> {
        let mut status = [0u8; 1];
        self.spi
            .transaction(&mut [
                SpiOperation::Write(&[opcode::RDSR]),
                SpiOperation::Read(&mut status),
            ])
            .map_err(Error::spi)?;
        Ok(Status::from_bits_retain(status[0]))
    }

    pub fn write_status(&mut self, status: Status) -> Result<()> {
        self.write_enable()?;
        self.spi
            .write(&[opcode::WRSR, status.bits()])
            .map_err(Error::spi)
    }

    pub fn write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        self.check_range(addr, data.len())?;
        trace!("FRAM write {} bytes at 0x{:06X}", data.len(), addr);
        let (header, len) = self.header(opcode::WRITE, addr);

        self.write_enable()?;
        self.spi
            .transaction(&mut [
                SpiOperation::Write(&header[..len]),
                SpiOperation::Write(data),
            ])
            .map_err(Error::spi)
    }

    pub fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        self.check_range(addr, buf.len())?;
        trace!("FRAM read {} bytes at 0x{:06X}", buf.len(), addr);
        let (header, len) = self.header(opcode::READ, addr);
        self.spi
            .transaction(&mut [
                SpiOperation::Write(&header[..len]),
                SpiOperation::Read(buf),
            ])
            .map_err(Error::spi)
    }

    /// Read with the fast-read opcode, which inserts one dummy byte after
    /// the address.
    pub fn fast_read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        self.check_range(addr, buf.len())?;
        let (mut header, len) = self.header(opcode::FSTRD, addr);
        header[len] = 0x00;
        self.spi
            .transaction(&mut [
                SpiOperation::Write(&header[..len + 1]),
                SpiOperation::Read(buf),
            ])
            .map_err(Error::spi)
    }

    /// Send a single opcode and read a fixed-length reply.
    pub fn query(&mut self, op: u8, buf: &mut [u8]) -> Result<()> {
        self.spi
            .transaction(&mut [SpiOperation::Write(&[op]), SpiOperation::Read(buf)])
            .map_err(Error::spi)
    }

    // Opcode followed by the big-endian address; one spare byte for the
    // fast-read dummy.
    fn header(&self, op: u8, addr: u32) -> ([u8; 5], usize) {
        let mut header = [0u8; 5];
        header[0] = op;
        let addr_bytes = addr.to_be_bytes();
        header[1..=self.addr_len].copy_from_slice(&addr_bytes[4 - self.addr_len..]);
        (header, 1 + self.addr_len)
    }

    fn check_range(&self, addr: u32, len: usize) -> Result<()> {
        if addr as u64 + len as u64 > self.capacity as u64 {
            return Err(Error::AddressOutOfRange {
                addr,
                len,
                capacity: self.capacity,
            });
        }
        Ok(())
    }
}

/// FRAM configuration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Array size in bytes
    pub capacity: u32,
    /// Block protection written by `default_cfg`
    pub block_protect: BlockProtect,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: 32 * 1024,
            block_protect: BlockProtect::None,
        }
    }
}

/// FRAM driver
pub struct Fram<SPI, WP, HOLD> {
    core: SpiFram<SPI>,
    wp: WP,
    hold: HOLD,
    config: Config,
}

impl<SPI, WP, HOLD> Fram<SPI, WP, HOLD>
where
    SPI: SpiDevice,
    WP: OutputPin,
    HOLD: OutputPin,
{
    pub fn new(spi: SPI, wp: WP, hold: HOLD, config: Config) -> Self {
        Self {
            core: SpiFram::new(spi, config.capacity, 2),
            wp,
            hold,
            config,
        }
    }

    /// Release WP and HOLD and program block protection.
    pub fn default_cfg(&mut self) -> Result<()> {
        debug!("Initializing FRAM ({} bytes)", self.config.capacity);
        self.wp.set_high().map_err(Error::pin)?;
        self.hold.set_high().map_err(Error::pin)?;
        self.core.write_status(self.config.block_protect.bits())
    }

    pub fn write_enable(&mut self) -> Result<()> {
        self.core.write_enable()
    }

    pub fn write_disable(&mut self) -> Result<()> {
        self.core.write_disable()
    }

    pub fn read_status(&mut self) -> Result<Status> {
        self.core.read_status()
    }

    pub fn write_status(&mut self, status: Status) -> Result<()> {
        self.core.write_status(status)
    }

    pub fn write(&mut self, addr: u16, data: &[u8]) -> Result<()> {
        self.core.write(addr as u32, data)
    }

    pub fn read(&mut self, addr: u16, buf: &mut [u8]) -> Result<()> {
        self.core.read(addr as u32, buf)
    }

    pub fn write_byte(&mut self, addr: u16, byte: u8) -> Result<()> {
        self.write(addr, &[byte])
    }

    pub fn read_byte(&mut self, addr: u16) -> Result<u8> {
        let mut byte = [0u8; 1];
        self.read(addr, &mut byte)?;
        Ok(byte[0])
    }

    /// Hold pauses a transfer in progress without deselecting the device.
    pub fn set_hold(&mut self, hold: bool) -> Result<()> {
        if hold {
            self.hold.set_low().map_err(Error::pin)
        } else {
            self.hold.set_high().map_err(Error::pin)
        }
    }

    /// Protect the status register from writes.
    pub fn set_write_protect(&mut self, protect: bool) -> Result<()> {
        if protect {
            self.wp.set_low().map_err(Error::pin)
        } else {
            self.wp.set_high().map_err(Error::pin)
        }
    }
}

inventory::submit! {
    ClickDescriptor {
        name: "FRAM",
        module: "click::fram",
        chip: "MB85RS256",
        interfaces: Interface::SPI.union(Interface::GPIO),
        default_config: Some(default_config::<Config>),
    }
}
