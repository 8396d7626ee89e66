//! FRAM 5 Click Driver
//!
//! Fujitsu MB85RC1MT 1-Mbit I2C FRAM. The 17-bit memory address is split
//! between the slave address (bit 16) and a 2-byte word address, so the
//! array appears as two 64 KiB banks.
//!
//! The WP pin is held high except while a write is in progress.

use embedded_hal::i2c::Operation;
use serde::{Deserialize, Serialize};

use crate::catalog::{ClickDescriptor, Interface};
use crate::config::default_config;
use crate::error::{Error, Result};
use crate::hw_trait::{I2c, OutputPin};
use crate::tracing::prelude::*;

/// Slave address with A2 = A1 = 0 and memory bank 0
pub const BASE_I2C_ADDR: u8 = 0x50;

/// Reserved slave address answering the device ID query
pub const DEVICE_ID_ADDR: u8 = 0x7C;

pub const CAPACITY: u32 = 128 * 1024;

const BANK_SIZE: u32 = 0x1_0000;

/// MB85RC1MT manufacturer and product codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceId {
    pub manufacturer: u16,
    pub product: u16,
}

impl DeviceId {
    pub const MB85RC1MT: DeviceId = DeviceId {
        manufacturer: 0x00A,
        product: 0x758,
    };

    fn from_bytes(b: [u8; 3]) -> Self {
        Self {
            manufacturer: ((b[0] as u16) << 4) | (b[1] >> 4) as u16,
            product: (((b[1] & 0x0F) as u16) << 8) | b[2] as u16,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Slave address for bank 0; bit 0 must be clear
    pub i2c_address: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            i2c_address: BASE_I2C_ADDR,
        }
    }
}

/// FRAM 5 driver
pub struct Fram5<I2C, WP> {
    i2c: I2C,
    wp: WP,
    config: Config,
}

impl<I2C, WP> Fram5<I2C, WP>
where
    I2C: I2c,
    WP: OutputPin,
{
    pub fn new(i2c: I2C, wp: WP, config: Config) -> Self {
        Self { i2c, wp, config }
    }

    /// Protect the array until the first write.
    pub fn default_cfg(&mut self) -> Result<()> {
        self.wp.set_high().map_err(Error::pin)
    }

    pub fn write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        check_range(addr, data.len())?;
        trace!("FRAM 5 write {} bytes at 0x{:05X}", data.len(), addr);

        self.wp.set_low().map_err(Error::pin)?;
        let result = self.write_banks(addr, data);
        // Restore protection whatever the outcome of the write; a bus error
        // takes precedence over a pin error.
        let restored = self.wp.set_high().map_err(Error::pin);
        if let Err(e) = &restored {
            warn!("FRAM 5 write protect not restored: {}", e);
        }
        result.and(restored)
    }

    pub fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        check_range(addr, buf.len())?;
        trace!("FRAM 5 read {} bytes at 0x{:05X}", buf.len(), addr);

        let mut addr = addr;
        let mut rest = buf;
        while !rest.is_empty() {
            let n = bank_chunk(addr, rest.len());
            let (chunk, tail) = rest.split_at_mut(n);
            let word = (addr as u16).to_be_bytes();
            let slave = self.slave(addr);
            self.i2c
                .write_read(slave, &word, chunk)
                .map_err(Error::i2c)?;
            addr += n as u32;
            rest = tail;
        }
        Ok(())
    }

    pub fn write_byte(&mut self, addr: u32, byte: u8) -> Result<()> {
        self.write(addr, &[byte])
    }

    pub fn read_byte(&mut self, addr: u32) -> Result<u8> {
        let mut byte = [0u8; 1];
        self.read(addr, &mut byte)?;
        Ok(byte[0])
    }

    /// Query the device ID through the reserved slave address.
    pub fn read_device_id(&mut self) -> Result<DeviceId> {
        let mut raw = [0u8; 3];
        let query = [self.config.i2c_address << 1];
        self.i2c
            .write_read(DEVICE_ID_ADDR, &query, &mut raw)
            .map_err(Error::i2c)?;
        let id = DeviceId::from_bytes(raw);
        debug!(
            "FRAM 5 manufacturer 0x{:03X}, product 0x{:03X}",
            id.manufacturer, id.product
        );
        Ok(id)
    }

    fn write_banks(&mut self, mut addr: u32, data: &[u8]) -> Result<()> {
        let mut rest = data;
        while !rest.is_empty() {
            let n = bank_chunk(addr, rest.len());
            let (chunk, tail) = rest.split_at(n);
            let word = (addr as u16).to_be_bytes();
            let slave = self.slave(addr);
            self.i2c
                .transaction(slave, &mut [Operation::Write(&word), Operation::Write(chunk)])
                .map_err(Error::i2c)?;
            addr += n as u32;
            rest = tail;
        }
        Ok(())
    }

    fn slave(&self, addr: u32) -> u8 {
        self.config.i2c_address | ((addr >> 16) & 0x01) as u8
    }
}

fn check_range(addr: u32, len: usize) -> Result<()> {
    if addr as u64 + len as u64 > CAPACITY as u64 {
        return Err(Error::AddressOutOfRange {
            addr,
            len,
            capacity: CAPACITY,
        });
    }
    Ok(())
}

// Bytes that fit before the next bank boundary.
fn bank_chunk(addr: u32, len: usize) -> usize {
    let to_boundary = (BANK_SIZE - (addr % BANK_SIZE)) as usize;
    len.min(to_boundary)
}

inventory::submit! {
    ClickDescriptor {
        name: "FRAM 5",
        module: "click::fram5",
        chip: "MB85RC1MT",
        interfaces: Interface::I2C.union(Interface::GPIO),
        default_config: Some(default_config::<Config>),
    }
}
