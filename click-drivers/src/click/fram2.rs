//! FRAM 2 Click Driver
//!
//! Cypress CY15B104Q 4-Mbit SPI FRAM. Uses the same command layer as the
//! FRAM Click with a 3-byte address, plus fast read, sleep and device ID.
//! As on the FRAM Click, WP and HOLD are first driven high by `default_cfg`.

use serde::{Deserialize, Serialize};

use super::fram::{opcode, BlockProtect, SpiFram, Status};
use crate::catalog::{ClickDescriptor, Interface};
use crate::config::default_config;
use crate::error::{Error, Result};
use crate::hw_trait::{OutputPin, SpiDevice};
use crate::tracing::prelude::*;

pub const DEVICE_ID_LEN: usize = 9;

/// Decoded RDID response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceId {
    /// JEDEC manufacturer ID after the 0x7F continuation bytes
    pub manufacturer: u8,
    pub product: [u8; 2],
    pub raw: [u8; DEVICE_ID_LEN],
}

impl DeviceId {
    fn parse(raw: [u8; DEVICE_ID_LEN]) -> Self {
        let manufacturer = raw
            .iter()
            .copied()
            .find(|b| *b != 0x7F)
            .unwrap_or(0x7F);
        Self {
            manufacturer,
            product: [raw[7], raw[8]],
            raw,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capacity: u32,
    pub block_protect: BlockProtect,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: 512 * 1024,
            block_protect: BlockProtect::None,
        }
    }
}

/// FRAM 2 driver
pub struct Fram2<SPI, WP, HOLD> {
    core: SpiFram<SPI>,
    wp: WP,
    hold: HOLD,
    config: Config,
}

impl<SPI, WP, HOLD> Fram2<SPI, WP, HOLD>
where
    SPI: SpiDevice,
    WP: OutputPin,
    HOLD: OutputPin,
{
    pub fn new(spi: SPI, wp: WP, hold: HOLD, config: Config) -> Self {
        Self {
            core: SpiFram::new(spi, config.capacity, 3),
            wp,
            hold,
            config,
        }
    }

    /// Release WP and HOLD and program block protection.
    pub fn default_cfg(&mut self) -> Result<()> {
        debug!("Initializing FRAM 2 ({} bytes)", self.config.capacity);
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

    pub fn write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        self.core.write(addr, data)
    }

    pub fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        self.core.read(addr, buf)
    }

    pub fn fast_read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        self.core.fast_read(addr, buf)
    }

    pub fn read_id(&mut self) -> Result<DeviceId> {
        let mut raw = [0u8; DEVICE_ID_LEN];
        self.core.query(opcode::RDID, &mut raw)?;
        let id = DeviceId::parse(raw);
        debug!("FRAM 2 device ID: {:02X?}", id.raw);
        Ok(id)
    }

    /// Enter sleep mode. The next chip select wakes the device.
    pub fn sleep(&mut self) -> Result<()> {
        self.core.command(opcode::SLEEP)
    }
}

inventory::submit! {
    ClickDescriptor {
        name: "FRAM 2",
        module: "click::fram2",
        chip: "CY15B104Q",
        interfaces: Interface::SPI.union(Interface::GPIO),
        default_config: Some(default_config::<Config>),
    }
}
