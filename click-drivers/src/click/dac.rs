//! DAC Click Driver
//!
//! Microchip MCP4921 12-bit voltage output DAC. Every update is a single
//! 16-bit write:
//!
//! ```text
//! bit 15: 0 (DAC A)   14: BUF   13: GA (1 = 1x gain)   12: SHDN (0 = off)
//! bits 11..0: data
//! ```

use modular_bitfield::prelude::*;
use serde::{Deserialize, Serialize};

use crate::catalog::{ClickDescriptor, Interface};
use crate::config::default_config;
use crate::error::{Error, Result};
use crate::hw_trait::SpiDevice;
use crate::tracing::prelude::*;

pub const MAX_VALUE: u16 = 4095;

#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DacWord {
    pub data: B12,
    /// Output active when set
    pub active: bool,
    /// 1x gain when set, 2x otherwise
    pub gain_1x: bool,
    pub buffered: bool,
    #[skip]
    __: B1,
}

impl DacWord {
    pub fn to_u16(self) -> u16 {
        u16::from_le_bytes(self.into_bytes())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gain {
    X1,
    X2,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Reference voltage on VREF (mV)
    pub vref_mv: f32,
    pub gain: Gain,
    /// Buffer the VREF input
    pub buffered: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vref_mv: 3300.0,
            gain: Gain::X1,
            buffered: false,
        }
    }
}

/// DAC driver
pub struct Dac<SPI> {
    spi: SPI,
    config: Config,
}

impl<SPI: SpiDevice> Dac<SPI> {
    pub fn new(spi: SPI, config: Config) -> Self {
        Self { spi, config }
    }

    /// Set the raw output code.
    pub fn set_value(&mut self, value: u16) -> Result<()> {
        if value > MAX_VALUE {
            return Err(Error::InvalidArgument(format!(
                "DAC value {} exceeds {}",
                value, MAX_VALUE
            )));
        }
        let word = self.word(value).with_active(true);
        self.write(word)
    }

    /// Set the output voltage, clamped to full scale. Returns the code
    /// written.
    pub fn set_voltage(&mut self, mv: f32) -> Result<u16> {
        let full_scale = match self.config.gain {
            Gain::X1 => self.config.vref_mv,
            Gain::X2 => self.config.vref_mv * 2.0,
        };
        let value = (mv.max(0.0) * 4096.0 / full_scale).min(MAX_VALUE as f32) as u16;
        trace!("DAC {:.1} mV -> {}", mv, value);
        self.set_value(value)?;
        Ok(value)
    }

    /// Turn the output off; it is pulled to ground through 500 kΩ.
    pub fn shutdown(&mut self) -> Result<()> {
        let word = self.word(0).with_active(false);
        self.write(word)
    }

    fn word(&self, value: u16) -> DacWord {
        DacWord::new()
            .with_data(value)
            .with_gain_1x(self.config.gain == Gain::X1)
            .with_buffered(self.config.buffered)
    }

    fn write(&mut self, word: DacWord) -> Result<()> {
        self.spi
            .write(&word.to_u16().to_be_bytes())
            .map_err(Error::spi)
    }
}

inventory::submit! {
    ClickDescriptor {
        name: "DAC",
        module: "click::dac",
        chip: "MCP4921",
        interfaces: Interface::SPI,
        default_config: Some(default_config::<Config>),
    }
}
