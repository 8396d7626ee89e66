//! ADC Click Driver
//!
//! Microchip MCP3204 4-channel 12-bit SAR ADC with an on-board 4.096 V
//! reference. A conversion is one 3-byte transfer: start bit and mode in
//! the first byte, channel select in the second, and the 12-bit result
//! clocked back in the last two.

use serde::{Deserialize, Serialize};

use crate::catalog::{ClickDescriptor, Interface};
use crate::config::default_config;
use crate::error::{Error, Result};
use crate::hw_trait::SpiDevice;
use crate::tracing::prelude::*;

pub const CHANNELS: u8 = 4;

const START: u8 = 0x04;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    SingleEnded,
    /// Pseudo-differential: CH0-CH1, CH1-CH0, CH2-CH3, CH3-CH2 for
    /// channels 0..=3
    Differential,
}

/// Command bytes for one conversion.
pub fn command(channel: u8, input: Input) -> [u8; 3] {
    let sgl = (input == Input::SingleEnded) as u8;
    // D2 is always 0 on the 4-channel part
    [START | (sgl << 1), (channel & 0x03) << 6, 0x00]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub vref_mv: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self { vref_mv: 4096.0 }
    }
}

/// ADC driver
pub struct Adc<SPI> {
    spi: SPI,
    config: Config,
}

impl<SPI: SpiDevice> Adc<SPI> {
    pub fn new(spi: SPI, config: Config) -> Self {
        Self { spi, config }
    }

    pub fn read_channel(&mut self, channel: u8, input: Input) -> Result<u16> {
        if channel >= CHANNELS {
            return Err(Error::InvalidArgument(format!(
                "channel {} outside 0..{}",
                channel, CHANNELS
            )));
        }
        let mut frame = command(channel, input);
        self.spi.transfer_in_place(&mut frame).map_err(Error::spi)?;
        let raw = (((frame[1] & 0x0F) as u16) << 8) | frame[2] as u16;
        trace!("MCP3204 CH{} {:?}: {}", channel, input, raw);
        Ok(raw)
    }

    /// Single-ended reading in mV.
    pub fn read_voltage(&mut self, channel: u8) -> Result<f32> {
        let raw = self.read_channel(channel, Input::SingleEnded)?;
        Ok(raw as f32 * self.config.vref_mv / 4096.0)
    }
}

inventory::submit! {
    ClickDescriptor {
        name: "ADC",
        module: "click::adc",
        chip: "MCP3204",
        interfaces: Interface::SPI,
        default_config: Some(default_config::<Config>),
    }
}
