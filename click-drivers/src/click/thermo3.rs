//! Thermo 3 Click Driver
//!
//! This module provides a driver for the Thermo 3 Click, built around the
//! Texas Instruments TMP102 digital temperature sensor.
//!
//! Temperature and limit registers are left-justified two's complement with
//! a resolution of 0.0625 °C: 12 bits normally, 13 bits in extended mode.
//!
//! Datasheet: <https://www.ti.com/lit/ds/symlink/tmp102.pdf>

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::catalog::{ClickDescriptor, Interface};
use crate::config::default_config;
use crate::error::{Error, Result};
use crate::hw_trait::{I2c, InputPin};
use crate::tracing::prelude::*;

pub const DEFAULT_I2C_ADDR: u8 = 0x48;

/// Degrees Celsius per LSB
pub const RESOLUTION: f32 = 0.0625;

mod reg {
    pub const TEMP: u8 = 0x00;
    pub const CONFIG: u8 = 0x01;
    pub const T_LOW: u8 = 0x02;
    pub const T_HIGH: u8 = 0x03;
}

bitflags! {
    /// Configuration register, first byte in the high half
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ConfigReg: u16 {
        const OS = 1 << 15;
        const R1 = 1 << 14;
        const R0 = 1 << 13;
        const F1 = 1 << 12;
        const F0 = 1 << 11;
        /// ALERT active high when set
        const POL = 1 << 10;
        /// Interrupt mode when set, comparator mode otherwise
        const TM = 1 << 9;
        const SD = 1 << 8;
        const CR1 = 1 << 7;
        const CR0 = 1 << 6;
        const AL = 1 << 5;
        /// 13-bit extended mode
        const EM = 1 << 4;
    }
}

impl ConfigReg {
    /// Power-on value: 12-bit, 4 Hz conversion, comparator mode
    pub const POWER_ON: ConfigReg = ConfigReg::from_bits_retain(0x60A0);
}

/// Convert a temperature register value to °C.
pub fn decode_temperature(raw: u16, extended: bool) -> f32 {
    let shift = if extended { 3 } else { 4 };
    ((raw as i16) >> shift) as f32 * RESOLUTION
}

/// Convert °C to a temperature register value, rounding to the nearest LSB.
pub fn encode_temperature(celsius: f32, extended: bool) -> u16 {
    let (shift, min, max) = if extended {
        (3, -4096, 4095)
    } else {
        (4, -2048, 2047)
    };
    let counts = (celsius / RESOLUTION).round().clamp(min as f32, max as f32) as i16;
    (counts << shift) as u16
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub i2c_address: u8,
    /// Enable 13-bit mode, extending the range to 150 °C
    pub extended_mode: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            i2c_address: DEFAULT_I2C_ADDR,
            extended_mode: false,
        }
    }
}

/// Thermo 3 driver
pub struct Thermo3<I2C, ALERT> {
    i2c: I2C,
    alert: ALERT,
    address: u8,
    // Cached copy of the device's configuration register
    config_reg: ConfigReg,
}

impl<I2C, ALERT> Thermo3<I2C, ALERT>
where
    I2C: I2c,
    ALERT: InputPin,
{
    pub fn new(i2c: I2C, alert: ALERT, config: Config) -> Self {
        let mut config_reg = ConfigReg::POWER_ON;
        config_reg.set(ConfigReg::EM, config.extended_mode);
        Self {
            i2c,
            alert,
            address: config.i2c_address,
            config_reg,
        }
    }

    /// Write the configuration register, selecting the configured mode.
    pub fn default_cfg(&mut self) -> Result<()> {
        debug!("Initializing TMP102 (config 0x{:04X})", self.config_reg.bits());
        self.write_config(self.config_reg)
    }

    pub fn read_temperature(&mut self) -> Result<f32> {
        let raw = self.read_register(reg::TEMP)?;
        let extended = self.config_reg.contains(ConfigReg::EM);
        let celsius = decode_temperature(raw, extended);
        trace!("TMP102 raw 0x{:04X} -> {:.4} °C", raw, celsius);
        Ok(celsius)
    }

    pub fn read_config(&mut self) -> Result<ConfigReg> {
        let raw = self.read_register(reg::CONFIG)?;
        self.config_reg = ConfigReg::from_bits_retain(raw);
        Ok(self.config_reg)
    }

    pub fn write_config(&mut self, config: ConfigReg) -> Result<()> {
        self.write_register(reg::CONFIG, config.bits())?;
        self.config_reg = config;
        Ok(())
    }

    /// Program the alert thresholds in °C.
    pub fn set_limits(&mut self, low: f32, high: f32) -> Result<()> {
        if low > high {
            return Err(Error::InvalidArgument(format!(
                "low limit {} above high limit {}",
                low, high
            )));
        }
        let extended = self.config_reg.contains(ConfigReg::EM);
        self.write_register(reg::T_LOW, encode_temperature(low, extended))?;
        self.write_register(reg::T_HIGH, encode_temperature(high, extended))
    }

    /// Whether ALERT is asserted, honoring the configured polarity.
    pub fn is_alert(&mut self) -> Result<bool> {
        if self.config_reg.contains(ConfigReg::POL) {
            self.alert.is_high().map_err(Error::pin)
        } else {
            self.alert.is_low().map_err(Error::pin)
        }
    }

    fn read_register(&mut self, register: u8) -> Result<u16> {
        let mut data = [0u8; 2];
        self.i2c
            .write_read(self.address, &[register], &mut data)
            .map_err(Error::i2c)?;
        Ok(u16::from_be_bytes(data))
    }

    fn write_register(&mut self, register: u8, value: u16) -> Result<()> {
        let [hi, lo] = value.to_be_bytes();
        self.i2c
            .write(self.address, &[register, hi, lo])
            .map_err(Error::i2c)
    }
}

inventory::submit! {
    ClickDescriptor {
        name: "Thermo 3",
        module: "click::thermo3",
        chip: "TMP102",
        interfaces: Interface::I2C.union(Interface::GPIO),
        default_config: Some(default_config::<Config>),
    }
}
