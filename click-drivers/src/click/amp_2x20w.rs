//! 2x20W Amp Click Driver
//!
//! This module provides a driver for the 2x20W Amp Click, built around the
//! Maxim MAX9744 stereo class-D amplifier with I2C volume control.
//!
//! Datasheet: <https://www.analog.com/media/en/technical-documentation/data-sheets/MAX9744.pdf>

use serde::{Deserialize, Serialize};

use crate::catalog::{ClickDescriptor, Interface};
use crate::config::default_config;
use crate::error::{Error, Result};
use crate::hw_trait::{I2c, InputPin, OutputPin};
use crate::tracing::prelude::*;

/// MAX9744 I2C address with ADDR1/ADDR2 strapped as on the board
pub const DEFAULT_I2C_ADDR: u8 = 0x4B;

/// Volume occupies the low 6 bits of a volume write
pub const VOLUME_MASK: u8 = 0x3F;

mod cmd {
    pub const VOLUME_UP: u8 = 0xC4;
    pub const VOLUME_DOWN: u8 = 0xC5;
}

/// Output modulation scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Modulation {
    /// Filterless modulation (default on power-up)
    Filterless = 0x40,
    /// Classic PWM, for use with an output filter
    ClassicPwm = 0x41,
}

/// 2x20W Amp configuration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// I2C slave address
    pub i2c_address: u8,
    /// Volume written by `default_cfg` (0..=63)
    pub volume: u8,
    /// Modulation written by `default_cfg`
    pub modulation: Modulation,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            i2c_address: DEFAULT_I2C_ADDR,
            volume: 0x1F,
            modulation: Modulation::Filterless,
        }
    }
}

/// 2x20W Amp driver
pub struct Amp2x20w<I2C, SHDN, MUTE, FLT> {
    i2c: I2C,
    shutdown: SHDN,
    mute: MUTE,
    fault: FLT,
    config: Config,
    volume: u8,
}

impl<I2C, SHDN, MUTE, FLT> Amp2x20w<I2C, SHDN, MUTE, FLT>
where
    I2C: I2c,
    SHDN: OutputPin,
    MUTE: OutputPin,
    FLT: InputPin,
{
    /// Create a new driver; no bus traffic until the first call.
    pub fn new(i2c: I2C, shutdown: SHDN, mute: MUTE, fault: FLT, config: Config) -> Self {
        let volume = config.volume & VOLUME_MASK;
        Self {
            i2c,
            shutdown,
            mute,
            fault,
            config,
            volume,
        }
    }

    /// Bring the amplifier up: out of shutdown, unmuted, configured
    /// modulation and volume.
    pub fn default_cfg(&mut self) -> Result<()> {
        debug!("Initializing MAX9744 amplifier");
        self.set_shutdown(false)?;
        self.set_mute(false)?;
        self.set_modulation(self.config.modulation)?;
        self.set_volume(self.config.volume)?;
        Ok(())
    }

    /// Set the volume. Only the low 6 bits are used.
    pub fn set_volume(&mut self, volume: u8) -> Result<()> {
        let volume = volume & VOLUME_MASK;
        trace!("Setting volume: {}", volume);
        self.write(volume)?;
        self.volume = volume;
        Ok(())
    }

    /// Step the volume up by one.
    pub fn volume_up(&mut self) -> Result<()> {
        self.write(cmd::VOLUME_UP)?;
        self.volume = (self.volume + 1).min(VOLUME_MASK);
        Ok(())
    }

    /// Step the volume down by one.
    pub fn volume_down(&mut self) -> Result<()> {
        self.write(cmd::VOLUME_DOWN)?;
        self.volume = self.volume.saturating_sub(1);
        Ok(())
    }

    /// Last volume written through this driver.
    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn set_modulation(&mut self, modulation: Modulation) -> Result<()> {
        trace!("Setting modulation: {:?}", modulation);
        self.write(modulation as u8)
    }

    /// Mute the outputs. MUTE is active low.
    pub fn set_mute(&mut self, mute: bool) -> Result<()> {
        if mute {
            self.mute.set_low().map_err(Error::pin)
        } else {
            self.mute.set_high().map_err(Error::pin)
        }
    }

    /// Put the amplifier into shutdown. SHDN is active low.
    pub fn set_shutdown(&mut self, shutdown: bool) -> Result<()> {
        if shutdown {
            self.shutdown.set_low().map_err(Error::pin)
        } else {
            self.shutdown.set_high().map_err(Error::pin)
        }
    }

    /// Check the open-drain FAULT output, asserted low on over-temperature
    /// or output short.
    pub fn is_fault(&mut self) -> Result<bool> {
        let fault = self.fault.is_low().map_err(Error::pin)?;
        if fault {
            warn!("MAX9744 reports a fault");
        }
        Ok(fault)
    }

    fn write(&mut self, byte: u8) -> Result<()> {
        self.i2c
            .write(self.config.i2c_address, &[byte])
            .map_err(Error::i2c)
    }
}

inventory::submit! {
    ClickDescriptor {
        name: "2x20W Amp",
        module: "click::amp_2x20w",
        chip: "MAX9744",
        interfaces: Interface::I2C.union(Interface::GPIO),
        default_config: Some(default_config::<Config>),
    }
}
