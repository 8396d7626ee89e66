//! Clock Gen 3 Click Driver
//!
//! This module provides a driver for the Clock Gen 3 Click, built around the
//! Linear Technology LTC6903 SPI-programmable oscillator (1 kHz to 68 MHz).
//!
//! The oscillator is programmed with a single 16-bit word holding a 4-bit
//! octave, a 10-bit DAC code and a 2-bit output configuration:
//!
//! ```text
//! f = 2^OCT * 2078 Hz / (2 - DAC / 1024)
//! ```
//!
//! Datasheet: <https://www.analog.com/media/en/technical-documentation/data-sheets/6903fe.pdf>

use modular_bitfield::prelude::*;
use serde::{Deserialize, Serialize};

use crate::catalog::{ClickDescriptor, Interface};
use crate::config::default_config;
use crate::error::{Error, Result};
use crate::hw_trait::{OutputPin, SpiDevice};
use crate::tracing::prelude::*;

/// Lower edge of octave 0 (kHz). Octave k starts at `OCTAVE_BASE_KHZ * 2^k`.
pub const OCTAVE_BASE_KHZ: f32 = 1.039;

/// Lowest programmable frequency (kHz)
pub const MIN_FREQ_KHZ: f32 = OCTAVE_BASE_KHZ;

/// Highest programmable frequency (kHz)
pub const MAX_FREQ_KHZ: f32 = 68_030.0;

pub const MAX_OCTAVE: u8 = 15;
pub const MAX_DAC: u16 = 1023;

/// LTC6903 control word, sent MSB first.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlWord {
    pub cnf: B2,
    pub dac: B10,
    pub oct: B4,
}

impl ControlWord {
    pub fn to_u16(self) -> u16 {
        u16::from_le_bytes(self.into_bytes())
    }

    pub fn from_u16(word: u16) -> Self {
        Self::from_bytes(word.to_le_bytes())
    }
}

/// Output driver configuration (CNF bits)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClockOutput {
    /// CLK and inverted CLK both running
    Both = 0,
    /// CLK off, inverted CLK running
    InvertedOnly = 1,
    /// CLK running, inverted CLK off
    ClkOnly = 2,
    /// Oscillator powered down
    PowerDown = 3,
}

/// Clock Gen 3 configuration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Output configuration used for every frequency write
    pub output: ClockOutput,
    /// Frequency programmed by `default_cfg` (kHz)
    pub frequency_khz: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output: ClockOutput::Both,
            frequency_khz: 1000.0,
        }
    }
}

/// Select the octave whose range contains `freq_khz`.
///
/// Octave k covers `[1.039 * 2^k, 2.078 * 2^k)` kHz.
pub fn octave_for(freq_khz: f32) -> Result<u8> {
    if !(MIN_FREQ_KHZ..=MAX_FREQ_KHZ).contains(&freq_khz) {
        return Err(Error::InvalidArgument(format!(
            "frequency {:.3} kHz outside {:.3}..={:.0} kHz",
            freq_khz, MIN_FREQ_KHZ, MAX_FREQ_KHZ
        )));
    }

    let mut oct = 0;
    while oct < MAX_OCTAVE && freq_khz >= OCTAVE_BASE_KHZ * (1u32 << (oct + 1)) as f32 {
        oct += 1;
    }
    Ok(oct)
}

/// DAC code giving the frequency closest to `freq_khz` within octave `oct`.
pub fn dac_value(freq_khz: f32, oct: u8) -> u16 {
    let freq_hz = freq_khz as f64 * 1000.0;
    let dac = 2048.0 - 2078.0 * 2f64.powi(10 + oct as i32) / freq_hz;
    dac.round().clamp(0.0, MAX_DAC as f64) as u16
}

/// Frequency produced by an octave and DAC code (kHz).
pub fn frequency_of(oct: u8, dac: u16) -> f32 {
    let hz = 2f64.powi(oct as i32) * 2078.0 / (2.0 - dac as f64 / 1024.0);
    (hz / 1000.0) as f32
}

/// Clock Gen 3 driver
pub struct ClockGen3<SPI, OE> {
    spi: SPI,
    oe: OE,
    config: Config,
    last_word: Option<ControlWord>,
}

impl<SPI, OE> ClockGen3<SPI, OE>
where
    SPI: SpiDevice,
    OE: OutputPin,
{
    pub fn new(spi: SPI, oe: OE, config: Config) -> Self {
        Self {
            spi,
            oe,
            config,
            last_word: None,
        }
    }

    /// Enable the output and program the configured frequency.
    pub fn default_cfg(&mut self) -> Result<()> {
        debug!("Initializing LTC6903 oscillator");
        self.enable(true)?;
        let actual = self.set_frequency(self.config.frequency_khz)?;
        debug!("Oscillator running at {:.3} kHz", actual);
        Ok(())
    }

    /// Program a frequency and return the frequency actually produced (kHz).
    pub fn set_frequency(&mut self, freq_khz: f32) -> Result<f32> {
        let oct = octave_for(freq_khz)?;
        let dac = dac_value(freq_khz, oct);
        trace!("Setting frequency {:.3} kHz: OCT={} DAC={}", freq_khz, oct, dac);

        let word = ControlWord::new()
            .with_oct(oct)
            .with_dac(dac)
            .with_cnf(self.config.output as u8);
        self.write_word(word.to_u16())?;
        Ok(frequency_of(oct, dac))
    }

    /// Change the output configuration, rewriting the current frequency if
    /// one has been programmed.
    pub fn set_output(&mut self, output: ClockOutput) -> Result<()> {
        self.config.output = output;
        if let Some(word) = self.last_word {
            self.write_word(word.with_cnf(output as u8).to_u16())?;
        }
        Ok(())
    }

    /// Drive the output-enable pin.
    pub fn enable(&mut self, enable: bool) -> Result<()> {
        if enable {
            self.oe.set_high().map_err(Error::pin)
        } else {
            self.oe.set_low().map_err(Error::pin)
        }
    }

    /// Write a raw control word.
    pub fn write_word(&mut self, word: u16) -> Result<()> {
        trace!("Writing control word 0x{:04X}", word);
        self.spi.write(&word.to_be_bytes()).map_err(Error::spi)?;
        self.last_word = Some(ControlWord::from_u16(word));
        Ok(())
    }

    /// Last control word written, if any.
    pub fn last_word(&self) -> Option<u16> {
        self.last_word.map(ControlWord::to_u16)
    }
}

inventory::submit! {
    ClickDescriptor {
        name: "Clock Gen 3",
        module: "click::clock_gen3",
        chip: "LTC6903",
        interfaces: Interface::SPI.union(Interface::GPIO),
        default_config: Some(default_config::<Config>),
    }
}
