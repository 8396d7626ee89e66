//! Turbidity Click Driver
//!
//! The Turbidity Click carries an optical turbidity probe front end. Its
//! output voltage falls as turbidity rises and can be sampled either by the
//! on-board Microchip MCP3221 12-bit I2C ADC or directly on the AN pin.
//!
//! Conversion to NTU uses a piecewise-linear calibration curve.

use serde::{Deserialize, Serialize};

use crate::catalog::{ClickDescriptor, Interface};
use crate::config::default_config;
use crate::error::{Error, Result};
use crate::hw_trait::{AnalogIn, I2c};
use crate::tracing::prelude::*;

/// MCP3221A5 I2C address
pub const DEFAULT_I2C_ADDR: u8 = 0x4D;

/// Turbidity reported below `VOLTAGE_MIN_MV` (probe fully obscured)
pub const NTU_MAX: f32 = 4000.0;
/// Turbidity reported above `VOLTAGE_MAX_MV` (clear water)
pub const NTU_MIN: f32 = 0.0;

pub const VOLTAGE_MIN_MV: f32 = 1600.0;
pub const VOLTAGE_MAX_MV: f32 = 4600.0;

/// Calibration segments as (upper voltage bound in mV, slope, intercept).
/// A voltage uses the first segment whose bound it is below.
const SEGMENTS: [(f32, f32, f32); 5] = [
    (2000.0, -2.5, 8000.0),
    (2800.0, -1.875, 6750.0),
    (3600.0, -1.25, 5000.0),
    (4200.0, -0.6, 2660.0),
    (VOLTAGE_MAX_MV, -0.35, 1610.0),
];

/// Convert probe output voltage to turbidity in NTU.
pub fn ntu_from_voltage(voltage_mv: f32) -> f32 {
    if voltage_mv < VOLTAGE_MIN_MV {
        return NTU_MAX;
    }
    if voltage_mv > VOLTAGE_MAX_MV {
        return NTU_MIN;
    }

    let (_, slope, intercept) = SEGMENTS
        .iter()
        .copied()
        .find(|(bound, _, _)| voltage_mv < *bound)
        .unwrap_or(SEGMENTS[SEGMENTS.len() - 1]);
    (slope * voltage_mv + intercept).clamp(NTU_MIN, NTU_MAX)
}

/// Where the probe voltage is sampled.
pub trait VoltageSource {
    /// Raw sample and its full-scale count.
    fn sample(&mut self) -> Result<(u16, u32)>;
}

/// MCP3221 12-bit I2C ADC.
pub struct Mcp3221<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> Mcp3221<I2C> {
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }
}

impl<I2C: I2c> VoltageSource for Mcp3221<I2C> {
    fn sample(&mut self) -> Result<(u16, u32)> {
        let mut data = [0u8; 2];
        self.i2c.read(self.address, &mut data).map_err(Error::i2c)?;
        let raw = (((data[0] & 0x0F) as u16) << 8) | data[1] as u16;
        Ok((raw, 4096))
    }
}

/// Analog pin sampled by the host ADC.
pub struct AnalogPin<A>(pub A);

impl<A: AnalogIn> VoltageSource for AnalogPin<A> {
    fn sample(&mut self) -> Result<(u16, u32)> {
        let raw = self.0.read_raw().map_err(Error::adc)?;
        Ok((raw, 1u32 << self.0.resolution_bits()))
    }
}

/// Turbidity configuration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// MCP3221 address, used by `Turbidity::with_i2c`
    pub i2c_address: u8,
    /// Full-scale voltage of the ADC (mV)
    pub reference_mv: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            i2c_address: DEFAULT_I2C_ADDR,
            reference_mv: 5000.0,
        }
    }
}

/// Turbidity driver
pub struct Turbidity<S> {
    source: S,
    config: Config,
}

impl<I2C: I2c> Turbidity<Mcp3221<I2C>> {
    /// Sample through the on-board ADC.
    pub fn with_i2c(i2c: I2C, config: Config) -> Self {
        let source = Mcp3221::new(i2c, config.i2c_address);
        Self { source, config }
    }
}

impl<A: AnalogIn> Turbidity<AnalogPin<A>> {
    /// Sample the AN pin. The reference voltage comes from the ADC.
    pub fn with_analog(adc: A, mut config: Config) -> Self {
        config.reference_mv = adc.reference_mv();
        Self {
            source: AnalogPin(adc),
            config,
        }
    }
}

impl<S: VoltageSource> Turbidity<S> {
    /// Raw ADC sample.
    pub fn read_raw(&mut self) -> Result<u16> {
        let (raw, _) = self.source.sample()?;
        Ok(raw)
    }

    /// Probe output voltage in mV.
    pub fn read_voltage(&mut self) -> Result<f32> {
        let (raw, full_scale) = self.source.sample()?;
        let voltage = raw as f32 * self.config.reference_mv / full_scale as f32;
        trace!("Turbidity raw {} -> {:.1} mV", raw, voltage);
        Ok(voltage)
    }

    /// Turbidity in NTU.
    pub fn get_ntu(&mut self) -> Result<f32> {
        let voltage = self.read_voltage()?;
        Ok(ntu_from_voltage(voltage))
    }
}

inventory::submit! {
    ClickDescriptor {
        name: "Turbidity",
        module: "click::turbidity",
        chip: "MCP3221",
        interfaces: Interface::I2C.union(Interface::ADC),
        default_config: Some(default_config::<Config>),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw_trait::mock::{I2cOp, MockAdc, MockI2c};
    use test_case::test_case;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 0.01
    }

    #[test_case(0.0, NTU_MAX; "no signal")]
    #[test_case(1599.9, NTU_MAX; "just below range")]
    #[test_case(4600.1, NTU_MIN; "just above range")]
    #[test_case(5000.0, NTU_MIN; "saturated")]
    fn test_ntu_outside_range(voltage: f32, expected: f32) {
        assert_eq!(ntu_from_voltage(voltage), expected);
    }

    #[test_case(1600.0, 4000.0; "range start")]
    #[test_case(1800.0, 3500.0; "first segment")]
    #[test_case(2000.0, 3000.0; "first threshold")]
    #[test_case(2400.0, 2250.0; "second segment")]
    #[test_case(2800.0, 1500.0; "second threshold")]
    #[test_case(3200.0, 1000.0; "third segment")]
    #[test_case(3600.0, 500.0; "third threshold")]
    #[test_case(3900.0, 320.0; "fourth segment")]
    #[test_case(4200.0, 140.0; "fourth threshold")]
    #[test_case(4400.0, 70.0; "last segment")]
    #[test_case(4600.0, 0.0; "range end")]
    fn test_ntu_piecewise(voltage: f32, expected: f32) {
        let ntu = ntu_from_voltage(voltage);
        assert!(approx(ntu, expected), "{} mV -> {} NTU, expected {}", voltage, ntu, expected);
    }

    #[test]
    fn test_segments_selected_below_threshold() {
        // Just below each threshold the lower segment's slope applies
        for (bound, slope, intercept) in &SEGMENTS[..4] {
            let v = bound - 1.0;
            assert!(approx(ntu_from_voltage(v), slope * v + intercept));
        }
    }

    #[test]
    fn test_curve_is_monotonic() {
        let mut last = ntu_from_voltage(VOLTAGE_MIN_MV);
        let mut v = VOLTAGE_MIN_MV;
        while v <= VOLTAGE_MAX_MV {
            let ntu = ntu_from_voltage(v);
            assert!(ntu <= last + 0.01, "curve rises at {} mV", v);
            last = ntu;
            v += 10.0;
        }
    }

    #[test]
    fn test_i2c_sample() {
        let i2c = MockI2c::new();
        // Upper nibble of the first byte is not part of the result
        i2c.queue_read(&[0xF8, 0x00]);
        i2c.queue_read(&[0x08, 0x00]);
        let mut turbidity = Turbidity::with_i2c(i2c.clone(), Config::default());

        assert_eq!(turbidity.read_raw().unwrap(), 0x800);
        let voltage = turbidity.read_voltage().unwrap();
        assert!(approx(voltage, 2500.0));
        assert_eq!(i2c.log()[0], I2cOp::Read(DEFAULT_I2C_ADDR, 2));
    }

    #[test]
    fn test_analog_sample() {
        let adc = MockAdc::new(10, 5000.0);
        adc.set_raw(1023);
        let mut turbidity = Turbidity::with_analog(adc.clone(), Config::default());
        // 1023/1024 of 5000 mV is above range
        assert_eq!(turbidity.get_ntu().unwrap(), NTU_MIN);

        adc.set_raw(200);
        // 976.6 mV is below range
        assert_eq!(turbidity.get_ntu().unwrap(), NTU_MAX);
    }
}
