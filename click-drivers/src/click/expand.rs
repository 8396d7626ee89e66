//! Expand Click Driver
//!
//! Microchip MCP23S17 16-bit SPI port expander. Registers are addressed
//! with IOCON.BANK = 0, so port A and port B registers are interleaved and
//! a port's register is the port A address plus the port index.
//!
//! Several expanders can share a chip select once hardware addressing
//! (IOCON.HAEN) is on; the A2..A0 strap is carried in every opcode.
//!
//! Datasheet: <https://ww1.microchip.com/downloads/en/devicedoc/20001952c.pdf>

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::catalog::{ClickDescriptor, Interface};
use crate::config::default_config;
use crate::error::{Error, Result};
use crate::hw_trait::{DelayNs, OutputPin, SpiDevice, SpiOperation};
use crate::tracing::prelude::*;

const OPCODE: u8 = 0x40;
const READ: u8 = 0x01;

/// Register addresses for port A with IOCON.BANK = 0
pub mod reg {
    pub const IODIR: u8 = 0x00;
    pub const IPOL: u8 = 0x02;
    pub const GPINTEN: u8 = 0x04;
    pub const DEFVAL: u8 = 0x06;
    pub const INTCON: u8 = 0x08;
    pub const IOCON: u8 = 0x0A;
    pub const GPPU: u8 = 0x0C;
    pub const INTF: u8 = 0x0E;
    pub const INTCAP: u8 = 0x10;
    pub const GPIO: u8 = 0x12;
    pub const OLAT: u8 = 0x14;
}

/// IOCON hardware address enable
pub const IOCON_HAEN: u8 = 0x08;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Port {
    A = 0,
    B = 1,
}

impl Port {
    fn register(self, base: u8) -> u8 {
        base + self as u8
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// A2..A0 strap (0..=7)
    pub hw_address: u8,
    /// RST assertion time (µs)
    pub reset_pulse_us: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hw_address: 0,
            reset_pulse_us: 1,
        }
    }
}

/// Expand driver
pub struct Expand<SPI, RST, D> {
    spi: SPI,
    rst: RST,
    delay: D,
    config: Config,
}

impl<SPI, RST, D> Expand<SPI, RST, D>
where
    SPI: SpiDevice,
    RST: OutputPin,
    D: DelayNs,
{
    pub fn new(spi: SPI, rst: RST, delay: D, config: Config) -> Self {
        Self {
            spi,
            rst,
            delay,
            config,
        }
    }

    /// Reset the expander and enable hardware addressing.
    pub fn default_cfg(&mut self) -> Result<()> {
        if self.config.hw_address > 7 {
            return Err(Error::Config(format!(
                "hardware address {} outside 0..=7",
                self.config.hw_address
            )));
        }
        debug!("Initializing MCP23S17 at hardware address {}", self.config.hw_address);
        self.reset()?;
        self.write_register(reg::IOCON, IOCON_HAEN)
    }

    /// Pulse RST low. All registers return to their power-on values.
    pub fn reset(&mut self) -> Result<()> {
        self.rst.set_low().map_err(Error::pin)?;
        self.delay.delay_us(self.config.reset_pulse_us);
        self.rst.set_high().map_err(Error::pin)
    }

    pub fn write_register(&mut self, register: u8, value: u8) -> Result<()> {
        trace!("MCP23S17 write 0x{:02X} = 0x{:02X}", register, value);
        let frame = [self.opcode(false), register, value];
        self.spi.write(&frame).map_err(Error::spi)
    }

    pub fn read_register(&mut self, register: u8) -> Result<u8> {
        let mut value = [0u8; 1];
        let header = [self.opcode(true), register];
        self.spi
            .transaction(&mut [SpiOperation::Write(&header), SpiOperation::Read(&mut value)])
            .map_err(Error::spi)?;
        Ok(value[0])
    }

    /// Set pin directions; a set bit makes the pin an input.
    pub fn set_direction(&mut self, port: Port, inputs: u8) -> Result<()> {
        self.write_register(port.register(reg::IODIR), inputs)
    }

    /// Enable the 100 kΩ pull-ups on the masked pins.
    pub fn set_pull_up(&mut self, port: Port, mask: u8) -> Result<()> {
        self.write_register(port.register(reg::GPPU), mask)
    }

    pub fn write_port(&mut self, port: Port, value: u8) -> Result<()> {
        self.write_register(port.register(reg::OLAT), value)
    }

    pub fn read_port(&mut self, port: Port) -> Result<u8> {
        self.read_register(port.register(reg::GPIO))
    }

    pub fn read_pin(&mut self, port: Port, pin: u8) -> Result<bool> {
        let mask = pin_mask(pin)?;
        Ok(self.read_port(port)? & mask != 0)
    }

    pub fn set_pin(&mut self, port: Port, pin: u8) -> Result<()> {
        let mask = pin_mask(pin)?;
        self.update_latch(port, |latch| latch | mask)
    }

    pub fn clear_pin(&mut self, port: Port, pin: u8) -> Result<()> {
        let mask = pin_mask(pin)?;
        self.update_latch(port, |latch| latch & !mask)
    }

    fn update_latch(&mut self, port: Port, f: impl FnOnce(u8) -> u8) -> Result<()> {
        let latch = self.read_register(port.register(reg::OLAT))?;
        self.write_register(port.register(reg::OLAT), f(latch))
    }

    fn opcode(&self, read: bool) -> u8 {
        OPCODE | ((self.config.hw_address & 0x07) << 1) | if read { READ } else { 0 }
    }
}

fn pin_mask(pin: u8) -> Result<u8> {
    if pin > 7 {
        return Err(Error::InvalidArgument(format!("pin {} outside 0..=7", pin)));
    }
    Ok(1 << pin)
}

inventory::submit! {
    ClickDescriptor {
        name: "Expand",
        module: "click::expand",
        chip: "MCP23S17",
        interfaces: Interface::SPI.union(Interface::GPIO),
        default_config: Some(default_config::<Config>),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw_trait::mock::{MockDelay, MockPin, MockSpi};

    fn expand(hw_address: u8) -> (Expand<MockSpi, MockPin, MockDelay>, MockSpi, MockPin) {
        let spi = MockSpi::new();
        let rst = MockPin::new(true);
        let config = Config {
            hw_address,
            ..Default::default()
        };
        let expand = Expand::new(spi.clone(), rst.clone(), MockDelay::new(), config);
        (expand, spi, rst)
    }

    #[test]
    fn test_default_cfg() {
        let (mut expand, spi, rst) = expand(0);
        expand.default_cfg().unwrap();
        assert_eq!(rst.history(), vec![false, true]);
        assert_eq!(spi.transactions(), vec![vec![0x40, 0x0A, 0x08]]);
    }

    #[test]
    fn test_hardware_address_in_opcode() {
        let (mut expand, spi, _) = expand(5);
        expand.write_port(Port::B, 0x55).unwrap();
        spi.queue_read(&[0xA5]);
        assert_eq!(expand.read_port(Port::A).unwrap(), 0xA5);
        assert_eq!(
            spi.transactions(),
            vec![vec![0x4A, 0x15, 0x55], vec![0x4B, 0x12]]
        );
    }

    #[test]
    fn test_direction_and_pull_up() {
        let (mut expand, spi, _) = expand(0);
        expand.set_direction(Port::A, 0xFF).unwrap();
        expand.set_pull_up(Port::B, 0x0F).unwrap();
        assert_eq!(
            spi.transactions(),
            vec![vec![0x40, 0x00, 0xFF], vec![0x40, 0x0D, 0x0F]]
        );
    }

    #[test]
    fn test_set_and_clear_pin() {
        let (mut expand, spi, _) = expand(0);
        spi.queue_read(&[0b0000_0001]);
        expand.set_pin(Port::A, 3).unwrap();
        spi.queue_read(&[0b0000_1001]);
        expand.clear_pin(Port::A, 0).unwrap();
        assert_eq!(
            spi.transactions(),
            vec![
                vec![0x41, 0x14],
                vec![0x40, 0x14, 0b0000_1001],
                vec![0x41, 0x14],
                vec![0x40, 0x14, 0b0000_1000],
            ]
        );
    }

    #[test]
    fn test_read_pin() {
        let (mut expand, spi, _) = expand(0);
        spi.queue_read(&[0x80]);
        assert!(expand.read_pin(Port::B, 7).unwrap());
        assert!(matches!(expand.read_pin(Port::B, 8), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_invalid_hw_address() {
        let (mut expand, spi, _) = expand(8);
        assert!(matches!(expand.default_cfg(), Err(Error::Config(_))));
        assert!(spi.transactions().is_empty());
    }
}
