//! UART 1-Wire Click Driver
//!
//! This module provides a driver for the UART 1-Wire Click, built around the
//! Maxim DS2480B serial-to-1-Wire line driver. The host talks to the DS2480B
//! over a 9600 baud UART; the DS2480B generates 1-Wire timing.
//!
//! The DS2480B has two modes. In command mode each byte is a command (for
//! example a bus reset). In data mode each byte is clocked onto the 1-Wire
//! bus and the byte sampled back is echoed to the host; reads are done by
//! writing 0xFF. The byte 0xE3 switches back to command mode, so a data byte
//! of 0xE3 must be sent twice.
//!
//! Datasheet: <https://www.analog.com/media/en/technical-documentation/data-sheets/DS2480B.pdf>

use crc_all::Crc;
use serde::{Deserialize, Serialize};

use crate::catalog::{ClickDescriptor, Interface};
use crate::config::default_config;
use crate::error::{Error, Result};
use crate::hw_trait::{DelayNs, ReadReady, SerialRead, SerialWrite};
use crate::tracing::prelude::*;

/// DS2480B control bytes
mod ds2480 {
    pub const COMMAND_MODE: u8 = 0xE3;
    pub const DATA_MODE: u8 = 0xE1;
    /// Bus reset at regular speed
    pub const RESET: u8 = 0xC1;
    /// Reply to a reset has the two top bits set
    pub const RESET_REPLY_MASK: u8 = 0xC0;
    pub const READ_SLOT: u8 = 0xFF;
}

/// 1-Wire ROM function commands
pub mod rom {
    pub const READ: u8 = 0x33;
    pub const MATCH: u8 = 0x55;
    pub const SKIP: u8 = 0xCC;
}

/// DS18B20 function commands
pub mod ds18b20 {
    pub const CONVERT_T: u8 = 0x44;
    pub const READ_SCRATCHPAD: u8 = 0xBE;
    pub const SCRATCHPAD_LEN: usize = 9;
    /// Temperature LSB weight at 12-bit resolution (°C)
    pub const RESOLUTION: f32 = 0.0625;
}

/// Bus state reported after a reset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetResult {
    /// 1-Wire line held low
    Shorted,
    Presence,
    /// Presence pulse from a device with an active alarm
    AlarmingPresence,
    NoPresence,
}

impl ResetResult {
    pub fn device_present(&self) -> bool {
        matches!(self, ResetResult::Presence | ResetResult::AlarmingPresence)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Command,
    Data,
}

/// UART 1-Wire configuration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Budget for one reply byte from the DS2480B (ms)
    pub read_timeout_ms: u32,
    /// Time allowed for a DS18B20 temperature conversion (ms)
    pub conversion_time_ms: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            read_timeout_ms: 100,
            conversion_time_ms: 750,
        }
    }
}

/// Maxim/Dallas CRC-8 (x^8 + x^5 + x^4 + 1, reflected).
pub fn crc8(bytes: &[u8]) -> u8 {
    let mut crc = Crc::<u8>::new(0x31, 8, 0x00, 0x00, true);
    crc.update(bytes);
    crc.finish()
}

/// UART 1-Wire driver
pub struct Uart1Wire<U, D> {
    uart: U,
    delay: D,
    config: Config,
    mode: Mode,
}

impl<U, D> Uart1Wire<U, D>
where
    U: SerialRead + SerialWrite + ReadReady,
    D: DelayNs,
{
    /// Create a new driver. The DS2480B powers up in command mode.
    pub fn new(uart: U, delay: D, config: Config) -> Self {
        Self {
            uart,
            delay,
            config,
            mode: Mode::Command,
        }
    }

    /// Reset the 1-Wire bus and report what answered.
    pub fn reset(&mut self) -> Result<ResetResult> {
        self.enter_mode(Mode::Command)?;
        self.send(&[ds2480::RESET])?;
        let reply = self.read_reply()?;

        if reply & ds2480::RESET_REPLY_MASK != ds2480::RESET_REPLY_MASK {
            error!("Unexpected reset reply 0x{:02X}", reply);
            return Err(Error::Protocol(format!("reset reply 0x{:02X}", reply)));
        }

        let result = match reply & 0x03 {
            0b00 => ResetResult::Shorted,
            0b01 => ResetResult::Presence,
            0b10 => ResetResult::AlarmingPresence,
            _ => ResetResult::NoPresence,
        };
        trace!("1-Wire reset: {:?}", result);
        Ok(result)
    }

    /// Write one byte on the 1-Wire bus.
    pub fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.enter_mode(Mode::Data)?;
        if byte == ds2480::COMMAND_MODE {
            self.send(&[byte, byte])?;
        } else {
            self.send(&[byte])?;
        }

        let echo = self.read_reply()?;
        if echo != byte {
            return Err(Error::Protocol(format!(
                "1-Wire echo 0x{:02X} for written byte 0x{:02X}",
                echo, byte
            )));
        }
        Ok(())
    }

    /// Read one byte from the 1-Wire bus.
    pub fn read_byte(&mut self) -> Result<u8> {
        self.enter_mode(Mode::Data)?;
        self.send(&[ds2480::READ_SLOT])?;
        self.read_reply()
    }

    /// Write a sequence of bytes, e.g. a ROM command and its argument.
    pub fn write_command(&mut self, bytes: &[u8]) -> Result<()> {
        for &byte in bytes {
            self.write_byte(byte)?;
        }
        Ok(())
    }

    pub fn read_data(&mut self, buf: &mut [u8]) -> Result<()> {
        for slot in buf.iter_mut() {
            *slot = self.read_byte()?;
        }
        Ok(())
    }

    /// Read the 64-bit ROM code of the only device on the bus.
    pub fn read_rom(&mut self) -> Result<[u8; 8]> {
        self.reset_expect_presence()?;
        self.write_byte(rom::READ)?;

        let mut code = [0u8; 8];
        self.read_data(&mut code)?;
        check_crc(&code)?;
        debug!("ROM code {}", hex::encode_upper(code));
        Ok(code)
    }

    /// Reset and address every device on the bus.
    pub fn skip_rom(&mut self) -> Result<()> {
        self.reset_expect_presence()?;
        self.write_byte(rom::SKIP)
    }

    /// Reset and address the device with the given ROM code.
    pub fn match_rom(&mut self, code: &[u8; 8]) -> Result<()> {
        self.reset_expect_presence()?;
        self.write_byte(rom::MATCH)?;
        self.write_command(code)
    }

    /// Convert and read the temperature of a single DS18B20 (°C).
    pub fn read_temperature(&mut self) -> Result<f32> {
        self.skip_rom()?;
        self.write_byte(ds18b20::CONVERT_T)?;
        self.delay.delay_ms(self.config.conversion_time_ms);

        self.skip_rom()?;
        self.write_byte(ds18b20::READ_SCRATCHPAD)?;
        let mut scratchpad = [0u8; ds18b20::SCRATCHPAD_LEN];
        self.read_data(&mut scratchpad)?;
        check_crc(&scratchpad)?;

        let raw = i16::from_le_bytes([scratchpad[0], scratchpad[1]]);
        let celsius = raw as f32 * ds18b20::RESOLUTION;
        trace!("DS18B20 raw 0x{:04X} -> {:.4} °C", raw, celsius);
        Ok(celsius)
    }

    fn reset_expect_presence(&mut self) -> Result<()> {
        let result = self.reset()?;
        if !result.device_present() {
            warn!("No 1-Wire device answered reset: {:?}", result);
            return Err(Error::Protocol(format!("no device present ({:?})", result)));
        }
        Ok(())
    }

    fn enter_mode(&mut self, mode: Mode) -> Result<()> {
        if self.mode != mode {
            let byte = match mode {
                Mode::Command => ds2480::COMMAND_MODE,
                Mode::Data => ds2480::DATA_MODE,
            };
            self.send(&[byte])?;
            self.mode = mode;
        }
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.uart.write_all(bytes).map_err(Error::serial)?;
        self.uart.flush().map_err(Error::serial)
    }

    fn read_reply(&mut self) -> Result<u8> {
        let mut remaining = self.config.read_timeout_ms;
        loop {
            if self.uart.read_ready().map_err(Error::serial)? {
                let mut byte = [0u8; 1];
                if self.uart.read(&mut byte).map_err(Error::serial)? == 1 {
                    return Ok(byte[0]);
                }
            }
            if remaining == 0 {
                return Err(Error::Timeout("DS2480B reply".into()));
            }
            remaining -= 1;
            self.delay.delay_ms(1);
        }
    }
}

fn check_crc(data: &[u8]) -> Result<()> {
    let (payload, crc) = data.split_at(data.len() - 1);
    let expected = crc8(payload);
    if expected != crc[0] {
        return Err(Error::Crc {
            expected,
            actual: crc[0],
        });
    }
    Ok(())
}

inventory::submit! {
    ClickDescriptor {
        name: "UART 1-Wire",
        module: "click::uart_1wire",
        chip: "DS2480B",
        interfaces: Interface::UART,
        default_config: Some(default_config::<Config>),
    }
}
