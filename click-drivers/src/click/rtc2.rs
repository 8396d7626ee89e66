//! RTC 2 Click Driver
//!
//! Maxim DS1307 battery-backed real-time clock with 56 bytes of SRAM.
//! Time and date registers are BCD. The driver always writes 24-hour time
//! but decodes either hour format on read.
//!
//! Datasheet: <https://www.analog.com/media/en/technical-documentation/data-sheets/DS1307.pdf>

use serde::{Deserialize, Serialize};
use time::{Date, Month, PrimitiveDateTime, Time};

use crate::catalog::{ClickDescriptor, Interface};
use crate::config::default_config;
use crate::error::{Error, Result};
use crate::hw_trait::I2c;
use crate::tracing::prelude::*;

pub const DEFAULT_I2C_ADDR: u8 = 0x68;

pub const RAM_START: u8 = 0x08;
pub const RAM_SIZE: usize = 56;

mod reg {
    pub const SECONDS: u8 = 0x00;
    pub const DAY: u8 = 0x03;
    pub const CONTROL: u8 = 0x07;
}

/// Clock halt, bit 7 of the seconds register
const CH: u8 = 0x80;
/// 12-hour mode select in the hours register
const HOUR_12: u8 = 0x40;
/// PM flag in 12-hour mode
const PM: u8 = 0x20;

/// SQW/OUT pin function (control register)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SquareWave {
    /// Oscillator output off, pin held low
    Low,
    /// Oscillator output off, pin held high
    High,
    Hz1,
    Hz4096,
    Hz8192,
    Hz32768,
}

impl SquareWave {
    fn control(self) -> u8 {
        const OUT: u8 = 0x80;
        const SQWE: u8 = 0x10;
        match self {
            SquareWave::Low => 0x00,
            SquareWave::High => OUT,
            SquareWave::Hz1 => SQWE,
            SquareWave::Hz4096 => SQWE | 0x01,
            SquareWave::Hz8192 => SQWE | 0x02,
            SquareWave::Hz32768 => SQWE | 0x03,
        }
    }
}

pub fn bcd_to_bin(bcd: u8) -> u8 {
    (bcd >> 4) * 10 + (bcd & 0x0F)
}

pub fn bin_to_bcd(bin: u8) -> u8 {
    ((bin / 10) << 4) | (bin % 10)
}

// Hours register to 0..=23 for either hour format.
fn decode_hours(reg: u8) -> u8 {
    if reg & HOUR_12 == 0 {
        return bcd_to_bin(reg & 0x3F);
    }
    let hour = bcd_to_bin(reg & 0x1F) % 12;
    if reg & PM != 0 {
        hour + 12
    } else {
        hour
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub i2c_address: u8,
    /// SQW/OUT function programmed by `default_cfg`
    pub square_wave: SquareWave,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            i2c_address: DEFAULT_I2C_ADDR,
            square_wave: SquareWave::Low,
        }
    }
}

/// RTC 2 driver
pub struct Rtc2<I2C> {
    i2c: I2C,
    config: Config,
}

impl<I2C: I2c> Rtc2<I2C> {
    pub fn new(i2c: I2C, config: Config) -> Self {
        Self { i2c, config }
    }

    /// Start the oscillator and program the SQW/OUT pin.
    pub fn default_cfg(&mut self) -> Result<()> {
        debug!("Initializing DS1307");
        self.start()?;
        self.set_square_wave(self.config.square_wave)
    }

    pub fn get_time(&mut self) -> Result<Time> {
        let mut regs = [0u8; 3];
        self.read_registers(reg::SECONDS, &mut regs)?;
        let seconds = bcd_to_bin(regs[0] & !CH);
        let minutes = bcd_to_bin(regs[1] & 0x7F);
        let hours = decode_hours(regs[2]);
        Time::from_hms(hours, minutes, seconds)
            .map_err(|e| Error::Protocol(format!("invalid time {:02X?}: {}", regs, e)))
    }

    /// Set the time in 24-hour format, leaving the run state unchanged.
    pub fn set_time(&mut self, time: Time) -> Result<()> {
        let halted = self.read_register(reg::SECONDS)? & CH;
        trace!("Setting time {}", time);
        self.write_registers(
            reg::SECONDS,
            &[
                bin_to_bcd(time.second()) | halted,
                bin_to_bcd(time.minute()),
                bin_to_bcd(time.hour()),
            ],
        )
    }

    pub fn get_date(&mut self) -> Result<Date> {
        let mut regs = [0u8; 4];
        self.read_registers(reg::DAY, &mut regs)?;
        let day = bcd_to_bin(regs[1] & 0x3F);
        let month = Month::try_from(bcd_to_bin(regs[2] & 0x1F))
            .map_err(|e| Error::Protocol(format!("invalid month: {}", e)))?;
        let year = 2000 + bcd_to_bin(regs[3]) as i32;
        Date::from_calendar_date(year, month, day)
            .map_err(|e| Error::Protocol(format!("invalid date {:02X?}: {}", regs, e)))
    }

    /// Set the date. The day-of-week register is derived from the date,
    /// Monday = 1.
    pub fn set_date(&mut self, date: Date) -> Result<()> {
        if !(2000..=2099).contains(&date.year()) {
            return Err(Error::InvalidArgument(format!(
                "year {} outside 2000..=2099",
                date.year()
            )));
        }
        trace!("Setting date {}", date);
        self.write_registers(
            reg::DAY,
            &[
                date.weekday().number_from_monday(),
                bin_to_bcd(date.day()),
                bin_to_bcd(date.month() as u8),
                bin_to_bcd((date.year() - 2000) as u8),
            ],
        )
    }

    pub fn get_datetime(&mut self) -> Result<PrimitiveDateTime> {
        let date = self.get_date()?;
        let time = self.get_time()?;
        Ok(PrimitiveDateTime::new(date, time))
    }

    pub fn set_datetime(&mut self, datetime: PrimitiveDateTime) -> Result<()> {
        self.set_date(datetime.date())?;
        self.set_time(datetime.time())
    }

    /// Clear the clock halt bit.
    pub fn start(&mut self) -> Result<()> {
        let seconds = self.read_register(reg::SECONDS)?;
        if seconds & CH != 0 {
            debug!("Starting DS1307 oscillator");
            self.write_registers(reg::SECONDS, &[seconds & !CH])?;
        }
        Ok(())
    }

    /// Set the clock halt bit.
    pub fn stop(&mut self) -> Result<()> {
        let seconds = self.read_register(reg::SECONDS)?;
        self.write_registers(reg::SECONDS, &[seconds | CH])
    }

    pub fn is_running(&mut self) -> Result<bool> {
        Ok(self.read_register(reg::SECONDS)? & CH == 0)
    }

    pub fn set_square_wave(&mut self, wave: SquareWave) -> Result<()> {
        self.write_registers(reg::CONTROL, &[wave.control()])
    }

    /// Read battery-backed RAM starting at `offset` (0..56).
    pub fn read_ram(&mut self, offset: usize, buf: &mut [u8]) -> Result<()> {
        check_ram_range(offset, buf.len())?;
        self.read_registers(RAM_START + offset as u8, buf)
    }

    pub fn write_ram(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        check_ram_range(offset, data.len())?;
        self.write_registers(RAM_START + offset as u8, data)
    }

    fn read_register(&mut self, register: u8) -> Result<u8> {
        let mut value = [0u8; 1];
        self.read_registers(register, &mut value)?;
        Ok(value[0])
    }

    fn read_registers(&mut self, start: u8, buf: &mut [u8]) -> Result<()> {
        self.i2c
            .write_read(self.config.i2c_address, &[start], buf)
            .map_err(Error::i2c)
    }

    fn write_registers(&mut self, start: u8, data: &[u8]) -> Result<()> {
        let mut frame = Vec::with_capacity(data.len() + 1);
        frame.push(start);
        frame.extend_from_slice(data);
        self.i2c
            .write(self.config.i2c_address, &frame)
            .map_err(Error::i2c)
    }
}

fn check_ram_range(offset: usize, len: usize) -> Result<()> {
    if offset + len > RAM_SIZE {
        return Err(Error::AddressOutOfRange {
            addr: offset as u32,
            len,
            capacity: RAM_SIZE as u32,
        });
    }
    Ok(())
}

inventory::submit! {
    ClickDescriptor {
        name: "RTC 2",
        module: "click::rtc2",
        chip: "DS1307",
        interfaces: Interface::I2C,
        default_config: Some(default_config::<Config>),
    }
}
