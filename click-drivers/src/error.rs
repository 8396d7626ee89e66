//! Common error types for click-drivers.
//!
//! This module provides a centralized Error enum using thiserror. Bus errors
//! coming from the HAL traits are reduced to their portable `ErrorKind` so a
//! single error type can cover every driver regardless of which HAL
//! implementation it was built with.

use thiserror::Error;

/// Main error type for click driver operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I2C bus errors
    #[error("I2C bus error: {0:?}")]
    I2c(embedded_hal::i2c::ErrorKind),

    /// SPI bus errors
    #[error("SPI bus error: {0:?}")]
    Spi(embedded_hal::spi::ErrorKind),

    /// GPIO pin errors
    #[error("GPIO error: {0:?}")]
    Pin(embedded_hal::digital::ErrorKind),

    /// PWM channel errors
    #[error("PWM error: {0:?}")]
    Pwm(embedded_hal::pwm::ErrorKind),

    /// UART errors
    #[error("Serial error: {0:?}")]
    Serial(embedded_io::ErrorKind),

    /// Analog input errors
    #[error("ADC error: {0}")]
    Adc(String),

    /// Caller passed a value the device cannot represent
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Memory access outside of the device
    #[error("Address range 0x{addr:06X}+{len} exceeds capacity 0x{capacity:06X}")]
    AddressOutOfRange { addr: u32, len: usize, capacity: u32 },

    /// Device identification did not match
    #[error("Device ID mismatch: {0}")]
    DeviceIdMismatch(String),

    /// Checksum over device data did not match
    #[error("CRC mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    Crc { expected: u8, actual: u8 },

    /// Device did not answer within the polling budget
    #[error("Timeout waiting for {0}")]
    Timeout(String),

    /// Modem answered a command with an error result code
    #[error("Command rejected: {0}")]
    Rejected(String),

    /// Device answered with something we cannot decode
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Map an I2C bus error.
    pub fn i2c<E: embedded_hal::i2c::Error>(e: E) -> Self {
        Error::I2c(e.kind())
    }

    /// Map an SPI bus error.
    pub fn spi<E: embedded_hal::spi::Error>(e: E) -> Self {
        Error::Spi(e.kind())
    }

    /// Map a GPIO error.
    pub fn pin<E: embedded_hal::digital::Error>(e: E) -> Self {
        Error::Pin(e.kind())
    }

    /// Map a PWM error.
    pub fn pwm<E: embedded_hal::pwm::Error>(e: E) -> Self {
        Error::Pwm(e.kind())
    }

    /// Map a UART error.
    pub fn serial<E: embedded_io::Error>(e: E) -> Self {
        Error::Serial(e.kind())
    }

    /// Map an analog input error.
    pub fn adc<E: std::fmt::Debug>(e: E) -> Self {
        Error::Adc(format!("{:?}", e))
    }
}

/// Convenience type alias for Results using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
