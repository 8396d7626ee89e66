//! Hardware abstraction layer traits.
//!
//! Drivers are generic over these traits and own the handles they are given
//! at construction. I2C, SPI, GPIO and delays come straight from
//! `embedded-hal` 1.0, UART from `embedded-io`. The two concerns
//! `embedded-hal` leaves out, PWM frequency control and ADC sampling, are
//! defined here.

pub use embedded_hal::delay::DelayNs;
pub use embedded_hal::digital::{InputPin, OutputPin, PinState};
pub use embedded_hal::i2c::I2c;
pub use embedded_hal::pwm::SetDutyCycle;
pub use embedded_hal::spi::{Operation as SpiOperation, SpiDevice};
pub use embedded_io::{Read as SerialRead, ReadReady, Write as SerialWrite};

#[cfg(test)]
pub(crate) mod mock;

/// A PWM output whose carrier frequency can be changed at runtime.
///
/// Duty cycle control is inherited from [`SetDutyCycle`]; implementations
/// should keep the duty cycle ratio when the frequency changes.
pub trait PwmOut: SetDutyCycle {
    /// Set the carrier frequency in hertz.
    fn set_frequency(&mut self, hz: u32) -> Result<(), Self::Error>;

    /// Start driving the output.
    fn enable(&mut self) -> Result<(), Self::Error>;

    /// Stop driving the output; the pin idles low.
    fn disable(&mut self) -> Result<(), Self::Error>;
}

/// A single-ended analog input channel.
pub trait AnalogIn {
    type Error: core::fmt::Debug;

    /// Take one sample, right-aligned to `resolution_bits()`.
    fn read_raw(&mut self) -> Result<u16, Self::Error>;

    /// Width of a sample in bits.
    fn resolution_bits(&self) -> u8;

    /// Voltage corresponding to full scale, in millivolts.
    fn reference_mv(&self) -> f32;

    /// Take one sample and convert it to millivolts.
    fn read_mv(&mut self) -> Result<f32, Self::Error> {
        let raw = self.read_raw()?;
        let full_scale = (1u32 << self.resolution_bits()) as f32;
        Ok(raw as f32 * self.reference_mv() / full_scale)
    }
}
