//! Buzz Click Driver
//!
//! Magnetic buzzer driven through a transistor from a PWM pin. Pitch is
//! the PWM frequency; loudness is the duty cycle, which is loudest at 50%.

use crate::catalog::{ClickDescriptor, Interface};
use crate::error::{Error, Result};
use crate::hw_trait::{DelayNs, PwmOut};
use crate::tracing::prelude::*;

/// Note frequencies in Hz, equal temperament with A4 = 440 Hz
pub mod note {
    pub const C4: u32 = 262;
    pub const CS4: u32 = 277;
    pub const D4: u32 = 294;
    pub const DS4: u32 = 311;
    pub const E4: u32 = 330;
    pub const F4: u32 = 349;
    pub const FS4: u32 = 370;
    pub const G4: u32 = 392;
    pub const GS4: u32 = 415;
    pub const A4: u32 = 440;
    pub const AS4: u32 = 466;
    pub const B4: u32 = 494;
    pub const C5: u32 = 523;
    pub const D5: u32 = 587;
    pub const E5: u32 = 659;
    pub const F5: u32 = 698;
    pub const G5: u32 = 784;
    pub const A5: u32 = 880;
    pub const B5: u32 = 988;
    pub const C6: u32 = 1047;
}

pub const MAX_VOLUME: u8 = 100;

/// Buzz driver
pub struct Buzz<PWM, D> {
    pwm: PWM,
    delay: D,
}

impl<PWM, D> Buzz<PWM, D>
where
    PWM: PwmOut,
    D: DelayNs,
{
    pub fn new(pwm: PWM, delay: D) -> Self {
        Self { pwm, delay }
    }

    /// Set the duty cycle as a fraction of the period (0.0..=1.0).
    pub fn set_duty_cycle(&mut self, fraction: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&fraction) {
            return Err(Error::InvalidArgument(format!(
                "duty cycle {} outside 0.0..=1.0",
                fraction
            )));
        }
        let duty = (self.pwm.max_duty_cycle() as f32 * fraction).round() as u16;
        self.pwm.set_duty_cycle(duty).map_err(Error::pwm)
    }

    /// Sound a tone for `duration_ms`, then silence the buzzer.
    pub fn play(&mut self, freq_hz: u32, volume: u8, duration_ms: u32) -> Result<()> {
        if volume > MAX_VOLUME {
            return Err(Error::InvalidArgument(format!(
                "volume {} exceeds {}",
                volume, MAX_VOLUME
            )));
        }
        trace!("Playing {} Hz at volume {} for {} ms", freq_hz, volume, duration_ms);
        self.pwm.set_frequency(freq_hz).map_err(Error::pwm)?;
        self.pwm
            .set_duty_cycle_percent(volume / 2)
            .map_err(Error::pwm)?;
        self.pwm.enable().map_err(Error::pwm)?;
        self.delay.delay_ms(duration_ms);
        self.stop()
    }

    pub fn stop(&mut self) -> Result<()> {
        self.pwm.disable().map_err(Error::pwm)
    }
}

inventory::submit! {
    ClickDescriptor {
        name: "Buzz",
        module: "click::buzz",
        chip: "CMT-8540S-SMT",
        interfaces: Interface::PWM,
        default_config: None,
    }
}
