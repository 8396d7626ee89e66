//! DC Motor Click Driver
//!
//! Brushed DC motor driver built around the TI DRV8833 H-bridge. SELECT1
//! and SELECT2 choose how the bridge routes the PWM signal, nSLEEP puts the
//! bridge into low-power sleep and nFAULT reports over-current or
//! over-temperature.

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::catalog::{ClickDescriptor, Interface};
use crate::config::default_config;
use crate::error::{Error, Result};
use crate::hw_trait::{InputPin, OutputPin, PinState, PwmOut};
use crate::tracing::prelude::*;

/// Bridge mode selected by the SELECT pins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum Direction {
    Clockwise,
    CounterClockwise,
    /// Both low-side switches on
    ShortBrake,
    /// Bridge outputs high impedance, motor coasts
    Stop,
}

impl Direction {
    // SELECT1, SELECT2 levels
    fn select_levels(self) -> (bool, bool) {
        match self {
            Direction::Clockwise => (true, false),
            Direction::CounterClockwise => (false, true),
            Direction::ShortBrake => (true, true),
            Direction::Stop => (false, false),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pwm_frequency_hz: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pwm_frequency_hz: 5000,
        }
    }
}

/// DC Motor driver
pub struct DcMotor<PWM, SEL1, SEL2, SLP, FLT> {
    pwm: PWM,
    select1: SEL1,
    select2: SEL2,
    sleep: SLP,
    fault: FLT,
    config: Config,
    direction: Direction,
}

impl<PWM, SEL1, SEL2, SLP, FLT> DcMotor<PWM, SEL1, SEL2, SLP, FLT>
where
    PWM: PwmOut,
    SEL1: OutputPin,
    SEL2: OutputPin,
    SLP: OutputPin,
    FLT: InputPin,
{
    pub fn new(pwm: PWM, select1: SEL1, select2: SEL2, sleep: SLP, fault: FLT, config: Config) -> Self {
        Self {
            pwm,
            select1,
            select2,
            sleep,
            fault,
            config,
            direction: Direction::Stop,
        }
    }

    /// Wake the bridge with the motor stopped and the PWM idle.
    pub fn default_cfg(&mut self) -> Result<()> {
        debug!("Initializing DRV8833 at {} Hz", self.config.pwm_frequency_hz);
        self.pwm
            .set_frequency(self.config.pwm_frequency_hz)
            .map_err(Error::pwm)?;
        self.pwm.set_duty_cycle_fully_off().map_err(Error::pwm)?;
        self.set_direction(Direction::Stop)?;
        self.sleep(false)
    }

    pub fn set_direction(&mut self, direction: Direction) -> Result<()> {
        trace!("Motor direction: {}", direction);
        let (sel1, sel2) = direction.select_levels();
        self.select1
            .set_state(PinState::from(sel1))
            .map_err(Error::pin)?;
        self.select2
            .set_state(PinState::from(sel2))
            .map_err(Error::pin)?;
        self.direction = direction;
        Ok(())
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Put the bridge to sleep. nSLEEP is active low.
    pub fn sleep(&mut self, sleep: bool) -> Result<()> {
        if sleep {
            self.sleep.set_low().map_err(Error::pin)
        } else {
            self.sleep.set_high().map_err(Error::pin)
        }
    }

    /// Set speed as a fraction of full duty (0.0..=1.0).
    pub fn set_speed(&mut self, fraction: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&fraction) {
            return Err(Error::InvalidArgument(format!(
                "speed {} outside 0.0..=1.0",
                fraction
            )));
        }
        let duty = (self.pwm.max_duty_cycle() as f32 * fraction).round() as u16;
        self.pwm.set_duty_cycle(duty).map_err(Error::pwm)
    }

    pub fn start(&mut self) -> Result<()> {
        self.pwm.enable().map_err(Error::pwm)
    }

    pub fn stop(&mut self) -> Result<()> {
        self.pwm.disable().map_err(Error::pwm)
    }

    /// nFAULT is open drain, asserted low.
    pub fn is_fault(&mut self) -> Result<bool> {
        let fault = self.fault.is_low().map_err(Error::pin)?;
        if fault {
            warn!("DRV8833 reports a fault");
        }
        Ok(fault)
    }
}

inventory::submit! {
    ClickDescriptor {
        name: "DC Motor",
        module: "click::dc_motor",
        chip: "DRV8833",
        interfaces: Interface::PWM.union(Interface::GPIO),
        default_config: Some(default_config::<Config>),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw_trait::mock::{MockPin, MockPwm};
    use test_case::test_case;

    type Motor = DcMotor<MockPwm, MockPin, MockPin, MockPin, MockPin>;

    fn motor() -> (Motor, MockPwm, MockPin, MockPin, MockPin, MockPin) {
        let pwm = MockPwm::new();
        let sel1 = MockPin::new(false);
        let sel2 = MockPin::new(false);
        let sleep = MockPin::new(false);
        let fault = MockPin::new(true);
        let motor = DcMotor::new(
            pwm.clone(),
            sel1.clone(),
            sel2.clone(),
            sleep.clone(),
            fault.clone(),
            Config::default(),
        );
        (motor, pwm, sel1, sel2, sleep, fault)
    }

    #[test_case(Direction::Clockwise, true, false)]
    #[test_case(Direction::CounterClockwise, false, true)]
    #[test_case(Direction::ShortBrake, true, true)]
    #[test_case(Direction::Stop, false, false)]
    fn test_direction_pins(direction: Direction, sel1_high: bool, sel2_high: bool) {
        let (mut motor, _, sel1, sel2, _, _) = motor();
        motor.set_direction(direction).unwrap();
        assert_eq!(sel1.is_set_high(), sel1_high);
        assert_eq!(sel2.is_set_high(), sel2_high);
        assert_eq!(motor.direction(), direction);
    }

    #[test]
    fn test_default_cfg_wakes_stopped() {
        let (mut motor, pwm, _, _, sleep, _) = motor();
        motor.default_cfg().unwrap();
        assert!(sleep.is_set_high());
        assert_eq!(motor.direction(), Direction::Stop);
        assert_eq!(pwm.state().frequency, 5000);
        assert_eq!(pwm.state().duty, 0);
    }

    #[test]
    fn test_speed_and_run() {
        let (mut motor, pwm, ..) = motor();
        motor.set_speed(0.75).unwrap();
        motor.start().unwrap();
        assert_eq!(pwm.state().duty, 750);
        assert!(pwm.state().enabled);
        motor.stop().unwrap();
        assert!(!pwm.state().enabled);
    }

    #[test_case(-0.01; "negative")]
    #[test_case(1.01; "above full")]
    fn test_speed_out_of_range(speed: f32) {
        let (mut motor, ..) = motor();
        assert!(matches!(motor.set_speed(speed), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_sleep_and_fault() {
        let (mut motor, _, _, _, sleep, fault) = motor();
        motor.sleep(true).unwrap();
        assert!(!sleep.is_set_high());
        assert!(!motor.is_fault().unwrap());
        fault.set_level(false);
        assert!(motor.is_fault().unwrap());
    }
}
