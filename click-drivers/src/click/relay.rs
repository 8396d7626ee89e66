//! Relay Click Driver
//!
//! Two G6D-1A-ASI relays switched directly by the RL1 and RL2 pins. The
//! pins cannot be read back, so relay state is tracked by the driver.

use strum::{Display, EnumIter, IntoEnumIterator};

use crate::catalog::{ClickDescriptor, Interface};
use crate::error::{Error, Result};
use crate::hw_trait::{OutputPin, PinState};
use crate::tracing::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum Relay {
    #[strum(to_string = "RL1")]
    One,
    #[strum(to_string = "RL2")]
    Two,
}

/// Relay driver
pub struct RelayClick<RL1, RL2> {
    rl1: RL1,
    rl2: RL2,
    state: [bool; 2],
}

impl<RL1, RL2> RelayClick<RL1, RL2>
where
    RL1: OutputPin,
    RL2: OutputPin,
{
    pub fn new(rl1: RL1, rl2: RL2) -> Self {
        Self {
            rl1,
            rl2,
            state: [false; 2],
        }
    }

    /// Open both relays.
    pub fn default_cfg(&mut self) -> Result<()> {
        for relay in Relay::iter() {
            self.set(relay, false)?;
        }
        Ok(())
    }

    pub fn set(&mut self, relay: Relay, on: bool) -> Result<()> {
        trace!("{} {}", relay, if on { "on" } else { "off" });
        let level = PinState::from(on);
        match relay {
            Relay::One => self.rl1.set_state(level).map_err(Error::pin)?,
            Relay::Two => self.rl2.set_state(level).map_err(Error::pin)?,
        }
        self.state[relay as usize] = on;
        Ok(())
    }

    pub fn toggle(&mut self, relay: Relay) -> Result<()> {
        self.set(relay, !self.is_on(relay))
    }

    pub fn is_on(&self, relay: Relay) -> bool {
        self.state[relay as usize]
    }
}

inventory::submit! {
    ClickDescriptor {
        name: "Relay",
        module: "click::relay",
        chip: "G6D-1A-ASI",
        interfaces: Interface::GPIO,
        default_config: None,
    }
}
