//! Catalog of the boards supported by this crate.
//!
//! Each driver module registers a [`ClickDescriptor`] with `inventory`, so
//! the catalog needs no central list to keep in sync.

use bitflags::bitflags;

use crate::error::Result;

bitflags! {
    /// Host interfaces a board uses on its mikroBUS socket.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Interface: u8 {
        const I2C  = 0x01;
        const SPI  = 0x02;
        const UART = 0x04;
        const GPIO = 0x08;
        const PWM  = 0x10;
        const ADC  = 0x20;
    }
}

/// Static description of a supported board.
#[derive(Debug)]
pub struct ClickDescriptor {
    /// Product name, e.g. "Clock Gen 3"
    pub name: &'static str,
    /// Driver module path within this crate
    pub module: &'static str,
    /// Main chip on the board
    pub chip: &'static str,
    pub interfaces: Interface,
    /// Factory configuration as JSON; `None` for boards without a `Config`
    pub default_config: Option<fn() -> Result<String>>,
}

inventory::collect!(ClickDescriptor);

/// All registered boards, sorted by name.
pub fn boards() -> Vec<&'static ClickDescriptor> {
    let mut boards: Vec<_> = inventory::iter::<ClickDescriptor>().collect();
    boards.sort_by_key(|desc| desc.name);
    boards
}

/// Look up a board by product name, ignoring case.
pub fn find(name: &str) -> Option<&'static ClickDescriptor> {
    inventory::iter::<ClickDescriptor>().find(|desc| desc.name.eq_ignore_ascii_case(name))
}

/// Boards using every interface in `interfaces`.
pub fn using(interfaces: Interface) -> Vec<&'static ClickDescriptor> {
    boards()
        .into_iter()
        .filter(|desc| desc.interfaces.contains(interfaces))
        .collect()
}
