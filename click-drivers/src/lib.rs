//! Blocking drivers for MikroElektronika Click boards.
//!
//! Each board lives in its own module under [`click`] and talks to the
//! hardware only through the traits in [`hw_trait`], so the same driver
//! runs against a microcontroller HAL, a Linux userspace HAL or the test
//! mocks.

pub mod catalog;
pub mod click;
pub mod config;
pub mod error;
pub mod hw_trait;
pub mod protocol;
pub mod tracing;

pub use error::{Error, Result};
