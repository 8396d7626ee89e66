//! Serializer Click Driver
//!
//! Octal industrial digital input serializer (MAX31911 family). Each SPI
//! read clocks out a 16-bit frame:
//!
//! ```text
//! byte 0: IN8 .. IN1
//! byte 1: UVFAULT OTFAULT FLDALRM CRC4 .. CRC0
//! ```
//!
//! The 5-bit CRC covers the input byte. FAULT and UVLO are open-drain
//! outputs, both active low.

use bitflags::bitflags;
use bitvec::prelude::*;
use crc_all::Crc;

use crate::catalog::{ClickDescriptor, Interface};
use crate::error::{Error, Result};
use crate::hw_trait::{InputPin, SpiDevice};
use crate::tracing::prelude::*;

pub const CHANNELS: usize = 8;

bitflags! {
    /// Status bits from the upper three bits of the second frame byte
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FrameStatus: u8 {
        const FIELD_ALARM = 0b001;
        const OVER_TEMPERATURE = 0b010;
        const UNDER_VOLTAGE = 0b100;
    }
}

/// CRC-5-ITU (x^5 + x^4 + x^2 + 1), initial value 0, not reflected.
pub fn crc5(data: u8) -> u8 {
    const POLYNOMIAL: u8 = 0x15;
    const WIDTH: usize = 5;
    let mut crc = Crc::<u8>::new(POLYNOMIAL, WIDTH, 0x00, 0x00, false);
    crc.update(&[data]);
    crc.finish()
}

/// One decoded input frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputFrame {
    inputs: u8,
    status: FrameStatus,
}

impl InputFrame {
    /// Decode and verify a raw frame.
    pub fn parse(raw: [u8; 2]) -> Result<Self> {
        let inputs = raw[0];
        let view = raw[1].view_bits::<Lsb0>();
        let actual: u8 = view[0..5].load();
        let status: u8 = view[5..8].load();

        let expected = crc5(inputs);
        if expected != actual {
            return Err(Error::Crc { expected, actual });
        }

        Ok(Self {
            inputs,
            status: FrameStatus::from_bits_truncate(status),
        })
    }

    /// All input states, IN1 in bit 0.
    pub fn inputs(&self) -> u8 {
        self.inputs
    }

    /// State of input `channel` (1..=8).
    pub fn channel(&self, channel: usize) -> Result<bool> {
        if !(1..=CHANNELS).contains(&channel) {
            return Err(Error::InvalidArgument(format!(
                "channel {} outside 1..={}",
                channel, CHANNELS
            )));
        }
        Ok(self.inputs.view_bits::<Lsb0>()[channel - 1])
    }

    /// Numbers of the inputs currently active.
    pub fn active_channels(&self) -> Vec<usize> {
        self.inputs
            .view_bits::<Lsb0>()
            .iter_ones()
            .map(|i| i + 1)
            .collect()
    }

    pub fn status(&self) -> FrameStatus {
        self.status
    }

    pub fn is_under_voltage(&self) -> bool {
        self.status.contains(FrameStatus::UNDER_VOLTAGE)
    }

    pub fn is_over_temperature(&self) -> bool {
        self.status.contains(FrameStatus::OVER_TEMPERATURE)
    }

    pub fn is_field_alarm(&self) -> bool {
        self.status.contains(FrameStatus::FIELD_ALARM)
    }
}

/// Serializer driver
pub struct Serializer<SPI, FLT, UVLO> {
    spi: SPI,
    fault: FLT,
    uvlo: UVLO,
}

impl<SPI, FLT, UVLO> Serializer<SPI, FLT, UVLO>
where
    SPI: SpiDevice,
    FLT: InputPin,
    UVLO: InputPin,
{
    pub fn new(spi: SPI, fault: FLT, uvlo: UVLO) -> Self {
        Self { spi, fault, uvlo }
    }

    /// Read and verify one frame.
    pub fn read_inputs(&mut self) -> Result<InputFrame> {
        let mut raw = [0u8; 2];
        self.spi.read(&mut raw).map_err(Error::spi)?;
        trace!("Serializer frame {:02X?}", raw);

        let frame = InputFrame::parse(raw)?;
        if !frame.status().is_empty() {
            warn!("Serializer status: {:?}", frame.status());
        }
        Ok(frame)
    }

    pub fn is_fault(&mut self) -> Result<bool> {
        self.fault.is_low().map_err(Error::pin)
    }

    pub fn is_under_voltage(&mut self) -> Result<bool> {
        self.uvlo.is_low().map_err(Error::pin)
    }
}

inventory::submit! {
    ClickDescriptor {
        name: "Serializer",
        module: "click::serializer",
        chip: "MAX31911",
        interfaces: Interface::SPI.union(Interface::GPIO),
        default_config: None,
    }
}
