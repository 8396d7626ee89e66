//! In-memory HAL implementations for host-side tests.
//!
//! Every mock is a cheap handle around shared state, so a test can keep a
//! clone, hand the other to a driver, and inspect the bus traffic afterwards.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::i2c::{self, I2c, NoAcknowledgeSource};
use embedded_hal::pwm::SetDutyCycle;
use embedded_hal::spi::{self, SpiDevice};

use super::{AnalogIn, PwmOut};

/// One recorded I2C operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum I2cOp {
    Write(u8, Vec<u8>),
    Read(u8, usize),
}

#[derive(Default)]
struct I2cState {
    log: Vec<I2cOp>,
    reads: VecDeque<Vec<u8>>,
    fail: bool,
}

/// I2C bus that records operations and answers reads from a queue.
#[derive(Clone, Default)]
pub struct MockI2c(Rc<RefCell<I2cState>>);

impl MockI2c {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the bytes returned by the next read operation.
    pub fn queue_read(&self, data: &[u8]) {
        self.0.borrow_mut().reads.push_back(data.to_vec());
    }

    /// Make every following operation fail with a NACK.
    pub fn fail(&self) {
        self.0.borrow_mut().fail = true;
    }

    pub fn log(&self) -> Vec<I2cOp> {
        self.0.borrow().log.clone()
    }

    /// Payloads of all write operations, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.0
            .borrow()
            .log
            .iter()
            .filter_map(|op| match op {
                I2cOp::Write(_, data) => Some(data.clone()),
                I2cOp::Read(..) => None,
            })
            .collect()
    }
}

impl i2c::ErrorType for MockI2c {
    type Error = i2c::ErrorKind;
}

impl I2c for MockI2c {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [i2c::Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut state = self.0.borrow_mut();
        if state.fail {
            return Err(i2c::ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }
        for op in operations {
            match op {
                i2c::Operation::Write(bytes) => {
                    state.log.push(I2cOp::Write(address, bytes.to_vec()));
                }
                i2c::Operation::Read(buf) => {
                    state.log.push(I2cOp::Read(address, buf.len()));
                    let data = state.reads.pop_front().unwrap_or_default();
                    for (dst, src) in buf.iter_mut().zip(data.iter()) {
                        *dst = *src;
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct SpiState {
    transactions: Vec<Vec<u8>>,
    reads: VecDeque<u8>,
    fail: bool,
}

/// SPI device that records the bytes clocked out per transaction and
/// answers reads byte by byte from a queue (0x00 when empty).
#[derive(Clone, Default)]
pub struct MockSpi(Rc<RefCell<SpiState>>);

impl MockSpi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_read(&self, data: &[u8]) {
        self.0.borrow_mut().reads.extend(data.iter().copied());
    }

    pub fn fail(&self) {
        self.0.borrow_mut().fail = true;
    }

    /// Bytes written during each chip-select assertion.
    pub fn transactions(&self) -> Vec<Vec<u8>> {
        self.0.borrow().transactions.clone()
    }
}

impl spi::ErrorType for MockSpi {
    type Error = spi::ErrorKind;
}

impl SpiDevice for MockSpi {
    fn transaction(&mut self, operations: &mut [spi::Operation<'_, u8>]) -> Result<(), Self::Error> {
        let mut state = self.0.borrow_mut();
        if state.fail {
            return Err(spi::ErrorKind::ModeFault);
        }
        let mut written = Vec::new();
        for op in operations {
            match op {
                spi::Operation::Write(bytes) => written.extend_from_slice(bytes),
                spi::Operation::Read(buf) => {
                    for b in buf.iter_mut() {
                        *b = state.reads.pop_front().unwrap_or(0);
                    }
                }
                spi::Operation::Transfer(read, write) => {
                    written.extend_from_slice(write);
                    for b in read.iter_mut() {
                        *b = state.reads.pop_front().unwrap_or(0);
                    }
                }
                spi::Operation::TransferInPlace(buf) => {
                    written.extend_from_slice(buf);
                    for b in buf.iter_mut() {
                        *b = state.reads.pop_front().unwrap_or(0);
                    }
                }
                spi::Operation::DelayNs(_) => {}
            }
        }
        state.transactions.push(written);
        Ok(())
    }
}

/// GPIO pin usable as input or output. Output writes are recorded.
#[derive(Clone, Debug)]
pub struct MockPin {
    level: Rc<Cell<bool>>,
    history: Rc<RefCell<Vec<bool>>>,
}

impl MockPin {
    pub fn new(high: bool) -> Self {
        Self {
            level: Rc::new(Cell::new(high)),
            history: Rc::default(),
        }
    }

    pub fn is_set_high(&self) -> bool {
        self.level.get()
    }

    /// Drive the level seen by the driver when the pin is an input.
    pub fn set_level(&self, high: bool) {
        self.level.set(high);
    }

    /// Every level written by the driver, in order.
    pub fn history(&self) -> Vec<bool> {
        self.history.borrow().clone()
    }
}

impl embedded_hal::digital::ErrorType for MockPin {
    type Error = Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.level.set(false);
        self.history.borrow_mut().push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.level.set(true);
        self.history.borrow_mut().push(true);
        Ok(())
    }
}

impl InputPin for MockPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.level.get())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.level.get())
    }
}

/// Delay that only accumulates the requested time.
#[derive(Clone, Default)]
pub struct MockDelay(Rc<Cell<u64>>);

impl MockDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.0.get() / 1_000_000
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.0.set(self.0.get() + ns as u64);
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct PwmState {
    pub frequency: u32,
    pub duty: u16,
    pub enabled: bool,
}

/// PWM channel with a 0..=1000 duty range.
#[derive(Clone, Default)]
pub struct MockPwm(Rc<RefCell<PwmState>>);

impl MockPwm {
    pub const MAX_DUTY: u16 = 1000;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PwmState {
        *self.0.borrow()
    }
}

impl embedded_hal::pwm::ErrorType for MockPwm {
    type Error = Infallible;
}

impl SetDutyCycle for MockPwm {
    fn max_duty_cycle(&self) -> u16 {
        Self::MAX_DUTY
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        self.0.borrow_mut().duty = duty;
        Ok(())
    }
}

impl PwmOut for MockPwm {
    fn set_frequency(&mut self, hz: u32) -> Result<(), Self::Error> {
        self.0.borrow_mut().frequency = hz;
        Ok(())
    }

    fn enable(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().enabled = true;
        Ok(())
    }

    fn disable(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().enabled = false;
        Ok(())
    }
}

/// Analog input returning a settable raw sample.
#[derive(Clone)]
pub struct MockAdc {
    raw: Rc<Cell<u16>>,
    bits: u8,
    reference_mv: f32,
}

impl MockAdc {
    pub fn new(bits: u8, reference_mv: f32) -> Self {
        Self {
            raw: Rc::default(),
            bits,
            reference_mv,
        }
    }

    pub fn set_raw(&self, raw: u16) {
        self.raw.set(raw);
    }
}

impl AnalogIn for MockAdc {
    type Error = Infallible;

    fn read_raw(&mut self) -> Result<u16, Self::Error> {
        Ok(self.raw.get())
    }

    fn resolution_bits(&self) -> u8 {
        self.bits
    }

    fn reference_mv(&self) -> f32 {
        self.reference_mv
    }
}

type Responder = Box<dyn FnMut(&[u8]) -> Vec<u8>>;

#[derive(Default)]
struct SerialState {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    responder: Option<Responder>,
}

/// UART whose receive side is fed by the test, optionally by a responder
/// closure called with every buffer the driver writes.
#[derive(Clone, Default)]
pub struct MockSerial(Rc<RefCell<SerialState>>);

impl MockSerial {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responder(responder: impl FnMut(&[u8]) -> Vec<u8> + 'static) -> Self {
        let serial = Self::default();
        serial.0.borrow_mut().responder = Some(Box::new(responder));
        serial
    }

    pub fn push_rx(&self, data: &[u8]) {
        self.0.borrow_mut().rx.extend(data.iter().copied());
    }

    pub fn sent(&self) -> Vec<u8> {
        self.0.borrow().tx.clone()
    }

    pub fn sent_string(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow().tx).into_owned()
    }
}

impl embedded_io::ErrorType for MockSerial {
    type Error = embedded_io::ErrorKind;
}

impl embedded_io::Read for MockSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut state = self.0.borrow_mut();
        let mut n = 0;
        while n < buf.len() {
            match state.rx.pop_front() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}

impl embedded_io::ReadReady for MockSerial {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.0.borrow().rx.is_empty())
    }
}

impl embedded_io::Write for MockSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let mut state = self.0.borrow_mut();
        state.tx.extend_from_slice(buf);
        let reply = state.responder.as_mut().map(|respond| respond(buf));
        if let Some(reply) = reply {
            state.rx.extend(reply);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
