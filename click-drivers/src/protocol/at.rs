//! AT-command channel for Hayes-style modems.
//!
//! This module provides a command channel that writes one command line at a
//! time and collects the modem's reply until a final result code arrives.
//! Waiting is bounded by a decrementing poll counter; there is no other
//! timing source.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::{Display, FromRepr};

use crate::error::{Error, Result};
use crate::hw_trait::{DelayNs, ReadReady, SerialRead, SerialWrite};
use crate::tracing::prelude::*;

/// Ctrl-Z, terminates SMS text after the `>` prompt.
pub const CTRL_Z: u8 = 0x1A;

/// AT channel timing and buffering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AtConfig {
    /// Budget for a final result code (ms)
    pub response_timeout_ms: u32,
    /// Delay between receive polls (ms)
    pub poll_interval_ms: u32,
    /// Receive buffer bound; older bytes are dropped first
    pub max_response_len: usize,
}

impl Default for AtConfig {
    fn default() -> Self {
        Self {
            response_timeout_ms: 5000,
            poll_interval_ms: 1,
            max_response_len: 1024,
        }
    }
}

/// Intermediate lines of a successful command, echo and blanks removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtResponse {
    pub lines: Vec<String>,
}

impl AtResponse {
    /// Find the first line starting with `prefix` and return the remainder,
    /// trimmed.
    pub fn line_with_prefix(&self, prefix: &str) -> Option<&str> {
        self.lines
            .iter()
            .find_map(|line| line.strip_prefix(prefix))
            .map(str::trim)
    }

    /// First line that is not an information response (`+XXX: ...`).
    pub fn first_plain_line(&self) -> Option<&str> {
        self.lines
            .iter()
            .map(String::as_str)
            .find(|line| !line.starts_with('+'))
    }
}

/// Received signal strength as reported by `AT+CSQ`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalQuality {
    pub rssi: u8,
    pub ber: u8,
}

impl SignalQuality {
    /// RSSI in dBm, or None when the modem reports "not detectable" (99).
    pub fn dbm(&self) -> Option<i16> {
        match self.rssi {
            0..=31 => Some(-113 + 2 * self.rssi as i16),
            _ => None,
        }
    }
}

/// Network registration state from `+CREG`/`+CEREG`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromRepr)]
#[repr(u8)]
pub enum RegistrationStatus {
    #[strum(to_string = "not registered")]
    NotRegistered = 0,
    #[strum(to_string = "registered, home network")]
    Home = 1,
    #[strum(to_string = "searching")]
    Searching = 2,
    #[strum(to_string = "registration denied")]
    Denied = 3,
    #[strum(to_string = "unknown")]
    Unknown = 4,
    #[strum(to_string = "registered, roaming")]
    Roaming = 5,
}

impl RegistrationStatus {
    pub fn is_registered(&self) -> bool {
        matches!(self, RegistrationStatus::Home | RegistrationStatus::Roaming)
    }
}

/// Parse the `+CSQ: <rssi>,<ber>` line of a response.
pub fn parse_signal_quality(response: &AtResponse) -> Result<SignalQuality> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^\+CSQ:\s*(\d+),(\d+)").expect("valid regex"));

    response
        .lines
        .iter()
        .find_map(|line| re.captures(line))
        .and_then(|caps| {
            Some(SignalQuality {
                rssi: caps[1].parse().ok()?,
                ber: caps[2].parse().ok()?,
            })
        })
        .ok_or_else(|| Error::Protocol(format!("no +CSQ line in {:?}", response.lines)))
}

/// Parse the `<prefix>: <n>,<stat>` line of a registration query, where
/// prefix is `+CREG` or `+CEREG`.
pub fn parse_registration(response: &AtResponse, prefix: &str) -> Result<RegistrationStatus> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^(\+C(?:E|G)?REG):\s*\d+,(\d+)").expect("valid regex")
    });

    let stat = response
        .lines
        .iter()
        .filter_map(|line| re.captures(line))
        .find(|caps| &caps[1] == prefix)
        .and_then(|caps| caps[2].parse::<u8>().ok())
        .ok_or_else(|| Error::Protocol(format!("no {} line in {:?}", prefix, response.lines)))?;

    RegistrationStatus::from_repr(stat)
        .ok_or_else(|| Error::Protocol(format!("unknown registration state {}", stat)))
}

enum Outcome {
    Ok(AtResponse),
    Rejected(String),
}

/// Reject a command parameter that would end the command line or its
/// quoted string early.
pub fn check_param(name: &str, value: &str) -> Result<()> {
    if value.contains(['"', '\r', '\n']) {
        return Err(Error::InvalidArgument(format!(
            "{} {:?} contains a quote or line break",
            name, value
        )));
    }
    Ok(())
}

/// Command channel over a UART.
pub struct AtChannel<U, D> {
    uart: U,
    delay: D,
    config: AtConfig,
    buffer: Vec<u8>,
}

impl<U, D> AtChannel<U, D>
where
    U: SerialRead + SerialWrite + ReadReady,
    D: DelayNs,
{
    pub fn new(uart: U, delay: D, config: AtConfig) -> Self {
        Self {
            uart,
            delay,
            config,
            buffer: Vec::new(),
        }
    }

    /// Access the delay, for pin sequencing done by the modem drivers.
    pub fn delay(&mut self) -> &mut D {
        &mut self.delay
    }

    /// Write one command line terminated by CR LF.
    pub fn send(&mut self, cmd: &str) -> Result<()> {
        trace!("AT >> {}", cmd);
        let mut line = Vec::with_capacity(cmd.len() + 2);
        line.extend_from_slice(cmd.as_bytes());
        line.extend_from_slice(b"\r\n");
        self.write_raw(&line)
    }

    /// Write bytes without any terminator.
    pub fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        self.uart.write_all(data).map_err(Error::serial)?;
        self.uart.flush().map_err(Error::serial)
    }

    /// Send a command and wait for its final result code.
    pub fn command(&mut self, cmd: &str) -> Result<AtResponse> {
        self.discard_pending()?;
        self.send(cmd)?;
        self.wait_final(cmd)
    }

    /// Wait for the final result code of an already-sent command.
    pub fn wait_final(&mut self, cmd: &str) -> Result<AtResponse> {
        let mut remaining = self.poll_budget();
        loop {
            self.poll()?;
            if let Some(outcome) = self.take_final(cmd) {
                return match outcome {
                    Outcome::Ok(response) => {
                        trace!("AT << {:?} OK", response.lines);
                        Ok(response)
                    }
                    Outcome::Rejected(code) => {
                        warn!("{} rejected: {}", cmd, code);
                        Err(Error::Rejected(format!("{}: {}", cmd, code)))
                    }
                };
            }
            if remaining == 0 {
                error!("No final result code for {}", cmd);
                return Err(Error::Timeout(format!("response to {}", cmd)));
            }
            remaining -= 1;
            self.delay.delay_ms(self.config.poll_interval_ms);
        }
    }

    /// Wait until `marker` has been received, consuming input up to and
    /// including it.
    pub fn wait_for(&mut self, marker: &str) -> Result<()> {
        if marker.is_empty() {
            return Err(Error::InvalidArgument("empty AT marker".into()));
        }
        let needle = marker.as_bytes();
        let mut remaining = self.poll_budget();
        loop {
            self.poll()?;
            if let Some(pos) = self
                .buffer
                .windows(needle.len())
                .position(|window| window == needle)
            {
                self.buffer.drain(..pos + needle.len());
                return Ok(());
            }
            if let Some(Outcome::Rejected(code)) = self.take_final(marker) {
                return Err(Error::Rejected(format!("waiting for {:?}: {}", marker, code)));
            }
            if remaining == 0 {
                return Err(Error::Timeout(format!("{:?}", marker)));
            }
            remaining -= 1;
            self.delay.delay_ms(self.config.poll_interval_ms);
        }
    }

    fn poll_budget(&self) -> u32 {
        (self.config.response_timeout_ms / self.config.poll_interval_ms.max(1)).max(1)
    }

    fn discard_pending(&mut self) -> Result<()> {
        self.poll()?;
        if !self.buffer.is_empty() {
            debug!(
                "Discarding {} unsolicited bytes: {:?}",
                self.buffer.len(),
                String::from_utf8_lossy(&self.buffer)
            );
            self.buffer.clear();
        }
        Ok(())
    }

    fn poll(&mut self) -> Result<()> {
        let mut chunk = [0u8; 64];
        while self.uart.read_ready().map_err(Error::serial)? {
            let n = self.uart.read(&mut chunk).map_err(Error::serial)?;
            if n == 0 {
                break;
            }
            self.buffer.extend_from_slice(&chunk[..n]);
        }
        if self.buffer.len() > self.config.max_response_len {
            let excess = self.buffer.len() - self.config.max_response_len;
            warn!("AT receive buffer overflow, dropping {} bytes", excess);
            self.buffer.drain(..excess);
        }
        Ok(())
    }

    // Scan complete lines for a final result code. On a hit the buffer is
    // consumed through that line. Offsets are counted in raw bytes; lines
    // are decoded only for matching.
    fn take_final(&mut self, cmd: &str) -> Option<Outcome> {
        let mut lines = Vec::new();
        let mut consumed = 0;
        let mut outcome = None;
        for raw in self.buffer.split_inclusive(|&b| b == b'\n') {
            if raw.last() != Some(&b'\n') {
                break;
            }
            consumed += raw.len();
            let decoded = String::from_utf8_lossy(raw);
            let line = decoded.trim();
            if line == "OK" {
                outcome = Some(Outcome::Ok(AtResponse {
                    lines: std::mem::take(&mut lines),
                }));
                break;
            }
            if line == "ERROR" || line.starts_with("+CME ERROR") || line.starts_with("+CMS ERROR") {
                outcome = Some(Outcome::Rejected(line.to_string()));
                break;
            }
            if !line.is_empty() && line != cmd {
                lines.push(line.to_string());
            }
        }
        if outcome.is_some() {
            self.buffer.drain(..consumed);
        }
        outcome
    }
}
