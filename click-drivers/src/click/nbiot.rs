//! NB IoT Click Driver
//!
//! This module provides a driver for the NB IoT Click, built around the
//! Quectel BC95 narrowband IoT modem. The modem is controlled with AT
//! commands over the UART; the RST pin forces a hardware reset.
//!
//! Payloads for UDP sockets are sent hex encoded, as the BC95 socket
//! commands expect.

use serde::{Deserialize, Serialize};

use crate::catalog::{ClickDescriptor, Interface};
use crate::config::default_config;
use crate::error::{Error, Result};
use crate::hw_trait::{DelayNs, OutputPin, ReadReady, SerialRead, SerialWrite};
use crate::protocol::at::{
    self as at, parse_registration, parse_signal_quality, AtChannel, AtConfig, AtResponse,
    RegistrationStatus, SignalQuality,
};
use crate::tracing::prelude::*;

/// Largest datagram accepted by `AT+NSOST`
pub const MAX_UDP_PAYLOAD: usize = 512;

/// NB IoT configuration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Access point name; `default_cfg` skips APN setup when empty
    pub apn: String,
    /// Frequency band selected by `default_cfg`, if any
    pub band: Option<u8>,
    /// RST assertion time (ms)
    pub reset_pulse_ms: u32,
    /// Wait after reset before the modem accepts commands (ms)
    pub boot_time_ms: u32,
    pub at: AtConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            apn: String::new(),
            band: None,
            reset_pulse_ms: 100,
            boot_time_ms: 5000,
            at: AtConfig::default(),
        }
    }
}

/// NB IoT driver
pub struct NbIot<U, D, RST> {
    at: AtChannel<U, D>,
    rst: RST,
    config: Config,
}

impl<U, D, RST> NbIot<U, D, RST>
where
    U: SerialRead + SerialWrite + ReadReady,
    D: DelayNs,
    RST: OutputPin,
{
    pub fn new(uart: U, delay: D, rst: RST, config: Config) -> Self {
        let at = AtChannel::new(uart, delay, config.at.clone());
        Self { at, rst, config }
    }

    /// Reset the modem, enable the radio and attach to the network.
    pub fn default_cfg(&mut self) -> Result<()> {
        info!("Initializing BC95 modem");
        self.reset()?;
        self.check()?;
        self.set_function(true)?;
        if let Some(band) = self.config.band {
            self.set_band(band)?;
        }
        if !self.config.apn.is_empty() {
            let apn = self.config.apn.clone();
            self.set_apn(&apn)?;
        }
        self.attach()
    }

    /// Pulse RST and wait for the modem to boot.
    pub fn reset(&mut self) -> Result<()> {
        debug!("Resetting BC95");
        self.rst.set_high().map_err(Error::pin)?;
        self.at.delay().delay_ms(self.config.reset_pulse_ms);
        self.rst.set_low().map_err(Error::pin)?;
        self.at.delay().delay_ms(self.config.boot_time_ms);
        Ok(())
    }

    /// Send a raw command line.
    pub fn command(&mut self, cmd: &str) -> Result<AtResponse> {
        self.at.command(cmd)
    }

    pub fn check(&mut self) -> Result<()> {
        self.at.command("AT").map(|_| ())
    }

    /// Full functionality (radio on) or minimum functionality.
    pub fn set_function(&mut self, full: bool) -> Result<()> {
        let cmd = format!("AT+CFUN={}", full as u8);
        self.at.command(&cmd).map(|_| ())
    }

    pub fn attach(&mut self) -> Result<()> {
        self.at.command("AT+CGATT=1").map(|_| ())
    }

    pub fn detach(&mut self) -> Result<()> {
        self.at.command("AT+CGATT=0").map(|_| ())
    }

    pub fn is_attached(&mut self) -> Result<bool> {
        let response = self.at.command("AT+CGATT?")?;
        let state = response
            .line_with_prefix("+CGATT:")
            .ok_or_else(|| Error::Protocol(format!("no +CGATT line in {:?}", response.lines)))?;
        Ok(state == "1")
    }

    pub fn set_apn(&mut self, apn: &str) -> Result<()> {
        at::check_param("APN", apn)?;
        let cmd = format!("AT+CGDCONT=1,\"IP\",\"{}\"", apn);
        self.at.command(&cmd).map(|_| ())
    }

    pub fn registration(&mut self) -> Result<RegistrationStatus> {
        let response = self.at.command("AT+CEREG?")?;
        let status = parse_registration(&response, "+CEREG")?;
        debug!("EPS registration: {}", status);
        Ok(status)
    }

    pub fn signal_quality(&mut self) -> Result<SignalQuality> {
        let response = self.at.command("AT+CSQ")?;
        parse_signal_quality(&response)
    }

    pub fn set_band(&mut self, band: u8) -> Result<()> {
        let cmd = format!("AT+NBAND={}", band);
        self.at.command(&cmd).map(|_| ())
    }

    pub fn imei(&mut self) -> Result<String> {
        let response = self.at.command("AT+CGSN=1")?;
        response
            .line_with_prefix("+CGSN:")
            .map(str::to_string)
            .ok_or_else(|| Error::Protocol(format!("no IMEI in {:?}", response.lines)))
    }

    /// Create a UDP socket bound to `port` with receive notifications on.
    /// Returns the socket id.
    pub fn open_udp_socket(&mut self, port: u16) -> Result<u8> {
        let cmd = format!("AT+NSOCR=DGRAM,17,{},1", port);
        let response = self.at.command(&cmd)?;
        let id = response
            .first_plain_line()
            .and_then(|line| line.parse::<u8>().ok())
            .ok_or_else(|| Error::Protocol(format!("no socket id in {:?}", response.lines)))?;
        debug!("Opened UDP socket {} on port {}", id, port);
        Ok(id)
    }

    /// Send a datagram. Returns the number of bytes the modem accepted.
    pub fn send_udp(&mut self, socket: u8, ip: &str, port: u16, data: &[u8]) -> Result<usize> {
        at::check_param("remote address", ip)?;
        if data.len() > MAX_UDP_PAYLOAD {
            return Err(Error::InvalidArgument(format!(
                "datagram of {} bytes exceeds {}",
                data.len(),
                MAX_UDP_PAYLOAD
            )));
        }
        let cmd = format!(
            "AT+NSOST={},{},{},{},{}",
            socket,
            ip,
            port,
            data.len(),
            hex::encode_upper(data)
        );
        let response = self.at.command(&cmd)?;

        // Reply is "<socket>,<length>"
        response
            .first_plain_line()
            .and_then(|line| line.split(',').nth(1))
            .and_then(|len| len.trim().parse::<usize>().ok())
            .ok_or_else(|| Error::Protocol(format!("unexpected NSOST reply {:?}", response.lines)))
    }

    pub fn close_socket(&mut self, socket: u8) -> Result<()> {
        let cmd = format!("AT+NSOCL={}", socket);
        self.at.command(&cmd).map(|_| ())
    }
}

inventory::submit! {
    ClickDescriptor {
        name: "NB IoT",
        module: "click::nbiot",
        chip: "BC95",
        interfaces: Interface::UART.union(Interface::GPIO),
        default_config: Some(default_config::<Config>),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw_trait::mock::{MockDelay, MockPin, MockSerial};

    // Modem answering each command line from a fixed table; unknown
    // commands get ERROR.
    fn modem(script: &[(&str, &str)]) -> MockSerial {
        let script: Vec<(String, String)> = script
            .iter()
            .map(|(cmd, reply)| (cmd.to_string(), reply.to_string()))
            .collect();
        MockSerial::with_responder(move |sent| {
            let cmd = String::from_utf8_lossy(sent).trim_end().to_string();
            let reply = script
                .iter()
                .find(|(c, _)| *c == cmd)
                .map(|(_, r)| r.as_str())
                .unwrap_or("\r\nERROR\r\n");
            reply.as_bytes().to_vec()
        })
    }

    fn nbiot(serial: MockSerial, config: Config) -> (NbIot<MockSerial, MockDelay, MockPin>, MockDelay, MockPin) {
        let delay = MockDelay::new();
        let rst = MockPin::new(false);
        let driver = NbIot::new(serial, delay.clone(), rst.clone(), config);
        (driver, delay, rst)
    }

    #[test]
    fn test_reset_pulse() {
        let (mut modem, delay, rst) = nbiot(MockSerial::new(), Config::default());
        modem.reset().unwrap();
        assert_eq!(rst.history(), vec![true, false]);
        assert_eq!(delay.elapsed_ms(), 5100);
    }

    #[test]
    fn test_default_cfg_sequence() {
        let serial = modem(&[
            ("AT", "\r\nOK\r\n"),
            ("AT+CFUN=1", "\r\nOK\r\n"),
            ("AT+NBAND=20", "\r\nOK\r\n"),
            ("AT+CGDCONT=1,\"IP\",\"iot.example\"", "\r\nOK\r\n"),
            ("AT+CGATT=1", "\r\nOK\r\n"),
        ]);
        let config = Config {
            apn: "iot.example".into(),
            band: Some(20),
            ..Default::default()
        };
        let (mut driver, _, _) = nbiot(serial.clone(), config);
        driver.default_cfg().unwrap();
        assert_eq!(
            serial.sent_string(),
            "AT\r\nAT+CFUN=1\r\nAT+NBAND=20\r\nAT+CGDCONT=1,\"IP\",\"iot.example\"\r\nAT+CGATT=1\r\n"
        );
    }

    #[test]
    fn test_registration_and_signal() {
        let serial = modem(&[
            ("AT+CEREG?", "\r\n+CEREG:0,1\r\n\r\nOK\r\n"),
            ("AT+CSQ", "\r\n+CSQ:17,99\r\n\r\nOK\r\n"),
            ("AT+CGATT?", "\r\n+CGATT:1\r\n\r\nOK\r\n"),
        ]);
        let (mut driver, _, _) = nbiot(serial, Config::default());
        assert_eq!(driver.registration().unwrap(), RegistrationStatus::Home);
        let csq = driver.signal_quality().unwrap();
        assert_eq!(csq.dbm(), Some(-79));
        assert!(driver.is_attached().unwrap());
    }

    #[test]
    fn test_imei() {
        let serial = modem(&[("AT+CGSN=1", "\r\n+CGSN:863703030000000\r\n\r\nOK\r\n")]);
        let (mut driver, _, _) = nbiot(serial, Config::default());
        assert_eq!(driver.imei().unwrap(), "863703030000000");
    }

    #[test]
    fn test_udp_socket_lifecycle() {
        let serial = modem(&[
            ("AT+NSOCR=DGRAM,17,5683,1", "\r\n0\r\n\r\nOK\r\n"),
            ("AT+NSOST=0,192.0.2.1,5683,3,01AB7F", "\r\n0,3\r\n\r\nOK\r\n"),
            ("AT+NSOCL=0", "\r\nOK\r\n"),
        ]);
        let (mut driver, _, _) = nbiot(serial, Config::default());
        let socket = driver.open_udp_socket(5683).unwrap();
        assert_eq!(socket, 0);
        let sent = driver.send_udp(socket, "192.0.2.1", 5683, &[0x01, 0xAB, 0x7F]).unwrap();
        assert_eq!(sent, 3);
        driver.close_socket(socket).unwrap();
    }

    #[test]
    fn test_oversized_datagram() {
        let serial = MockSerial::new();
        let (mut driver, _, _) = nbiot(serial.clone(), Config::default());
        let data = vec![0u8; MAX_UDP_PAYLOAD + 1];
        assert!(matches!(
            driver.send_udp(0, "192.0.2.1", 1, &data),
            Err(Error::InvalidArgument(_))
        ));
        assert!(serial.sent().is_empty());
    }

    #[test]
    fn test_line_breaks_in_parameters_rejected() {
        let serial = MockSerial::new();
        let (mut driver, _, _) = nbiot(serial.clone(), Config::default());
        assert!(matches!(
            driver.set_apn("internet\r\nAT+CFUN=0"),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            driver.send_udp(0, "192.0.2.1\"", 1, &[0]),
            Err(Error::InvalidArgument(_))
        ));
        assert!(serial.sent().is_empty());
    }

    #[test]
    fn test_rejected_command() {
        let serial = modem(&[]);
        let (mut driver, _, _) = nbiot(serial, Config::default());
        assert!(matches!(driver.attach(), Err(Error::Rejected(_))));
    }
}
