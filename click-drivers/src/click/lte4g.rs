//! 4G LTE Click Driver
//!
//! Telit LE910 LTE modem controlled with AT commands over the UART. The
//! PWRKEY pin switches the module on.

use serde::{Deserialize, Serialize};

use crate::catalog::{ClickDescriptor, Interface};
use crate::config::default_config;
use crate::error::{Error, Result};
use crate::hw_trait::{DelayNs, OutputPin, ReadReady, SerialRead, SerialWrite};
use crate::protocol::at::{
    self as at, parse_registration, parse_signal_quality, AtChannel, AtConfig, AtResponse,
    RegistrationStatus, SignalQuality, CTRL_Z,
};
use crate::tracing::prelude::*;

/// Longest SMS text accepted in GSM 7-bit text mode
pub const MAX_SMS_LEN: usize = 160;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Access point name; `default_cfg` skips APN setup when empty
    pub apn: String,
    /// PWRKEY assertion time (ms)
    pub pwrkey_pulse_ms: u32,
    /// Wait after power-on before the modem accepts commands (ms)
    pub boot_time_ms: u32,
    pub at: AtConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            apn: String::new(),
            pwrkey_pulse_ms: 2000,
            boot_time_ms: 5000,
            at: AtConfig::default(),
        }
    }
}

/// 4G LTE driver
pub struct Lte4g<U, D, PWK> {
    at: AtChannel<U, D>,
    pwrkey: PWK,
    config: Config,
}

impl<U, D, PWK> Lte4g<U, D, PWK>
where
    U: SerialRead + SerialWrite + ReadReady,
    D: DelayNs,
    PWK: OutputPin,
{
    pub fn new(uart: U, delay: D, pwrkey: PWK, config: Config) -> Self {
        let at = AtChannel::new(uart, delay, config.at.clone());
        Self { at, pwrkey, config }
    }

    /// Power the module on, check it responds and set the APN.
    pub fn default_cfg(&mut self) -> Result<()> {
        info!("Initializing LE910 modem");
        self.power_on()?;
        self.check()?;
        if !self.config.apn.is_empty() {
            let apn = self.config.apn.clone();
            self.set_apn(&apn)?;
        }
        Ok(())
    }

    pub fn power_on(&mut self) -> Result<()> {
        debug!("Pulsing LE910 PWRKEY");
        self.pwrkey.set_high().map_err(Error::pin)?;
        self.at.delay().delay_ms(self.config.pwrkey_pulse_ms);
        self.pwrkey.set_low().map_err(Error::pin)?;
        self.at.delay().delay_ms(self.config.boot_time_ms);
        Ok(())
    }

    pub fn command(&mut self, cmd: &str) -> Result<AtResponse> {
        self.at.command(cmd)
    }

    pub fn check(&mut self) -> Result<()> {
        self.at.command("AT").map(|_| ())
    }

    /// Manufacturer, model and revision lines from `ATI`.
    pub fn module_info(&mut self) -> Result<Vec<String>> {
        Ok(self.at.command("ATI")?.lines)
    }

    pub fn set_apn(&mut self, apn: &str) -> Result<()> {
        at::check_param("APN", apn)?;
        let cmd = format!("AT+CGDCONT=1,\"IP\",\"{}\"", apn);
        self.at.command(&cmd).map(|_| ())
    }

    pub fn registration(&mut self) -> Result<RegistrationStatus> {
        let response = self.at.command("AT+CREG?")?;
        let status = parse_registration(&response, "+CREG")?;
        debug!("Network registration: {}", status);
        Ok(status)
    }

    /// Name of the selected operator, or None when no operator is selected.
    pub fn operator(&mut self) -> Result<Option<String>> {
        let response = self.at.command("AT+COPS?")?;
        let line = response
            .line_with_prefix("+COPS:")
            .ok_or_else(|| Error::Protocol(format!("no +COPS line in {:?}", response.lines)))?;
        Ok(line.split('"').nth(1).map(str::to_string))
    }

    pub fn signal_quality(&mut self) -> Result<SignalQuality> {
        let response = self.at.command("AT+CSQ")?;
        parse_signal_quality(&response)
    }

    /// Send a text message. Returns the message reference.
    pub fn send_sms(&mut self, number: &str, text: &str) -> Result<u8> {
        at::check_param("number", number)?;
        if text.len() > MAX_SMS_LEN {
            return Err(Error::InvalidArgument(format!(
                "SMS of {} bytes exceeds {}",
                text.len(),
                MAX_SMS_LEN
            )));
        }
        if text.as_bytes().contains(&CTRL_Z) {
            return Err(Error::InvalidArgument("SMS text contains Ctrl-Z".into()));
        }

        self.at.command("AT+CMGF=1")?;
        self.at.send(&format!("AT+CMGS=\"{}\"", number))?;
        self.at.wait_for(">")?;

        let mut body = Vec::with_capacity(text.len() + 1);
        body.extend_from_slice(text.as_bytes());
        body.push(CTRL_Z);
        self.at.write_raw(&body)?;

        let response = self.at.wait_final("AT+CMGS")?;
        let reference = response
            .line_with_prefix("+CMGS:")
            .and_then(|mr| mr.parse::<u8>().ok())
            .ok_or_else(|| Error::Protocol(format!("no message reference in {:?}", response.lines)))?;
        info!("SMS to {} sent, reference {}", number, reference);
        Ok(reference)
    }
}

inventory::submit! {
    ClickDescriptor {
        name: "4G LTE",
        module: "click::lte4g",
        chip: "LE910",
        interfaces: Interface::UART.union(Interface::GPIO),
        default_config: Some(default_config::<Config>),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw_trait::mock::{MockDelay, MockPin, MockSerial};

    fn lte(serial: MockSerial) -> Lte4g<MockSerial, MockDelay, MockPin> {
        Lte4g::new(serial, MockDelay::new(), MockPin::new(false), Config::default())
    }

    fn ok_after(lines: &str) -> Vec<u8> {
        format!("\r\n{}\r\n\r\nOK\r\n", lines).into_bytes()
    }

    #[test]
    fn test_power_on_pulse() {
        let delay = MockDelay::new();
        let pwrkey = MockPin::new(false);
        let mut modem = Lte4g::new(MockSerial::new(), delay.clone(), pwrkey.clone(), Config::default());
        modem.power_on().unwrap();
        assert_eq!(pwrkey.history(), vec![true, false]);
        assert_eq!(delay.elapsed_ms(), 7000);
    }

    #[test]
    fn test_send_sms() {
        let serial = MockSerial::with_responder(|sent| match sent {
            b"AT+CMGF=1\r\n" => b"\r\nOK\r\n".to_vec(),
            b"AT+CMGS=\"+15550100\"\r\n" => b"\r\n> ".to_vec(),
            b"hello\x1A" => ok_after("+CMGS: 42"),
            _ => b"\r\nERROR\r\n".to_vec(),
        });
        let mut modem = lte(serial.clone());
        assert_eq!(modem.send_sms("+15550100", "hello").unwrap(), 42);
        assert!(serial.sent().ends_with(b"hello\x1A"));
    }

    #[test]
    fn test_sms_prompt_timeout() {
        let serial = MockSerial::with_responder(|sent| match sent {
            b"AT+CMGF=1\r\n" => b"\r\nOK\r\n".to_vec(),
            _ => Vec::new(),
        });
        let mut modem = Lte4g::new(
            serial.clone(),
            MockDelay::new(),
            MockPin::new(false),
            Config {
                at: AtConfig {
                    response_timeout_ms: 20,
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        assert!(matches!(modem.send_sms("+15550100", "hi"), Err(Error::Timeout(_))));
        assert!(!serial.sent().contains(&CTRL_Z));
    }

    #[test]
    fn test_sms_too_long() {
        let mut modem = lte(MockSerial::new());
        let text = "x".repeat(MAX_SMS_LEN + 1);
        assert!(matches!(modem.send_sms("1", &text), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_quote_in_number_rejected() {
        let serial = MockSerial::new();
        let mut modem = lte(serial.clone());
        assert!(matches!(
            modem.send_sms("+1555\"\r\nATD112;", "hi"),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(modem.set_apn("a\"b"), Err(Error::InvalidArgument(_))));
        assert!(serial.sent().is_empty());
    }

    #[test]
    fn test_operator() {
        let serial = MockSerial::with_responder(|sent| match sent {
            b"AT+COPS?\r\n" => ok_after("+COPS: 0,0,\"Example Net\",7"),
            _ => b"\r\nERROR\r\n".to_vec(),
        });
        let mut modem = lte(serial);
        assert_eq!(modem.operator().unwrap().as_deref(), Some("Example Net"));
    }

    #[test]
    fn test_no_operator() {
        let serial = MockSerial::with_responder(|_| ok_after("+COPS: 0"));
        let mut modem = lte(serial);
        assert_eq!(modem.operator().unwrap(), None);
    }

    #[test]
    fn test_module_info_and_registration() {
        let serial = MockSerial::with_responder(|sent| match sent {
            b"ATI\r\n" => ok_after("Telit\r\nLE910-EU1\r\n20.00.403"),
            b"AT+CREG?\r\n" => ok_after("+CREG: 0,5"),
            b"AT+CSQ\r\n" => ok_after("+CSQ: 99,99"),
            _ => b"\r\nERROR\r\n".to_vec(),
        });
        let mut modem = lte(serial);
        assert_eq!(modem.module_info().unwrap(), vec!["Telit", "LE910-EU1", "20.00.403"]);
        let status = modem.registration().unwrap();
        assert_eq!(status, RegistrationStatus::Roaming);
        assert!(status.is_registered());
        assert_eq!(modem.signal_quality().unwrap().dbm(), None);
    }
}
