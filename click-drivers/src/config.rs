//! Configuration loading for board drivers.
//!
//! Every board module defines a `Config` whose `Default` holds the board's
//! factory settings. Configs are plain serde types, so a host application
//! can keep per-socket overrides in a JSON document and load only the
//! fields it wants to change; missing fields keep their defaults.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

/// Parse a board configuration from JSON.
pub fn from_json<T: DeserializeOwned>(json: &str) -> Result<T> {
    serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
}

/// Parse a board configuration from a reader producing JSON.
pub fn from_reader<T: DeserializeOwned, R: std::io::Read>(reader: R) -> Result<T> {
    serde_json::from_reader(reader).map_err(|e| Error::Config(e.to_string()))
}

/// Render a board configuration as pretty-printed JSON.
pub fn to_json<T: Serialize>(config: &T) -> Result<String> {
    serde_json::to_string_pretty(config).map_err(|e| Error::Config(e.to_string()))
}

/// Render a board's factory configuration as JSON.
pub fn default_config<T: Default + Serialize>() -> Result<String> {
    to_json(&T::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::click::{amp_2x20w, clock_gen3, nbiot, turbidity};

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config: amp_2x20w::Config = from_json(r#"{ "volume": 40 }"#).unwrap();
        assert_eq!(config.volume, 40);
        assert_eq!(config.i2c_address, amp_2x20w::Config::default().i2c_address);
    }

    #[test]
    fn test_empty_document_is_default() {
        let config: turbidity::Config = from_json("{}").unwrap();
        assert_eq!(config.reference_mv, turbidity::Config::default().reference_mv);
    }

    #[test]
    fn test_nested_at_config() {
        let config: nbiot::Config = from_json(
            r#"{ "apn": "iot.example", "at": { "response_timeout_ms": 300 } }"#,
        )
        .unwrap();
        assert_eq!(config.apn, "iot.example");
        assert_eq!(config.at.response_timeout_ms, 300);
        assert_eq!(config.at.poll_interval_ms, 1);
    }

    #[test]
    fn test_enum_fields_roundtrip() {
        let config = clock_gen3::Config {
            output: clock_gen3::ClockOutput::ClkOnly,
            ..Default::default()
        };
        let json = to_json(&config).unwrap();
        let parsed: clock_gen3::Config = from_json(&json).unwrap();
        assert_eq!(parsed.output, clock_gen3::ClockOutput::ClkOnly);
    }

    #[test]
    fn test_malformed_document() {
        let result: Result<amp_2x20w::Config> = from_json(r#"{ "volume": "loud" }"#);
        assert!(matches!(result, Err(Error::Config(_))));
        let result: Result<amp_2x20w::Config> = from_reader(&b"not json"[..]);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
