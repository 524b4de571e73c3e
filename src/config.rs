//! Live-mode hardware configuration, read from a JSON file. Ported from
//! `set_mode_live`'s key lookups (`input.c`).

use crate::error::NplError;
use crate::{FREQ_MAX, FREQ_MIN};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// GPIO pin number.
    pub pin: u32,
    /// Whether a logic-high sample means "carrier dip active".
    pub activehigh: bool,
    /// Nominal sample frequency in Hz; must be even and in
    /// `[FREQ_MIN, FREQ_MAX]`.
    pub freq: u32,
    /// FreeBSD `/dev/gpioc<N>` device index; required on FreeBSD, unused
    /// elsewhere (the Linux sysfs interface has no equivalent key).
    #[serde(default)]
    pub iodev: Option<u32>,
}

impl Config {
    pub fn load(path: &str) -> Result<Self, NplError> {
        let text = std::fs::read_to_string(path).map_err(|source| NplError::ConfigIo {
            path: path.to_string(),
            source,
        })?;
        let config: Config = serde_json::from_str(&text).map_err(|source| NplError::ConfigParse {
            path: path.to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), NplError> {
        if self.freq < FREQ_MIN || self.freq > FREQ_MAX || self.freq % 2 == 1 {
            return Err(NplError::ConfigInvalid {
                field: "freq",
                reason: format!(
                    "must be an even number between {} and {} inclusive, got {}",
                    FREQ_MIN, FREQ_MAX, self.freq
                ),
            });
        }
        if cfg!(target_os = "freebsd") && self.iodev.is_none() {
            return Err(NplError::ConfigMissingKey("iodev"));
        }
        Ok(())
    }
}

/// Convenience wrapper accepting any path-like argument, for CLI use.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, NplError> {
    Config::load(&path.as_ref().to_string_lossy())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_minimal_config() {
        let json = r#"{"pin": 4, "activehigh": true, "freq": 1000}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.pin, 4);
        assert!(config.activehigh);
        assert_eq!(config.freq, 1000);
        assert_eq!(config.iodev, None);
    }

    #[test]
    fn test_rejects_odd_frequency() {
        let config = Config {
            pin: 4,
            activehigh: true,
            freq: 1001,
            iodev: None,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_out_of_range_frequency() {
        let config = Config {
            pin: 4,
            activehigh: true,
            freq: 4,
            iodev: None,
        };
        assert!(config.validate().is_err());
        let config = Config {
            pin: 4,
            activehigh: true,
            freq: 200_000,
            iodev: None,
        };
        assert!(config.validate().is_err());
    }
}
