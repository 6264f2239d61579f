//! Build-time settings of the monitor.
//!
//! Values come from the `[monitor-esp32]` table of `cfg.toml` at the crate root and are
//! baked into the firmware. Everything is stored as text and validated once at startup
//! into a [`MonitorConfig`].

use std::{fmt, time::Duration};

#[toml_cfg::toml_config]
pub struct Config {
    #[default("")]
    wifi_ssid: &'static str,
    #[default("")]
    wifi_psk: &'static str,
    #[default("wpa2")]
    wifi_auth: &'static str,
    #[default("")]
    endpoint: &'static str,
    #[default("10")]
    report_interval_secs: &'static str,
    #[default("30")]
    connect_timeout_secs: &'static str,
    #[default("5")]
    http_timeout_secs: &'static str,
    #[default("112")]
    current_zero_offset: &'static str,
    #[default("0.04028320312")]
    current_gain: &'static str,
    #[default("true")]
    gate_on_connectivity: &'static str,
}

/// Error types related to loading the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required key is empty.
    Missing(&'static str),
    /// A key holds something that cannot be parsed or is out of range.
    Invalid { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "`{key}` must be set in cfg.toml"),
            ConfigError::Invalid { key, value } => write!(f, "`{key}` has invalid value {value:?}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Minimum authentication strength the station accepts from an access point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStrength {
    Open,
    Wep,
    Wpa,
    Wpa2,
    WpaWpa2,
    Wpa3,
    Wpa2Wpa3,
}

impl AuthStrength {
    fn parse(value: &str) -> Option<Self> {
        let strength = match value.trim().to_ascii_lowercase().as_str() {
            "open" | "none" => AuthStrength::Open,
            "wep" => AuthStrength::Wep,
            "wpa" => AuthStrength::Wpa,
            "wpa2" => AuthStrength::Wpa2,
            "wpa_wpa2" => AuthStrength::WpaWpa2,
            "wpa3" => AuthStrength::Wpa3,
            "wpa2_wpa3" => AuthStrength::Wpa2Wpa3,
            _ => return None,
        };
        Some(strength)
    }
}

/// Credentials of the network to join in station mode.
#[derive(Clone, PartialEq, Eq)]
pub struct WifiCredentials {
    pub ssid: String,
    pub password: String,
    pub auth: AuthStrength,
}

impl fmt::Debug for WifiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WifiCredentials")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .field("auth", &self.auth)
            .finish()
    }
}

/// Raw, unvalidated settings. Mirrors the `cfg.toml` keys one to one.
#[derive(Debug, Clone, Copy)]
pub struct RawSettings<'a> {
    pub wifi_ssid: &'a str,
    pub wifi_psk: &'a str,
    pub wifi_auth: &'a str,
    pub endpoint: &'a str,
    pub report_interval_secs: &'a str,
    pub connect_timeout_secs: &'a str,
    pub http_timeout_secs: &'a str,
    pub current_zero_offset: &'a str,
    pub current_gain: &'a str,
    pub gate_on_connectivity: &'a str,
}

impl Default for RawSettings<'static> {
    fn default() -> Self {
        RawSettings {
            wifi_ssid: "",
            wifi_psk: "",
            wifi_auth: "wpa2",
            endpoint: "",
            report_interval_secs: "10",
            connect_timeout_secs: "30",
            http_timeout_secs: "5",
            current_zero_offset: "112",
            current_gain: "0.04028320312",
            gate_on_connectivity: "true",
        }
    }
}

/// Validated configuration consumed by the rest of the firmware.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub wifi: WifiCredentials,
    pub endpoint: String,
    pub report_interval: Duration,
    pub connect_timeout: Duration,
    pub http_timeout: Duration,
    pub current_zero_offset: i32,
    pub current_gain: f64,
    pub gate_on_connectivity: bool,
}

impl MonitorConfig {
    /// Loads the configuration baked in from `cfg.toml`.
    ///
    /// # Errors
    ///
    /// See [`MonitorConfig::parse`].
    pub fn from_build_config() -> Result<Self, ConfigError> {
        Self::parse(RawSettings {
            wifi_ssid: CONFIG.wifi_ssid,
            wifi_psk: CONFIG.wifi_psk,
            wifi_auth: CONFIG.wifi_auth,
            endpoint: CONFIG.endpoint,
            report_interval_secs: CONFIG.report_interval_secs,
            connect_timeout_secs: CONFIG.connect_timeout_secs,
            http_timeout_secs: CONFIG.http_timeout_secs,
            current_zero_offset: CONFIG.current_zero_offset,
            current_gain: CONFIG.current_gain,
            gate_on_connectivity: CONFIG.gate_on_connectivity,
        })
    }

    /// Validates raw settings.
    ///
    /// # Errors
    ///
    /// - `ConfigError::Missing`: If the SSID or the endpoint are empty.
    /// - `ConfigError::Invalid`: If a value does not parse, the endpoint is not an http(s)
    ///   URL, the interval or a timeout is zero or the gain is not a finite positive number.
    pub fn parse(raw: RawSettings<'_>) -> Result<Self, ConfigError> {
        let ssid = raw.wifi_ssid.trim();
        if ssid.is_empty() {
            return Err(ConfigError::Missing("wifi_ssid"));
        }
        let auth = AuthStrength::parse(raw.wifi_auth).ok_or_else(|| invalid("wifi_auth", raw.wifi_auth))?;

        let endpoint = raw.endpoint.trim();
        if endpoint.is_empty() {
            return Err(ConfigError::Missing("endpoint"));
        }
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(invalid("endpoint", endpoint));
        }

        let report_interval = parse_nonzero_secs("report_interval_secs", raw.report_interval_secs)?;

        let current_gain: f64 = parse_value("current_gain", raw.current_gain)?;
        if !current_gain.is_finite() || current_gain <= 0.0 {
            return Err(invalid("current_gain", raw.current_gain));
        }

        Ok(MonitorConfig {
            wifi: WifiCredentials {
                ssid: ssid.to_string(),
                password: raw.wifi_psk.to_string(),
                auth,
            },
            endpoint: endpoint.to_string(),
            report_interval,
            connect_timeout: parse_nonzero_secs("connect_timeout_secs", raw.connect_timeout_secs)?,
            http_timeout: parse_nonzero_secs("http_timeout_secs", raw.http_timeout_secs)?,
            current_zero_offset: parse_value("current_zero_offset", raw.current_zero_offset)?,
            current_gain,
            gate_on_connectivity: parse_value("gate_on_connectivity", raw.gate_on_connectivity)?,
        })
    }
}

fn invalid(key: &'static str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
    }
}

fn parse_value<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| invalid(key, value))
}

fn parse_nonzero_secs(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    match parse_value::<u64>(key, value)? {
        0 => Err(invalid(key, value)),
        secs => Ok(Duration::from_secs(secs)),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn valid_settings() -> RawSettings<'static> {
        RawSettings {
            wifi_ssid: "workshop",
            wifi_psk: "hunter22",
            endpoint: "http://10.0.0.2:8080/api/readings",
            ..Default::default()
        }
    }

    #[test]
    fn test0_defaults_match_sensor_constants() {
        let config = MonitorConfig::parse(valid_settings()).unwrap();
        assert_eq!(config.report_interval, Duration::from_secs(10));
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.http_timeout, Duration::from_secs(5));
        assert_eq!(config.current_zero_offset, 112);
        assert_eq!(config.current_gain, 0.04028320312);
        assert_eq!(config.wifi.auth, AuthStrength::Wpa2);
        assert!(config.gate_on_connectivity);
    }

    #[test]
    fn test1_missing_ssid_is_rejected() {
        let raw = RawSettings {
            wifi_ssid: "  ",
            ..valid_settings()
        };
        assert_eq!(MonitorConfig::parse(raw), Err(ConfigError::Missing("wifi_ssid")));
    }

    #[test]
    fn test2_endpoint_must_be_http() {
        let raw = RawSettings {
            endpoint: "ftp://10.0.0.2/readings",
            ..valid_settings()
        };
        assert!(matches!(
            MonitorConfig::parse(raw),
            Err(ConfigError::Invalid { key: "endpoint", .. })
        ));
    }

    #[test]
    fn test3_zero_interval_is_rejected() {
        let raw = RawSettings {
            report_interval_secs: "0",
            ..valid_settings()
        };
        assert!(matches!(
            MonitorConfig::parse(raw),
            Err(ConfigError::Invalid { key: "report_interval_secs", .. })
        ));
    }

    #[test]
    fn test4_gain_must_be_positive() {
        for gain in ["-0.5", "0", "NaN", "abc"] {
            let raw = RawSettings {
                current_gain: gain,
                ..valid_settings()
            };
            assert!(MonitorConfig::parse(raw).is_err(), "gain {gain} was accepted");
        }
    }

    #[test]
    fn test5_auth_strength_names() {
        let raw = RawSettings {
            wifi_auth: "WPA2_WPA3",
            ..valid_settings()
        };
        assert_eq!(MonitorConfig::parse(raw).unwrap().wifi.auth, AuthStrength::Wpa2Wpa3);

        let raw = RawSettings {
            wifi_auth: "wpa4",
            ..valid_settings()
        };
        assert!(MonitorConfig::parse(raw).is_err());
    }

    #[test]
    fn test6_debug_hides_password() {
        let config = MonitorConfig::parse(valid_settings()).unwrap();
        assert!(!format!("{:?}", config.wifi).contains("hunter22"));
    }

    #[test]
    fn test7_zero_timeouts_are_rejected() {
        let raw = RawSettings {
            connect_timeout_secs: "0",
            ..valid_settings()
        };
        assert!(matches!(
            MonitorConfig::parse(raw),
            Err(ConfigError::Invalid { key: "connect_timeout_secs", .. })
        ));

        let raw = RawSettings {
            http_timeout_secs: "0",
            ..valid_settings()
        };
        assert!(matches!(
            MonitorConfig::parse(raw),
            Err(ConfigError::Invalid { key: "http_timeout_secs", .. })
        ));
    }
}
