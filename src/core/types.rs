use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{Error, Result};

/// Protocol dialect spoken by the spa controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Jacuzzi J-series ("ProLink") controllers
    Jacuzzi,
    /// Sundance 780/880 series controllers
    Sundance,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Jacuzzi => write!(f, "jacuzzi"),
            Dialect::Sundance => write!(f, "sundance"),
        }
    }
}

impl std::str::FromStr for Dialect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "jacuzzi" => Ok(Dialect::Jacuzzi),
            "sundance" => Ok(Dialect::Sundance),
            other => Err(Error::config(format!("unknown dialect: {}", other))),
        }
    }
}

/// Temperature scale reported by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TempScale {
    Fahrenheit,
    #[default]
    Celsius,
}

impl TempScale {
    /// Raw byte meaning "sensor unavailable"
    pub const UNAVAILABLE: u8 = 255;

    /// Decodes a raw temperature byte: half degrees in Celsius, whole degrees in Fahrenheit
    pub fn decode(self, raw: u8) -> Option<f64> {
        if raw == Self::UNAVAILABLE {
            return None;
        }
        match self {
            TempScale::Celsius => Some(raw as f64 / 2.0),
            TempScale::Fahrenheit => Some(raw as f64),
        }
    }

    /// Encodes a temperature into the raw byte the controller expects
    pub fn encode(self, value: f64) -> u8 {
        let raw = match self {
            TempScale::Celsius => (value * 2.0).round(),
            TempScale::Fahrenheit => value.round(),
        };
        raw.clamp(0.0, 254.0) as u8
    }

    /// Rounds a requested set point to the resolution of this scale
    pub fn round(self, value: f64) -> f64 {
        match self {
            TempScale::Celsius => (value * 2.0).round() / 2.0,
            TempScale::Fahrenheit => value.round(),
        }
    }
}

impl fmt::Display for TempScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TempScale::Fahrenheit => write!(f, "Fahrenheit"),
            TempScale::Celsius => write!(f, "Celsius"),
        }
    }
}

/// Clock display format of the control panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClockFormat {
    #[default]
    TwelveHour,
    TwentyFourHour,
}

/// How a repeated status payload is recognised as unchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeDetection {
    /// Compare every payload byte with the previous frame of the same kind
    FullPayload,
    /// Compare only the checksum byte of the previous frame of the same kind
    Checksum,
}

/// Lifecycle of the gateway connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
        }
    }
}

/// Configuration for a spa session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Gateway host name or address
    pub host: String,
    /// Gateway TCP port; the dialect default when unset
    pub port: Option<u16>,
    /// Protocol dialect of the controller
    pub dialect: Dialect,
    /// Button-press cycles observed before a free channel is claimed
    pub probe_threshold: u8,
    /// Silence on status updates before the supervisor probes the controller
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub status_timeout: Duration,
    /// Time granted to the module identity probe before reconnecting
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub probe_grace: Duration,
    /// Supervisor polling interval
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub health_interval: Duration,
    /// Fixed delay between reconnect attempts
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub reconnect_delay: Duration,
    /// Timeout for a single TCP connect
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub connect_timeout: Duration,
    /// Pause between repeated button presses
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub press_interval: Duration,
    /// Pause before a read-back request follows a filter command
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub settle_delay: Duration,
    /// Overrides the dialect's change detection strategy
    pub change_detection: Option<ChangeDetection>,
    /// Fixed channel assignment nonce; random per session when unset
    #[serde(serialize_with = "super::serde::serialize_nonce")]
    #[serde(deserialize_with = "super::serde::deserialize_nonce")]
    pub assignment_nonce: Option<[u8; 2]>,
    /// Answer an empty transmit slot with an idle frame
    pub send_nothing_to_send: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            host: String::new(),
            port: None,
            dialect: Dialect::Jacuzzi,
            probe_threshold: super::DEFAULT_PROBE_THRESHOLD,
            status_timeout: Duration::from_secs(120),
            probe_grace: Duration::from_secs(10),
            health_interval: Duration::from_secs(1),
            reconnect_delay: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(10),
            press_interval: Duration::from_secs(1),
            settle_delay: Duration::from_millis(100),
            change_detection: None,
            assignment_nonce: None,
            send_nothing_to_send: false,
        }
    }
}

impl SessionConfig {
    /// Creates a configuration for the given gateway and dialect
    pub fn new(host: impl Into<String>, dialect: Dialect) -> Self {
        SessionConfig {
            host: host.into(),
            dialect,
            ..Default::default()
        }
    }

    /// Checks the configuration for values the session cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::config("host must not be empty"));
        }
        if self.probe_threshold == 0 {
            return Err(Error::config("probe_threshold must be at least 1"));
        }
        if self.health_interval.is_zero() {
            return Err(Error::config("health_interval must be non-zero"));
        }
        Ok(())
    }
}
