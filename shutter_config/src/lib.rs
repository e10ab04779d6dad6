#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for a Modbus hub and the time-based covers wired to it.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Travel durations accept integer or fractional seconds.
use serde::Deserialize;
use serde::de::Deserializer;
use std::collections::BTreeMap;

/// Travel time used when a device does not specify one (seconds).
pub const DEFAULT_TRAVEL_SECS: f64 = 25.0;
/// Standard Modbus/TCP port.
pub const DEFAULT_MODBUS_PORT: u16 = 502;

/// Largest unit id a Modbus slave may use.
const MAX_SLAVE: u8 = 247;
/// Upper bound for poll period and settle delay (ms).
const MAX_CONTROL_MS: u64 = 10_000;

#[derive(Debug, Deserialize)]
pub struct Hub {
    /// Name the devices refer to; passed to every coil write.
    pub name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Connect/read/write timeout per request (ms).
    #[serde(default = "default_hub_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_port() -> u16 {
    DEFAULT_MODBUS_PORT
}

fn default_hub_timeout_ms() -> u64 {
    1000
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ControlCfg {
    /// Period of the position poll loop while a cover moves.
    pub poll_ms: u64,
    /// Delay between releasing one coil and energizing the other.
    pub settle_ms: u64,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self {
            poll_ms: 100,
            settle_ms: 300,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct StateCfg {
    /// JSON file holding the last known position of every cover.
    pub file: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Device {
    /// Friendly name; the device id is used when absent.
    #[serde(default)]
    pub name: Option<String>,
    /// Modbus unit id.
    pub slave: u8,
    pub coil_open: u16,
    pub coil_close: u16,
    /// Seconds for a full closed -> open run.
    #[serde(default = "default_travel", deserialize_with = "de_seconds")]
    pub travel_up: f64,
    /// Seconds for a full open -> closed run.
    #[serde(default = "default_travel", deserialize_with = "de_seconds")]
    pub travel_down: f64,
}

impl Device {
    pub fn display_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.name.as_deref().unwrap_or(id)
    }
}

fn default_travel() -> f64 {
    DEFAULT_TRAVEL_SECS
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SecondsToml {
    Int(i64),
    Float(f64),
}

fn de_seconds<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match SecondsToml::deserialize(deserializer)? {
        SecondsToml::Int(v) => v as f64,
        SecondsToml::Float(v) => v,
    })
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub hub: Hub,
    #[serde(default)]
    pub control: ControlCfg,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub state: StateCfg,
    /// Covers keyed by device id.
    #[serde(default)]
    pub devices: BTreeMap<String, Device>,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    /// Look up a device by id.
    pub fn device(&self, id: &str) -> eyre::Result<&Device> {
        self.devices.get(id).ok_or_else(|| {
            let known: Vec<&str> = self.devices.keys().map(String::as_str).collect();
            eyre::eyre!(
                "unknown cover '{id}' (configured: {})",
                if known.is_empty() {
                    "none".to_string()
                } else {
                    known.join(", ")
                }
            )
        })
    }

    pub fn validate(&self) -> eyre::Result<()> {
        // Hub
        if self.hub.name.trim().is_empty() {
            eyre::bail!("hub.name must not be empty");
        }
        if self.hub.host.trim().is_empty() {
            eyre::bail!("hub.host must not be empty");
        }
        if self.hub.port == 0 {
            eyre::bail!("hub.port must be > 0");
        }
        if self.hub.timeout_ms == 0 {
            eyre::bail!("hub.timeout_ms must be >= 1");
        }

        // Control
        if self.control.poll_ms == 0 || self.control.poll_ms > MAX_CONTROL_MS {
            eyre::bail!("control.poll_ms must be in [1, {MAX_CONTROL_MS}]");
        }
        if self.control.settle_ms == 0 || self.control.settle_ms > MAX_CONTROL_MS {
            eyre::bail!("control.settle_ms must be in [1, {MAX_CONTROL_MS}]");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly, got '{rot}'");
        }

        // Devices
        for (id, dev) in &self.devices {
            if id.trim().is_empty() {
                eyre::bail!("device ids must not be empty");
            }
            if dev.slave == 0 || dev.slave > MAX_SLAVE {
                eyre::bail!("devices.{id}.slave must be in [1, {MAX_SLAVE}]");
            }
            if dev.coil_open == dev.coil_close {
                eyre::bail!("devices.{id}: coil_open and coil_close must differ");
            }
            if !(dev.travel_up.is_finite() && dev.travel_up > 0.0) {
                eyre::bail!("devices.{id}.travel_up must be > 0 seconds");
            }
            if !(dev.travel_down.is_finite() && dev.travel_down > 0.0) {
                eyre::bail!("devices.{id}.travel_down must be > 0 seconds");
            }
        }

        Ok(())
    }
}
