//! Conversions from `shutter_config` types to `shutter_core` types.

use std::time::Duration;

use crate::builder::ControllerCfg;
use crate::error::Report;
use crate::sequencer::CoilPair;
use crate::travel::TravelConfig;

// ── TravelConfig ─────────────────────────────────────────────────────────────

impl TryFrom<&shutter_config::Device> for TravelConfig {
    type Error = Report;

    fn try_from(d: &shutter_config::Device) -> Result<Self, Self::Error> {
        TravelConfig::new(d.travel_up, d.travel_down)
    }
}

// ── CoilPair ─────────────────────────────────────────────────────────────────

impl CoilPair {
    /// Coil addresses of `device` on the hub called `hub`.
    pub fn from_device(hub: &str, device: &shutter_config::Device) -> Self {
        Self {
            hub: hub.to_owned(),
            unit: device.slave,
            open: device.coil_open,
            close: device.coil_close,
        }
    }
}

// ── ControllerCfg ────────────────────────────────────────────────────────────

impl From<&shutter_config::ControlCfg> for ControllerCfg {
    fn from(c: &shutter_config::ControlCfg) -> Self {
        Self {
            poll_interval: Duration::from_millis(c.poll_ms),
            settle: Duration::from_millis(c.settle_ms),
        }
    }
}
