//! Builder for `Cover`.
//!
//! Id, travel durations, coil pair and writer are required; everything else
//! has a default (no persistence, thread-backed scheduler, monotonic clock,
//! 100 ms poll, 300 ms settle). `build()` restores the last known position
//! from the store before returning.

use std::sync::Arc;
use std::time::Duration;

use shutter_traits::{Clock, CoilWriter, MonotonicClock, PositionStore, Scheduler};

use crate::controller::{Cover, DEFAULT_POLL_INTERVAL};
use crate::error::{BuildError, Result};
use crate::mocks::NullStore;
use crate::scheduler::ThreadScheduler;
use crate::sequencer::{CoilPair, CommandSequencer, DEFAULT_SETTLE};
use crate::travel::{TravelConfig, TravelEstimator};
use crate::util::OPEN;

/// Timing knobs shared by every cover on a hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerCfg {
    pub poll_interval: Duration,
    pub settle: Duration,
}

impl Default for ControllerCfg {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            settle: DEFAULT_SETTLE,
        }
    }
}

pub struct CoverBuilder<W: CoilWriter> {
    id: Option<String>,
    travel: Option<TravelConfig>,
    coils: Option<CoilPair>,
    writer: Option<W>,
    store: Option<Arc<dyn PositionStore + Send + Sync>>,
    scheduler: Option<Arc<dyn Scheduler + Send + Sync>>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    control: ControllerCfg,
}

impl<W: CoilWriter> Default for CoverBuilder<W> {
    fn default() -> Self {
        Self {
            id: None,
            travel: None,
            coils: None,
            writer: None,
            store: None,
            scheduler: None,
            clock: None,
            control: ControllerCfg::default(),
        }
    }
}

impl<W: CoilWriter + Send + 'static> CoverBuilder<W> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_travel(mut self, travel: TravelConfig) -> Self {
        self.travel = Some(travel);
        self
    }

    pub fn with_coils(mut self, coils: CoilPair) -> Self {
        self.coils = Some(coils);
        self
    }

    pub fn with_writer(mut self, writer: W) -> Self {
        self.writer = Some(writer);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn PositionStore + Send + Sync>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler + Send + Sync>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.control.poll_interval = interval;
        self
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.control.settle = settle;
        self
    }

    pub fn with_controller_cfg(mut self, control: ControllerCfg) -> Self {
        self.control = control;
        self
    }

    pub fn build(self) -> Result<Cover<W>> {
        let id = self
            .id
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| eyre::Report::new(BuildError::MissingId))?;
        let travel = self
            .travel
            .ok_or_else(|| eyre::Report::new(BuildError::MissingTravel))?;
        let coils = self
            .coils
            .ok_or_else(|| eyre::Report::new(BuildError::MissingCoils))?;
        let writer = self
            .writer
            .ok_or_else(|| eyre::Report::new(BuildError::MissingWriter))?;

        if self.control.poll_interval.is_zero() {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "poll interval must be > 0",
            )));
        }
        // Release and engage must never run back to back.
        if self.control.settle.is_zero() {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "settle delay must be > 0",
            )));
        }
        if coils.open == coils.close {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "open and close coils must differ",
            )));
        }

        let clock: Arc<dyn Clock + Send + Sync> = self.clock.unwrap_or_else(|| Arc::new(MonotonicClock::new()));
        let store: Arc<dyn PositionStore + Send + Sync> = self.store.unwrap_or_else(|| Arc::new(NullStore));
        let scheduler: Arc<dyn Scheduler + Send + Sync> =
            self.scheduler.unwrap_or_else(|| Arc::new(ThreadScheduler::new()));

        let mut estimator = TravelEstimator::new(travel, clock.clone());
        match store.load_last_position(&id) {
            Some(p) if p <= OPEN => {
                tracing::debug!(cover = %id, position = p, "restored last known position");
                estimator.set_position(p);
            }
            Some(p) => {
                tracing::warn!(cover = %id, position = p, "ignoring out-of-range stored position");
            }
            None => {
                tracing::debug!(cover = %id, "no stored position; position unknown");
            }
        }

        let sequencer = CommandSequencer::new(writer, coils, self.control.settle, clock);
        Ok(Cover::assemble(
            id,
            estimator,
            sequencer,
            store,
            scheduler,
            self.control.poll_interval,
        ))
    }
}
