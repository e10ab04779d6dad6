//! Travel estimator: position of a sensorless cover from elapsed travel time.
//!
//! The position is never advanced by a timer. The estimator remembers the
//! position committed at the last direction change, when travel started and
//! where it is heading; every query interpolates linearly from those and the
//! clock. Committing (on stop or when re-arming) rounds the live value and
//! makes it the new baseline, so elapsed time is never counted twice.

use std::sync::Arc;
use std::time::{Duration, Instant};

use eyre::Report;
use shutter_traits::{Clock, CoverAttributes};

use crate::error::{CoverError, Result};
use crate::util::{CLOSED, OPEN, round_percent};

/// Direction of travel. `Up` opens, `Down` closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Stopped,
    Up,
    Down,
}

/// Full-travel durations; asymmetric up/down times are allowed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TravelConfig {
    travel_up_secs: f64,
    travel_down_secs: f64,
}

impl TravelConfig {
    /// Both durations must be finite and strictly positive.
    pub fn new(travel_up_secs: f64, travel_down_secs: f64) -> Result<Self> {
        for (name, v) in [("travel_up", travel_up_secs), ("travel_down", travel_down_secs)] {
            if !(v.is_finite() && v > 0.0) {
                return Err(Report::new(CoverError::Configuration(format!(
                    "{name} must be a positive number of seconds, got {v}"
                ))));
            }
        }
        Ok(Self {
            travel_up_secs,
            travel_down_secs,
        })
    }

    pub fn travel_up_secs(&self) -> f64 {
        self.travel_up_secs
    }

    pub fn travel_down_secs(&self) -> f64 {
        self.travel_down_secs
    }

    /// Percent per second in `direction`; zero when stopped.
    pub fn rate(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Up => 100.0 / self.travel_up_secs,
            Direction::Down => 100.0 / self.travel_down_secs,
            Direction::Stopped => 0.0,
        }
    }

    pub fn attributes(&self) -> CoverAttributes {
        CoverAttributes {
            travel_up_secs: self.travel_up_secs,
            travel_down_secs: self.travel_down_secs,
        }
    }
}

pub struct TravelEstimator {
    config: TravelConfig,
    clock: Arc<dyn Clock + Send + Sync>,
    // Committed position; None until restored or a raw open/close starts.
    position: Option<u8>,
    direction: Direction,
    travel_start: Option<Instant>,
    // Explicit target; None for raw open/close (the extreme is implied).
    target: Option<u8>,
}

impl core::fmt::Debug for TravelEstimator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TravelEstimator")
            .field("position", &self.position)
            .field("direction", &self.direction)
            .field("target", &self.target)
            .field("traveling_for", &self.travel_start.map(|t| self.clock.elapsed_since(t)))
            .finish()
    }
}

impl TravelEstimator {
    pub fn new(config: TravelConfig, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self {
            config,
            clock,
            position: None,
            direction: Direction::Stopped,
            travel_start: None,
            target: None,
        }
    }

    pub fn config(&self) -> &TravelConfig {
        &self.config
    }

    /// Restore a known position (e.g. from the position store at startup).
    /// Any travel in progress is discarded.
    pub fn set_position(&mut self, position: u8) {
        self.position = Some(position.min(OPEN));
        self.direction = Direction::Stopped;
        self.travel_start = None;
        self.target = None;
    }

    /// Live position as of now, rounded; `None` while unknown.
    pub fn current_position(&self) -> Option<u8> {
        self.position_at(self.clock.now())
    }

    /// Live position as of `now`, rounded.
    pub fn position_at(&self, now: Instant) -> Option<u8> {
        self.exact_at(now).map(round_percent)
    }

    /// Arm travel towards `target`. A target equal to the live position is a
    /// no-op, whether stopped or moving.
    pub fn start_travel(&mut self, target: u8) {
        let target = target.min(OPEN);
        let now = self.clock.now();
        let Some(current) = self.position_at(now) else {
            tracing::debug!(target, "start_travel ignored: position unknown");
            return;
        };
        if target == current {
            return;
        }
        self.commit(now);
        self.direction = if target > current {
            Direction::Up
        } else {
            Direction::Down
        };
        self.travel_start = Some(now);
        self.target = Some(target);
    }

    /// Raw open: travel up until fully open. From an unknown position the
    /// cover is assumed fully closed so the run lasts the whole travel time.
    pub fn start_travel_up(&mut self) {
        self.start_raw(Direction::Up, CLOSED);
    }

    /// Raw close: travel down until fully closed. From an unknown position
    /// the cover is assumed fully open.
    pub fn start_travel_down(&mut self) {
        self.start_raw(Direction::Down, OPEN);
    }

    fn start_raw(&mut self, direction: Direction, assume_from: u8) {
        let now = self.clock.now();
        if self.commit(now).is_none() {
            self.position = Some(assume_from);
        }
        self.direction = direction;
        self.travel_start = Some(now);
        self.target = None;
    }

    /// Freeze the live position and stop. Idempotent.
    pub fn stop(&mut self) -> Option<u8> {
        let now = self.clock.now();
        self.commit(now)
    }

    /// True when stopped, or when the live position has reached the target
    /// (or the extreme for a raw open/close).
    pub fn position_reached(&self) -> bool {
        let now = self.clock.now();
        match (self.direction, self.exact_at(now), self.effective_target()) {
            (Direction::Up, Some(p), Some(t)) => p >= f64::from(t),
            (Direction::Down, Some(p), Some(t)) => p <= f64::from(t),
            _ => true,
        }
    }

    pub fn is_traveling(&self) -> bool {
        self.direction != Direction::Stopped
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_opening(&self) -> bool {
        self.direction == Direction::Up
    }

    pub fn is_closing(&self) -> bool {
        self.direction == Direction::Down
    }

    /// Closed means position 0; an unknown position is not closed.
    pub fn is_closed(&self) -> bool {
        self.current_position() == Some(CLOSED)
    }

    /// Explicit target of the current segment, if any.
    pub fn target_position(&self) -> Option<u8> {
        self.target
    }

    pub fn travel_start(&self) -> Option<Instant> {
        self.travel_start
    }

    /// Where the current segment ends: the explicit target, else the extreme
    /// in the direction of travel.
    pub fn effective_target(&self) -> Option<u8> {
        match self.direction {
            Direction::Stopped => None,
            Direction::Up => Some(self.target.unwrap_or(OPEN)),
            Direction::Down => Some(self.target.unwrap_or(CLOSED)),
        }
    }

    /// Time left until the current segment completes; zero when stopped.
    pub fn remaining(&self) -> Duration {
        let now = self.clock.now();
        let (Some(p), Some(t)) = (self.exact_at(now), self.effective_target()) else {
            return Duration::ZERO;
        };
        let rate = self.config.rate(self.direction);
        if rate <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64((f64::from(t) - p).abs() / rate)
    }

    /// Unrounded live position, clamped to [0, 100] and never past the
    /// segment end.
    fn exact_at(&self, now: Instant) -> Option<f64> {
        let start = f64::from(self.position?);
        let (Some(t0), Some(end)) = (self.travel_start, self.effective_target()) else {
            return Some(start);
        };
        let elapsed = now.saturating_duration_since(t0).as_secs_f64();
        let delta = elapsed * self.config.rate(self.direction);
        let end = f64::from(end);
        let p = match self.direction {
            Direction::Up => (start + delta).min(end),
            Direction::Down => (start - delta).max(end),
            Direction::Stopped => start,
        };
        Some(p.clamp(f64::from(CLOSED), f64::from(OPEN)))
    }

    fn commit(&mut self, now: Instant) -> Option<u8> {
        let p = self.position_at(now);
        self.position = p;
        self.direction = Direction::Stopped;
        self.travel_start = None;
        self.target = None;
        p
    }
}
