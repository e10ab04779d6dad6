#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Time-based position control for sensorless covers (hardware-agnostic).
//!
//! A cover (blind, shutter, garage door) driven by an open coil and a close
//! coil has no position feedback. This crate estimates its position from
//! elapsed travel time and drives the coils to reach a requested position.
//! All host interaction goes through the `shutter_traits` seams.
//!
//! ## Architecture
//!
//! - **Travel estimation**: linear interpolation from the last committed
//!   position, travel start and configured full-travel time (`travel`)
//! - **Command sequencing**: OPEN/CLOSE/STOP as ordered coil writes with a
//!   settle delay so both coils are never energized (`sequencer`)
//! - **Motion control**: requests, the poll loop and completion detection
//!   (`controller`), assembled by `CoverBuilder` (`builder`)
//! - **Events**: structured lifecycle notifications (`events`)
//!
//! ## Positions
//!
//! Positions are integer percent, 0 fully closed and 100 fully open. They
//! are rounded from the interpolated value, never truncated.

pub mod builder;
pub mod controller;
pub mod conversions;
pub mod error;
pub mod events;
pub mod hw_error;
pub mod mocks;
pub mod scheduler;
pub mod sequencer;
pub mod status;
pub mod travel;
pub mod util;

pub use builder::{ControllerCfg, CoverBuilder};
pub use controller::{Cover, DEFAULT_POLL_INTERVAL};
pub use error::{BuildError, Coil, CoverError, Phase, Report, Result, WriteFault};
pub use events::{CoverEvent, EventBus};
pub use scheduler::ThreadScheduler;
pub use sequencer::{CoilPair, CommandSequencer, DEFAULT_SETTLE, Intent};
pub use status::{CoverState, MotionState};
pub use travel::{Direction, TravelConfig, TravelEstimator};
