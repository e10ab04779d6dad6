//! Host seams for the cover controller.
//!
//! Everything the core needs from the outside world goes through one of
//! these traits: time (`Clock`), the actuator transport (`CoilWriter`),
//! last-known-position persistence (`PositionStore`) and periodic callbacks
//! (`Scheduler`).
pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

use std::time::Duration;

/// Writes a single on/off output ("coil") on a field bus.
///
/// Implementations block until the write is acknowledged or has failed.
/// There is no read-back.
pub trait CoilWriter {
    fn write_coil(
        &mut self,
        hub: &str,
        unit: u8,
        address: u16,
        state: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

impl<W: CoilWriter + ?Sized> CoilWriter for Box<W> {
    fn write_coil(
        &mut self,
        hub: &str,
        unit: u8,
        address: u16,
        state: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).write_coil(hub, unit, address, state)
    }
}

/// Shared writer: several covers on one hub serialize through the mutex.
impl<W: CoilWriter> CoilWriter for std::sync::Arc<std::sync::Mutex<W>> {
    fn write_coil(
        &mut self,
        hub: &str,
        unit: u8,
        address: u16,
        state: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut inner = self
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.write_coil(hub, unit, address, state)
    }
}

/// Static attributes published alongside every position update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverAttributes {
    /// Seconds for a full closed -> open run.
    pub travel_up_secs: f64,
    /// Seconds for a full open -> closed run.
    pub travel_down_secs: f64,
}

/// Last-known-position persistence.
pub trait PositionStore {
    /// Position recorded by a previous run, if any.
    fn load_last_position(&self, cover_id: &str) -> Option<u8>;

    /// Record the current position. Called on every poll tick and on stop,
    /// so implementations should be cheap or deduplicate.
    fn publish(&self, cover_id: &str, position: u8, attributes: &CoverAttributes);
}

/// Callback run on every scheduler tick.
pub type Tick = Box<dyn FnMut() + Send + 'static>;

/// Opaque identifier of a periodic registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickHandle(pub u64);

/// Periodic callback scheduling.
///
/// `cancel` must be idempotent and callable from inside the tick itself.
pub trait Scheduler {
    fn every(&self, interval: Duration, tick: Tick) -> TickHandle;
    fn cancel(&self, handle: TickHandle);
}
