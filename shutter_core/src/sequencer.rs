//! Actuator command sequencer.
//!
//! Translates OPEN/CLOSE/STOP intents into ordered coil writes on a pair of
//! interlocked outputs. The opposing coil is always released before the
//! requested one is engaged, with a settle delay in between, so both coils
//! are never energized at the same time.

use std::sync::Arc;
use std::time::Duration;

use shutter_traits::{Clock, CoilWriter};

use crate::error::{Coil, CoverError, Phase};
use crate::hw_error::map_hw_error;

/// Default pause between releasing one coil and engaging the other.
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(300);

/// Abstract actuation command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Open,
    Close,
    Stop,
}

/// Addressing of one cover's open/close coils on a hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoilPair {
    pub hub: String,
    pub unit: u8,
    pub open: u16,
    pub close: u16,
}

impl CoilPair {
    fn address(&self, coil: Coil) -> u16 {
        match coil {
            Coil::Open => self.open,
            Coil::Close => self.close,
        }
    }
}

pub struct CommandSequencer<W: CoilWriter> {
    writer: W,
    coils: CoilPair,
    settle: Duration,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl<W: CoilWriter> CommandSequencer<W> {
    pub fn new(writer: W, coils: CoilPair, settle: Duration, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self {
            writer,
            coils,
            settle,
            clock,
        }
    }

    /// Execute `intent` as a sequence of coil writes.
    ///
    /// OPEN and CLOSE release the opposing coil, wait for the settle delay and
    /// then engage; a failed write aborts the rest of the sequence. STOP
    /// releases both coils and attempts the second write even if the first
    /// fails, returning the first failure.
    pub fn send(&mut self, intent: Intent) -> Result<(), CoverError> {
        tracing::debug!(
            hub = %self.coils.hub,
            unit = self.coils.unit,
            ?intent,
            "sending command"
        );
        match intent {
            Intent::Open => self.drive(Coil::Open, Coil::Close),
            Intent::Close => self.drive(Coil::Close, Coil::Open),
            Intent::Stop => {
                let open = self.write(Coil::Open, Phase::Release, false);
                let close = self.write(Coil::Close, Phase::Release, false);
                open.and(close)
            }
        }
    }

    fn drive(&mut self, engage: Coil, release: Coil) -> Result<(), CoverError> {
        self.write(release, Phase::Release, false)?;
        self.clock.sleep(self.settle);
        self.write(engage, Phase::Engage, true)
    }

    fn write(&mut self, coil: Coil, phase: Phase, state: bool) -> Result<(), CoverError> {
        let address = self.coils.address(coil);
        self.writer
            .write_coil(&self.coils.hub, self.coils.unit, address, state)
            .map_err(|e| {
                let fault = map_hw_error(e.as_ref());
                tracing::warn!(
                    hub = %self.coils.hub,
                    unit = self.coils.unit,
                    address,
                    %coil,
                    %phase,
                    error = %e,
                    "coil write failed"
                );
                CoverError::CommandFailed { coil, phase, fault }
            })
    }
}
