//! Cover lifecycle notifications.
//!
//! Subscribers get an unbounded crossbeam receiver; emitting never blocks the
//! controller. Receivers that have been dropped are pruned on the next emit.

use crossbeam_channel as xch;
use std::sync::Mutex;

use crate::error::CoverError;
use crate::travel::Direction;
use crate::util::lock;

#[derive(Debug, Clone, PartialEq)]
pub enum CoverEvent {
    /// Travel was armed and the motor commanded.
    TravelStarted {
        cover: String,
        from: u8,
        /// Explicit target, or the extreme for a raw open/close.
        target: u8,
        direction: Direction,
    },
    /// Live position published by the poll loop.
    PositionUpdated { cover: String, position: u8 },
    /// Explicit stop while moving.
    TravelStopped { cover: String, position: Option<u8> },
    /// The estimate reached its target and the motor was stopped.
    TravelCompleted {
        cover: String,
        position: Option<u8>,
        /// A command for this travel failed; the completion is time-based only.
        after_failure: bool,
    },
    CommandFailed { cover: String, error: CoverError },
}

impl CoverEvent {
    /// True for events that end a travel.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CoverEvent::TravelStopped { .. } | CoverEvent::TravelCompleted { .. }
        )
    }
}

#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<xch::Sender<CoverEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> xch::Receiver<CoverEvent> {
        let (tx, rx) = xch::unbounded();
        lock(&self.subscribers).push(tx);
        rx
    }

    pub fn emit(&self, event: CoverEvent) {
        tracing::trace!(?event, "emit");
        lock(&self.subscribers).retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }
}
