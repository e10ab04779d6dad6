//! Motion controller: one `Cover` per physical actuator.
//!
//! Lock order is `command` -> `poll` -> `estimator`. Requests hold the
//! command lock for their whole duration, which serializes coil writes and
//! processes requests in arrival order. The poll tick only takes the command
//! lock when it has to stop the motor, so a settle delay in flight never
//! holds up position publishing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crossbeam_channel as xch;
use eyre::Report;
use shutter_traits::{CoilWriter, CoverAttributes, PositionStore, Scheduler, TickHandle};

use crate::builder::CoverBuilder;
use crate::error::{CoverError, Result};
use crate::events::{CoverEvent, EventBus};
use crate::sequencer::{CommandSequencer, Intent};
use crate::status::{CoverState, MotionState};
use crate::travel::{Direction, TravelEstimator};
use crate::util::{CLOSED, OPEN, lock};

/// Default poll period.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
struct PollLoop {
    handle: Option<TickHandle>,
    // Bumped on every registration so ticks from a cancelled loop do nothing.
    generation: u64,
}

pub(crate) struct Inner<W: CoilWriter> {
    id: String,
    attributes: CoverAttributes,
    poll_interval: Duration,
    estimator: Mutex<TravelEstimator>,
    command: Mutex<CommandSequencer<W>>,
    poll: Mutex<PollLoop>,
    store: Arc<dyn PositionStore + Send + Sync>,
    scheduler: Arc<dyn Scheduler + Send + Sync>,
    events: EventBus,
    failed_in_motion: AtomicBool,
}

/// Time-based cover controller.
///
/// Cheap to clone; clones drive the same cover. The motor is stopped and the
/// poll loop cancelled when the last clone is dropped.
pub struct Cover<W: CoilWriter + Send + 'static = Box<dyn CoilWriter + Send>> {
    inner: Arc<Inner<W>>,
}

impl<W: CoilWriter + Send + 'static> Clone for Cover<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W: CoilWriter + Send + 'static> core::fmt::Debug for Cover<W> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Cover")
            .field("id", &self.inner.id)
            .field("estimator", &*lock(&self.inner.estimator))
            .finish()
    }
}

impl Cover {
    /// Start building a cover.
    pub fn builder<W: CoilWriter + Send + 'static>() -> CoverBuilder<W> {
        CoverBuilder::default()
    }
}

impl<W: CoilWriter + Send + 'static> Cover<W> {
    pub(crate) fn assemble(
        id: String,
        estimator: TravelEstimator,
        sequencer: CommandSequencer<W>,
        store: Arc<dyn PositionStore + Send + Sync>,
        scheduler: Arc<dyn Scheduler + Send + Sync>,
        poll_interval: Duration,
    ) -> Self {
        let attributes = estimator.config().attributes();
        Self {
            inner: Arc::new(Inner {
                id,
                attributes,
                poll_interval,
                estimator: Mutex::new(estimator),
                command: Mutex::new(sequencer),
                poll: Mutex::new(PollLoop::default()),
                store,
                scheduler,
                events: EventBus::new(),
                failed_in_motion: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Move to `position` percent (0 closed, 100 open).
    ///
    /// Fails with `InvalidPositionRequest` outside `0..=100` and with
    /// `UnknownPosition` before a reference position is established. A
    /// request for the live position is a no-op. A coil write failure is
    /// returned as `CommandFailed`; the poll loop keeps running regardless.
    pub fn set_position(&self, position: i32) -> Result<()> {
        let target = u8::try_from(position)
            .ok()
            .filter(|p| *p <= OPEN)
            .ok_or_else(|| Report::new(CoverError::InvalidPositionRequest(position)))?;
        let inner = &self.inner;
        let mut cmd = lock(&inner.command);
        let (from, direction) = {
            let mut est = lock(&inner.estimator);
            let Some(current) = est.current_position() else {
                return Err(Report::new(CoverError::UnknownPosition));
            };
            if target == current {
                tracing::debug!(cover = %inner.id, position = current, "already at requested position");
                return Ok(());
            }
            est.start_travel(target);
            (current, est.direction())
        };
        let intent = if direction == Direction::Up {
            Intent::Open
        } else {
            Intent::Close
        };
        self.begin_motion(from, target, direction);
        inner.dispatch(&mut cmd, intent)
    }

    /// Travel up until fully open.
    pub fn open(&self) -> Result<()> {
        self.travel_raw(TravelEstimator::start_travel_up, OPEN, Intent::Open)
    }

    /// Travel down until fully closed.
    pub fn close(&self) -> Result<()> {
        self.travel_raw(TravelEstimator::start_travel_down, CLOSED, Intent::Close)
    }

    fn travel_raw(&self, start: fn(&mut TravelEstimator), target: u8, intent: Intent) -> Result<()> {
        let inner = &self.inner;
        let mut cmd = lock(&inner.command);
        let (from, direction) = {
            let mut est = lock(&inner.estimator);
            start(&mut *est);
            // A raw start from unknown assumes the opposite extreme.
            (est.current_position().unwrap_or(OPEN - target), est.direction())
        };
        self.begin_motion(from, target, direction);
        inner.dispatch(&mut cmd, intent)
    }

    /// Freeze the estimate and de-energize both coils. Idempotent.
    pub fn stop(&self) -> Result<()> {
        let inner = &self.inner;
        let mut cmd = lock(&inner.command);
        let was_moving = lock(&inner.poll).handle.is_some();
        let position = lock(&inner.estimator).stop();
        let result = cmd.send(Intent::Stop);
        inner.stop_poll();
        if let Some(p) = position {
            inner.publish(p);
        }
        if was_moving {
            tracing::info!(cover = %inner.id, position = ?position, "travel stopped");
            inner.events.emit(CoverEvent::TravelStopped {
                cover: inner.id.clone(),
                position,
            });
        }
        drop(cmd);
        result.map_err(|e| {
            inner.command_failed(&e);
            Report::new(e)
        })
    }

    fn begin_motion(&self, from: u8, target: u8, direction: Direction) {
        let inner = &self.inner;
        inner.failed_in_motion.store(false, Ordering::SeqCst);
        tracing::info!(cover = %inner.id, from, target, ?direction, "travel started");
        inner.events.emit(CoverEvent::TravelStarted {
            cover: inner.id.clone(),
            from,
            target,
            direction,
        });
        Inner::ensure_poll(&self.inner);
    }

    /// Rounded live position; `None` until a reference is established.
    pub fn current_position(&self) -> Option<u8> {
        lock(&self.inner.estimator).current_position()
    }

    pub fn direction(&self) -> Direction {
        lock(&self.inner.estimator).direction()
    }

    pub fn is_opening(&self) -> bool {
        lock(&self.inner.estimator).is_opening()
    }

    pub fn is_closing(&self) -> bool {
        lock(&self.inner.estimator).is_closing()
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.inner.estimator).is_closed()
    }

    /// True while the poll loop is active.
    pub fn is_moving(&self) -> bool {
        lock(&self.inner.poll).handle.is_some()
    }

    pub fn travel_up(&self) -> f64 {
        self.inner.attributes.travel_up_secs
    }

    pub fn travel_down(&self) -> f64 {
        self.inner.attributes.travel_down_secs
    }

    pub fn attributes(&self) -> CoverAttributes {
        self.inner.attributes
    }

    /// Estimated time until the current travel completes.
    pub fn remaining(&self) -> Duration {
        lock(&self.inner.estimator).remaining()
    }

    pub fn state(&self) -> CoverState {
        let motion = if self.is_moving() {
            MotionState::Moving
        } else {
            MotionState::Idle
        };
        let est = lock(&self.inner.estimator);
        CoverState {
            id: self.inner.id.clone(),
            position: est.current_position(),
            direction: est.direction(),
            motion,
            is_closed: est.is_closed(),
            target: est.effective_target(),
            attributes: self.inner.attributes,
            assumed_state: true,
        }
    }

    /// Receive lifecycle events from now on.
    pub fn subscribe(&self) -> xch::Receiver<CoverEvent> {
        self.inner.events.subscribe()
    }
}

impl<W: CoilWriter + Send + 'static> Inner<W> {
    fn ensure_poll(this: &Arc<Self>) {
        let mut poll = lock(&this.poll);
        if poll.handle.is_some() {
            return;
        }
        poll.generation = poll.generation.wrapping_add(1);
        let generation = poll.generation;
        let weak = Arc::downgrade(this);
        let handle = this.scheduler.every(
            this.poll_interval,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.poll_tick(generation);
                }
            }),
        );
        tracing::debug!(cover = %this.id, generation, "poll loop started");
        poll.handle = Some(handle);
    }

    fn is_current(&self, generation: u64) -> bool {
        let poll = lock(&self.poll);
        poll.handle.is_some() && poll.generation == generation
    }

    fn poll_tick(&self, generation: u64) {
        if !self.is_current(generation) {
            return;
        }
        let (position, reached) = {
            let est = lock(&self.estimator);
            (est.current_position(), est.position_reached())
        };
        tracing::trace!(cover = %self.id, position = ?position, reached, "poll");
        if reached {
            self.complete(generation);
        } else if let Some(p) = position {
            self.publish(p);
            self.events.emit(CoverEvent::PositionUpdated {
                cover: self.id.clone(),
                position: p,
            });
        }
    }

    fn complete(&self, generation: u64) {
        let mut cmd = lock(&self.command);
        // A request may have re-armed travel or stopped the loop since the
        // unlocked check.
        if !self.is_current(generation) || !lock(&self.estimator).position_reached() {
            return;
        }
        self.stop_poll();
        let result = cmd.send(Intent::Stop);
        let position = lock(&self.estimator).stop();
        drop(cmd);
        if let Some(p) = position {
            self.publish(p);
        }
        if let Err(e) = &result {
            tracing::error!(cover = %self.id, error = %e, "stop after completed travel failed");
            self.command_failed(e);
        }
        let after_failure = self.failed_in_motion.swap(false, Ordering::SeqCst);
        tracing::info!(cover = %self.id, position = ?position, after_failure, "travel completed");
        self.events.emit(CoverEvent::TravelCompleted {
            cover: self.id.clone(),
            position,
            after_failure,
        });
    }

    fn stop_poll(&self) {
        let handle = lock(&self.poll).handle.take();
        if let Some(h) = handle {
            self.scheduler.cancel(h);
            tracing::debug!(cover = %self.id, "poll loop stopped");
        }
    }

    fn dispatch(&self, cmd: &mut CommandSequencer<W>, intent: Intent) -> Result<()> {
        cmd.send(intent).map_err(|e| {
            self.failed_in_motion.store(true, Ordering::SeqCst);
            self.command_failed(&e);
            Report::new(e)
        })
    }

    fn command_failed(&self, error: &CoverError) {
        self.events.emit(CoverEvent::CommandFailed {
            cover: self.id.clone(),
            error: error.clone(),
        });
    }

    fn publish(&self, position: u8) {
        self.store.publish(&self.id, position, &self.attributes);
    }
}

impl<W: CoilWriter> Drop for Inner<W> {
    fn drop(&mut self) {
        let poll = self.poll.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(h) = poll.handle.take() {
            self.scheduler.cancel(h);
        }
        let est = self
            .estimator
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if !est.is_traveling() {
            return;
        }
        est.stop();
        let cmd = self.command.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = cmd.send(Intent::Stop) {
            tracing::warn!(cover = %self.id, error = %e, "stop on drop failed");
        }
    }
}
