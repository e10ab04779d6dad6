//! Test and helper mocks for shutter_core
//!
//! These are plain in-memory implementations of the host seams. Clones share
//! state, so a test can keep one handle while the cover owns another.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use shutter_traits::{Clock, CoilWriter, CoverAttributes, PositionStore, Scheduler, Tick, TickHandle};

use crate::util::lock;

/// Store that remembers nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStore;

impl PositionStore for NullStore {
    fn load_last_position(&self, _cover_id: &str) -> Option<u8> {
        None
    }

    fn publish(&self, _cover_id: &str, _position: u8, _attributes: &CoverAttributes) {}
}

/// In-memory store that records every publish.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    initial: Arc<Mutex<HashMap<String, u8>>>,
    published: Arc<Mutex<Vec<(String, u8)>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a last-known position for `cover_id`.
    pub fn with_position(self, cover_id: &str, position: u8) -> Self {
        lock(&self.initial).insert(cover_id.to_owned(), position);
        self
    }

    /// All published positions for `cover_id`, oldest first.
    pub fn history(&self, cover_id: &str) -> Vec<u8> {
        lock(&self.published)
            .iter()
            .filter(|(id, _)| id == cover_id)
            .map(|(_, p)| *p)
            .collect()
    }

    pub fn last(&self, cover_id: &str) -> Option<u8> {
        self.history(cover_id).last().copied()
    }
}

impl PositionStore for MemoryStore {
    fn load_last_position(&self, cover_id: &str) -> Option<u8> {
        lock(&self.initial).get(cover_id).copied()
    }

    fn publish(&self, cover_id: &str, position: u8, _attributes: &CoverAttributes) {
        lock(&self.published).push((cover_id.to_owned(), position));
    }
}

/// One successful coil write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoilWrite {
    pub hub: String,
    pub unit: u8,
    pub address: u16,
    pub state: bool,
    pub at: Option<Instant>,
}

#[derive(Debug, Default)]
struct CoilLog {
    writes: Vec<CoilWrite>,
    fail: Vec<(u16, bool)>,
}

/// Coil writer that records successful writes and fails on request.
#[derive(Clone, Default)]
pub struct RecordingCoils {
    log: Arc<Mutex<CoilLog>>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
}

impl core::fmt::Debug for RecordingCoils {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RecordingCoils")
            .field("writes", &lock(&self.log).writes.len())
            .finish()
    }
}

impl RecordingCoils {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timestamp each write with `clock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Make writes of `state` to `address` fail until cleared.
    pub fn fail_when(&self, address: u16, state: bool) {
        lock(&self.log).fail.push((address, state));
    }

    /// Let every write succeed again.
    pub fn clear_failures(&self) {
        lock(&self.log).fail.clear();
    }

    pub fn log(&self) -> Vec<CoilWrite> {
        lock(&self.log).writes.clone()
    }

    /// `(address, state)` of every successful write, oldest first.
    pub fn writes(&self) -> Vec<(u16, bool)> {
        lock(&self.log)
            .writes
            .iter()
            .map(|w| (w.address, w.state))
            .collect()
    }

    /// Last written state of `address`, if it was ever written.
    pub fn state(&self, address: u16) -> Option<bool> {
        lock(&self.log)
            .writes
            .iter()
            .rev()
            .find(|w| w.address == address)
            .map(|w| w.state)
    }

    /// Replay the log and report whether `a` and `b` were ever on together.
    pub fn ever_both_on(&self, a: u16, b: u16) -> bool {
        let (mut on_a, mut on_b) = (false, false);
        for w in &lock(&self.log).writes {
            if w.address == a {
                on_a = w.state;
            } else if w.address == b {
                on_b = w.state;
            }
            if on_a && on_b {
                return true;
            }
        }
        false
    }

    /// Shortest gap between releasing one of `a`/`b` and engaging the other.
    /// Requires a clock.
    pub fn min_switch_gap(&self, a: u16, b: u16) -> Option<Duration> {
        let log = lock(&self.log);
        let mut min: Option<Duration> = None;
        for pair in log.writes.windows(2) {
            let (rel, eng) = (&pair[0], &pair[1]);
            let crossed = (rel.address == a && eng.address == b) || (rel.address == b && eng.address == a);
            if crossed && !rel.state && eng.state {
                if let (Some(t0), Some(t1)) = (rel.at, eng.at) {
                    let gap = t1.saturating_duration_since(t0);
                    min = Some(min.map_or(gap, |m| m.min(gap)));
                }
            }
        }
        min
    }
}

impl CoilWriter for RecordingCoils {
    fn write_coil(
        &mut self,
        hub: &str,
        unit: u8,
        address: u16,
        state: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let at = self.clock.as_ref().map(|c| c.now());
        let mut log = lock(&self.log);
        if log.fail.contains(&(address, state)) {
            return Err(Box::new(std::io::Error::other(format!(
                "injected failure at coil {address}"
            ))));
        }
        log.writes.push(CoilWrite {
            hub: hub.to_owned(),
            unit,
            address,
            state,
            at,
        });
        Ok(())
    }
}

struct Registration {
    id: u64,
    interval: Duration,
    tick: Arc<Mutex<Tick>>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    active: Vec<Registration>,
}

/// Scheduler driven by hand: nothing runs until `fire` is called.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    registry: Arc<Mutex<Registry>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every active tick once. Returns how many ran.
    ///
    /// Ticks run on a snapshot taken without holding the registry lock, so a
    /// tick may cancel itself or register another.
    pub fn fire(&self) -> usize {
        let ticks: Vec<_> = lock(&self.registry)
            .active
            .iter()
            .map(|r| (r.id, r.tick.clone()))
            .collect();
        let mut ran = 0;
        for (id, tick) in ticks {
            // Skip ticks cancelled by an earlier tick in this round.
            if !lock(&self.registry).active.iter().any(|r| r.id == id) {
                continue;
            }
            let mut tick = lock(&tick);
            (*tick)();
            ran += 1;
        }
        ran
    }

    /// Fire `n` rounds, stopping early once nothing is registered.
    pub fn fire_n(&self, n: usize) -> usize {
        let mut total = 0;
        for _ in 0..n {
            let ran = self.fire();
            if ran == 0 {
                break;
            }
            total += ran;
        }
        total
    }

    /// Number of active registrations.
    pub fn active(&self) -> usize {
        lock(&self.registry).active.len()
    }

    /// Interval of each active registration.
    pub fn intervals(&self) -> Vec<Duration> {
        lock(&self.registry).active.iter().map(|r| r.interval).collect()
    }
}

impl Scheduler for ManualScheduler {
    fn every(&self, interval: Duration, tick: Tick) -> TickHandle {
        let mut reg = lock(&self.registry);
        let id = reg.next_id;
        reg.next_id += 1;
        reg.active.push(Registration {
            id,
            interval,
            tick: Arc::new(Mutex::new(tick)),
        });
        TickHandle(id)
    }

    fn cancel(&self, handle: TickHandle) {
        lock(&self.registry).active.retain(|r| r.id != handle.0);
    }
}
