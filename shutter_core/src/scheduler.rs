//! Thread-backed periodic scheduler.
//!
//! Each registration gets its own worker thread that waits on a crossbeam
//! channel with a timeout; a timeout is a tick, anything else (the sender
//! being dropped by `cancel` or by the scheduler's `Drop`) ends the loop.
//!
//! `cancel` never joins. A tick may cancel its own registration, and a
//! caller may cancel while the worker is blocked on a lock the caller holds;
//! joining in either case would deadlock. Workers are joined when the
//! scheduler is dropped.
use crossbeam_channel as xch;
use shutter_traits::{Scheduler, Tick, TickHandle};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{JoinHandle, ThreadId};
use std::time::Duration;

use crate::util::lock;

struct Worker {
    stop_tx: xch::Sender<()>,
    join: JoinHandle<()>,
}

#[derive(Default)]
pub struct ThreadScheduler {
    next_id: AtomicU64,
    workers: Mutex<HashMap<u64, Worker>>,
    retired: Mutex<Vec<JoinHandle<()>>>,
}

impl ThreadScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live registrations.
    pub fn active(&self) -> usize {
        lock(&self.workers).len()
    }

    fn reap(&self) {
        let mut retired = lock(&self.retired);
        let (done, pending): (Vec<_>, Vec<_>) =
            retired.drain(..).partition(JoinHandle::is_finished);
        *retired = pending;
        drop(retired);
        for h in done {
            if h.join().is_err() {
                tracing::warn!("scheduler worker panicked");
            }
        }
    }
}

impl Scheduler for ThreadScheduler {
    fn every(&self, interval: Duration, mut tick: Tick) -> TickHandle {
        self.reap();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (stop_tx, stop_rx) = xch::bounded::<()>(0);
        let spawned = std::thread::Builder::new()
            .name(format!("shutter-tick-{id}"))
            .spawn(move || {
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(xch::RecvTimeoutError::Timeout) => tick(),
                        _ => break,
                    }
                }
                tracing::trace!(id, "tick worker exiting");
            });
        match spawned {
            Ok(join) => {
                lock(&self.workers).insert(id, Worker { stop_tx, join });
            }
            Err(e) => {
                tracing::error!(id, error = %e, "failed to spawn tick worker");
            }
        }
        TickHandle(id)
    }

    fn cancel(&self, handle: TickHandle) {
        let worker = lock(&self.workers).remove(&handle.0);
        if let Some(Worker { stop_tx, join }) = worker {
            drop(stop_tx);
            lock(&self.retired).push(join);
        }
    }
}

impl Drop for ThreadScheduler {
    fn drop(&mut self) {
        let me: ThreadId = std::thread::current().id();
        let workers: Vec<_> = lock(&self.workers).drain().map(|(_, w)| w).collect();
        let mut joins = Vec::with_capacity(workers.len());
        for Worker { stop_tx, join } in workers {
            drop(stop_tx);
            joins.push(join);
        }
        joins.append(&mut lock(&self.retired));
        for join in joins {
            // The last owner may be a tick running on its own worker.
            if join.thread().id() == me {
                continue;
            }
            if join.join().is_err() {
                tracing::warn!("scheduler worker panicked during shutdown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn ticks_until_cancelled() {
        let sched = ThreadScheduler::new();
        let n = Arc::new(AtomicUsize::new(0));
        let n2 = n.clone();
        let h = sched.every(
            Duration::from_millis(5),
            Box::new(move || {
                n2.fetch_add(1, Ordering::SeqCst);
            }),
        );
        std::thread::sleep(Duration::from_millis(60));
        sched.cancel(h);
        assert_eq!(sched.active(), 0);
        // Allow an in-flight tick to finish.
        std::thread::sleep(Duration::from_millis(20));
        let after_cancel = n.load(Ordering::SeqCst);
        assert!(after_cancel >= 2, "ticks={after_cancel}");
        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(n.load(Ordering::SeqCst), after_cancel);
    }

    #[test]
    fn cancel_is_idempotent() {
        let sched = ThreadScheduler::new();
        let h = sched.every(Duration::from_millis(50), Box::new(|| {}));
        sched.cancel(h);
        sched.cancel(h);
        sched.cancel(TickHandle(999));
        assert_eq!(sched.active(), 0);
    }
}
