//! Small shared helpers.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lowest reportable position (fully closed).
pub const CLOSED: u8 = 0;
/// Highest reportable position (fully open).
pub const OPEN: u8 = 100;

/// Lock a mutex, recovering the guard if a previous holder panicked.
///
/// Cover state stays meaningful after a panicking tick, so poisoning is not
/// treated as fatal.
#[inline]
pub fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Round a fractional percentage to the nearest integer position in
/// `[CLOSED, OPEN]`. Non-finite values map to `CLOSED`.
#[inline]
pub fn round_percent(p: f64) -> u8 {
    if !p.is_finite() {
        return CLOSED;
    }
    p.round().clamp(f64::from(CLOSED), f64::from(OPEN)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_nearest_not_down() {
        assert_eq!(round_percent(49.5), 50);
        assert_eq!(round_percent(49.49), 49);
        assert_eq!(round_percent(0.6), 1);
    }

    #[test]
    fn clamps_and_handles_non_finite() {
        assert_eq!(round_percent(-3.0), 0);
        assert_eq!(round_percent(140.2), 100);
        assert_eq!(round_percent(f64::NAN), 0);
        assert_eq!(round_percent(f64::INFINITY), 0);
    }

    #[test]
    fn lock_survives_poison() {
        let m = std::sync::Arc::new(Mutex::new(5));
        let m2 = m.clone();
        let _ = std::thread::spawn(move || {
            let _g = m2.lock().unwrap();
            panic!("poison");
        })
        .join();
        assert!(m.is_poisoned());
        assert_eq!(*lock(&m), 5);
    }
}
