use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use shutter_core::{Direction, TravelConfig, TravelEstimator};
use shutter_traits::ManualClock;

fn estimator(up: f64, down: f64, at: u8) -> (TravelEstimator, ManualClock) {
    let clock = ManualClock::new();
    let mut est = TravelEstimator::new(TravelConfig::new(up, down).unwrap(), Arc::new(clock.clone()));
    est.set_position(at);
    (est, clock)
}

prop_compose! {
    fn travel_secs()(ms in 500u64..120_000) -> f64 {
        ms as f64 / 1000.0
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 256, .. ProptestConfig::default() })]

    // From closed, after t < U seconds the estimate is round(100 t / U) within one unit.
    #[test]
    fn linear_rate_within_rounding(up in travel_secs(), frac in 0.0f64..1.0) {
        let (mut est, clock) = estimator(up, 10.0, 0);
        est.start_travel_up();
        let t = up * frac;
        clock.advance(Duration::from_secs_f64(t));
        let expected = (100.0 * t / up).round();
        let got = f64::from(est.current_position().unwrap());
        prop_assert!((got - expected).abs() <= 1.0, "got {got} expected {expected}");
    }

    // Converges on the target exactly and never passes it on the way.
    #[test]
    fn converges_without_overshoot(
        up in travel_secs(),
        down in travel_secs(),
        from in 0u8..=100,
        target in 0u8..=100,
        step_ms in 10u64..2_000,
    ) {
        prop_assume!(from != target);
        let (mut est, clock) = estimator(up, down, from);
        est.start_travel(target);
        let rising = target > from;
        let mut last = from;
        let mut steps = 0;
        while !est.position_reached() {
            clock.advance(Duration::from_millis(step_ms));
            let p = est.current_position().unwrap();
            if rising {
                prop_assert!(p >= last && p <= target);
            } else {
                prop_assert!(p <= last && p >= target);
            }
            last = p;
            steps += 1;
            prop_assert!(steps < 100_000);
        }
        prop_assert_eq!(est.current_position(), Some(target));
        prop_assert_eq!(est.stop(), Some(target));
    }

    // Stopping twice leaves the same state as stopping once.
    #[test]
    fn stop_is_idempotent(
        from in 0u8..=100,
        target in 0u8..=100,
        run_ms in 0u64..30_000,
        idle_ms in 0u64..30_000,
    ) {
        let (mut est, clock) = estimator(20.0, 15.0, from);
        est.start_travel(target);
        clock.advance(Duration::from_millis(run_ms));
        let once = est.stop();
        clock.advance(Duration::from_millis(idle_ms));
        prop_assert_eq!(est.stop(), once);
        prop_assert_eq!(est.current_position(), once);
        prop_assert_eq!(est.direction(), Direction::Stopped);
        prop_assert!(est.position_reached());
    }

    // Re-arming upward mid-travel continues from the position reached so far.
    #[test]
    fn rearm_continues_from_live_position(
        up in travel_secs(),
        t1_frac in 0.0f64..0.9,
        extra in 1u8..50,
    ) {
        let (mut est, clock) = estimator(up, up, 0);
        est.start_travel_up();
        clock.advance(Duration::from_secs_f64(up * t1_frac));
        let at_t1 = est.current_position().unwrap();
        let target = at_t1.saturating_add(extra).min(100);
        est.start_travel(target);
        prop_assert_eq!(est.current_position(), Some(at_t1));
        clock.advance(Duration::from_millis(1));
        let p = est.current_position().unwrap();
        prop_assert!(p >= at_t1 && p <= at_t1 + 1);
    }
}
