//! Property tests for the fan-in manifest and reconnect backoff.

use proptest::prelude::*;

use tracker_common::consts::CLOUD_BACKOFF_DELAYS_S;
use tracker_common::event::{DataKind, DataKinds};
use tracker_core::backoff::ReconnectBackoff;
use tracker_core::manifest::{RecordOutcome, SamplingManifest};

#[derive(Debug, Clone, Copy)]
enum Step {
    Respond(DataKind),
    /// Timeout of an older cycle.
    StaleTimeout,
}

fn kind() -> impl Strategy<Value = DataKind> {
    prop::sample::select(DataKind::ALL.to_vec())
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => kind().prop_map(Step::Respond),
        1 => Just(Step::StaleTimeout),
    ]
}

proptest! {
    /// Whatever the order, duplicates or stale timeouts, a cycle whose every
    /// requested kind answers fires exactly once.
    #[test]
    fn cycle_fires_exactly_once(
        bits in 1u8..0x20,
        noise in prop::collection::vec(step(), 0..40),
        cut in any::<prop::sample::Index>(),
    ) {
        let requested = DataKinds::from_bits_truncate(bits);
        let mut manifest = SamplingManifest::new();
        manifest.begin(DataKinds::BATTERY);
        let cycle = manifest.begin(requested);

        // Every requested kind answers once, spliced into random noise.
        let mut steps = noise.clone();
        let at = cut.index(steps.len() + 1);
        for (i, k) in requested.kinds().enumerate() {
            steps.insert((at + i).min(steps.len()), Step::Respond(k));
        }

        let mut fired = 0;
        for step in steps {
            match step {
                Step::Respond(k) => {
                    if manifest.record(k) == RecordOutcome::Complete {
                        fired += 1;
                    }
                }
                Step::StaleTimeout => {
                    prop_assert!(!manifest.expire(cycle.wrapping_sub(1)));
                }
            }
        }
        // The real timeout arrives last and must lose the race.
        if manifest.expire(cycle) {
            fired += 1;
        }
        prop_assert_eq!(fired, 1);
        prop_assert!(!manifest.is_open());
    }

    /// A cycle missing a response fires on its own timeout only.
    #[test]
    fn incomplete_cycle_fires_on_timeout(
        bits in 2u8..0x20,
        order in prop::collection::vec(kind(), 0..20),
    ) {
        let requested = DataKinds::from_bits_truncate(bits);
        prop_assume!(requested.count() >= 2);
        let missing = requested.kinds().last().unwrap();
        let mut manifest = SamplingManifest::new();
        let cycle = manifest.begin(requested);
        for k in order.into_iter().filter(|k| *k != missing) {
            prop_assert_ne!(manifest.record(k), RecordOutcome::Complete);
        }
        prop_assert!(manifest.expire(cycle));
        prop_assert!(!manifest.expire(cycle));
        prop_assert_eq!(manifest.record(missing), RecordOutcome::Idle);
    }

    /// Delays never shrink, stay within the table and stop after the cap.
    #[test]
    fn backoff_is_monotonic_and_capped(max in 0u32..30) {
        let mut backoff = ReconnectBackoff::new(max);
        let mut delays = Vec::new();
        while let Ok(delay) = backoff.next_delay() {
            delays.push(delay.as_secs());
            prop_assert!(delays.len() <= max as usize + 1);
        }
        prop_assert_eq!(delays.len(), max as usize + 1);
        prop_assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        prop_assert!(delays.iter().all(|d| *d <= *CLOUD_BACKOFF_DELAYS_S.last().unwrap()));
        backoff.reset();
        prop_assert_eq!(backoff.next_delay().unwrap().as_secs(), CLOUD_BACKOFF_DELAYS_S[0]);
    }
}
