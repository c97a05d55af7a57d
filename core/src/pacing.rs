use std::time::Duration;

use rand::Rng;

/// Randomized inter-line pacing. Roughly one line in ten gets a small
/// delay; the other nine display immediately, so normal runs are not
/// materially slowed.
///
/// The policy is advisory only: callers must perform the returned
/// delay as a cancellable wait so it never blocks shutdown.
///
/// ~10% chance of delaying the next line.
pub fn should_delay(rng: &mut impl Rng) -> bool {
    rng.random_range(0..999) < 100
}

/// Delay length in 5 ms steps, uniform over {5, 10, ..., 95}.
pub fn delay(rng: &mut impl Rng) -> Duration {
    Duration::from_millis(rng.random_range(1..=19) * 5)
}
