//! Jittered revalidation scheduling.

use std::time::{Duration, Instant};

use rand::Rng;

/// Interval until the next revalidation: `min + uniform[0, max - min)`.
///
/// The jitter keeps many warm instances that started together from
/// revalidating in lockstep.
pub(crate) fn next_interval(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let spread = (max - min).as_nanos().min(u64::MAX as u128) as u64;
    min + Duration::from_nanos(rand::thread_rng().gen_range(0..spread))
}

/// Roughly a century; used when the configured interval overflows `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

pub(crate) fn next_sync(min: Duration, max: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(next_interval(min, max))
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}
