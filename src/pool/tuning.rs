//! Adaptive refill controllers
//!
//! Two independent first-order controllers run once per refill sweep.
//! The interval controller reacts to consumption pressure: a queue
//! draining faster than it fills means shorter delays between sweeps.
//! The capacity controller reacts to dialing productivity: a low success
//! ratio means the upstream is unhappy and the target shrinks to stop
//! hammering it.

use std::time::Duration;

/// Interval adjustment step
const INTERVAL_STEP: Duration = Duration::from_millis(100);

/// Compute the next refill interval
///
/// `idle` is the ready-queue length observed before the fill phase.
/// Below 20% occupancy the interval shrinks by one step, above 80% it
/// grows by one step; the result never crosses `[min_ivl, max_ivl]`.
/// Thresholds use integer arithmetic, so small capacities only move on
/// the extremes.
pub(crate) fn next_interval(
    idle: usize,
    capacity: usize,
    current: Duration,
    min_ivl: Duration,
    max_ivl: Duration,
) -> Duration {
    if idle < capacity * 2 / 10 && current > min_ivl {
        return current.saturating_sub(INTERVAL_STEP).max(min_ivl);
    }

    if idle > capacity * 8 / 10 && current < max_ivl {
        return (current + INTERVAL_STEP).min(max_ivl);
    }

    current
}

/// Compute the next target capacity
///
/// `created` is the number of successful publishes in the sweep that
/// just finished. A success ratio below 0.2 shrinks the target by one,
/// above 0.8 grows it by one, always within `[min_cap, max_cap]`.
pub(crate) fn next_capacity(
    created: usize,
    capacity: usize,
    min_cap: usize,
    max_cap: usize,
) -> usize {
    if capacity == 0 {
        return capacity;
    }

    let ratio = created as f64 / capacity as f64;

    if ratio < 0.2 && capacity > min_cap {
        return capacity - 1;
    }

    if ratio > 0.8 && capacity < max_cap {
        return capacity + 1;
    }

    capacity
}
