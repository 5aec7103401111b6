//! Averaging-window difficulty retarget with damped, clamped timespans.

use alloy_primitives::U256;
use dpow_types::context::PowParams;

use crate::target::{get_compact, set_compact, target_from_be_bytes};

/// The two header fields the retarget reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderSummary {
    pub bits: u32,
    pub median_time_past: i64,
}

/// Compact target of the block after the newest header in `headers`
/// (oldest first).
///
/// The window is the newest `averaging_window` headers; the header just
/// before it supplies the starting median time. With too little history
/// the proof-of-work limit applies.
pub fn next_work_required(headers: &[HeaderSummary], params: &PowParams) -> u32 {
    let pow_limit = target_from_be_bytes(params.pow_limit);
    let window = params.averaging_window as usize;
    if window == 0 || headers.len() < window + 1 {
        return get_compact(pow_limit, false);
    }
    let last = headers[headers.len() - 1];
    let first = headers[headers.len() - window - 1];

    let total = headers[headers.len() - window..]
        .iter()
        .fold(U256::ZERO, |acc, h| acc.saturating_add(set_compact(h.bits).target));
    let average = total / U256::from(window as u64);

    calculate_next_work_required(
        average,
        last.median_time_past,
        first.median_time_past,
        params,
    )
}

/// Scale `average` by the damped actual timespan of the window.
pub fn calculate_next_work_required(
    average: U256,
    last_median_time: i64,
    first_median_time: i64,
    params: &PowParams,
) -> u32 {
    let timespan = params.averaging_window_timespan();
    let actual = last_median_time.saturating_sub(first_median_time);
    let damped = (timespan + (actual.saturating_sub(timespan)) / 4)
        .clamp(params.min_actual_timespan(), params.max_actual_timespan());

    // Divide first: the result must be bit-exact with other nodes.
    let mut next = average / U256::from(timespan.max(1) as u64);
    next = next.saturating_mul(U256::from(damped.max(0) as u64));

    let pow_limit = target_from_be_bytes(params.pow_limit);
    if next > pow_limit {
        next = pow_limit;
    }
    tracing::trace!(actual, damped, bits = get_compact(next, false), "retarget");
    get_compact(next, false)
}
