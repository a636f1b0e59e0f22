//! Continuous percentile estimation.

/// Return the `pct` percentile (0.0..=1.0) of an ascending-sorted slice,
/// linearly interpolated between adjacent order statistics.
///
/// The rank is `pct * (n - 1)`; the result lies between the values at the
/// floor and ceiling of that rank. Returns `None` for an empty slice.
#[must_use]
pub fn percentile_cont(sorted: &[f64], pct: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pct = pct.clamp(0.0, 1.0);
    let rank = pct * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let lower = sorted[lo];
    let upper = sorted[hi.min(sorted.len() - 1)];
    Some(lower + (rank - lo as f64) * (upper - lower))
}

/// Sort values ascending. NaN never reaches here: metrics are finite.
pub fn sort_values(values: &mut [f64]) {
    values.sort_by(f64::total_cmp);
}
