use crate::ratio::RatioValue;

/// Absolute tolerance under which two ratios are the same pitch.
pub const RATIO_EPS: f64 = 1e-9;

pub fn same_ratio(a: f64, b: f64) -> bool {
    (a - b).abs() <= RATIO_EPS
}

/// Optionally octave-reduce, convert to float, drop near-duplicates (the first occurrence
/// wins), and sort ascending.
pub fn normalize<I, R>(ratios: I, reduce_octave: bool) -> Vec<f64>
where
    I: IntoIterator<Item = R>,
    R: Into<RatioValue>,
{
    let mut result = dedup(ratios.into_iter().map(|r| {
        let r: RatioValue = r.into();
        if reduce_octave {
            r.reduce_to_octave().as_float()
        } else {
            r.as_float()
        }
    }));
    result.sort_by(f64::total_cmp);
    result
}

/// Drop values within [`RATIO_EPS`] of an earlier value, keeping order.
pub fn dedup(values: impl IntoIterator<Item = f64>) -> Vec<f64> {
    let mut result: Vec<f64> = Vec::new();
    for v in values {
        if !result.iter().any(|&seen| same_ratio(seen, v)) {
            result.push(v);
        }
    }
    result
}
