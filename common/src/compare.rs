//! Reference series (harmonic, subharmonic, 12-TET) laid against a custom scale.

use crate::notes::{SEMITONES_PER_OCTAVE, hz_to_note_name};

/// Place ascending `series` values into the half-open windows `[customs[i], customs[i+1])` of
/// the ascending `customs`; the last window is unbounded. A single forward cursor walks the
/// series, so each value lands at most once and placements increase with the window index. A
/// value that does not fall in the current window is simply not placed there; the cursor only
/// advances on a placement.
pub fn align(series: &[f64], customs: &[f64]) -> Vec<Option<f64>> {
    let mut result = vec![None; customs.len()];
    let mut p = 0;
    for (i, slot) in result.iter_mut().enumerate() {
        let low = customs[i];
        let high = customs.get(i + 1).copied().unwrap_or(f64::INFINITY);
        if let Some(&v) = series.get(p)
            && low <= v
            && v < high
        {
            *slot = Some(v);
            p += 1;
        }
    }
    result
}

/// `fundamental * n` for `n = 1, 2, ...` up to and including `ceiling`.
pub fn harmonic_series(fundamental: f64, ceiling: f64) -> Vec<f64> {
    if !(fundamental > 0.0) {
        return Vec::new();
    }
    (1..)
        .map(|n| fundamental * n as f64)
        .take_while(|&v| v <= ceiling)
        .collect()
}

/// `fundamental / m` for `m = 1, 2, ...` down to `floor`, in ascending order.
pub fn subharmonic_series(fundamental: f64, floor: f64) -> Vec<f64> {
    if !(fundamental > 0.0) || !(floor > 0.0) {
        return Vec::new();
    }
    let mut result: Vec<f64> = (1..)
        .map(|m| fundamental / m as f64)
        .take_while(|&v| v >= floor)
        .collect();
    result.reverse();
    result
}

/// Nearest 12-TET pitch to `hz`, anchored at `base`.
pub fn nearest_tet(hz: f64, base: f64) -> Option<f64> {
    if !(hz > 0.0 && base > 0.0) {
        return None;
    }
    let semitones = SEMITONES_PER_OCTAVE as f64;
    let n = (semitones * (hz / base).log2()).round();
    Some(base * 2f64.powf(n / semitones))
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonReference {
    /// Fundamental of the harmonic series and anchor of the 12-TET grid.
    pub fundamental_hz: f64,
    pub subharmonic_fundamental_hz: f64,
    /// A4, used to name 12-TET pitches.
    pub diapason_hz: f64,
    pub harmonic_ceiling_hz: f64,
    pub subharmonic_floor_hz: f64,
}

impl ComparisonReference {
    pub const DEFAULT_HARMONIC_CEILING_HZ: f64 = 10000.0;
    pub const DEFAULT_SUBHARMONIC_FLOOR_HZ: f64 = 16.0;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRow {
    pub step: usize,
    pub midi: i32,
    pub ratio: f64,
    pub custom_hz: f64,
    pub harmonic_hz: Option<f64>,
    pub subharmonic_hz: Option<f64>,
    pub tet_hz: f64,
    pub tet_note: Option<String>,
}

impl ComparisonRow {
    pub fn harmonic_delta(&self) -> Option<f64> {
        self.harmonic_hz.map(|h| self.custom_hz - h)
    }

    pub fn subharmonic_delta(&self) -> Option<f64> {
        self.subharmonic_hz.map(|s| self.custom_hz - s)
    }

    pub fn tet_delta(&self) -> f64 {
        self.custom_hz - self.tet_hz
    }

    /// Whether the custom pitch lies within `threshold_hz` of its aligned harmonic.
    pub fn near_harmonic(&self, threshold_hz: f64) -> bool {
        self.harmonic_delta().is_some_and(|d| d.abs() < threshold_hz)
    }
}

/// One row per ratio, sorted by frequency. Row `i` is reported at key `base_key + i`.
pub fn build_comparison(
    ratios: &[f64],
    base_key: u8,
    base_hz: f64,
    reference: &ComparisonReference,
) -> Vec<ComparisonRow> {
    let mut customs: Vec<(f64, f64)> = ratios.iter().map(|&r| (base_hz * r, r)).collect();
    customs.sort_by(|a, b| a.0.total_cmp(&b.0));
    let custom_hz: Vec<f64> = customs.iter().map(|c| c.0).collect();

    let harmonics = harmonic_series(reference.fundamental_hz, reference.harmonic_ceiling_hz);
    let cutoff = custom_hz
        .first()
        .copied()
        .unwrap_or(reference.fundamental_hz)
        .max(reference.subharmonic_floor_hz);
    let subharmonics: Vec<f64> = subharmonic_series(
        reference.subharmonic_fundamental_hz,
        reference.subharmonic_floor_hz,
    )
    .into_iter()
    .filter(|&v| v >= cutoff)
    .collect();

    let harmonic_aligned = align(&harmonics, &custom_hz);
    let subharmonic_aligned = align(&subharmonics, &custom_hz);

    customs
        .into_iter()
        .enumerate()
        .map(|(step, (custom_hz, ratio))| {
            let tet_hz = nearest_tet(custom_hz, reference.fundamental_hz)
                .unwrap_or(reference.fundamental_hz);
            ComparisonRow {
                step,
                midi: base_key as i32 + step as i32,
                ratio,
                custom_hz,
                harmonic_hz: harmonic_aligned[step],
                subharmonic_hz: subharmonic_aligned[step],
                tet_hz,
                tet_note: hz_to_note_name(tet_hz, reference.diapason_hz),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{assert_all_close, assert_close};

    #[test]
    fn test_align() {
        let customs = [100.0, 200.0, 300.0, 400.0];
        assert_eq!(
            align(&[100.0, 250.0, 300.0, 1000.0], &customs),
            vec![Some(100.0), Some(250.0), Some(300.0), Some(1000.0)]
        );
        // 50 is below every window and holds the cursor
        assert_eq!(
            align(&[50.0, 150.0], &customs),
            vec![None, None, None, None]
        );
        assert_eq!(
            align(&[150.0, 250.0, 350.0], &customs),
            vec![Some(150.0), Some(250.0), Some(350.0), None]
        );
        // 160 misses window 1 and is never placed
        assert_eq!(
            align(&[150.0, 160.0, 350.0], &customs),
            vec![Some(150.0), None, None, None]
        );
        assert_eq!(align(&[], &customs), vec![None; 4]);
        assert!(align(&[1.0], &[]).is_empty());
    }

    #[test]
    fn test_align_properties() {
        let customs: Vec<f64> = (0..24).map(|i| 100.0 * 2f64.powf(i as f64 / 12.0)).collect();
        let series = harmonic_series(100.0, 10000.0);
        let aligned = align(&series, &customs);
        let placed: Vec<f64> = aligned.iter().flatten().copied().collect();
        assert!(placed.windows(2).all(|w| w[0] < w[1]));
        for (i, v) in aligned.iter().enumerate() {
            if let Some(v) = v {
                assert!(*v >= customs[i]);
                if let Some(next) = customs.get(i + 1) {
                    assert!(v < next);
                }
            }
        }
        assert!(placed.len() >= 3);
        // placed values keep series order
        let mut it = series.iter();
        for v in &placed {
            assert!(it.any(|s| s == v));
        }
    }

    #[test]
    fn test_series() {
        let h = harmonic_series(2500.0, 10000.0);
        assert_eq!(h, vec![2500.0, 5000.0, 7500.0, 10000.0]);
        assert!(harmonic_series(0.0, 10000.0).is_empty());
        let s = subharmonic_series(880.0, 16.0);
        assert_eq!(s.len(), 55);
        assert_close(s[0], 16.0, 1e-12);
        assert_eq!(*s.last().unwrap(), 880.0);
        assert!(s.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_nearest_tet() {
        assert_close(nearest_tet(445.0, 440.0).unwrap(), 440.0, 1e-12);
        assert_close(nearest_tet(460.0, 440.0).unwrap(), 466.1637615180899, 1e-9);
        assert_close(nearest_tet(219.0, 440.0).unwrap(), 220.0, 1e-9);
        assert_eq!(nearest_tet(0.0, 440.0), None);
        assert_eq!(nearest_tet(440.0, -1.0), None);
    }

    #[test]
    fn test_build_comparison() {
        let base = 261.6255653005986;
        let reference = ComparisonReference {
            fundamental_hz: base,
            subharmonic_fundamental_hz: 880.0,
            diapason_hz: 440.0,
            harmonic_ceiling_hz: 10000.0,
            subharmonic_floor_hz: 16.0,
        };
        // deliberately unsorted input
        let rows = build_comparison(&[1.5, 1.0, 1.25, 2.0], 60, base, &reference);
        assert_eq!(rows.len(), 4);
        assert_all_close(
            &rows.iter().map(|r| r.ratio).collect::<Vec<_>>(),
            &[1.0, 1.25, 1.5, 2.0],
            0.0,
        );
        assert_eq!(rows.iter().map(|r| r.midi).collect::<Vec<_>>(), vec![60, 61, 62, 63]);
        assert_eq!(rows[0].harmonic_hz, Some(base));
        assert_eq!(rows[0].harmonic_delta(), Some(0.0));
        assert!(rows[0].near_harmonic(17.0));
        assert_eq!(rows[1].harmonic_hz, None);
        assert_eq!(rows[3].harmonic_hz, Some(2.0 * base));
        assert_eq!(rows[0].tet_note.as_deref(), Some("C4"));
        assert_eq!(rows[2].tet_note.as_deref(), Some("G4"));
        assert_close(rows[2].tet_delta(), base * 1.5 - base * 2f64.powf(7.0 / 12.0), 1e-9);
        // subharmonics of 880 at or above the lowest custom pitch are 880/3, 440, 880
        assert_close(rows[0].subharmonic_hz.unwrap(), 880.0 / 3.0, 1e-9);
        assert_eq!(rows[1].subharmonic_hz, None);
        assert_close(rows[2].subharmonic_hz.unwrap(), 440.0, 1e-9);
        assert_close(rows[3].subharmonic_hz.unwrap(), 880.0, 1e-9);
    }
}
