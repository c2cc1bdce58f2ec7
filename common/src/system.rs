use crate::cents_to_ratio;
use crate::normalize::{RATIO_EPS, normalize};
use crate::ratio::{DanielouExponents, RatioValue};
use anyhow::bail;
use clap::ValueEnum;
use log::debug;

/// Ratios produced by one generator, plus the factor after which they repeat.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedScale {
    pub ratios: Vec<f64>,
    pub interval: f64,
}

/// Which `a = -1` fifth counts the full Danielou grid uses. The two revisions disagree:
/// `First` descends 5 and ascends 3, `Second` descends 4 and ascends 3.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GridRevision {
    /// a = -1 series: 5 descending, 3 ascending fifths
    First,
    /// a = -1 series: 4 descending, 3 ascending fifths
    #[default]
    Second,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DanielouMode {
    /// One ratio per triple, in the order given.
    Manual(Vec<DanielouExponents>),
    Subset,
    FullGrid(GridRevision),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SystemSpec {
    /// `index` equal divisions of `width_cents`.
    EqualStep { index: i64, width_cents: f64 },
    Geometric {
        generator: RatioValue,
        steps: i64,
        interval: RatioValue,
    },
    /// The 4:5:6 lattice `(3/2)^a (5/4)^b`, `|a| <= a_max`, `|b| <= b_max`.
    Natural { a_max: u32, b_max: u32 },
    Danielou(DanielouMode),
}

impl SystemSpec {
    pub fn generate(&self, reduce: bool) -> anyhow::Result<GeneratedScale> {
        let scale = match self {
            SystemSpec::EqualStep { index, width_cents } => equal_step(*index, *width_cents)?,
            SystemSpec::Geometric {
                generator,
                steps,
                interval,
            } => geometric(*generator, *steps, *interval, reduce)?,
            SystemSpec::Natural { a_max, b_max } => GeneratedScale {
                ratios: natural(*a_max, *b_max, reduce),
                interval: 2.0,
            },
            SystemSpec::Danielou(mode) => GeneratedScale {
                ratios: danielou(mode, reduce),
                interval: 2.0,
            },
        };
        if !scale.interval.is_finite() {
            bail!("repetition interval {} is out of range", scale.interval);
        }
        if let Some(r) = scale.ratios.iter().find(|r| !(r.is_finite() && **r > 0.0)) {
            bail!("generated ratio {r} is out of range; try reducing into the interval");
        }
        debug!(
            "generated {} ratios, interval {}",
            scale.ratios.len(),
            scale.interval
        );
        Ok(scale)
    }
}

pub fn equal_step(index: i64, width_cents: f64) -> anyhow::Result<GeneratedScale> {
    if index <= 0 {
        bail!("equal-step index must be > 0, not {index}");
    }
    if !(width_cents > 0.0) || !width_cents.is_finite() {
        bail!("equal-step width must be > 0 cents, not {width_cents}");
    }
    let interval = cents_to_ratio(width_cents);
    let step = interval.powf(1.0 / index as f64);
    let ratios = (0..index).map(|i| step.powf(i as f64)).collect();
    Ok(GeneratedScale { ratios, interval })
}

/// `generator^0 .. generator^(steps-1)`, each reduced into `[1, interval)` unless `reduce` is
/// false. Generation order is kept.
pub fn geometric(
    generator: RatioValue,
    steps: i64,
    interval: RatioValue,
    reduce: bool,
) -> anyhow::Result<GeneratedScale> {
    if steps <= 0 {
        bail!("number of geometric steps must be > 0, not {steps}");
    }
    let g = generator.as_float();
    if !(g > 0.0) || !g.is_finite() {
        bail!("geometric generator must be finite and > 0, not {generator}");
    }
    let i = interval.as_float();
    if !(i > 1.0) || !i.is_finite() {
        bail!("geometric interval must be finite and > 1, not {interval}");
    }
    let steps = i32::try_from(steps)
        .map_err(|_| anyhow::anyhow!("too many geometric steps: {steps}"))?;
    let ratios = (0..steps)
        .map(|i| {
            if reduce {
                RatioValue::reduced_product(&[(generator, i)], interval).as_float()
            } else {
                generator.power(i).as_float()
            }
        })
        .collect();
    Ok(GeneratedScale {
        ratios,
        interval: interval.as_float(),
    })
}

pub fn natural(a_max: u32, b_max: u32, reduce: bool) -> Vec<f64> {
    let fifth = RatioValue::Exact((3, 2).into());
    let third = RatioValue::Exact((5, 4).into());
    let (a_max, b_max) = (a_max as i32, b_max as i32);
    let mut values = Vec::new();
    for a in -a_max..=a_max {
        for b in -b_max..=b_max {
            values.push(fifth.power(a) * third.power(b));
        }
    }
    normalize(values, reduce)
}

fn danielou_terms(e: DanielouExponents) -> [(RatioValue, i32); 3] {
    [
        (RatioValue::Exact((6, 5).into()), e.a),
        (RatioValue::Exact((3, 2).into()), e.b),
        (RatioValue::integer(2), e.c),
    ]
}

fn danielou_ratio(e: DanielouExponents) -> RatioValue {
    danielou_terms(e)
        .into_iter()
        .fold(RatioValue::integer(1), |acc, (base, k)| acc * base.power(k))
}

pub fn danielou(mode: &DanielouMode, reduce: bool) -> Vec<f64> {
    match mode {
        DanielouMode::Manual(triples) => triples
            .iter()
            .map(|&e| {
                if reduce {
                    RatioValue::reduced_product(&danielou_terms(e), RatioValue::integer(2))
                        .as_float()
                } else {
                    danielou_ratio(e).as_float()
                }
            })
            .collect(),
        DanielouMode::Subset => normalize(danielou_subset(), reduce),
        DanielouMode::FullGrid(revision) => {
            let values = normalize(danielou_grid(*revision), reduce);
            if reduce {
                fifty_three(values)
            } else {
                values
            }
        }
    }
}

fn danielou_subset() -> Vec<RatioValue> {
    let fifth = RatioValue::Exact((3, 2).into());
    let minor_third = RatioValue::Exact((6, 5).into());
    let major_sixth = RatioValue::Exact((5, 3).into());
    let mut values = vec![RatioValue::integer(1)];
    values.extend((-5..=5).map(|b| fifth.power(b)));
    values.extend((1..=3).map(|k| minor_third.power(k)));
    values.extend((1..=3).map(|k| major_sixth.power(k)));
    values
}

/// Each series is centered on `(6/5)^a` and extends by the given number of descending and
/// ascending fifths.
fn grid_series(revision: GridRevision) -> [(i32, u32, u32); 7] {
    let minus_one = match revision {
        GridRevision::First => (-1, 5, 3),
        GridRevision::Second => (-1, 4, 3),
    };
    [
        (0, 5, 5),
        (1, 3, 4),
        minus_one,
        (2, 4, 4),
        (-2, 4, 4),
        (3, 4, 0),
        (-3, 0, 4),
    ]
}

fn danielou_grid(revision: GridRevision) -> Vec<RatioValue> {
    let mut values = Vec::new();
    for (a, descending, ascending) in grid_series(revision) {
        let (descending, ascending) = (descending as i32, ascending as i32);
        values.extend(
            (-descending..=ascending).map(|b| danielou_ratio(DanielouExponents { a, b, c: 0 })),
        );
    }
    values
}

/// Force the unison, keep the lowest 52 distinct degrees, and close with the octave.
fn fifty_three(mut values: Vec<f64>) -> Vec<f64> {
    const DEGREES: usize = 52;
    if values.first().is_none_or(|&v| (v - 1.0).abs() > RATIO_EPS) {
        values.push(1.0);
        values.sort_by(f64::total_cmp);
    }
    let mut result: Vec<f64> = Vec::with_capacity(DEGREES + 1);
    for v in values {
        if result.len() == DEGREES {
            break;
        }
        if result.last().is_none_or(|&last| (v - last).abs() > RATIO_EPS) {
            result.push(v);
        }
    }
    result.push(2.0);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{assert_all_close, assert_close};

    fn exact(n: i64, d: i64) -> RatioValue {
        RatioValue::new(n, d).unwrap()
    }

    #[test]
    fn test_equal_step() -> anyhow::Result<()> {
        let s = SystemSpec::EqualStep {
            index: 12,
            width_cents: 1200.0,
        }
        .generate(true)?;
        assert_eq!(s.ratios.len(), 12);
        assert_close(s.ratios[0], 1.0, 1e-12);
        assert_close(s.ratios[1], 1.059463, 1e-6);
        assert_close(s.ratios[7], 1.498307, 1e-6);
        assert_close(s.interval, 2.0, 1e-12);

        let s = equal_step(13, 1901.955)?;
        assert_eq!(s.ratios.len(), 13);
        assert_close(s.interval, 3.0, 1e-5);

        assert!(equal_step(0, 1200.0).is_err());
        assert!(equal_step(-3, 1200.0).is_err());
        assert!(equal_step(12, 0.0).is_err());
        assert!(equal_step(12, -100.0).is_err());
        Ok(())
    }

    #[test]
    fn test_geometric() -> anyhow::Result<()> {
        let s = geometric(exact(3, 2), 12, RatioValue::integer(2), true)?;
        assert_eq!(s.interval, 2.0);
        assert_eq!(s.ratios.len(), 12);
        assert!(s.ratios.iter().all(|&r| (1.0..2.0).contains(&r)));
        // generation order: 1, 3/2, 9/8, 27/16, ...
        assert_all_close(&s.ratios[..4], &[1.0, 1.5, 1.125, 1.6875], 1e-12);
        let distinct = normalize(s.ratios.clone(), false);
        assert_eq!(distinct.len(), 12);

        let s = geometric(exact(3, 2), 4, RatioValue::integer(2), false)?;
        assert_all_close(&s.ratios, &[1.0, 1.5, 2.25, 3.375], 1e-12);

        let s = geometric(
            RatioValue::Float(1.25),
            3,
            RatioValue::Float(crate::cents_to_ratio(700.0)),
            true,
        )?;
        assert!(s.ratios.iter().all(|&r| r >= 1.0 && r < s.interval));

        assert!(geometric(exact(3, 2), 0, RatioValue::integer(2), true).is_err());
        assert!(geometric(RatioValue::integer(0), 5, RatioValue::integer(2), true).is_err());
        assert!(geometric(exact(-3, 2), 5, RatioValue::integer(2), true).is_err());
        assert!(geometric(exact(3, 2), 5, RatioValue::integer(1), true).is_err());
        let octave = RatioValue::integer(2);
        assert!(geometric(RatioValue::Float(f64::INFINITY), 3, octave, true).is_err());
        assert!(geometric(RatioValue::Float(f64::NAN), 3, octave, true).is_err());
        assert!(geometric(exact(3, 2), 3, RatioValue::Float(f64::INFINITY), true).is_err());
        Ok(())
    }

    #[test]
    fn test_large_exponents_reduce() -> anyhow::Result<()> {
        let e = |a, b, c| DanielouExponents { a, b, c };
        let mode = DanielouMode::Manual(vec![e(0, 0, 1100), e(-400, 300, 0)]);
        let r = danielou(&mode, true);
        assert_eq!(r[0], 1.0);
        assert!((1.0..2.0).contains(&r[1]));

        let s = geometric(RatioValue::integer(1000), 128, RatioValue::integer(2), true)?;
        assert_eq!(s.ratios.len(), 128);
        assert!(s.ratios.iter().all(|&r| (1.0..2.0).contains(&r)));
        // 1000^k folded into the octave is 2^frac(k log2 1000)
        assert_close(s.ratios[127], 2f64.powf((127.0 * 1000f64.log2()).fract()), 1e-9);

        let s = geometric(RatioValue::Float(1000.0), 128, RatioValue::integer(2), true)?;
        assert!(s.ratios.iter().all(|&r| (1.0..2.0).contains(&r)));

        // without reduction the values really are out of range
        let spec = SystemSpec::Danielou(mode);
        assert!(spec.generate(true).is_ok());
        assert!(spec.generate(false).is_err());
        let spec = SystemSpec::Geometric {
            generator: RatioValue::integer(1000),
            steps: 128,
            interval: RatioValue::integer(2),
        };
        assert!(spec.generate(false).is_err());
        Ok(())
    }

    #[test]
    fn test_natural() {
        assert_all_close(&natural(0, 1, true), &[1.0, 1.25, 1.6], 1e-12);
        assert_all_close(&natural(0, 1, false), &[0.8, 1.0, 1.25], 1e-12);
        let expected = [1.0, 16.0 / 15.0, 1.2, 1.25, 4.0 / 3.0, 1.5, 1.6, 5.0 / 3.0, 1.875];
        assert_all_close(&natural(1, 1, true), &expected, 1e-12);
        assert_eq!(natural(0, 0, true), vec![1.0]);
    }

    #[test]
    fn test_danielou_manual() {
        let e = |a, b, c| DanielouExponents { a, b, c };
        let mode = DanielouMode::Manual(vec![e(0, 1, 0), e(1, 0, 0), e(0, 0, 1), e(0, 2, 0)]);
        assert_all_close(&danielou(&mode, true), &[1.5, 1.2, 1.0, 1.125], 1e-12);
        assert_all_close(&danielou(&mode, false), &[1.5, 1.2, 2.0, 2.25], 1e-12);
    }

    #[test]
    fn test_danielou_subset() {
        let r = danielou(&DanielouMode::Subset, true);
        assert_eq!(r.len(), 17);
        assert_eq!(r[0], 1.0);
        assert_close(r[1], 1.0534979423868314, 1e-12);
        assert_close(r[16], 1.8984375, 1e-12);
        assert!(r.contains(&1.2));
        assert!(r.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_danielou_grid() {
        for revision in [GridRevision::First, GridRevision::Second] {
            let r = danielou(&DanielouMode::FullGrid(revision), true);
            assert_eq!(r.len(), 53);
            assert_eq!(r[0], 1.0);
            assert_eq!(r[52], 2.0);
            assert!(r.windows(2).all(|w| w[0] < w[1]));
        }
        let r = danielou(&DanielouMode::FullGrid(GridRevision::Second), true);
        assert_all_close(&r[..4], &[1.0, 1.0125, 1.024, 1.0416666666666667], 1e-12);
        assert_all_close(&r[50..], &[1.875, 1.8984375, 2.0], 1e-12);

        // without reduction there is no 53-degree closure
        let r = danielou(&DanielouMode::FullGrid(GridRevision::Second), false);
        assert_eq!(r.len(), 55);
    }

    #[test]
    fn test_fifty_three_adds_unison() {
        let r = fifty_three(vec![1.1, 1.2]);
        assert_eq!(r, vec![1.0, 1.1, 1.2, 2.0]);
    }
}
