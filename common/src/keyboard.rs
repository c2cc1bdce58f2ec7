use log::warn;
use std::fmt::{Display, Formatter};

pub const MIDI_MIN: i32 = 0;
pub const MIDI_MAX: i32 = 127;
pub const KEY_COUNT: usize = 128;

/// Repeat `ratios` over `span` periods; copy `k` is scaled by `factor^k`. Blocks keep their
/// internal order, so the result is only sorted if the input was sorted and fits in one period.
pub fn repeat(ratios: &[f64], span: u32, factor: f64) -> Vec<f64> {
    if span <= 1 || !(factor > 0.0) {
        return ratios.to_vec();
    }
    let mut result = Vec::with_capacity(ratios.len() * span as usize);
    for k in 0..span {
        let scale = factor.powi(k as i32);
        result.extend(ratios.iter().map(|r| r * scale));
    }
    result
}

/// `span` capped at one period more than the keyboard can hold, which [`fit`] cuts to the same
/// result as the full span.
pub fn useful_span(len: usize, span: u32) -> u32 {
    let cap = u32::try_from(KEY_COUNT / len.max(1) + 1).unwrap_or(u32::MAX);
    span.max(1).min(cap)
}

/// Something [`fit`] had to change to make the ratios fit on the keyboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FitWarning {
    /// More than 128 ratios; only the first 128 are kept.
    TooManyRatios { count: usize },
    /// Truncation mode dropped ratios past key 127.
    Truncated { dropped: usize },
    /// Adaptive mode moved the base key so every ratio has a key.
    BaseKeyMoved { from: i32, to: u8 },
}

impl Display for FitWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FitWarning::TooManyRatios { count } => write!(
                f,
                "number of steps ({count}) exceeds {KEY_COUNT}; only the first {KEY_COUNT} are kept"
            ),
            FitWarning::Truncated { dropped } => {
                write!(f, "series exceeds the MIDI range; truncated {dropped} steps")
            }
            FitWarning::BaseKeyMoved { from, to } => {
                write!(f, "base key moved from {from} to {to} to include all steps")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyMapping {
    pub ratios: Vec<f64>,
    pub base_key: u8,
    pub warnings: Vec<FitWarning>,
}

fn clamp_key(key: i32, max: i32) -> u8 {
    // max is at most MIDI_MAX, so this always fits
    key.clamp(MIDI_MIN, max) as u8
}

/// Place `ratios` on keys `base_key..`. With `prefer_truncate`, the base key is authoritative
/// and ratios past key 127 are dropped; otherwise the base key moves so that all ratios fit.
/// More than 128 ratios are always cut to 128 first.
pub fn fit(ratios: &[f64], base_key: i32, prefer_truncate: bool) -> KeyMapping {
    let mut warnings = Vec::new();
    let mut ratios = ratios.to_vec();
    if ratios.len() > KEY_COUNT {
        warnings.push(FitWarning::TooManyRatios {
            count: ratios.len(),
        });
        ratios.truncate(KEY_COUNT);
    }
    let base_key = if prefer_truncate {
        let key = clamp_key(base_key, MIDI_MAX);
        let room = KEY_COUNT - key as usize;
        if ratios.len() > room {
            warnings.push(FitWarning::Truncated {
                dropped: ratios.len() - room,
            });
            ratios.truncate(room);
        }
        key
    } else {
        let n = ratios.len() as i32;
        let allowed_max = (MIDI_MAX - (n - 1)).clamp(MIDI_MIN, MIDI_MAX);
        let key = clamp_key(base_key, allowed_max);
        if key as i32 != base_key {
            warnings.push(FitWarning::BaseKeyMoved {
                from: base_key,
                to: key,
            });
        }
        key
    };
    for w in &warnings {
        warn!("{w}");
    }
    KeyMapping {
        ratios,
        base_key,
        warnings,
    }
}
