use anyhow::bail;
use clap::ValueEnum;
use intonation_common::compare::ComparisonReference;
use intonation_common::normalize::RATIO_EPS;
use intonation_common::notes::NoteOrHz;
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const DEFAULT_DIAPASON: f64 = 440.0;
pub const DEFAULT_SUBHARMONIC_FUNDAMENTAL: &str = "A5";
pub const DEFAULT_PROXIMITY_HZ: f64 = 17.0;

/// How to decide whether a score table without an explicit interval repeats at the octave.
#[derive(ValueEnum, Deserialize, Copy, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IntervalPolicy {
    /// All ratios in [1, 2]
    #[default]
    Inclusive,
    /// All ratios in [1, 2)
    Exclusive,
}

impl IntervalPolicy {
    /// 2.0 if every ratio lies in the octave this policy accepts, else 0.0.
    pub fn infer(self, ratios: &[f64]) -> f64 {
        let min = ratios.iter().copied().fold(1.0, f64::min);
        let max = ratios.iter().copied().fold(1.0, f64::max);
        let upper_ok = match self {
            IntervalPolicy::Inclusive => max <= 2.0 + RATIO_EPS,
            IntervalPolicy::Exclusive => max < 2.0 - RATIO_EPS,
        };
        if min >= 1.0 - RATIO_EPS && upper_ok {
            2.0
        } else {
            0.0
        }
    }
}

/// Contents of the optional `--config` TOML file. Every key is optional.
#[derive(Deserialize, Debug, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub diapason: Option<f64>,
    pub subharmonic_fundamental: Option<String>,
    pub harmonic_ceiling_hz: Option<f64>,
    pub subharmonic_floor_hz: Option<f64>,
    pub proximity_hz: Option<f64>,
    pub interval_policy: Option<IntervalPolicy>,
}

impl Settings {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        Self::parse(&data).map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))
    }

    pub fn parse(data: &str) -> anyhow::Result<Self> {
        let s: Settings = toml::from_str(data)?;
        s.validate()?;
        Ok(s)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let positive = [
            ("diapason", self.diapason),
            ("harmonic_ceiling_hz", self.harmonic_ceiling_hz),
            ("subharmonic_floor_hz", self.subharmonic_floor_hz),
            ("proximity_hz", self.proximity_hz),
        ];
        for (name, value) in positive {
            if let Some(v) = value
                && !(v > 0.0 && v.is_finite())
            {
                bail!("{name} must be > 0, not {v}");
            }
        }
        if let Some(f) = &self.subharmonic_fundamental {
            f.parse::<NoteOrHz>()?;
        }
        Ok(())
    }

    pub fn diapason(&self) -> f64 {
        self.diapason.unwrap_or(DEFAULT_DIAPASON)
    }

    pub fn subharmonic_fundamental(&self) -> anyhow::Result<NoteOrHz> {
        self.subharmonic_fundamental
            .as_deref()
            .unwrap_or(DEFAULT_SUBHARMONIC_FUNDAMENTAL)
            .parse()
    }

    pub fn harmonic_ceiling_hz(&self) -> f64 {
        self.harmonic_ceiling_hz
            .unwrap_or(ComparisonReference::DEFAULT_HARMONIC_CEILING_HZ)
    }

    pub fn subharmonic_floor_hz(&self) -> f64 {
        self.subharmonic_floor_hz
            .unwrap_or(ComparisonReference::DEFAULT_SUBHARMONIC_FLOOR_HZ)
    }

    pub fn proximity_hz(&self) -> f64 {
        self.proximity_hz.unwrap_or(DEFAULT_PROXIMITY_HZ)
    }

    pub fn interval_policy(&self) -> IntervalPolicy {
        self.interval_policy.unwrap_or_default()
    }
}
