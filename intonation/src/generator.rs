use crate::config::{IntervalPolicy, Settings};
use crate::tabular::{JsonFile, Stdout, TableSink, TextFile};
use anyhow::{anyhow, bail};
use clap::{ArgGroup, Parser};
use cpstun::{CpstunTable, ScoreDocument};
use intonation_common::compare::{ComparisonReference, build_comparison};
use intonation_common::keyboard::{KeyMapping, fit, repeat, useful_span};
use intonation_common::notes::NoteOrHz;
use intonation_common::ratio::{DanielouExponents, IntervalSpec, RatioValue};
use intonation_common::system::{DanielouMode, GridRevision, SystemSpec};
use log::{debug, info};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub mod cpstun;
pub mod report;
pub mod tun;


#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("system").multiple(false)))]
pub struct GenerateOptions {
    /// Base name for output. The score table goes to OUTPUT.csd; reports are named after OUTPUT,
    /// or OUTPUT_<table-id> if OUTPUT.csd already existed.
    #[arg(default_value = "out")]
    pub output: PathBuf,
    /// TOML file with reference settings (diapason, subharmonic_fundamental,
    /// harmonic_ceiling_hz, subharmonic_floor_hz, proximity_hz, interval_policy)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Frequency of A4 in Hz; default 440
    #[arg(long)]
    pub diapason: Option<f64>,
    /// MIDI key that plays the first ratio
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u8).range(0..=127))]
    pub basekey: u8,
    /// Note name (C4, F#3, Bb2) or frequency in Hz that ratio 1 sounds at
    #[arg(long, default_value = "C4")]
    pub basenote: NoteOrHz,

    /// Equal-step system: INDEX divisions of WIDTH. WIDTH is cents when it is an integer or has a
    /// c/cent/cents suffix, otherwise a ratio (3/2, 2.0). This is the default (12 1200).
    #[arg(long, group = "system", num_args = 2, value_names = ["INDEX", "WIDTH"])]
    pub et: Option<Vec<String>>,
    /// Geometric system: GEN^0 .. GEN^(STEPS-1) reduced into INTERVAL (default 2/1). INTERVAL
    /// follows the same cents/ratio rule as --et WIDTH.
    #[arg(
        long,
        group = "system",
        num_args = 2..=3,
        value_names = ["GEN", "STEPS", "INTERVAL"]
    )]
    pub geometric: Option<Vec<String>>,
    /// Natural 4:5:6 system: (3/2)^a (5/4)^b for |a| <= A_MAX, |b| <= B_MAX
    #[arg(long, group = "system", num_args = 2, value_names = ["A_MAX", "B_MAX"])]
    pub natural: Option<Vec<u32>>,
    /// Danielou ratio (6/5)^a (3/2)^b 2^c given as a,b,c (or a:b:c, a;b;c, [a,b,c]); a single
    /// integer a means a,0,1. Repeat for more ratios.
    #[arg(
        long,
        group = "system",
        allow_hyphen_values = true,
        value_parser = DanielouExponents::parse
    )]
    pub danielou: Vec<DanielouExponents>,
    /// Full 53-degree Danielou grid
    #[arg(long, group = "system")]
    pub danielou_all: bool,
    /// Danielou subset: the fifths axis plus three minor-third and three major-sixth harmonics
    #[arg(long, group = "system")]
    pub danielou_subset: bool,
    /// Fifth counts used by the grid's a = -1 series
    #[arg(long, value_enum, default_value_t)]
    pub danielou_grid: GridRevision,

    /// Do not reduce ratios into the repetition interval
    #[arg(long)]
    pub no_reduce: bool,
    /// Repeat the system over this many intervals
    #[arg(long, visible_alias = "ambitus", default_value_t = 1)]
    pub span: u32,
    /// Write the spanned ratios to the score table with interval 0
    #[arg(long)]
    pub interval_zero: bool,
    /// Keep the base key and drop ratios past key 127 instead of moving the base key
    #[arg(long)]
    pub midi_truncate: bool,
    /// Infer the score table interval (2 or 0) from the ratios instead of using the system's
    /// repetition interval
    #[arg(long)]
    pub infer_interval: bool,
    /// Octave test used by --infer-interval
    #[arg(long, value_enum)]
    pub interval_policy: Option<IntervalPolicy>,

    /// Also write an AnaMark .tun file
    #[arg(long)]
    pub export_tun: bool,
    /// Also write the report tables as JSON
    #[arg(long)]
    pub json: bool,
    /// Fundamental for the harmonic series and the 12-TET grid (note, Hz, or "basenote")
    #[arg(long)]
    pub compare_fund: Option<NoteOrHz>,
    /// Fundamental for the subharmonic series (note or Hz); default A5
    #[arg(long)]
    pub subharm_fund: Option<NoteOrHz>,
}

impl GenerateOptions {
    /// Options for `output` with every other setting at its default.
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            config: None,
            diapason: None,
            basekey: 60,
            basenote: NoteOrHz::Note("C4".to_string()),
            et: None,
            geometric: None,
            natural: None,
            danielou: Vec::new(),
            danielou_all: false,
            danielou_subset: false,
            danielou_grid: GridRevision::default(),
            no_reduce: false,
            span: 1,
            interval_zero: false,
            midi_truncate: false,
            infer_interval: false,
            interval_policy: None,
            export_tun: false,
            json: false,
            compare_fund: None,
            subharm_fund: None,
        }
    }
}

/// Ratios placed on the keyboard and anchored at an absolute frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct TuningSystem {
    pub ratios: Vec<f64>,
    /// Repetition factor; 0 when the ratios do not repeat.
    pub interval: f64,
    pub base_key: u8,
    pub base_frequency: f64,
}

impl TuningSystem {
    fn from_mapping(mapping: KeyMapping, interval: f64, base_frequency: f64) -> Self {
        Self {
            ratios: mapping.ratios,
            interval,
            base_key: mapping.base_key,
            base_frequency,
        }
    }
}

/// Everything a run produced.
#[derive(Debug)]
pub struct Generated {
    pub table_id: u32,
    pub score: PathBuf,
    pub export_base: PathBuf,
    /// The system used for the console table, reports, and TUN file.
    pub effective: TuningSystem,
    /// The system written to the score table.
    pub scored: TuningSystem,
}

fn parse_integer<T: std::str::FromStr>(what: &str, s: &str) -> anyhow::Result<T> {
    s.trim()
        .parse()
        .map_err(|_| anyhow!("{what} must be an integer, not {s:?}"))
}

fn parse_generator(s: &str) -> anyhow::Result<RatioValue> {
    RatioValue::parse(s).or_else(|e| {
        s.trim()
            .parse::<f64>()
            .map(RatioValue::Float)
            .map_err(|_| anyhow!("invalid geometric generator {s:?}: {e}"))
    })
}

/// The tuning system selected by the options.
pub fn system_spec(options: &GenerateOptions) -> anyhow::Result<SystemSpec> {
    if let Some(args) = &options.natural {
        let [a_max, b_max] = args.as_slice() else {
            bail!("--natural takes A_MAX and B_MAX");
        };
        return Ok(SystemSpec::Natural {
            a_max: *a_max,
            b_max: *b_max,
        });
    }
    if options.danielou_all {
        return Ok(SystemSpec::Danielou(DanielouMode::FullGrid(
            options.danielou_grid,
        )));
    }
    if options.danielou_subset {
        return Ok(SystemSpec::Danielou(DanielouMode::Subset));
    }
    if !options.danielou.is_empty() {
        return Ok(SystemSpec::Danielou(DanielouMode::Manual(
            options.danielou.clone(),
        )));
    }
    if let Some(args) = &options.geometric {
        let (generator, steps, interval) = match args.as_slice() {
            [g, s] => (g, s, "2/1"),
            [g, s, i] => (g, s, i.as_str()),
            _ => bail!("--geometric takes GEN STEPS [INTERVAL]"),
        };
        return Ok(SystemSpec::Geometric {
            generator: parse_generator(generator)?,
            steps: parse_integer("geometric STEPS", steps)?,
            interval: IntervalSpec::parse(interval)?.to_ratio()?,
        });
    }
    let (index, width_cents) = match &options.et {
        None => (12, 1200.0),
        Some(args) => {
            let [index, width] = args.as_slice() else {
                bail!("--et takes INDEX and WIDTH");
            };
            (
                parse_integer("equal-step INDEX", index)?,
                IntervalSpec::parse(width)?.to_cents(),
            )
        }
    };
    Ok(SystemSpec::EqualStep { index, width_cents })
}

/// `path` with `suffix` appended to its final component.
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = OsString::from(path.as_os_str());
    s.push(suffix);
    PathBuf::from(s)
}

fn positive(what: &str, value: f64) -> anyhow::Result<f64> {
    if !(value > 0.0) || !value.is_finite() {
        bail!("{what} must be > 0, not {value}");
    }
    Ok(value)
}

/// Generate the selected system, append it to the score document, and write the reports.
pub fn generate(options: GenerateOptions) -> anyhow::Result<Generated> {
    let settings = match &options.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    let diapason = positive("diapason", options.diapason.unwrap_or(settings.diapason()))?;
    if options.basenote == NoteOrHz::BaseNote {
        bail!("--basenote must be a note name or a frequency");
    }
    let base_frequency = options.basenote.resolve(diapason, f64::NAN)?;
    let compare_fund = options
        .compare_fund
        .as_ref()
        .unwrap_or(&NoteOrHz::BaseNote)
        .resolve(diapason, base_frequency)?;
    let subharm_fund = match &options.subharm_fund {
        Some(f) => f.clone(),
        None => settings.subharmonic_fundamental()?,
    }
    .resolve(diapason, base_frequency)?;
    let reference = ComparisonReference {
        fundamental_hz: compare_fund,
        subharmonic_fundamental_hz: subharm_fund,
        diapason_hz: diapason,
        harmonic_ceiling_hz: settings.harmonic_ceiling_hz(),
        subharmonic_floor_hz: settings.subharmonic_floor_hz(),
    };
    let policy = options
        .interval_policy
        .unwrap_or(settings.interval_policy());
    debug!("base frequency {base_frequency} Hz, reference {reference:?}");

    let scale = system_spec(&options)?.generate(!options.no_reduce)?;
    let span = useful_span(scale.ratios.len(), options.span);
    let spanned = repeat(&scale.ratios, span, scale.interval);
    let basekey = options.basekey as i32;
    let effective = TuningSystem::from_mapping(
        fit(&spanned, basekey, options.midi_truncate),
        scale.interval,
        base_frequency,
    );

    let (score_ratios, score_interval) = if options.interval_zero {
        (&spanned, 0.0)
    } else {
        (&scale.ratios, scale.interval)
    };
    let score_mapping = fit(score_ratios, basekey, options.midi_truncate);
    let score_interval = if options.infer_interval {
        policy.infer(&score_mapping.ratios)
    } else {
        score_interval
    };
    let scored = TuningSystem::from_mapping(score_mapping, score_interval, base_frequency);
    debug!(
        "score table: {} ratios, interval {}, base key {}",
        scored.ratios.len(),
        scored.interval,
        scored.base_key
    );

    let system_table = report::system_table(&effective.ratios, effective.base_key, base_frequency);
    Stdout.write_table(&system_table)?;

    let score = with_suffix(&options.output, ".csd");
    let mut document = ScoreDocument::open(&score)?;
    let table_id = document.append_table(&CpstunTable::new(
        &scored.ratios,
        scored.interval,
        scored.base_frequency,
        scored.base_key,
    ))?;
    let export_base = if document.existed() {
        with_suffix(&options.output, &format!("_{table_id}"))
    } else {
        options.output.clone()
    };

    let rows = build_comparison(
        &effective.ratios,
        effective.base_key,
        base_frequency,
        &reference,
    );
    let comparison_table = report::comparison_table(&rows, settings.proximity_hz());
    TextFile {
        path: with_suffix(&export_base, "_system.txt"),
    }
    .write_table(&system_table)?;
    TextFile {
        path: with_suffix(&export_base, "_compare.txt"),
    }
    .write_table(&comparison_table)?;
    if options.json {
        JsonFile {
            path: with_suffix(&export_base, "_system.json"),
        }
        .write_table(&system_table)?;
        JsonFile {
            path: with_suffix(&export_base, "_compare.json"),
        }
        .write_table(&comparison_table)?;
    }
    if options.export_tun {
        tun::write(
            with_suffix(&export_base, ".tun"),
            &effective.ratios,
            effective.base_key,
            base_frequency,
        )?;
    }
    info!("exports written with base name {}", export_base.display());
    Ok(Generated {
        table_id,
        score,
        export_base,
        effective,
        scored,
    })
}

pub fn run(options: GenerateOptions) -> anyhow::Result<()> {
    generate(options)?;
    Ok(())
}
