use crate::keyboard::{MIDI_MAX, MIDI_MIN};
use crate::to_anyhow;
use anyhow::bail;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use winnow::ascii::dec_int;
use winnow::combinator::opt;
use winnow::error::{ContextError, StrContext};
use winnow::token::one_of;
use winnow::{ModalParser, Parser};

pub const MIDI_A4: i32 = 69;
pub const SEMITONES_PER_OCTAVE: i32 = 12;
const SHARP_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

fn letter_offset(c: char) -> i32 {
    match c {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        _ => 11,
    }
}

fn note<'s>() -> impl ModalParser<&'s str, i32, ContextError<StrContext>> {
    (
        one_of(['A', 'B', 'C', 'D', 'E', 'F', 'G']).context(StrContext::Label("note letter")),
        opt(one_of(['#', 'B'])),
        dec_int::<_, i32, _>.context(StrContext::Label("octave")),
    )
        .map(|(letter, accidental, octave)| {
            let alteration = match accidental {
                Some('#') => 1,
                Some(_) => -1,
                None => 0,
            };
            (octave + 1) * SEMITONES_PER_OCTAVE + letter_offset(letter) + alteration
        })
}

/// Scientific note name to MIDI key: `C4` is 60, `A4` is 69. The letter may be followed by
/// `#` or `b`; the octave may be negative.
pub fn note_to_midi(name: &str) -> anyhow::Result<u8> {
    let upper = name.trim().to_uppercase();
    if upper.is_empty() {
        bail!("empty note name");
    }
    let midi = note()
        .parse(upper.as_str())
        .map_err(|e| anyhow::anyhow!("invalid note name {name:?}: {}", to_anyhow(e)))?;
    if !(MIDI_MIN..=MIDI_MAX).contains(&midi) {
        bail!("note {name} is outside the MIDI range ({midi})");
    }
    Ok(midi as u8)
}

pub fn midi_to_hz(midi: f64, diapason: f64) -> f64 {
    diapason * 2f64.powf((midi - MIDI_A4 as f64) / SEMITONES_PER_OCTAVE as f64)
}

/// Nearest MIDI key to `hz`, clamped to the keyboard. `None` for non-positive input.
pub fn hz_to_midi(hz: f64, diapason: f64) -> Option<u8> {
    if !(hz > 0.0 && diapason > 0.0) {
        return None;
    }
    let midi = (MIDI_A4 as f64 + SEMITONES_PER_OCTAVE as f64 * (hz / diapason).log2()).round();
    if !midi.is_finite() {
        return None;
    }
    Some((midi as i32).clamp(MIDI_MIN, MIDI_MAX) as u8)
}

pub fn midi_to_note_name(midi: u8) -> String {
    let midi = midi as i32;
    let name = SHARP_NAMES[(midi % SEMITONES_PER_OCTAVE) as usize];
    format!("{name}{}", midi / SEMITONES_PER_OCTAVE - 1)
}

pub fn hz_to_note_name(hz: f64, diapason: f64) -> Option<String> {
    hz_to_midi(hz, diapason).map(midi_to_note_name)
}

/// A pitch given on the command line or in a config file.
#[derive(Debug, Clone, PartialEq)]
pub enum NoteOrHz {
    Hz(f64),
    Note(String),
    /// Whatever the base note of the run resolves to.
    BaseNote,
}

impl NoteOrHz {
    /// Frequency in Hz; note names are tuned against `diapason`.
    pub fn resolve(&self, diapason: f64, base_hz: f64) -> anyhow::Result<f64> {
        let hz = match self {
            NoteOrHz::Hz(hz) => *hz,
            NoteOrHz::Note(name) => midi_to_hz(note_to_midi(name)? as f64, diapason),
            NoteOrHz::BaseNote => base_hz,
        };
        if !(hz > 0.0) || !hz.is_finite() {
            bail!("frequency must be > 0, not {hz}");
        }
        Ok(hz)
    }
}

impl FromStr for NoteOrHz {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("basenote") {
            return Ok(NoteOrHz::BaseNote);
        }
        if let Ok(hz) = s.parse::<f64>() {
            return Ok(NoteOrHz::Hz(hz));
        }
        note_to_midi(s)?;
        Ok(NoteOrHz::Note(s.to_string()))
    }
}

impl Display for NoteOrHz {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            NoteOrHz::Hz(hz) => write!(f, "{hz}"),
            NoteOrHz::Note(name) => write!(f, "{name}"),
            NoteOrHz::BaseNote => write!(f, "basenote"),
        }
    }
}
