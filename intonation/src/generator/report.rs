use crate::tabular::{Band, Cell, Column, Table};
use intonation_common::compare::ComparisonRow;

const RATIO_DECIMALS: usize = 10;
const HZ_DECIMALS: usize = 6;

/// Step, key, ratio, and frequency of each ratio, ordered by frequency.
pub fn system_table(ratios: &[f64], base_key: u8, base_hz: f64) -> Table {
    let mut sorted = ratios.to_vec();
    sorted.sort_by(f64::total_cmp);
    let rows = sorted
        .iter()
        .enumerate()
        .map(|(step, &r)| {
            vec![
                Cell::Int(step as i64),
                Cell::Int(base_key as i64 + step as i64),
                Cell::num(r, RATIO_DECIMALS),
                Cell::num(base_hz * r, HZ_DECIMALS),
            ]
        })
        .collect();
    Table {
        title: "system".to_string(),
        columns: vec![
            Column::new("Step", Band::Plain),
            Column::new("MIDI", Band::Plain),
            Column::new("Ratio", Band::Plain),
            Column::new("Hz", Band::Plain),
        ],
        rows,
    }
}

fn optional(value: Option<f64>, near: bool) -> Cell {
    match value {
        Some(value) => Cell::Num {
            value,
            decimals: HZ_DECIMALS,
            near,
        },
        None => Cell::Empty,
    }
}

/// Comparison against the harmonic, subharmonic, and 12-TET references. Custom and harmonic
/// values are marked when they are closer than `proximity_hz`.
pub fn comparison_table(rows: &[ComparisonRow], proximity_hz: f64) -> Table {
    let rows = rows
        .iter()
        .map(|row| {
            let near = row.near_harmonic(proximity_hz);
            vec![
                Cell::Int(row.step as i64),
                Cell::Int(row.midi as i64),
                Cell::num(row.ratio, RATIO_DECIMALS),
                Cell::Num {
                    value: row.custom_hz,
                    decimals: HZ_DECIMALS,
                    near,
                },
                optional(row.harmonic_hz, near),
                optional(row.harmonic_delta(), false),
                optional(row.subharmonic_hz, false),
                optional(row.subharmonic_delta(), false),
                Cell::num(row.tet_hz, HZ_DECIMALS),
                row.tet_note
                    .as_ref()
                    .map_or(Cell::Empty, |n| Cell::Text(n.clone())),
                Cell::num(row.tet_delta(), HZ_DECIMALS),
            ]
        })
        .collect();
    Table {
        title: "comparison".to_string(),
        columns: vec![
            Column::new("Step", Band::Plain),
            Column::new("MIDI", Band::Plain),
            Column::new("Ratio", Band::Plain),
            Column::new("Custom_Hz", Band::Custom),
            Column::new("Harmonic_Hz", Band::Harmonic),
            Column::new("DeltaHz_Harm", Band::Plain),
            Column::new("Subharm_Hz", Band::Subharmonic),
            Column::new("DeltaHz_Sub", Band::Plain),
            Column::new("TET_Hz", Band::Tet),
            Column::new("TET_Note", Band::Tet),
            Column::new("DeltaHz_TET", Band::Plain),
        ],
        rows,
    }
}
