use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fs;
use std::path::PathBuf;

/// Place the given strings in left-aligned columns separated by `spaces` spaces. Each row must
/// have the same number of columns as `headers`, which are printed above their columns. Widths
/// are counted in characters, so markers such as `≈` take one column. Trailing spaces are
/// trimmed.
pub fn format_tabular(headers: &[&str], spaces: usize, rows: &[Vec<String>]) -> Vec<String> {
    let num_cols = headers.len();
    for row in rows {
        if row.len() != num_cols {
            panic!("format_tabular called with inconsistent columns per row");
        }
    }
    if num_cols == 0 {
        return vec![];
    }

    let mut col_widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, s) in col_widths.iter_mut().zip(row) {
            *width = (*width).max(s.chars().count());
        }
    }

    let spacer = " ".repeat(spaces);
    let mut result = vec![pad_line(headers.iter().copied(), &col_widths, &spacer)];
    for row in rows {
        result.push(pad_line(row.iter().map(String::as_str), &col_widths, &spacer));
    }
    result
}

fn pad_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize], spacer: &str) -> String {
    cells
        .zip(widths)
        .map(|(s, &width)| format!("{s}{}", " ".repeat(width - s.chars().count())))
        .collect::<Vec<_>>()
        .join(spacer)
        .trim_end()
        .to_string()
}

/// Colour band of a column in styled output.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Band {
    Plain,
    Custom,
    Harmonic,
    Subharmonic,
    Tet,
}

impl Band {
    pub fn colour(self) -> Option<&'static str> {
        match self {
            Band::Plain => None,
            Band::Custom => Some("red"),
            Band::Harmonic => Some("green"),
            Band::Subharmonic => Some("yellow"),
            Band::Tet => Some("blue"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub label: &'static str,
    pub band: Band,
}

impl Column {
    pub fn new(label: &'static str, band: Band) -> Self {
        Self { label, band }
    }
}

impl Serialize for Column {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut s = serializer.serialize_struct("Column", 2)?;
        s.serialize_field("label", self.label)?;
        s.serialize_field("band", &self.band.colour())?;
        s.end()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    Empty,
    Int(i64),
    /// Fixed-point number; `near` appends the proximity marker in text output.
    Num {
        value: f64,
        decimals: usize,
        near: bool,
    },
    Text(String),
}

pub const NEAR_MARKER: char = '≈';

impl Cell {
    pub fn num(value: f64, decimals: usize) -> Self {
        Cell::Num {
            value,
            decimals,
            near: false,
        }
    }

    pub fn text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Int(i) => i.to_string(),
            Cell::Num {
                value,
                decimals,
                near,
            } => {
                let mut s = format!("{value:.decimals$}");
                if *near {
                    s.push(NEAR_MARKER);
                }
                s
            }
            Cell::Text(s) => s.clone(),
        }
    }
}

impl Serialize for Cell {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Cell::Empty => serializer.serialize_none(),
            Cell::Int(i) => serializer.serialize_i64(*i),
            Cell::Num { value, .. } => serializer.serialize_f64(*value),
            Cell::Text(s) => serializer.serialize_str(s),
        }
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Table {
    pub title: String,
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Left-aligned columns separated by two spaces, header first.
    pub fn to_lines(&self) -> Vec<String> {
        let headers: Vec<&str> = self.columns.iter().map(|c| c.label).collect();
        let rows: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(Cell::text).collect())
            .collect();
        format_tabular(&headers, 2, &rows)
    }

    pub fn to_text(&self) -> String {
        let mut s = self.to_lines().join("\n");
        s.push('\n');
        s
    }
}

/// Destination for a rendered table.
pub trait TableSink {
    fn write_table(&mut self, table: &Table) -> anyhow::Result<()>;
}

pub struct TextFile {
    pub path: PathBuf,
}

impl TableSink for TextFile {
    fn write_table(&mut self, table: &Table) -> anyhow::Result<()> {
        fs::write(&self.path, table.to_text())?;
        println!("{} table written to {}", table.title, self.path.display());
        Ok(())
    }
}

pub struct JsonFile {
    pub path: PathBuf,
}

impl TableSink for JsonFile {
    fn write_table(&mut self, table: &Table) -> anyhow::Result<()> {
        let mut data = serde_json::to_string_pretty(table)?;
        data.push('\n');
        fs::write(&self.path, data)?;
        println!("{} JSON written to {}", table.title, self.path.display());
        Ok(())
    }
}

pub struct Stdout;

impl TableSink for Stdout {
    fn write_table(&mut self, table: &Table) -> anyhow::Result<()> {
        for line in table.to_lines() {
            println!("{line}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_format_tabular() {
        let rows = strings(&[&["1", "a", "1.5"], &["10", "bbbb", "22.25"], &["7", "", ""]]);
        let lines = format_tabular(&["Step", "X", "Value"], 2, &rows);
        assert_eq!(
            lines,
            vec![
                "Step  X     Value",
                "1     a     1.5",
                "10    bbbb  22.25",
                "7",
            ]
        );
        assert_eq!(format_tabular(&["A", "B"], 1, &[]), vec!["A B"]);
        assert!(format_tabular(&[], 2, &[]).is_empty());
    }

    #[test]
    fn test_char_width() {
        let rows = strings(&[&["440.000000≈", "x"], &["5.5", "y"]]);
        let lines = format_tabular(&["Hz", "Z"], 2, &rows);
        assert_eq!(lines, vec!["Hz           Z", "440.000000≈  x", "5.5          y"]);
    }

    fn sample() -> Table {
        Table {
            title: "system".to_string(),
            columns: vec![
                Column::new("Step", Band::Plain),
                Column::new("Custom_Hz", Band::Custom),
                Column::new("Harmonic_Hz", Band::Harmonic),
                Column::new("Note", Band::Tet),
            ],
            rows: vec![
                vec![
                    Cell::Int(0),
                    Cell::Num {
                        value: 261.5,
                        decimals: 6,
                        near: true,
                    },
                    Cell::num(261.5, 6),
                    Cell::Text("C4".to_string()),
                ],
                vec![Cell::Int(1), Cell::num(300.0, 6), Cell::Empty, Cell::Empty],
            ],
        }
    }

    #[test]
    fn test_table_text() {
        assert_eq!(
            sample().to_text(),
            "Step  Custom_Hz    Harmonic_Hz  Note\n\
             0     261.500000≈  261.500000   C4\n\
             1     300.000000\n"
        );
    }

    #[test]
    fn test_table_json() -> anyhow::Result<()> {
        let v = serde_json::to_value(sample())?;
        assert_eq!(
            v,
            serde_json::json!({
                "title": "system",
                "columns": [
                    {"label": "Step", "band": null},
                    {"label": "Custom_Hz", "band": "red"},
                    {"label": "Harmonic_Hz", "band": "green"},
                    {"label": "Note", "band": "blue"},
                ],
                "rows": [
                    [0, 261.5, 261.5, "C4"],
                    [1, 300.0, null, null],
                ],
            })
        );
        Ok(())
    }

    #[test]
    fn test_sinks() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let text = tmp.path().join("t.txt");
        let json = tmp.path().join("t.json");
        TextFile { path: text.clone() }.write_table(&sample())?;
        JsonFile { path: json.clone() }.write_table(&sample())?;
        assert_eq!(fs::read_to_string(text)?, sample().to_text());
        let v: serde_json::Value = serde_json::from_str(&fs::read_to_string(json)?)?;
        assert_eq!(v["columns"][2]["band"], "green");
        Ok(())
    }
}
