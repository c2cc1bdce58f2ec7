use log::debug;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

pub const SCORE_SKELETON: &str = "<CsoundSynthesizer>\n\
<CsOptions>\n\
\n\
</CsOptions>\n\
<CsInstruments>\n\
\n\
</CsInstruments>\n\
<CsScore>\n\
\n\
</CsScore>\n\
</CsoundSynthesizer>\n";

const END_OF_SCORE: &str = "</CsScore>";

static TABLE_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bf\s*(\d+)\b").unwrap());

pub fn rounded_float(val: impl Into<f64>, max_decimals: usize) -> String {
    let mut s = format!("{:.*}", max_decimals, val.into());
    if s.contains('.') {
        s = s.trim_end_matches('0').trim_end_matches('.').to_string();
    }
    s
}

/// Format with at most `digits` significant digits, switching to exponent notation for very
/// large or small magnitudes and dropping trailing zeros (C's `%g`).
pub fn significant_float(val: f64, digits: usize) -> String {
    if !val.is_finite() {
        return val.to_string();
    }
    let digits = digits.max(1);
    let sci = format!("{:.*e}", digits - 1, val);
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return sci;
    };
    let exp: i32 = exp.parse().unwrap_or(0);
    if exp < -4 || exp >= digits as i32 {
        let mantissa = if mantissa.contains('.') {
            mantissa.trim_end_matches('0').trim_end_matches('.')
        } else {
            mantissa
        };
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exp.abs())
    } else {
        rounded_float(val, (digits as i32 - 1 - exp) as usize)
    }
}

/// A generated scale rendered as a Csound GEN -2 table for `cpstun`.
#[derive(Debug, Clone, PartialEq)]
pub struct CpstunTable {
    /// Sorted ascending.
    pub ratios: Vec<f64>,
    /// 0 means the table does not repeat.
    pub interval: f64,
    pub base_frequency: f64,
    pub base_key: u8,
}

/// Starting column of each token of a rendered table line.
struct TokenColumns {
    prefix_len: usize,
    offsets: Vec<usize>,
}

impl TokenColumns {
    fn new(prefix: &str, tokens: &[String]) -> Self {
        let prefix_len = prefix.chars().count();
        let mut col = prefix_len;
        let offsets = tokens
            .iter()
            .map(|t| {
                let start = col;
                col += t.chars().count() + 1;
                start
            })
            .collect();
        Self {
            prefix_len,
            offsets,
        }
    }

    fn column(&self, token: usize) -> usize {
        self.offsets.get(token).copied().unwrap_or(self.prefix_len)
    }

    /// A comment line with each label starting under its token.
    fn comment(&self, labels: &[(usize, &str)]) -> String {
        let mut line = String::from(";");
        for &(token, label) in labels {
            let len = line.chars().count();
            let target = self.column(token).max(len + 1);
            line.push_str(&" ".repeat(target - len));
            line.push_str(label);
        }
        line.push('\n');
        line
    }
}

impl CpstunTable {
    /// A non-positive `interval` is written as 0.
    pub fn new(ratios: &[f64], interval: f64, base_frequency: f64, base_key: u8) -> Self {
        let mut ratios = ratios.to_vec();
        ratios.sort_by(f64::total_cmp);
        Self {
            ratios,
            interval: if interval > 0.0 { interval } else { 0.0 },
            base_frequency,
            base_key,
        }
    }

    fn tokens(&self) -> Vec<String> {
        let mut tokens = vec![
            self.ratios.len().to_string(),
            significant_float(self.interval, 10),
            significant_float(self.base_frequency, 10),
            self.base_key.to_string(),
        ];
        tokens.extend(self.ratios.iter().map(|r| format!("{r:.10}")));
        tokens
    }

    /// Two aligned comment lines, a summary comment, and the `f` statement.
    pub fn render(&self, table_id: u32) -> String {
        let tokens = self.tokens();
        let prefix = format!("f {table_id} 0 {} -2 ", tokens.len());
        let columns = TokenColumns::new(&prefix, &tokens);
        let mut out = columns.comment(&[
            (0, "numgrades"),
            (2, "basefreq"),
            (4, "tuning-ratios ......."),
        ]);
        out.push_str(&columns.comment(&[(1, "interval"), (3, "basekey")]));
        out.push_str(&format!(
            "; cpstun table generated | basekey={} basefrequency={:.6}Hz\n",
            self.base_key, self.base_frequency
        ));
        out.push_str(&prefix);
        out.push_str(&tokens.join(" "));
        out.push('\n');
        out
    }
}

/// A Csound document that tables are appended to. The whole file is read on open and rewritten
/// on save; only one process may update a given document at a time.
pub struct ScoreDocument {
    path: PathBuf,
    content: String,
    existed: bool,
}

impl ScoreDocument {
    /// Read `path`, or start from [`SCORE_SKELETON`] if it does not exist.
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let existed = fs::exists(&path)?;
        let content = if existed {
            fs::read_to_string(&path)?
        } else {
            SCORE_SKELETON.to_string()
        };
        Ok(Self {
            path,
            content,
            existed,
        })
    }

    pub fn existed(&self) -> bool {
        self.existed
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// One more than the highest `f N` found in the document.
    pub fn next_table_id(&self) -> u32 {
        TABLE_ID
            .captures_iter(&self.content)
            .filter_map(|c| c[1].parse::<u32>().ok())
            .max()
            .unwrap_or(0)
            .saturating_add(1)
    }

    /// Insert before the last end-of-score marker, or append a new score section if there is
    /// none.
    pub fn insert(&mut self, entry: &str) {
        match self.content.rfind(END_OF_SCORE) {
            Some(pos) => self.content.insert_str(pos, entry),
            None => self
                .content
                .push_str(&format!("\n<CsScore>\n{entry}{END_OF_SCORE}\n")),
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        fs::write(&self.path, &self.content)?;
        Ok(())
    }

    /// Add `table` under the next free id and rewrite the document. Returns the id.
    pub fn append_table(&mut self, table: &CpstunTable) -> anyhow::Result<u32> {
        let id = self.next_table_id();
        debug!("adding cpstun table {id} to {}", self.path.display());
        self.insert(&table.render(id));
        self.save()?;
        println!("cpstun table (f {id}) written to {}", self.path.display());
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounded_float() {
        assert_eq!(rounded_float(2.5, 3), "2.5");
        assert_eq!(rounded_float(2.0, 3), "2");
        assert_eq!(rounded_float(1.0 / 3.0, 4), "0.3333");
        assert_eq!(rounded_float(10.0, 0), "10");
    }

    #[test]
    fn test_significant_float() {
        assert_eq!(significant_float(2.0, 10), "2");
        assert_eq!(significant_float(0.0, 10), "0");
        assert_eq!(significant_float(261.6255653005986, 10), "261.6255653");
        assert_eq!(significant_float(1.4983070768766815, 10), "1.498307077");
        assert_eq!(significant_float(440.0, 10), "440");
        assert_eq!(significant_float(12345678901.0, 10), "1.23456789e+10");
        assert_eq!(significant_float(0.00001234, 10), "1.234e-05");
        assert_eq!(significant_float(0.0001234, 10), "0.0001234");
        assert_eq!(significant_float(-3.5, 10), "-3.5");
        assert_eq!(significant_float(9999999999.5, 10), "1e+10");
    }

    #[test]
    fn test_render() {
        let t = CpstunTable::new(&[1.5, 1.0, 1.25], 2.0, 261.6255653005986, 60);
        assert_eq!(t.ratios, vec![1.0, 1.25, 1.5]);
        let rendered = t.render(3);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 4);
        let f_line = lines[3];
        assert_eq!(
            f_line,
            "f 3 0 7 -2 3 2 261.6255653 60 1.0000000000 1.2500000000 1.5000000000"
        );
        assert_eq!(
            lines[2],
            "; cpstun table generated | basekey=60 basefrequency=261.625565Hz"
        );
        // each label starts where its token starts unless the previous label is in the way
        let col = |line: &str, pat: &str| line.find(pat).unwrap();
        assert_eq!(col(lines[0], "numgrades"), col(f_line, " 3 2 ") + 1);
        assert!(lines[0].contains("numgrades basefreq tuning-ratios"));
        assert_eq!(col(lines[0], "tuning-ratios"), col(f_line, "1.0000000000"));
        assert_eq!(col(lines[1], "interval"), col(f_line, "2 261"));
        assert_eq!(col(lines[1], "basekey"), col(f_line, "60 "));
        assert!(lines[0].starts_with(';'));
        assert!(lines[1].starts_with(';'));
    }

    #[test]
    fn test_render_crowded_labels() {
        // short tokens force labels to spill right, separated by at least one space
        let t = CpstunTable::new(&[], 0.0, 1.0, 0);
        let rendered = t.render(1);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[3], "f 1 0 4 -2 0 0 1 0");
        assert!(lines[0].contains("numgrades basefreq"));
        assert!(lines[1].contains("interval basekey"));
        assert_eq!(t.interval, 0.0);
        assert_eq!(CpstunTable::new(&[1.0], -3.0, 1.0, 0).interval, 0.0);
    }

    #[test]
    fn test_score_document() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("out.csd");
        let mut doc = ScoreDocument::open(&path)?;
        assert!(!doc.existed());
        assert_eq!(doc.content(), SCORE_SKELETON);
        assert_eq!(doc.next_table_id(), 1);
        let table = CpstunTable::new(&[1.0, 1.5], 2.0, 440.0, 69);
        assert_eq!(doc.append_table(&table)?, 1);

        let mut doc = ScoreDocument::open(&path)?;
        assert!(doc.existed());
        assert_eq!(doc.next_table_id(), 2);
        assert_eq!(doc.append_table(&table)?, 2);
        let content = fs::read_to_string(&path)?;
        assert!(content.ends_with(
            "f 2 0 6 -2 2 2 440 69 1.0000000000 1.5000000000\n</CsScore>\n</CsoundSynthesizer>\n"
        ));
        assert_eq!(content.matches("f 1 0 6 -2").count(), 1);
        Ok(())
    }

    #[test]
    fn test_table_ids() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("x.csd");
        fs::write(&path, "<CsScore>\nf1 0 16 10 1\nf 12 0 8 -2 1\n; basefreq f7x\ni 1 0 1\n")?;
        let mut doc = ScoreDocument::open(&path)?;
        assert_eq!(doc.next_table_id(), 13);
        // no end marker: a new score section is appended
        doc.insert("f 13 0 4 -2 0 0 1 0\n");
        assert!(
            doc.content()
                .ends_with("i 1 0 1\n\n<CsScore>\nf 13 0 4 -2 0 0 1 0\n</CsScore>\n")
        );
        Ok(())
    }
}
