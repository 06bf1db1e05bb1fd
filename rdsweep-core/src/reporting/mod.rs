// ============================================================================
// rdsweep-core/src/reporting/mod.rs
// ============================================================================
//
// RESULT TABLE: Rows of the Experiment and their CSV Serialization
//
// One `ResultRow` is created per successful (input, configuration) pair and
// never modified afterwards. The table header is the fixed leading columns,
// then the union of every row's dynamic columns (encoder statistics and
// flattened quality scores) in first-seen order, then `parameters`. Cells a
// row does not carry are written empty.

use crate::error::CoreResult;
use crate::media::{FrameRate, Resolution};

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Columns every row starts with.
pub const LEADING_COLUMNS: [&str; 15] = [
    "infile",
    "label",
    "codec",
    "resolution",
    "width",
    "height",
    "framerate",
    "rcmode",
    "quality",
    "bitrate",
    "preset",
    "run",
    "gop_length",
    "actual_bitrate",
    "encoded_size",
];

/// Column closing every row.
pub const TRAILING_COLUMN: &str = "parameters";

/// Value of one dynamic cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Integer(u64),
    Text(String),
}

impl Cell {
    fn render(&self) -> String {
        match self {
            Cell::Number(v) => format_float(*v),
            Cell::Integer(v) => v.to_string(),
            Cell::Text(s) => s.clone(),
        }
    }
}

/// One observation of the experiment.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub infile: String,
    pub label: String,
    pub codec: String,
    /// Encode resolution (the reference resolution when none was requested)
    pub resolution: Resolution,
    pub framerate: FrameRate,
    pub rcmode: String,
    pub quality: Option<u32>,
    pub bitrate: Option<u32>,
    pub preset: Option<String>,
    pub run: u32,
    pub gop_length: Option<u32>,
    /// kbps
    pub actual_bitrate: f64,
    /// bytes
    pub encoded_size: u64,
    /// Encoder statistics and quality columns, in emission order
    pub columns: Vec<(String, Cell)>,
    /// Fixed codec parameters as `k=v;` pairs
    pub parameters: String,
}

impl ResultRow {
    fn leading_cells(&self) -> Vec<String> {
        let opt = |v: Option<u32>| v.map(|v| v.to_string()).unwrap_or_default();
        vec![
            self.infile.clone(),
            self.label.clone(),
            self.codec.clone(),
            self.resolution.to_string(),
            self.resolution.width.to_string(),
            self.resolution.height.to_string(),
            self.framerate.to_string(),
            self.rcmode.clone(),
            opt(self.quality),
            opt(self.bitrate),
            self.preset.clone().unwrap_or_default(),
            self.run.to_string(),
            opt(self.gop_length),
            format_float(self.actual_bitrate),
            self.encoded_size.to_string(),
        ]
    }

    /// Value of a dynamic column.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.columns.iter().find(|(k, _)| k == column).map(|(_, v)| v)
    }
}

/// Ordered, append-only collection of rows.
#[derive(Debug, Clone, Default)]
pub struct ResultTable {
    rows: Vec<ResultRow>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: ResultRow) {
        self.rows.push(row);
    }

    #[must_use]
    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Leading columns, union of dynamic columns in first-seen order,
    /// trailing column.
    #[must_use]
    pub fn header(&self) -> Vec<String> {
        let mut header: Vec<String> = LEADING_COLUMNS.iter().map(|c| c.to_string()).collect();
        let fixed = header.len();
        for row in &self.rows {
            for (key, _) in &row.columns {
                if !header[fixed..].contains(key) {
                    header.push(key.clone());
                }
            }
        }
        header.push(TRAILING_COLUMN.to_string());
        header
    }

    /// Serializes the table as CSV with a header line.
    pub fn write_csv<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        let header = self.header();
        write_record(writer, &header)?;
        let dynamic = &header[LEADING_COLUMNS.len()..header.len() - 1];
        for row in &self.rows {
            let mut record = row.leading_cells();
            for key in dynamic {
                record.push(row.get(key).map(Cell::render).unwrap_or_default());
            }
            record.push(row.parameters.clone());
            write_record(writer, &record)?;
        }
        Ok(())
    }

    /// Writes the table to `path`, replacing any existing file.
    pub fn write_to_path(&self, path: &Path) -> CoreResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_csv(&mut writer)?;
        writer.flush()?;
        log::info!("Wrote {} rows to {}", self.rows.len(), path.display());
        Ok(())
    }
}

fn write_record<W: Write>(writer: &mut W, fields: &[String]) -> std::io::Result<()> {
    let line: Vec<String> = fields.iter().map(|f| quote_field(f)).collect();
    writeln!(writer, "{}", line.join(","))
}

/// Quotes a field when it contains a delimiter, quote or line break.
fn quote_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Infinities print as `inf`/`-inf`; NaN leaves the cell empty.
fn format_float(v: f64) -> String {
    if v.is_nan() { String::new() } else { format!("{v}") }
}
