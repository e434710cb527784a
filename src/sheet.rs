//! Worksheet rows as tagged cell values
//!
//! Workbooks are read with calamine. Rows are padded so that row and column
//! indices are absolute sheet positions: calamine trims a sheet to its used
//! range, but the scanner relies on "first cell" and "third cell" meaning
//! columns A and C.

use crate::PackError;
use calamine::{open_workbook_auto, Data, Range, Reader, Sheets};
use std::borrow::Cow;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// A single cell value
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
}

/// One worksheet row
pub type SheetRow = Vec<CellValue>;

/// Failure to read a cell as a number
#[derive(Debug, Clone, PartialEq)]
pub struct CoercionError {
    pub value: String,
}

impl fmt::Display for CoercionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot read {:?} as a number", self.value)
    }
}

impl std::error::Error for CoercionError {}

impl CellValue {
    /// Text shown for the cell; whole numbers print without a fraction
    pub fn display(&self) -> Cow<'_, str> {
        match self {
            CellValue::Empty => Cow::Borrowed(""),
            CellValue::Text(s) => Cow::Borrowed(s.as_str()),
            CellValue::Number(n) => Cow::Owned(format_number(*n)),
        }
    }

    /// Displayed text with surrounding whitespace removed
    pub fn trimmed(&self) -> Cow<'_, str> {
        match self.display() {
            Cow::Borrowed(s) => Cow::Borrowed(s.trim()),
            Cow::Owned(s) => Cow::Owned(s.trim().to_string()),
        }
    }

    /// True when the cell shows nothing but whitespace
    pub fn is_blank(&self) -> bool {
        self.trimmed().is_empty()
    }

    /// True when the cell carries a value: not blank and not a numeric zero
    ///
    /// Packing lists leave zero in cells that have nothing to report, so a
    /// zero quantity, color or PO is read as missing.
    pub fn is_present(&self) -> bool {
        match self {
            CellValue::Number(n) => *n != 0.0,
            _ => !self.is_blank(),
        }
    }

    /// Read the cell as a finite number
    pub fn to_f64(&self) -> Result<f64, CoercionError> {
        let number = match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => s.trim().parse::<f64>().ok(),
            CellValue::Empty => None,
        };
        match number {
            Some(n) if n.is_finite() => Ok(n),
            _ => Err(CoercionError {
                value: self.display().into_owned(),
            }),
        }
    }
}

impl From<&Data> for CellValue {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => CellValue::Empty,
            Data::String(s) => CellValue::Text(s.clone()),
            Data::Float(f) => CellValue::Number(*f),
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Bool(b) => CellValue::Text(if *b { "TRUE" } else { "FALSE" }.to_string()),
            Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
            Data::Error(e) => CellValue::Text(e.to_string()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s.to_string())
        }
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(n as f64)
    }
}

/// Whole numbers print as integers: a PO typed as a number reads `4500123`,
/// not `4500123.0`. Whether numeric POs should keep the `.0` suffix is an
/// open question.
fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Text of a whole row, one cell per line, used for header signature checks
pub fn row_text(row: &[CellValue]) -> String {
    row.iter()
        .map(|c| c.display())
        .collect::<Vec<_>>()
        .join("\n")
}

/// A named worksheet with its rows
#[derive(Debug, Clone)]
pub struct Worksheet {
    pub name: String,
    pub rows: Vec<SheetRow>,
}

/// An open workbook whose sheets are read on demand
pub struct Workbook {
    sheets: Sheets<BufReader<File>>,
}

impl Workbook {
    /// Open an `.xls`, `.xlsx` or `.xlsm` workbook
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PackError> {
        let sheets = open_workbook_auto(path)?;
        Ok(Self { sheets })
    }

    /// Sheet names in workbook order
    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.sheet_names()
    }

    /// Read one worksheet
    pub fn worksheet(&mut self, name: &str) -> Result<Worksheet, PackError> {
        let range = self.sheets.worksheet_range(name)?;
        Ok(Worksheet {
            name: name.to_string(),
            rows: range_to_rows(&range),
        })
    }

    /// Iterate worksheets lazily in workbook order
    pub fn worksheets(&mut self) -> impl Iterator<Item = Result<Worksheet, PackError>> + '_ {
        let names = self.sheet_names();
        names.into_iter().map(move |name| self.worksheet(&name))
    }
}

/// Convert a calamine range into rows addressed from cell A1
fn range_to_rows(range: &Range<Data>) -> Vec<SheetRow> {
    let Some((start_row, start_col)) = range.start() else {
        return Vec::new();
    };

    let mut rows: Vec<SheetRow> = vec![Vec::new(); start_row as usize];
    for row in range.rows() {
        let mut cells = vec![CellValue::Empty; start_col as usize];
        cells.extend(row.iter().map(CellValue::from));
        rows.push(cells);
    }
    rows
}
