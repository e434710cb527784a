//! Packing records across workbooks
//!
//! Each workbook contributes at most one [`PackingRecord`]: the first sheet
//! carrying the packing-slip marker is scanned and every later sheet in that
//! workbook is ignored. The record is kept only when a PO number was found.

use crate::scanner::{is_packing_slip_sheet, scan_rows, SheetScan};
use crate::sheet::{Workbook, Worksheet};
use crate::PackError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Shipment data extracted from one packing-list workbook
///
/// The lists are filled from the subtotal rows in sheet order. A subtotal row
/// that lacks a quantity adds nothing to that quantity's list, so the lists
/// can differ in length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackingRecord {
    #[serde(rename = "PO_Number")]
    pub po_number: String,
    #[serde(rename = "Colors")]
    pub colors: Vec<String>,
    #[serde(rename = "Cartons")]
    pub cartons: Vec<i64>,
    #[serde(rename = "Pieces")]
    pub pieces: Vec<i64>,
    #[serde(rename = "Total_Gross_Weight")]
    pub total_gross_weight: Vec<String>,
}

impl PackingRecord {
    /// Build a record from a sheet scan; `None` without a PO number
    pub fn from_scan(scan: &SheetScan) -> Option<Self> {
        let po_number = scan.po_number.clone()?;
        let rows = &scan.subtotals;

        Some(Self {
            po_number,
            colors: rows.iter().map(|r| r.color.clone()).collect(),
            cartons: rows.iter().filter_map(|r| r.cartons).collect(),
            pieces: rows.iter().filter_map(|r| r.pieces).collect(),
            total_gross_weight: rows
                .iter()
                .filter_map(|r| r.total_gross_weight.clone())
                .collect(),
        })
    }
}

/// Records collected over a batch of workbooks, in processing order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackingReport {
    pub records: Vec<PackingRecord>,
    /// Number of workbooks offered to the report, including failed ones
    pub files_processed: usize,
}

impl PackingReport {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Row-oriented JSON array of the records
    pub fn to_json(&self) -> Result<String, PackError> {
        Ok(serde_json::to_string_pretty(&self.records)?)
    }

    /// Write the JSON array to `path`
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<(), PackError> {
        let mut json = self.to_json()?;
        json.push('\n');
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Pick the first packing-slip sheet and build its record
///
/// Sheets are pulled from the iterator one at a time; nothing after the first
/// qualifying sheet is read.
pub fn record_from_sheets<I>(sheets: I) -> Result<Option<PackingRecord>, PackError>
where
    I: IntoIterator<Item = Result<Worksheet, PackError>>,
{
    for sheet in sheets {
        let sheet = sheet?;
        if !is_packing_slip_sheet(&sheet.rows) {
            log::debug!("Sheet {:?}: no PACKING SLIP marker, skipping", sheet.name);
            continue;
        }

        let scan = scan_rows(&sheet.rows);
        log::debug!(
            "Sheet {:?}: PO {:?}, {} subtotal rows",
            sheet.name,
            scan.po_number,
            scan.subtotals.len()
        );
        if scan.po_number.is_none() {
            log::info!("Sheet {:?}: PO number not found", sheet.name);
        }
        return Ok(PackingRecord::from_scan(&scan));
    }

    Ok(None)
}

/// Extract the packing record of one workbook file
pub fn extract_workbook<P: AsRef<Path>>(path: P) -> Result<Option<PackingRecord>, PackError> {
    let mut workbook = Workbook::open(path)?;
    record_from_sheets(workbook.worksheets())
}

/// Extract records from every workbook, skipping files that cannot be read
pub fn collect_records<P: AsRef<Path>>(paths: &[P]) -> PackingReport {
    let mut report = PackingReport::default();

    for path in paths {
        let path = path.as_ref();
        report.files_processed += 1;
        log::info!("Reading {}", path.display());

        match extract_workbook(path) {
            Ok(Some(record)) => {
                log::info!(
                    "{}: PO {} with {} colors",
                    path.display(),
                    record.po_number,
                    record.colors.len()
                );
                report.records.push(record);
            }
            Ok(None) => log::info!("{}: no packing list data", path.display()),
            Err(e) => log::warn!("Error reading {}: {}", path.display(), e),
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::SubtotalRow;
    use crate::sheet::{CellValue, SheetRow};
    use pretty_assertions::assert_eq;

    fn text_row(cells: &[&str]) -> SheetRow {
        cells.iter().map(|&c| CellValue::from(c)).collect()
    }

    fn sheet(name: &str, rows: Vec<SheetRow>) -> Result<Worksheet, PackError> {
        Ok(Worksheet {
            name: name.to_string(),
            rows,
        })
    }

    fn packing_rows(po: &str) -> Vec<SheetRow> {
        vec![
            text_row(&["PACKING SLIP"]),
            text_row(&["PO", "STYLE", "COLOR"]),
            text_row(&[po, "S1", "Navy"]),
            text_row(&["", "", "", "# CARTONS", "TOTAL PIECES", "TOTAL G.W(kg)"]),
            vec![
                "SUB TOTAL".into(),
                CellValue::Empty,
                "Navy".into(),
                CellValue::Number(12.0),
                CellValue::Number(340.0),
                CellValue::Number(255.5),
            ],
        ]
    }

    #[test]
    fn test_from_scan_flattens_optional_fields() {
        let scan = SheetScan {
            po_number: Some("A1".into()),
            subtotals: vec![
                SubtotalRow {
                    row: 5,
                    color: "Navy".into(),
                    cartons: Some(1),
                    pieces: None,
                    total_gross_weight: Some("1.000".into()),
                },
                SubtotalRow {
                    row: 6,
                    color: "Red".into(),
                    cartons: Some(2),
                    pieces: Some(20),
                    total_gross_weight: None,
                },
            ],
            ..Default::default()
        };

        let record = PackingRecord::from_scan(&scan).unwrap();
        assert_eq!(record.colors, vec!["Navy", "Red"]);
        assert_eq!(record.cartons, vec![1, 2]);
        assert_eq!(record.pieces, vec![20]);
        assert_eq!(record.total_gross_weight, vec!["1.000"]);
    }

    #[test]
    fn test_from_scan_requires_po() {
        assert!(PackingRecord::from_scan(&SheetScan::default()).is_none());
    }

    #[test]
    fn test_first_qualifying_sheet_wins() {
        let sheets = vec![
            sheet("Invoice", vec![text_row(&["COMMERCIAL INVOICE"])]),
            sheet("PL", packing_rows("A1")),
            sheet("PL (2)", packing_rows("B2")),
        ];
        let record = record_from_sheets(sheets).unwrap().unwrap();
        assert_eq!(record.po_number, "A1");
    }

    #[test]
    fn test_later_sheets_are_not_read() {
        let sheets = vec![
            sheet("PL", packing_rows("A1")),
            Err(PackError::Workbook("must not be read".into())),
        ];
        assert!(record_from_sheets(sheets).unwrap().is_some());
    }

    #[test]
    fn test_qualifying_sheet_without_po_yields_nothing() {
        let mut rows = packing_rows("A1");
        rows[2] = text_row(&["", "S1", "Navy"]);
        let sheets = vec![sheet("PL", rows), sheet("PL (2)", packing_rows("B2"))];
        assert!(record_from_sheets(sheets).unwrap().is_none());
    }

    #[test]
    fn test_json_shape() {
        let report = PackingReport {
            records: vec![record_from_sheets(vec![sheet("PL", packing_rows("A1"))])
                .unwrap()
                .unwrap()],
            files_processed: 1,
        };

        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!([{
                "PO_Number": "A1",
                "Colors": ["Navy"],
                "Cartons": [12],
                "Pieces": [340],
                "Total_Gross_Weight": ["255.500"]
            }])
        );
    }

    #[test]
    fn test_collect_records_skips_unreadable_files() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("broken.xlsx");
        std::fs::write(&bogus, b"not a workbook").unwrap();

        let report = collect_records(&[bogus]);
        assert!(report.is_empty());
        assert_eq!(report.files_processed, 1);
    }
}
