//! Packing-list sheet scanning
//!
//! A single forward pass over a worksheet's rows that picks up the PO number
//! under the PO/STYLE/COLOR header, the cartons/pieces/weight column offsets,
//! and one [`SubtotalRow`] per "SUB TOTAL" row.

use crate::sheet::{row_text, CellValue, SheetRow};
use std::fmt;

/// Cell text that marks a sheet as a packing slip
pub const SHEET_MARKER: &str = "PACKING SLIP";

/// Number of leading rows searched for [`SHEET_MARKER`]
pub const QUALIFYING_ROWS: usize = 5;

const PO_HEADER: &str = "PO";
const PO_SIGNATURE: [&str; 3] = ["PO", "STYLE", "COLOR"];

const CARTONS_HEADER: &str = "# CARTONS";
const PIECES_HEADER: &str = "TOTAL PIECES";
const WEIGHT_HEADER: &str = "TOTAL G.W(kg)";

const SUBTOTAL_LABEL: &str = "SUB TOTAL";
const COLOR_COLUMN: usize = 2;

/// Column offsets of the quantity columns, resolved from their header row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnIndexSet {
    pub cartons: Option<usize>,
    pub pieces: Option<usize>,
    pub total_gross_weight: Option<usize>,
}

/// Quantity fields read from a subtotal row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtotalField {
    Cartons,
    Pieces,
    TotalGrossWeight,
}

impl fmt::Display for SubtotalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubtotalField::Cartons => "cartons",
            SubtotalField::Pieces => "pieces",
            SubtotalField::TotalGrossWeight => "total gross weight",
        };
        f.write_str(name)
    }
}

/// One "SUB TOTAL" row; a quantity is `None` when its column was not
/// resolved yet, the cell was blank or zero, or the cell was not numeric
#[derive(Debug, Clone, PartialEq)]
pub struct SubtotalRow {
    /// Row index within the sheet (0-indexed)
    pub row: usize,
    pub color: String,
    pub cartons: Option<i64>,
    pub pieces: Option<i64>,
    /// Weight formatted with three fraction digits
    pub total_gross_weight: Option<String>,
}

/// A non-numeric value found where a quantity was expected
#[derive(Debug, Clone, PartialEq)]
pub struct RowIssue {
    pub row: usize,
    pub field: SubtotalField,
    pub value: String,
}

/// Result of scanning a qualifying sheet
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetScan {
    pub po_number: Option<String>,
    pub columns: ColumnIndexSet,
    pub subtotals: Vec<SubtotalRow>,
    pub issues: Vec<RowIssue>,
}

/// Check the first rows for a cell reading exactly "PACKING SLIP"
pub fn is_packing_slip_sheet(rows: &[SheetRow]) -> bool {
    rows.iter()
        .take(QUALIFYING_ROWS)
        .any(|row| row.iter().any(|cell| cell.trimmed() == SHEET_MARKER))
}

/// Scan a sheet, returning `None` when it is not a packing slip
pub fn scan_sheet(rows: &[SheetRow]) -> Option<SheetScan> {
    if !is_packing_slip_sheet(rows) {
        return None;
    }
    Some(scan_rows(rows))
}

/// Scan every row without checking the packing-slip marker
pub fn scan_rows(rows: &[SheetRow]) -> SheetScan {
    let mut scan = SheetScan::default();

    for (idx, row) in rows.iter().enumerate() {
        let text = row_text(row);

        if row.len() > 2 && PO_SIGNATURE.iter().all(|s| text.contains(s)) {
            if let Some(po) = rows.get(idx + 1).and_then(|next| po_below_header(row, next)) {
                if let Some(previous) = &scan.po_number {
                    log::debug!("Row {}: PO {} replaces {}", idx, po, previous);
                }
                scan.po_number = Some(po);
            }
        }

        if text.contains(CARTONS_HEADER)
            && text.contains(PIECES_HEADER)
            && text.contains(WEIGHT_HEADER)
        {
            resolve_columns(row, &mut scan.columns);
            log::debug!("Row {}: quantity columns {:?}", idx, scan.columns);
        }

        if let Some(subtotal) = read_subtotal(idx, row, &scan.columns, &mut scan.issues) {
            scan.subtotals.push(subtotal);
        }
    }

    scan
}

/// Value under the first cell reading "PO", if present
fn po_below_header(header: &[CellValue], next: &[CellValue]) -> Option<String> {
    let po_col = header.iter().position(|c| c.trimmed() == PO_HEADER)?;
    let candidate = next.get(po_col)?;
    if candidate.is_present() {
        Some(candidate.trimmed().into_owned())
    } else {
        None
    }
}

/// Record the offset of every exactly-matching header cell
fn resolve_columns(row: &[CellValue], columns: &mut ColumnIndexSet) {
    for (i, cell) in row.iter().enumerate() {
        match &*cell.trimmed() {
            CARTONS_HEADER => columns.cartons = Some(i),
            PIECES_HEADER => columns.pieces = Some(i),
            WEIGHT_HEADER => columns.total_gross_weight = Some(i),
            _ => {}
        }
    }
}

fn read_subtotal(
    idx: usize,
    row: &[CellValue],
    columns: &ColumnIndexSet,
    issues: &mut Vec<RowIssue>,
) -> Option<SubtotalRow> {
    if row.len() <= COLOR_COLUMN || row[0].trimmed() != SUBTOTAL_LABEL {
        return None;
    }
    if !row[COLOR_COLUMN].is_present() {
        return None;
    }
    let color = row[COLOR_COLUMN].trimmed();

    let mut number_at = |column: Option<usize>, field: SubtotalField| -> Option<f64> {
        let cell = row.get(column?)?;
        if !cell.is_present() {
            return None;
        }
        match cell.to_f64() {
            Ok(n) => Some(n),
            Err(e) => {
                log::warn!("Row {}: skipping {}: {}", idx, field, e);
                issues.push(RowIssue {
                    row: idx,
                    field,
                    value: e.value,
                });
                None
            }
        }
    };

    let cartons = number_at(columns.cartons, SubtotalField::Cartons).map(|n| n.trunc() as i64);
    let pieces = number_at(columns.pieces, SubtotalField::Pieces).map(|n| n.trunc() as i64);
    let total_gross_weight = number_at(columns.total_gross_weight, SubtotalField::TotalGrossWeight)
        .map(|n| format!("{:.3}", n));

    Some(SubtotalRow {
        row: idx,
        color: color.into_owned(),
        cartons,
        pieces,
        total_gross_weight,
    })
}
