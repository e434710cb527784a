//! Packing-slip extraction for spreadsheet shipping documents
//!
//! This crate provides:
//! - Page classification: decide whether a converted PDF page is a packing slip
//! - Page filtering and merging of converted PDFs using lopdf
//! - Subtotal extraction from packing-list workbooks into JSON records
//! - A batch driver that ties conversion, filtering and extraction together

pub mod aggregate;
pub mod batch;
pub mod classifier;
pub mod convert;
pub mod extractor;
pub mod filter;
pub mod merge;
pub mod scanner;
pub mod sheet;

pub use aggregate::{collect_records, extract_workbook, PackingRecord, PackingReport};
pub use batch::{BatchConfig, InvoiceSummary, MergeSummary};
pub use classifier::{is_packing_slip_page, ClassifierConfig};
pub use convert::{DocumentConverter, SofficeConverter};
pub use extractor::{extract_page_text, TextItem, TextLine};
pub use filter::{filter_pdf, filter_pdf_mem, FilteredDocument, PageTextSource};
pub use merge::merge_documents;
pub use scanner::{scan_sheet, ColumnIndexSet, SheetScan, SubtotalRow};
pub use sheet::{CellValue, SheetRow, Workbook, Worksheet};

#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parsing error: {0}")]
    Pdf(String),
    #[error("Invalid PDF structure: {0}")]
    InvalidStructure(String),
    #[error("Page text extraction failed on page {page}: {reason}")]
    PageText { page: u32, reason: String },
    #[error("Workbook error: {0}")]
    Workbook(String),
    #[error("Conversion of {path} failed: {reason}")]
    Conversion { path: String, reason: String },
    #[error("Conversion of {path} timed out after {seconds}s")]
    ConversionTimeout { path: String, seconds: u64 },
    #[error("Converter `{0}` is not available")]
    ConverterUnavailable(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PackError {
    /// Whether the error should stop a whole batch rather than one file
    pub fn is_batch_fatal(&self) -> bool {
        matches!(self, PackError::ConverterUnavailable(_))
    }
}

impl From<lopdf::Error> for PackError {
    fn from(e: lopdf::Error) -> Self {
        PackError::Pdf(e.to_string())
    }
}

impl From<calamine::Error> for PackError {
    fn from(e: calamine::Error) -> Self {
        PackError::Workbook(e.to_string())
    }
}
