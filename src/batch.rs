//! Directory-level runs
//!
//! Three runs share one [`BatchConfig`]:
//! - invoice conversion: spreadsheets named like invoices become PDFs next to them
//! - packing-slip merge: every other spreadsheet is converted in a scratch
//!   directory, filtered to its packing-slip pages, and the results are merged
//! - record extraction: packing-list workbooks become JSON records
//!
//! Failures are isolated per file. Only a missing converter stops a run.

use crate::aggregate::{collect_records, PackingReport};
use crate::classifier::ClassifierConfig;
use crate::convert::DocumentConverter;
use crate::filter::{filter_pdf_with_config, FilteredDocument};
use crate::merge::merge_to_file;
use crate::PackError;
use std::fs;
use std::path::{Path, PathBuf};

/// Spreadsheet extensions picked up from the target directory
pub const SPREADSHEET_EXTENSIONS: [&str; 3] = ["xls", "xlsx", "xlsm"];

/// File name of the merged packing-slip PDF
pub const COMBINED_PDF_NAME: &str = "combined_packing_slips.pdf";

/// Configuration shared by the directory runs
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Directory holding the spreadsheets; outputs are written here too
    pub directory: PathBuf,
    /// File-name marker of invoices (case-insensitive)
    pub invoice_marker: String,
    /// File-name markers excluded from the packing-slip merge (case-insensitive)
    pub exclude_markers: Vec<String>,
    /// File name of the merged PDF inside `directory`
    pub output_name: String,
    pub classifier: ClassifierConfig,
}

impl BatchConfig {
    pub fn new<P: Into<PathBuf>>(directory: P) -> Self {
        Self {
            directory: directory.into(),
            invoice_marker: "INV".to_string(),
            exclude_markers: vec!["INV".to_string(), "BCR".to_string()],
            output_name: COMBINED_PDF_NAME.to_string(),
            classifier: ClassifierConfig::default(),
        }
    }

    pub fn output_path(&self) -> PathBuf {
        self.directory.join(&self.output_name)
    }
}

/// Outcome of an invoice conversion run
#[derive(Debug, Default)]
pub struct InvoiceSummary {
    pub converted: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

/// Outcome of a packing-slip merge run
#[derive(Debug, Default)]
pub struct MergeSummary {
    /// Merged PDF, if at least one page was kept
    pub output: Option<PathBuf>,
    /// Source spreadsheets that contributed pages, in merge order
    pub merged_files: Vec<PathBuf>,
    /// Pages in the merged PDF
    pub page_count: usize,
    /// Spreadsheets without packing-slip pages
    pub without_packing_slips: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

/// List spreadsheets in `dir`, sorted by file name
pub fn list_spreadsheets(dir: &Path) -> Result<Vec<PathBuf>, PackError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && has_spreadsheet_extension(&path) {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

fn has_spreadsheet_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            SPREADSHEET_EXTENSIONS
                .iter()
                .any(|ext| e.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Whether `name` contains any of `markers`, ignoring case
pub fn name_contains_marker<S: AsRef<str>>(name: &str, markers: &[S]) -> bool {
    let upper = name.to_uppercase();
    markers
        .iter()
        .map(|m| m.as_ref().trim())
        .filter(|m| !m.is_empty())
        .any(|m| upper.contains(&m.to_uppercase()))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Convert invoice spreadsheets to PDFs placed in the target directory
pub fn convert_invoices<C: DocumentConverter>(
    config: &BatchConfig,
    converter: &C,
) -> Result<InvoiceSummary, PackError> {
    let mut summary = InvoiceSummary::default();

    for path in list_spreadsheets(&config.directory)? {
        let name = file_name(&path);
        if !name_contains_marker(&name, &[config.invoice_marker.as_str()]) {
            log::info!("Skipped (not an invoice): {}", name);
            summary.skipped.push(path);
            continue;
        }

        match converter.convert_to_pdf(&path, &config.directory) {
            Ok(pdf) => {
                log::info!("Converted: {} -> {}", name, pdf.display());
                summary.converted.push(pdf);
            }
            Err(e) if e.is_batch_fatal() => return Err(e),
            Err(e) => {
                log::warn!("Failed to convert {}: {}", name, e);
                summary.failed.push((path, e.to_string()));
            }
        }
    }

    Ok(summary)
}

/// Convert, filter and merge packing slips into one PDF in the target directory
///
/// Converted PDFs live in a scratch directory that is removed when the run
/// ends, whether it succeeds or not.
pub fn merge_packing_slips<C: DocumentConverter>(
    config: &BatchConfig,
    converter: &C,
) -> Result<MergeSummary, PackError> {
    let scratch = tempfile::Builder::new().prefix("packslip-").tempdir()?;
    let mut summary = MergeSummary::default();
    let mut filtered: Vec<FilteredDocument> = Vec::new();

    for path in list_spreadsheets(&config.directory)? {
        let name = file_name(&path);
        if name_contains_marker(&name, &config.exclude_markers) {
            log::debug!("Excluded by marker: {}", name);
            continue;
        }
        log::info!("Processing: {}", name);

        match filter_spreadsheet(&path, scratch.path(), config, converter) {
            Ok(Some(doc)) => {
                log::info!(
                    "Found {} packing slip page(s) in: {}",
                    doc.page_count(),
                    name
                );
                summary.merged_files.push(path);
                filtered.push(doc);
            }
            Ok(None) => {
                log::warn!("No packing slip pages found in: {}", name);
                summary.without_packing_slips.push(path);
            }
            Err(e) if e.is_batch_fatal() => return Err(e),
            Err(e) => {
                log::warn!("Failed to process {}: {}", name, e);
                summary.failed.push((path, e.to_string()));
            }
        }
    }

    let file_count = filtered.len();
    let output = config.output_path();
    match merge_to_file(filtered, &output)? {
        Some(page_count) => {
            log::info!(
                "Combined {} filtered packing slip(s), {} page(s), into: {}",
                file_count,
                page_count,
                output.display()
            );
            summary.page_count = page_count;
            summary.output = Some(output);
        }
        None => log::warn!("No packing slips found to combine"),
    }

    Ok(summary)
}

/// Convert one spreadsheet and keep its packing-slip pages
///
/// The converted PDF is deleted when it has no packing-slip pages.
fn filter_spreadsheet<C: DocumentConverter>(
    path: &Path,
    scratch: &Path,
    config: &BatchConfig,
    converter: &C,
) -> Result<Option<FilteredDocument>, PackError> {
    let pdf = converter.convert_to_pdf(path, scratch)?;
    let filtered = filter_pdf_with_config(&pdf, &config.classifier)?;
    if filtered.is_none() {
        if let Err(e) = fs::remove_file(&pdf) {
            log::warn!("Could not delete {}: {}", pdf.display(), e);
        }
    }
    Ok(filtered)
}

/// Extract packing records from every spreadsheet in the target directory
pub fn extract_packing_records(config: &BatchConfig) -> Result<PackingReport, PackError> {
    let files = list_spreadsheets(&config.directory)?;
    if files.is_empty() {
        log::warn!(
            "No spreadsheet files found in {}",
            config.directory.display()
        );
    }
    Ok(collect_records(&files))
}
