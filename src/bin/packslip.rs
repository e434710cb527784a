//! CLI for converting, merging and extracting packing slips

use clap::{Args, Parser, Subcommand};
use packslip::batch::{self, BatchConfig};
use packslip::{PackError, SofficeConverter};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "packslip",
    version,
    about = "Packing-slip PDF merging and packing-list extraction"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert invoice spreadsheets to PDF next to the originals
    ConvertInvoices(ConvertArgs),
    /// Merge the packing-slip pages of all other spreadsheets into one PDF
    Merge(MergeArgs),
    /// Extract PO, color and quantity subtotals as JSON
    Extract(ExtractArgs),
    /// Run invoice conversion, merge and extraction in sequence
    All(AllArgs),
}

#[derive(Args, Debug, Clone)]
struct DirArgs {
    /// Directory holding the spreadsheets
    #[arg(long, default_value = ".")]
    dir: PathBuf,
}

#[derive(Args, Debug, Clone)]
struct ConverterArgs {
    /// LibreOffice executable
    #[arg(long, default_value = "soffice")]
    soffice: PathBuf,

    /// Seconds allowed per conversion
    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,

    /// File-name marker of invoices
    #[arg(long, default_value = "INV")]
    invoice_marker: String,
}

#[derive(Args, Debug, Clone)]
struct ConvertArgs {
    #[command(flatten)]
    dir: DirArgs,

    #[command(flatten)]
    converter: ConverterArgs,
}

#[derive(Args, Debug, Clone)]
struct MergeOptions {
    /// File-name markers excluded from the merge (repeatable)
    #[arg(long = "exclude", default_values_t = [String::from("INV"), String::from("BCR")])]
    exclude_markers: Vec<String>,

    /// File name of the merged PDF inside --dir
    #[arg(long, default_value = batch::COMBINED_PDF_NAME)]
    output_name: String,
}

/// Merge options of the combined run, which also skips B255 and CCI files
#[derive(Args, Debug, Clone)]
struct CombinedMergeOptions {
    /// File-name markers excluded from the merge (repeatable)
    #[arg(
        long = "exclude",
        default_values_t = [String::from("INV"), String::from("B255"), String::from("CCI")]
    )]
    exclude_markers: Vec<String>,

    /// File name of the merged PDF inside --dir
    #[arg(long, default_value = batch::COMBINED_PDF_NAME)]
    output_name: String,
}

impl From<CombinedMergeOptions> for MergeOptions {
    fn from(options: CombinedMergeOptions) -> Self {
        Self {
            exclude_markers: options.exclude_markers,
            output_name: options.output_name,
        }
    }
}

#[derive(Args, Debug, Clone)]
struct MergeArgs {
    #[command(flatten)]
    dir: DirArgs,

    #[command(flatten)]
    converter: ConverterArgs,

    #[command(flatten)]
    merge: MergeOptions,
}

#[derive(Args, Debug, Clone)]
struct ExtractArgs {
    #[command(flatten)]
    dir: DirArgs,

    /// Also write the JSON array to this file
    #[arg(long)]
    json_out: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct AllArgs {
    #[command(flatten)]
    dir: DirArgs,

    #[command(flatten)]
    converter: ConverterArgs,

    #[command(flatten)]
    merge: CombinedMergeOptions,

    /// Also write the JSON array to this file
    #[arg(long)]
    json_out: Option<PathBuf>,
}

impl ConverterArgs {
    fn converter(&self) -> SofficeConverter {
        SofficeConverter {
            program: self.soffice.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

fn batch_config(
    dir: &DirArgs,
    converter: Option<&ConverterArgs>,
    merge: Option<&MergeOptions>,
) -> BatchConfig {
    let mut config = BatchConfig::new(&dir.dir);
    if let Some(converter) = converter {
        config.invoice_marker = converter.invoice_marker.clone();
    }
    if let Some(merge) = merge {
        config.exclude_markers = merge.exclude_markers.clone();
        config.output_name = merge.output_name.clone();
    }
    config
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), PackError> {
    match cli.command {
        Commands::ConvertInvoices(args) => {
            let config = batch_config(&args.dir, Some(&args.converter), None);
            run_convert(&config, &args.converter)
        }
        Commands::Merge(args) => {
            let config = batch_config(&args.dir, Some(&args.converter), Some(&args.merge));
            run_merge(&config, &args.converter)
        }
        Commands::Extract(args) => {
            let config = batch_config(&args.dir, None, None);
            run_extract(&config, args.json_out.as_ref())
        }
        Commands::All(args) => {
            let merge = MergeOptions::from(args.merge);
            let config = batch_config(&args.dir, Some(&args.converter), Some(&merge));
            log::info!("Input directory: {}", config.directory.display());

            println!("{}", banner("Invoice conversion"));
            run_convert(&config, &args.converter)?;
            println!("{}", banner("Packing slip merge"));
            run_merge(&config, &args.converter)?;
            println!("{}", banner("Packing list extraction"));
            run_extract(&config, args.json_out.as_ref())?;

            println!("All steps completed");
            Ok(())
        }
    }
}

fn banner(title: &str) -> String {
    format!("{0}\n{1}\n{0}", "=".repeat(60), title)
}

fn run_convert(config: &BatchConfig, converter: &ConverterArgs) -> Result<(), PackError> {
    let summary = batch::convert_invoices(config, &converter.converter())?;
    println!(
        "Invoices converted: {}, failed: {}, skipped: {}",
        summary.converted.len(),
        summary.failed.len(),
        summary.skipped.len()
    );
    Ok(())
}

fn run_merge(config: &BatchConfig, converter: &ConverterArgs) -> Result<(), PackError> {
    let summary = batch::merge_packing_slips(config, &converter.converter())?;
    match &summary.output {
        Some(output) => println!(
            "Combined {} file(s), {} page(s) into: {}",
            summary.merged_files.len(),
            summary.page_count,
            output.display()
        ),
        None => println!("No packing slips found to combine"),
    }
    if !summary.failed.is_empty() {
        println!("Failed: {}", summary.failed.len());
        for (path, reason) in &summary.failed {
            println!("  {}: {}", path.display(), reason);
        }
    }
    Ok(())
}

fn run_extract(config: &BatchConfig, json_out: Option<&PathBuf>) -> Result<(), PackError> {
    let report = batch::extract_packing_records(config)?;
    println!(
        "Files processed: {}, packing lists found: {}",
        report.files_processed,
        report.len()
    );
    if report.is_empty() {
        println!("No packing list data found");
        return Ok(());
    }

    println!("{}", report.to_json()?);
    if let Some(path) = json_out {
        report.write_json(path)?;
        println!("JSON written to: {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_for(args: &[&str]) -> BatchConfig {
        match Cli::try_parse_from(args).unwrap().command {
            Commands::Merge(args) => batch_config(&args.dir, Some(&args.converter), Some(&args.merge)),
            Commands::All(args) => {
                let merge = MergeOptions::from(args.merge);
                batch_config(&args.dir, Some(&args.converter), Some(&merge))
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_merge_excludes_invoices_and_bcr_by_default() {
        let config = config_for(&["packslip", "merge"]);
        assert_eq!(config.exclude_markers, vec!["INV", "BCR"]);
    }

    #[test]
    fn test_all_excludes_invoices_b255_and_cci_by_default() {
        let config = config_for(&["packslip", "all", "--dir", "/data"]);
        assert_eq!(config.exclude_markers, vec!["INV", "B255", "CCI"]);
        assert_eq!(config.directory, PathBuf::from("/data"));
    }

    #[test]
    fn test_exclude_markers_can_be_overridden() {
        let config = config_for(&["packslip", "all", "--exclude", "INV", "--exclude", "XYZ"]);
        assert_eq!(config.exclude_markers, vec!["INV", "XYZ"]);
    }
}
