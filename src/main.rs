mod analysis;
mod config;
mod data;
mod error;
mod report;

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracing::info;

use analysis::{AnalysisReport, Metric};
use config::Settings;
use data::{
    CmaMatcher, NvcrClient, ReportingWindow, SupplyFile, SupplyPortal, SupplySource, TradeFile,
    TradePortal, TradeProcessor, TradeSource,
};
use report::Styles;

/// Collects and reports on Victoria's Native Vegetation Credit Register.
#[derive(Debug, Parser)]
#[command(name = "nvcr-trade", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Download the latest trade-price workbook
    Download {
        /// Where to save it [default: NVCR_Trade-prices-<timestamp>.xlsx]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Split a trade workbook into clean HU and SHU CSV files
    Clean {
        /// Trade workbook to read
        #[arg(short, long)]
        input: PathBuf,
        /// Directory for the CSV files
        #[arg(short = 'd', long)]
        dir: Option<PathBuf>,
    },
    /// Scrape GHU supply for every CMA
    Supply {
        /// Supply workbook [default: Supply_<timestamp>.xlsx]
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Combined supply CSV [default: Supply_<timestamp>.csv]
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Build the trade analysis workbook
    Analyse {
        /// Supply workbook from an earlier `supply` run (scraped when absent)
        #[arg(short, long)]
        supply: Option<PathBuf>,
        /// Trade workbook (downloaded when absent)
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Report workbook
        #[arg(short, long, default_value = "Trade-Analysis.xlsx")]
        output: PathBuf,
        /// First day of the reporting window (YYYY-MM-DD)
        #[arg(short = 'b', long = "start", value_parser = parse_date)]
        start: Option<NaiveDate>,
        /// Last day of the reporting window (YYYY-MM-DD)
        #[arg(short = 'e', long = "end", value_parser = parse_date)]
        end: Option<NaiveDate>,
        /// Also dump the summaries as JSON
        #[arg(long)]
        summary_json: Option<PathBuf>,
        /// Only save the trade workbook to this path, then stop
        #[arg(long)]
        download_nvcr: Option<PathBuf>,
    },
    /// Apply the house font and currency formats to a workbook
    Format {
        /// Workbook to restyle
        #[arg(short, long)]
        input: PathBuf,
        /// Restyled copy [default: <input stem>_updated.xlsx]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn parse_date(s: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
}

fn timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

fn formatted_copy_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workbook".to_string());
    input.with_file_name(format!("{stem}_updated.xlsx"))
}

async fn write_file(path: &Path, bytes: Vec<u8>) -> anyhow::Result<()> {
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("could not write {}", path.display()))
}

async fn download(client: &NvcrClient, output: Option<PathBuf>) -> anyhow::Result<()> {
    let path = output.unwrap_or_else(|| {
        client
            .settings()
            .output_dir
            .join(format!("NVCR_Trade-prices-{}.xlsx", timestamp()))
    });
    println!("Downloading NVCR trade prices...");
    client
        .save_trade_workbook(&path)
        .await
        .context("trade workbook download failed; a saved workbook can be analysed with -i/--input")?;
    println!("Saved {}", path.display());
    Ok(())
}

/// Splits a trade workbook into clean HU and SHU CSV files in `dir`.
///
/// # Arguments
/// * `settings`: supplies the CMA names labels are matched against
/// * `input`: trade workbook to read
/// * `dir`: directory for the two timestamped CSV files
async fn clean(settings: &Settings, input: PathBuf, dir: PathBuf) -> anyhow::Result<()> {
    let source = TradeFile(input);
    println!("Reading {}...", source.describe());
    let records = source
        .load()
        .await
        .with_context(|| format!("could not read {}", source.describe()))?;
    let split = TradeProcessor::new(CmaMatcher::from_settings(settings)).process_batch(records);

    let ts = timestamp();
    let hu_path = dir.join(format!("Full-HU-Traded-Credits-{ts}.csv"));
    let shu_path = dir.join(format!("Full-SHU-Traded-Credits-{ts}.csv"));

    let file = File::create(&hu_path).with_context(|| format!("could not create {}", hu_path.display()))?;
    report::write_hu_csv(&split.hu, file)?;
    let file =
        File::create(&shu_path).with_context(|| format!("could not create {}", shu_path.display()))?;
    report::write_shu_csv(&split.shu, file)?;

    println!("HU trades:  {:>6} -> {}", split.hu.len(), hu_path.display());
    println!("SHU trades: {:>6} -> {}", split.shu.len(), shu_path.display());
    Ok(())
}

async fn supply(
    client: NvcrClient,
    output: Option<PathBuf>,
    csv_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    let settings = client.settings().clone();
    let ts = timestamp();
    let xlsx_path = output.unwrap_or_else(|| settings.output_dir.join(format!("Supply_{ts}.xlsx")));
    let csv_path = csv_path.unwrap_or_else(|| settings.output_dir.join(format!("Supply_{ts}.csv")));

    let source = SupplyPortal(client);
    let book = source
        .load(&settings.cmas)
        .await
        .with_context(|| format!("could not scrape {}", source.describe()))?;

    let styles = Styles::from_settings(&settings);
    write_file(&xlsx_path, report::write_supply_workbook(&book, &styles)?).await?;

    let file = File::create(&csv_path).with_context(|| format!("could not create {}", csv_path.display()))?;
    report::write_supply_csv(&book, Local::now().date_naive(), file)?;

    println!("Supply saved to {} and {}", xlsx_path.display(), csv_path.display());
    Ok(())
}

fn print_metrics(title: &str, metrics: &[Metric]) {
    println!("\n{title}");
    for m in metrics {
        match m.value {
            Some(v) if m.currency => println!("  {:<32} ${:.2}", m.label, v),
            Some(v) => println!("  {:<32} {:.2}", m.label, v),
            None => println!("  {:<32} -", m.label),
        }
    }
}

fn print_report(report: &AnalysisReport) {
    println!(
        "\nReporting window: {} to {}",
        report.window.start, report.window.end
    );
    for cma in &report.cmas {
        print_metrics(&cma.cma, &cma.metrics());
    }
    print_metrics("SHU, last 3 years", &report.shu_three_year.metrics());
    print_metrics("SHU, last year", &report.shu_one_year.metrics());
}

/// Runs the full analysis and writes the report workbook.
///
/// Trades and supply are read from the given files, or fetched from the
/// register when a path is absent.
///
/// # Errors
/// Fails when a source cannot be loaded, naming the flag that supplies a
/// local file, or when the report cannot be written
async fn analyse(
    client: NvcrClient,
    supply_path: Option<PathBuf>,
    input: Option<PathBuf>,
    output: PathBuf,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    summary_json: Option<PathBuf>,
) -> anyhow::Result<()> {
    let settings = client.settings().clone();
    let window =
        ReportingWindow::default_for(Local::now().date_naive()).with_overrides(start, end);
    if window.start > window.end {
        anyhow::bail!(
            "reporting window starts after it ends ({} > {})",
            window.start,
            window.end
        );
    }

    // Trades
    let trades: Box<dyn TradeSource> = match input {
        Some(path) => Box::new(TradeFile(path)),
        None => Box::new(TradePortal(client.clone())),
    };
    println!("Loading {}...", trades.describe());
    let records = trades.load().await.with_context(|| {
        format!(
            "could not load {}; pass -i/--input with a saved trade workbook",
            trades.describe()
        )
    })?;
    let split = TradeProcessor::new(CmaMatcher::from_settings(&settings)).process_batch(records);

    // Supply
    let supply: Box<dyn SupplySource> = match supply_path {
        Some(path) => Box::new(SupplyFile(path)),
        None => Box::new(SupplyPortal(client)),
    };
    println!("Loading {}...", supply.describe());
    let book = supply.load(&settings.cmas).await.with_context(|| {
        format!(
            "could not load {}; pass -s/--supply with a saved supply workbook",
            supply.describe()
        )
    })?;

    let report = AnalysisReport::build(window, &split, &book, &settings)
        .context("analysis failed")?;
    info!(cmas = report.cmas.len(), "analysis complete");

    // Report workbook, then the optional JSON dump
    let styles = Styles::from_settings(&settings);
    write_file(&output, report::write_analysis_workbook(&report, &styles)?).await?;

    if let Some(path) = summary_json {
        let json = serde_json::to_string_pretty(&report)?;
        write_file(&path, json.into_bytes()).await?;
        println!("Summary JSON written to {}", path.display());
    }

    print_report(&report);
    println!("\nAnalysis saved to {}", output.display());
    Ok(())
}

async fn restyle(settings: &Settings, input: PathBuf, output: Option<PathBuf>) -> anyhow::Result<()> {
    let output = output.unwrap_or_else(|| formatted_copy_path(&input));
    let bytes = tokio::fs::read(&input)
        .await
        .with_context(|| format!("could not read {}", input.display()))?;

    let cma_sheets: Vec<String> = settings.cmas.iter().map(|c| report::sheet_name(c)).collect();
    let styles = Styles::from_settings(settings);
    let restyled = report::restyle_workbook(bytes, &cma_sheets, &styles)
        .with_context(|| format!("could not restyle {}", input.display()))?;
    write_file(&output, restyled).await?;

    println!("Formatted copy saved to {}", output.display());
    Ok(())
}

/// Entry point: parses the command line and runs one pipeline step.
///
/// Each step writes a file the next one can read, so the steps can be run
/// one at a time: download, clean, supply, analyse, then format.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    // Load settings from the environment and .env file
    let settings = Settings::from_env().context("invalid NVCR_* settings")?;

    match cli.command {
        Command::Download { output } => {
            let client = NvcrClient::new(settings)?;
            download(&client, output).await
        }
        Command::Clean { input, dir } => {
            let dir = dir.unwrap_or_else(|| settings.output_dir.clone());
            clean(&settings, input, dir).await
        }
        Command::Supply { output, csv } => supply(NvcrClient::new(settings)?, output, csv).await,
        Command::Analyse {
            supply,
            input,
            output,
            start,
            end,
            summary_json,
            download_nvcr,
        } => {
            let client = NvcrClient::new(settings)?;
            if let Some(path) = download_nvcr {
                return download(&client, Some(path)).await;
            }
            analyse(client, supply, input, output, start, end, summary_json).await
        }
        Command::Format { input, output } => restyle(&settings, input, output).await,
    }
}
