//! `cpk-report`: overall report and abnormality scan for one CSV export.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::Parser;
use polars::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

use dairy_cpk::{
    AnalysisSettings, ClassificationRule, CoefficientConfig, CpkError, CpkModel, DateRange,
    Dimension, Granularity, Season, Selectors,
};

#[derive(Parser, Debug)]
#[command(name = "cpk-report")]
#[command(about = "Process capability report for dairy quality records")]
struct Args {
    /// CSV export of quality records
    #[arg(long)]
    input: PathBuf,

    /// JSON settings file (coefficients, rule, scan controls)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Coefficient preset, overrides the settings file
    #[arg(long)]
    season: Option<Season>,

    /// Region selector (repeatable)
    #[arg(long = "region")]
    regions: Vec<String>,

    /// Sub-region selector (repeatable)
    #[arg(long = "sub-region")]
    sub_regions: Vec<String>,

    /// Locality selector (repeatable)
    #[arg(long = "locality")]
    localities: Vec<String>,

    /// Farm name selector (repeatable)
    #[arg(long = "farm")]
    farms: Vec<String>,

    /// First intake date of the report selection (YYYY-MM-DD)
    #[arg(long, requires = "to")]
    from: Option<NaiveDate>,

    /// Last intake date of the report selection (YYYY-MM-DD)
    #[arg(long, requires = "from")]
    to: Option<NaiveDate>,

    /// Detail and scan period granularity
    #[arg(long)]
    granularity: Option<Granularity>,

    /// Scan dimension: region, sub_region or farm
    #[arg(long)]
    dimension: Option<Dimension>,

    /// Flag cells with CPK below this value
    #[arg(long, conflicts_with_all = ["band_min", "band_max"])]
    threshold: Option<f64>,

    /// Lower edge of the acceptable CPK band
    #[arg(long, requires = "band_max")]
    band_min: Option<f64>,

    /// Upper edge of the acceptable CPK band
    #[arg(long, requires = "band_min")]
    band_max: Option<f64>,

    /// First intake date considered by the scan
    #[arg(long, requires = "scan_to")]
    scan_from: Option<NaiveDate>,

    /// Last intake date considered by the scan
    #[arg(long, requires = "scan_from")]
    scan_to: Option<NaiveDate>,

    /// Write summary.csv, detail.csv and abnormal.csv here
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), CpkError> {
    let args = Args::parse();
    init_logging(args.verbose);

    let settings = resolve_settings(&args)?;
    let granularity = settings.scan.granularity;

    let base = args
        .input
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let filename = args
        .input
        .file_name()
        .and_then(|f| f.to_str())
        .ok_or_else(|| CpkError::General(format!("Invalid input path: {:?}", args.input)))?;

    let mut model = CpkModel::new(base);
    model.load_csv(filename, None)?;
    model.set_settings(settings)?;
    model.set_selection(selection(&args)?);

    let mut summary = model.summary()?.to_frame()?;
    let mut detail = model.detail(granularity)?.to_frame()?;
    let scan = model.scan()?;
    info!(
        dimension = %scan.dimension,
        cells = scan.cells_scanned,
        abnormal = scan.len(),
        "scan finished"
    );
    let mut abnormal = scan.to_frame()?;

    println!("{summary}");
    println!("{detail}");
    println!("{abnormal}");

    if let Some(dir) = &args.output_dir {
        fs::create_dir_all(dir)?;
        write_csv(&dir.join("summary.csv"), &mut summary)?;
        write_csv(&dir.join("detail.csv"), &mut detail)?;
        write_csv(&dir.join("abnormal.csv"), &mut abnormal)?;
        info!(dir = %dir.display(), "wrote report tables");
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Settings file first, then command-line overrides.
fn resolve_settings(args: &Args) -> Result<AnalysisSettings, CpkError> {
    let mut settings = match &args.settings {
        Some(path) => AnalysisSettings::from_json_file(path)?,
        None => AnalysisSettings::default(),
    };
    if let Some(season) = args.season {
        settings.coefficients = CoefficientConfig::for_season(season);
    }
    if let Some(threshold) = args.threshold {
        settings.rule = ClassificationRule::below(threshold);
    }
    if let (Some(min), Some(max)) = (args.band_min, args.band_max) {
        settings.rule = ClassificationRule::outside(min, max)?;
    }
    if let Some(granularity) = args.granularity {
        settings.scan.granularity = granularity;
    }
    if let Some(dimension) = args.dimension {
        settings.scan.dimension = dimension;
    }
    if let (Some(start), Some(end)) = (args.scan_from, args.scan_to) {
        settings.scan.date_range = Some(DateRange::new(start, end)?);
    }
    settings.validate()?;
    Ok(settings)
}

fn selection(args: &Args) -> Result<Selectors, CpkError> {
    let mut selectors = Selectors::new()
        .with_regions(args.regions.iter().cloned())
        .with_sub_regions(args.sub_regions.iter().cloned())
        .with_localities(args.localities.iter().cloned())
        .with_farms(args.farms.iter().cloned());
    if let (Some(start), Some(end)) = (args.from, args.to) {
        selectors = selectors.with_date_range(DateRange::new(start, end)?);
    }
    Ok(selectors)
}

fn write_csv(path: &Path, df: &mut DataFrame) -> Result<(), CpkError> {
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).finish(df)?;
    Ok(())
}
