//! GeoGuard CLI - change detection and multi-index fusion

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use geoguard_algorithms::alerts::{
    group_related_alerts, prioritize, AlertContext, AlertGroup, AlertRecord, GroupingParams,
    PriorityParams, PriorityRecord,
};
use geoguard_algorithms::change_point::{
    detect_change_point, Baseline, CusumParams, DetectorParams, EwmaParams,
};
use geoguard_algorithms::fusion::{AoiMetadata, FusionConfig, FusionEngine, Region};
use geoguard_algorithms::imagery::{
    compute_indices_with, summarize_indices, IndexParams, IndexSummary, SpectralIndex, SummaryMap,
};
use geoguard_algorithms::statistics::{analyze_hotspots, HotspotParams};
use geoguard_algorithms::temporal::{analyze_temporal, Polarity, TemporalParams, TimeSeriesPoint};
use geoguard_core::{BandSet, Raster};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "geoguard")]
#[command(author, version, about = "Environmental change detection and fusion", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute spectral index summaries from band arrays
    Indices {
        /// JSON object mapping band names to 2-D arrays
        #[arg(short, long)]
        bands: PathBuf,
        /// Comma-separated subset of indices (default: all computable)
        #[arg(short, long, value_delimiter = ',')]
        indices: Option<Vec<String>>,
        /// SAVI soil brightness factor
        #[arg(long, default_value = "0.5")]
        savi_l: f64,
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run an EWMA or CUSUM change-point detector over a series
    Detect {
        /// JSON array of values in acquisition order
        #[arg(short, long)]
        series: PathBuf,
        #[arg(short, long, value_enum, default_value = "ewma")]
        algorithm: DetectorArg,
        /// Named parameter preset
        #[arg(short, long, value_enum)]
        preset: Option<PresetArg>,
        /// EWMA smoothing factor
        #[arg(long)]
        lambda: Option<f64>,
        /// EWMA control-limit width or CUSUM allowance
        #[arg(short, long)]
        k: Option<f64>,
        /// CUSUM decision threshold
        #[arg(long)]
        h: Option<f64>,
        /// Known baseline mean (requires --baseline-std)
        #[arg(long, requires = "baseline_std")]
        baseline_mean: Option<f64>,
        #[arg(long, requires = "baseline_mean")]
        baseline_std: Option<f64>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Trend, velocity and forecast of a timestamped series
    Temporal {
        /// JSON array of {timestamp, value, quality?}
        #[arg(short, long)]
        series: PathBuf,
        /// Critical value for the time-to-threshold estimate
        #[arg(short, long, allow_hyphen_values = true)]
        critical: Option<f64>,
        #[arg(short, long, value_enum, default_value = "higher-is-healthier")]
        polarity: PolarityArg,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Localize change between two index rasters
    Hotspots {
        /// JSON 2-D array of the earlier index raster
        #[arg(short, long)]
        before: PathBuf,
        /// JSON 2-D array of the later index raster
        #[arg(short, long)]
        after: PathBuf,
        /// Cells per side of the analysis grid
        #[arg(short, long, default_value = "10")]
        grid: usize,
        /// Threshold percentile of the change raster
        #[arg(short, long, default_value = "90")]
        percentile: f64,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Fuse current and previous index summaries into a risk assessment
    Fuse {
        /// JSON object of current summaries (numbers or {mean, min, max, std})
        #[arg(short, long)]
        current: PathBuf,
        /// JSON object of previous summaries
        #[arg(short, long)]
        previous: PathBuf,
        /// JSON array of historical summary objects, oldest first
        #[arg(long)]
        history: Option<PathBuf>,
        /// TOML fusion configuration
        #[arg(long)]
        config: Option<PathBuf>,
        /// Regional preset, overrides the configuration's region
        #[arg(short, long)]
        region: Option<String>,
        /// AOI identifier echoed into the result
        #[arg(long)]
        aoi: Option<String>,
        /// AOI centre latitude, selects the region when --region is absent
        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Score and order alerts for follow-up
    Prioritize {
        /// JSON array of alerts, each with an optional "context" object
        #[arg(short, long)]
        alerts: PathBuf,
        /// Keep only the top N
        #[arg(short, long)]
        limit: Option<usize>,
        /// Also group alerts close in space and time
        #[arg(short, long)]
        group: bool,
        #[arg(long, default_value = "2.0")]
        group_distance_km: f64,
        #[arg(long, default_value = "7")]
        group_window_days: f64,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the effective fusion configuration as TOML
    Config {
        #[arg(short, long, default_value = "default")]
        region: String,
        /// Print the per-index thresholds after regional scaling instead
        #[arg(short, long)]
        thresholds: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DetectorArg {
    Ewma,
    Cusum,
}

#[derive(Clone, Copy, ValueEnum)]
enum PresetArg {
    Vegetation,
    WaterQuality,
    Construction,
    Deforestation,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolarityArg {
    HigherIsHealthier,
    HigherIsWorse,
}

// ─── Input formats ──────────────────────────────────────────────────────

/// Summary given either as a bare mean or as full statistics
#[derive(Deserialize)]
#[serde(untagged)]
enum SummaryInput {
    Value(f64),
    Full(IndexSummary),
}

impl From<SummaryInput> for IndexSummary {
    fn from(s: SummaryInput) -> Self {
        match s {
            SummaryInput::Value(v) => IndexSummary::from_value(v),
            SummaryInput::Full(s) => s,
        }
    }
}

#[derive(Deserialize)]
struct AlertEntry {
    #[serde(flatten)]
    alert: AlertRecord,
    #[serde(default)]
    context: AlertContext,
}

#[derive(Serialize)]
struct PrioritizeOutput {
    priorities: Vec<PriorityRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    groups: Option<Vec<AlertGroup>>,
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

fn read_raster(path: &Path) -> Result<Raster<f64>> {
    let pb = spinner("Reading raster...");
    let rows: Vec<Vec<f64>> = read_json(path)?;
    let raster = Raster::from_rows(rows)
        .with_context(|| format!("{} is not a rectangular grid", path.display()))?;
    pb.finish_and_clear();
    info!("Input: {} x {}", raster.cols(), raster.rows());
    Ok(raster)
}

fn read_summaries(path: &Path) -> Result<SummaryMap> {
    let raw: BTreeMap<String, SummaryInput> = read_json(path)?;
    Ok(raw.into_iter().map(|(k, v)| (k, v.into())).collect())
}

fn read_history(path: &Path) -> Result<Vec<SummaryMap>> {
    let raw: Vec<BTreeMap<String, SummaryInput>> = read_json(path)?;
    Ok(raw
        .into_iter()
        .map(|m| m.into_iter().map(|(k, v)| (k, v.into())).collect())
        .collect())
}

fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize result")?;
    match output {
        Some(path) => {
            std::fs::write(path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Result saved to: {}", path.display());
        }
        None => println!("{text}"),
    }
    Ok(())
}

fn done(name: &str, elapsed: std::time::Duration) {
    info!("{} finished in {:.2?}", name, elapsed);
}

fn detector_params(
    algorithm: DetectorArg,
    preset: Option<PresetArg>,
    lambda: Option<f64>,
    k: Option<f64>,
    h: Option<f64>,
) -> Result<DetectorParams> {
    let params = match algorithm {
        DetectorArg::Ewma => {
            let mut p = match preset {
                None => EwmaParams::default(),
                Some(PresetArg::Vegetation) => EwmaParams::vegetation(),
                Some(PresetArg::WaterQuality) => EwmaParams::water_quality(),
                Some(_) => bail!("preset is not an EWMA preset"),
            };
            if h.is_some() {
                bail!("--h applies to CUSUM only");
            }
            p.lambda = lambda.unwrap_or(p.lambda);
            p.k = k.unwrap_or(p.k);
            DetectorParams::ewma(p)
        }
        DetectorArg::Cusum => {
            let mut p = match preset {
                None => CusumParams::default(),
                Some(PresetArg::Construction) => CusumParams::construction(),
                Some(PresetArg::Deforestation) => CusumParams::deforestation(),
                Some(_) => bail!("preset is not a CUSUM preset"),
            };
            if lambda.is_some() {
                bail!("--lambda applies to EWMA only");
            }
            p.k = k.unwrap_or(p.k);
            p.h = h.unwrap_or(p.h);
            DetectorParams::cusum(p)
        }
    };
    Ok(params)
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Indices {
            bands,
            indices,
            savi_l,
            output,
        } => {
            let pb = spinner("Reading bands...");
            let layers: BTreeMap<String, Vec<Vec<f64>>> = read_json(&bands)?;
            let mut rasters = Vec::with_capacity(layers.len());
            for (name, rows) in layers {
                let raster = Raster::from_rows(rows)
                    .with_context(|| format!("band '{name}' is not a rectangular grid"))?;
                rasters.push((name, raster));
            }
            let band_set = BandSet::from_named(rasters).context("Invalid band set")?;
            pb.finish_and_clear();
            info!("Bands: {}", band_set.len());

            let indices = indices
                .map(|names| {
                    names
                        .iter()
                        .map(|n| n.parse::<SpectralIndex>())
                        .collect::<geoguard_core::Result<Vec<_>>>()
                })
                .transpose()
                .context("Invalid index list")?;
            let params = IndexParams { indices, savi_l };

            let start = Instant::now();
            let rasters = compute_indices_with(&band_set, &params)?;
            let summaries = summarize_indices(&rasters);
            done("Index computation", start.elapsed());
            write_json(&summaries, output.as_deref())?;
        }

        Commands::Detect {
            series,
            algorithm,
            preset,
            lambda,
            k,
            h,
            baseline_mean,
            baseline_std,
            output,
        } => {
            let values: Vec<f64> = read_json(&series)?;
            let mut params = detector_params(algorithm, preset, lambda, k, h)?;
            if let (Some(mean), Some(std)) = (baseline_mean, baseline_std) {
                params = params.with_baseline(Baseline::new(mean, std));
            }

            let start = Instant::now();
            let result = detect_change_point(&values, &params)?;
            done("Change-point detection", start.elapsed());
            write_json(&result, output.as_deref())?;
        }

        Commands::Temporal {
            series,
            critical,
            polarity,
            output,
        } => {
            let points: Vec<TimeSeriesPoint> = read_json(&series)?;
            let params = TemporalParams {
                critical_threshold: critical,
                polarity: match polarity {
                    PolarityArg::HigherIsHealthier => Polarity::HigherIsHealthier,
                    PolarityArg::HigherIsWorse => Polarity::HigherIsWorse,
                },
            };

            let start = Instant::now();
            let analysis = analyze_temporal(&points, &params);
            done("Temporal analysis", start.elapsed());
            write_json(&analysis, output.as_deref())?;
        }

        Commands::Hotspots {
            before,
            after,
            grid,
            percentile,
            output,
        } => {
            let before = read_raster(&before)?;
            let after = read_raster(&after)?;
            let params = HotspotParams {
                grid_size: grid,
                percentile,
            };

            let start = Instant::now();
            let report = analyze_hotspots(&before, &after, &params)?;
            done("Hotspot analysis", start.elapsed());
            info!(
                "{} hotspots ({:?}) over {} cells",
                report.total_hotspots(),
                report.distribution,
                report.cells_analyzed
            );
            write_json(&report, output.as_deref())?;
        }

        Commands::Fuse {
            current,
            previous,
            history,
            config,
            region,
            aoi,
            lat,
            lon,
            output,
        } => {
            let mut cfg = match &config {
                Some(path) => FusionConfig::load(path)
                    .with_context(|| format!("Invalid fusion configuration {}", path.display()))?,
                None => FusionConfig::default(),
            };
            if let Some(name) = region {
                cfg.region = name.parse::<Region>()?;
            } else if let (Some(lat), Some(lon)) = (lat, lon) {
                cfg.region = Region::from_coordinates(lat, lon);
                info!("Region from coordinates: {}", cfg.region);
            }
            let engine = FusionEngine::new(cfg).context("Invalid fusion configuration")?;

            let current = read_summaries(&current)?;
            let previous = read_summaries(&previous)?;
            let history = history.as_deref().map(read_history).transpose()?;
            let aoi = aoi.map(|id| {
                let meta = AoiMetadata::new(id);
                match (lat, lon) {
                    (Some(lat), Some(lon)) => meta.with_location(lat, lon),
                    _ => meta,
                }
            });

            let start = Instant::now();
            let result = engine.fuse(&current, &previous, history.as_deref(), aoi.as_ref());
            done("Fusion", start.elapsed());
            info!(
                "{} (confidence {:.2}, risk {:.2}, {})",
                result.category, result.confidence, result.composite_risk_score, result.risk_level
            );
            write_json(&result, output.as_deref())?;
        }

        Commands::Prioritize {
            alerts,
            limit,
            group,
            group_distance_km,
            group_window_days,
            output,
        } => {
            let entries: Vec<AlertEntry> = read_json(&alerts)?;
            let pairs: Vec<(AlertRecord, AlertContext)> =
                entries.into_iter().map(|e| (e.alert, e.context)).collect();

            let start = Instant::now();
            let priorities = prioritize(&pairs, &PriorityParams::default(), limit)?;
            let groups = group.then(|| {
                let records: Vec<AlertRecord> = pairs.iter().map(|(a, _)| a.clone()).collect();
                let params = GroupingParams {
                    distance_km: group_distance_km,
                    window_days: group_window_days,
                };
                group_related_alerts(&records, &params)
            });
            done("Prioritization", start.elapsed());
            write_json(&PrioritizeOutput { priorities, groups }, output.as_deref())?;
        }

        Commands::Config { region, thresholds } => {
            let region: Region = region.parse()?;
            let cfg = FusionConfig::for_region(region);
            if thresholds {
                for (name, t) in cfg.effective_thresholds() {
                    println!("{name:<16} {t:>6.2}%");
                }
                println!("{:<16} {:>6.2}%", "(other)", cfg.default_threshold);
            } else {
                print!("{}", cfg.to_toml_string()?);
            }
        }
    }

    Ok(())
}
