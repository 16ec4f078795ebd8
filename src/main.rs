//! CLI entry point for the bikeshare trip statistics pipeline.
//!
//! Provides subcommands for loading raw trip extracts into the deduplicated
//! canonical store and for computing the aggregate report consumed by the
//! reporting layer.

use anyhow::Result;
use bikeshare_stats::analytics::engine::build_report;
use bikeshare_stats::analytics::outliers::OutlierPolicy;
use bikeshare_stats::analytics::publish::{upload_report, write_report};
use bikeshare_stats::extract::{decode_rows, read_source};
use bikeshare_stats::loader::{LoadReport, load_batch};
use bikeshare_stats::store::{TripStore, append_records, read_store};
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::Path;
use tracing::Instrument;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "bikeshare_stats")]
#[command(about = "Consolidate bikeshare trip extracts and compute rider statistics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load one or more raw trip extracts into the canonical store
    Load {
        /// Extract files or URLs (CSV, optionally gzipped)
        #[arg(value_name = "FILE_OR_URL", required = true)]
        extracts: Vec<String>,

        /// Canonical store CSV file
        #[arg(short, long, default_value = "trips.csv")]
        store: String,

        /// Maximum number of extracts decoded concurrently
        #[arg(short, long, default_value_t = 4)]
        concurrency: usize,
    },
    /// Compute the aggregate report over the canonical store
    Report {
        /// Canonical store CSV file
        #[arg(short, long, default_value = "trips.csv")]
        store: String,

        /// Output path for the report JSON
        #[arg(short, long, default_value = "trip_report.json")]
        output: String,

        /// Number of stations to keep in the frequency tables
        #[arg(long, default_value_t = 10)]
        top_stations: usize,

        /// Percentile used for the upper outlier bound
        #[arg(long, default_value_t = 99.0)]
        percentile: f64,

        /// Minimum trip distance in meters counted toward distance stats
        #[arg(long, default_value_t = 10.0)]
        min_distance: f64,

        /// Minimum trip duration in minutes counted toward duration stats
        #[arg(long, default_value_t = 1.0)]
        min_duration: f64,

        /// Optional: S3 bucket name to upload the report to (e.g., "my-bucket")
        #[arg(long)]
        s3_bucket: Option<String>,

        /// Optional: Gzip compress the report before uploading to S3
        #[arg(long, default_value_t = false)]
        gzip: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/bikeshare_stats.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("bikeshare_stats.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Load {
            extracts,
            store,
            concurrency,
        } => {
            load_extracts(&extracts, &store, concurrency).await?;
        }
        Commands::Report {
            store,
            output,
            top_stations,
            percentile,
            min_distance,
            min_duration,
            s3_bucket,
            gzip,
        } => {
            let policy = OutlierPolicy {
                percentile,
                min_distance_m: min_distance,
                min_duration_min: min_duration,
            };
            run_report(&store, &output, top_stations, policy, s3_bucket, gzip).await?;
        }
    }

    Ok(())
}

/// Decodes extracts concurrently, then merges them into the canonical store
/// in argument order so first-write-wins is reproducible run to run.
#[tracing::instrument(skip(extracts), fields(extract_count = extracts.len(), store = %store_path, concurrency))]
async fn load_extracts(extracts: &[String], store_path: &str, concurrency: usize) -> Result<()> {
    let mut store = read_store(store_path)?;
    info!(existing_rows = store.len(), "Canonical store loaded");

    let semaphore = std::sync::Arc::new(tokio::sync::Semaphore::new(concurrency));

    let mut tasks = vec![];
    for source in extracts {
        let sem = semaphore.clone();
        let source = source.clone();

        let extract_span = tracing::info_span!("decode_extract", source = %source);

        let task = tokio::spawn(
            async move {
                let _permit = sem.acquire().await.unwrap();

                let bytes = match read_source(&source).await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        error!(error = %e, "Extract unavailable, skipping");
                        return None;
                    }
                };

                match decode_rows(&bytes) {
                    Ok(batch) => Some(batch),
                    Err(e) => {
                        error!(error = %e, "Extract decode failed, skipping");
                        None
                    }
                }
            }
            .instrument(extract_span),
        );

        tasks.push(task);
    }

    // The loader is the single writer; batches merge sequentially here.
    let mut total = LoadReport::default();
    for task in tasks {
        let Ok(Some(batch)) = task.await else {
            continue;
        };

        let outcome = load_batch(&mut store, batch);
        append_records(store_path, &outcome.newly_accepted)?;
        total.merge(&outcome.report);
    }

    info!(
        accepted = total.accepted,
        validation_rejected = total.validation_rejected,
        parse_rejected = total.parse_rejected,
        conflict_skipped = total.conflict_skipped,
        store_rows = store.len(),
        "Load complete"
    );

    println!("{}", serde_json::to_string_pretty(&total)?);
    Ok(())
}

/// Builds the aggregate report over the store snapshot and emits it.
#[tracing::instrument(skip(policy, s3_bucket), fields(store = %store_path, output = %output_path))]
async fn run_report(
    store_path: &str,
    output_path: &str,
    top_stations: usize,
    policy: OutlierPolicy,
    s3_bucket: Option<String>,
    gzip: bool,
) -> Result<()> {
    let store = read_store(store_path)?;
    if store.is_empty() {
        warn!("Canonical store is empty; report will carry zero counts");
    }

    let report = build_report(&store, &policy, top_stations);
    write_report(output_path, &report)?;

    if let Some(bucket) = s3_bucket {
        let file_name = Path::new(output_path)
            .file_name()
            .and_then(OsStr::to_str)
            .unwrap_or("trip_report.json");
        upload_report(&bucket, &format!("aggregates/{file_name}"), &report, gzip).await?;
    }

    Ok(())
}
