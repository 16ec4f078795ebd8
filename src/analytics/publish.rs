//! Report emission: pretty JSON on disk, optional S3 upload.

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use tracing::info;

use crate::analytics::types::TripReport;

/// Writes the report as pretty-printed JSON.
pub fn write_report(path: &str, report: &TripReport) -> Result<()> {
    let body = serde_json::to_vec_pretty(report)?;
    std::fs::write(path, body).with_context(|| format!("writing report {path}"))?;

    info!(path, total_trips = report.total_trips, "Report written");
    Ok(())
}

/// Uploads the report JSON to S3 under `aggregates/`, gzip-compressed when
/// requested.
pub async fn upload_report(bucket: &str, key: &str, report: &TripReport, gzip: bool) -> Result<()> {
    let config = aws_config::load_from_env().await;
    let s3 = aws_sdk_s3::Client::new(&config);

    let body = serde_json::to_vec(report)?;

    let mut request = s3
        .put_object()
        .bucket(bucket)
        .key(key)
        .content_type("application/json");

    let payload = if gzip {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&body)?;
        request = request.content_encoding("gzip");
        encoder.finish()?
    } else {
        body
    };

    request.body(payload.into()).send().await?;

    info!(bucket, key, gzip, "Report uploaded");
    Ok(())
}
