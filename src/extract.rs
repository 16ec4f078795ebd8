//! Extract acquisition and decoding.
//!
//! An extract is a 13-column CSV of raw trip rows, local or remote, plain or
//! gzip-compressed. Decoding is row-tolerant: a malformed row is counted and
//! skipped, never fatal for the batch.

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use std::io::Read;
use tracing::{debug, warn};

use crate::fetch::{BasicClient, fetch_bytes};
use crate::model::RawTripRow;

/// Raw rows decoded from one extract, plus the count of rows the CSV layer
/// could not produce at all (wrong column count, unreadable field).
#[derive(Debug, Default)]
pub struct RawBatch {
    pub rows: Vec<RawTripRow>,
    pub malformed: usize,
}

/// Loads extract bytes from a local file path or over HTTP.
#[tracing::instrument(fields(source = %source))]
pub async fn read_source(source: &str) -> Result<Vec<u8>> {
    let bytes = if source.starts_with("http") {
        let client = BasicClient::new();
        fetch_bytes(&client, source).await?
    } else {
        std::fs::read(source).with_context(|| format!("reading extract {source}"))?
    };
    Ok(bytes)
}

/// Transparently decompresses gzip payloads, detected by magic bytes rather
/// than file extension so remote extracts work too.
fn gunzip_if_needed(bytes: &[u8]) -> Result<Vec<u8>> {
    if bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b {
        let mut decoder = GzDecoder::new(bytes);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .context("decompressing gzip extract")?;
        return Ok(out);
    }
    Ok(bytes.to_vec())
}

/// Decodes extract bytes into raw rows.
///
/// # Errors
///
/// Returns an error only when the payload is not a readable CSV at all;
/// individual bad rows are logged and tallied in [`RawBatch::malformed`].
pub fn decode_rows(bytes: &[u8]) -> Result<RawBatch> {
    let bytes = gunzip_if_needed(bytes)?;

    let mut reader = csv::Reader::from_reader(bytes.as_slice());
    let mut batch = RawBatch::default();

    for (i, result) in reader.deserialize::<RawTripRow>().enumerate() {
        match result {
            Ok(row) => batch.rows.push(row),
            Err(e) => {
                warn!(row = i + 1, error = %e, "Skipping malformed extract row");
                batch.malformed += 1;
            }
        }
    }

    debug!(
        rows = batch.rows.len(),
        malformed = batch.malformed,
        "Extract decoded"
    );
    Ok(batch)
}
