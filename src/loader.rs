//! Deduplicating load of raw extract batches into the canonical store.
//!
//! Row failures are tallied and logged, never fatal; running the same extract
//! twice leaves the store unchanged.

use serde::Serialize;
use tracing::debug;

use crate::extract::RawBatch;
use crate::model::TripRecord;
use crate::store::{InsertOutcome, TripStore};

/// Per-batch accounting, reported back to the caller after a load.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct LoadReport {
    /// Rows newly inserted into the canonical store.
    pub accepted: usize,
    /// Rows rejected for incomplete geolocation.
    pub validation_rejected: usize,
    /// Rows rejected for malformed fields or unrecognized categories.
    pub parse_rejected: usize,
    /// Rows silently discarded because their `ride_id` was already present.
    pub conflict_skipped: usize,
}

impl LoadReport {
    pub fn merge(&mut self, other: &LoadReport) {
        self.accepted += other.accepted;
        self.validation_rejected += other.validation_rejected;
        self.parse_rejected += other.parse_rejected;
        self.conflict_skipped += other.conflict_skipped;
    }

    pub fn total_rows(&self) -> usize {
        self.accepted + self.validation_rejected + self.parse_rejected + self.conflict_skipped
    }
}

/// Result of loading one batch: the report plus the records that were
/// actually inserted, in insertion order, for append-only persistence.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub report: LoadReport,
    pub newly_accepted: Vec<TripRecord>,
}

/// Validates, converts, and inserts a decoded batch.
///
/// Conflict policy is first-write-wins: a `ride_id` already in the store
/// permanently blocks later versions, within a batch and across batches.
pub fn load_batch(store: &mut impl TripStore, batch: RawBatch) -> LoadOutcome {
    let mut outcome = LoadOutcome::default();
    outcome.report.parse_rejected = batch.malformed;

    for raw in batch.rows {
        let ride_id = raw.ride_id.clone();
        match TripRecord::from_raw(raw) {
            Ok(trip) => match store.insert_if_absent(trip.clone()) {
                InsertOutcome::Inserted => {
                    outcome.report.accepted += 1;
                    outcome.newly_accepted.push(trip);
                }
                InsertOutcome::Duplicate => {
                    outcome.report.conflict_skipped += 1;
                }
            },
            Err(e) if e.is_validation() => {
                debug!(ride_id = %ride_id, error = %e, "Row rejected by validation");
                outcome.report.validation_rejected += 1;
            }
            Err(e) => {
                debug!(ride_id = %ride_id, error = %e, "Row rejected by parsing");
                outcome.report.parse_rejected += 1;
            }
        }
    }

    outcome
}
