//! Canonical trip store: deduplicated, append-only.
//!
//! Engines receive the store through an explicit interface; nothing holds a
//! global handle. On disk the store is a CSV file that only ever grows —
//! accepted rows are appended, never rewritten.

use anyhow::{Context, Result};
use csv::WriterBuilder;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::Path;
use tracing::debug;

use crate::model::TripRecord;

/// Outcome of an insert attempt, distinguishing a fresh row from a
/// first-write-wins skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
}

/// Interface the loader and query engines use to reach the canonical store.
pub trait TripStore {
    /// Inserts a trip unless a row with the same `ride_id` already exists.
    /// The first accepted record for an id permanently wins.
    fn insert_if_absent(&mut self, trip: TripRecord) -> InsertOutcome;

    /// All accepted trips, in insertion order.
    fn scan(&self) -> &[TripRecord];

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory store keyed by `ride_id`, preserving insertion order for
/// deterministic scans.
#[derive(Debug, Default)]
pub struct MemoryStore {
    trips: Vec<TripRecord>,
    by_id: HashMap<String, usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TripStore for MemoryStore {
    fn insert_if_absent(&mut self, trip: TripRecord) -> InsertOutcome {
        if self.by_id.contains_key(&trip.ride_id) {
            return InsertOutcome::Duplicate;
        }
        self.by_id.insert(trip.ride_id.clone(), self.trips.len());
        self.trips.push(trip);
        InsertOutcome::Inserted
    }

    fn scan(&self) -> &[TripRecord] {
        &self.trips
    }

    fn len(&self) -> usize {
        self.trips.len()
    }
}

/// Appends accepted trips to the store file as CSV rows.
///
/// Creates the file with headers if it does not already exist.
pub fn append_records(path: &str, trips: &[TripRecord]) -> Result<()> {
    if trips.is_empty() {
        return Ok(());
    }

    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, rows = trips.len(), "Appending store rows");

    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .with_context(|| format!("opening store file {path}"))?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    for trip in trips {
        writer.serialize(trip)?;
    }
    writer.flush()?;

    Ok(())
}

/// Reads a store file back into memory. A missing file is an empty store,
/// so the first load of a fresh store path just works.
///
/// # Errors
///
/// Any unreadable row here is fatal: the store file is written only by us,
/// so corruption means the store itself is unavailable.
pub fn read_store(path: &str) -> Result<MemoryStore> {
    let mut store = MemoryStore::new();

    if !Path::new(path).exists() {
        return Ok(store);
    }

    let file = std::fs::File::open(path).with_context(|| format!("opening store file {path}"))?;
    let mut reader = csv::Reader::from_reader(file);

    for result in reader.deserialize::<TripRecord>() {
        let trip = result.with_context(|| format!("reading store file {path}"))?;
        store.insert_if_absent(trip);
    }

    debug!(path, rows = store.len(), "Store loaded");
    Ok(store)
}
