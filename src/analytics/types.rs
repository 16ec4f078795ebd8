//! Result tables produced by the aggregation engine.
//!
//! These are ephemeral query outputs, serialized as JSON for the reporting
//! layer; nothing here is ever written back to the canonical store.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::analytics::outliers::OutlierPolicy;

/// Ride count for one station, across start and end roles.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationCount {
    pub station: String,
    pub rides: usize,
}

/// Ride count for one temporal bucket (month, weekday, or hour).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BucketCount {
    pub bucket: u32,
    pub rides: usize,
}

/// Mean and spread of an outlier-trimmed field, with how many rows survived
/// the trim.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TrimmedSummary {
    pub trimmed_rides: usize,
    pub mean: f64,
    pub stddev: f64,
}

/// All aggregate distributions for one rider population.
#[derive(Debug, Serialize)]
pub struct GroupBreakdown {
    pub trips: usize,
    /// Top stations by appearance count, descending; ties broken by station
    /// name ascending so emissions are deterministic.
    pub top_stations: Vec<StationCount>,
    /// Always 12 buckets, January through December, zeros included.
    pub rides_by_month: Vec<BucketCount>,
    /// Always 7 buckets, 0 = Sunday.
    pub rides_by_weekday: Vec<BucketCount>,
    /// Always 24 buckets.
    pub rides_by_hour: Vec<BucketCount>,
    /// Count per rideable type; every category present even at zero.
    pub rides_by_type: BTreeMap<String, usize>,
    /// Percent of rides on an electric vehicle, rounded to 2 decimals.
    pub electric_pct: f64,
    pub distance_m: TrimmedSummary,
    pub duration_min: TrimmedSummary,
}

/// Complete aggregation result over one store snapshot.
#[derive(Debug, Serialize)]
pub struct TripReport {
    pub schema_version: u8,
    pub generated_at: DateTime<Utc>,
    pub total_trips: usize,
    /// The trimming parameters this report was computed with.
    pub policy: OutlierPolicy,
    /// Global p99 cutoffs, exposed as diagnostics.
    pub distance_p99_m: f64,
    pub duration_p99_min: f64,
    /// Keyed by membership class ("casual", "member"); both keys always
    /// present.
    pub groups: BTreeMap<String, GroupBreakdown>,
}
