//! Quantile-based outlier bounds for distance and duration.
//!
//! A small fraction of GPS/clock artifacts produce near-zero or extreme
//! values; trimming at a high percentile bounds the tail's influence on the
//! summary statistics without deleting anything from the store. Thresholds
//! are recomputed per dataset snapshot, never frozen.

use serde::Serialize;

use crate::analytics::utility::percentile;
use crate::derive::DerivedFields;

/// Tunable trimming parameters. Defaults match the shipped reports: p99
/// upper bound, 10 m distance floor, 1 min duration floor.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct OutlierPolicy {
    pub percentile: f64,
    pub min_distance_m: f64,
    pub min_duration_min: f64,
}

impl Default for OutlierPolicy {
    fn default() -> Self {
        OutlierPolicy {
            percentile: 99.0,
            min_distance_m: 10.0,
            min_duration_min: 1.0,
        }
    }
}

/// Valid open range for one field. A value counts toward aggregates iff it
/// is strictly inside.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FieldBounds {
    pub lower: f64,
    pub upper: f64,
}

impl FieldBounds {
    pub fn contains(&self, value: f64) -> bool {
        value > self.lower && value < self.upper
    }
}

impl OutlierPolicy {
    /// Bounds for trip distance over the full derived dataset.
    pub fn distance_bounds(&self, derived: &[DerivedFields]) -> FieldBounds {
        self.bounds(
            self.min_distance_m,
            derived.iter().map(|d| d.distance_m),
        )
    }

    /// Bounds for trip duration over the full derived dataset.
    pub fn duration_bounds(&self, derived: &[DerivedFields]) -> FieldBounds {
        self.bounds(
            self.min_duration_min,
            derived.iter().map(|d| d.duration_minutes),
        )
    }

    fn bounds(&self, floor: f64, values: impl Iterator<Item = f64>) -> FieldBounds {
        let mut finite: Vec<f64> = values.filter(|v| v.is_finite()).collect();
        finite.sort_by(f64::total_cmp);

        FieldBounds {
            lower: floor,
            upper: percentile(&finite, self.percentile),
        }
    }
}
