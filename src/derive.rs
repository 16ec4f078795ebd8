//! Derived analytical fields, computed per trip.
//!
//! Everything here is a pure function of a [`TripRecord`]: the derived values
//! are never stored, only recomputed over a snapshot when a query runs.

use chrono::{Datelike, Timelike};
use serde::Serialize;

use crate::model::TripRecord;

/// Mean earth radius in meters, spherical approximation.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Analytical projection of a single trip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DerivedFields {
    /// Calendar month of `started_at`, 1–12.
    pub month: u32,
    /// Day of week of `started_at`, 0 = Sunday through 6 = Saturday.
    pub day_of_week: u32,
    /// Hour of `started_at`, 0–23.
    pub hour: u32,
    /// Great-circle meters between the start and end coordinates. May be
    /// non-finite if the stored floats are degenerate; such a value is
    /// excluded from distance aggregates but the trip itself stays.
    pub distance_m: f64,
    /// Signed fractional minutes from `started_at` to `ended_at`. Negative
    /// or zero when source clocks disagree; deliberately not clamped.
    pub duration_minutes: f64,
}

impl DerivedFields {
    /// Computes all derived fields for one trip. Temporal buckets come from
    /// the naive stored timestamp with no timezone conversion.
    pub fn from_trip(trip: &TripRecord) -> Self {
        DerivedFields {
            month: trip.started_at.month(),
            day_of_week: trip.started_at.weekday().num_days_from_sunday(),
            hour: trip.started_at.hour(),
            distance_m: haversine_m(trip.start_lat, trip.start_lng, trip.end_lat, trip.end_lng),
            duration_minutes: (trip.ended_at - trip.started_at).num_milliseconds() as f64
                / 60_000.0,
        }
    }

    /// False when the stored coordinates produced a non-finite distance.
    pub fn has_valid_distance(&self) -> bool {
        self.distance_m.is_finite()
    }
}

/// Haversine great-circle distance in meters.
pub fn haversine_m(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lng2 - lng1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_M * a.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MemberClass, RideableType};

    fn trip_at(start: &str, end: &str) -> TripRecord {
        let parse = |s| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
        };
        TripRecord {
            ride_id: "A1".to_string(),
            rideable_type: RideableType::ClassicBike,
            started_at: parse(start),
            ended_at: parse(end),
            start_station_name: None,
            end_station_name: None,
            start_lat: 41.8964,
            start_lng: -87.6610,
            end_lat: 41.9122,
            end_lng: -87.6346,
            member_casual: MemberClass::Casual,
        }
    }

    #[test]
    fn test_temporal_buckets_and_duration() {
        // 2024-06-01 is a Saturday.
        let trip = trip_at("2024-06-01 08:00:00", "2024-06-01 08:15:00");
        let derived = DerivedFields::from_trip(&trip);

        assert_eq!(derived.month, 6);
        assert_eq!(derived.day_of_week, 6);
        assert_eq!(derived.hour, 8);
        assert_eq!(derived.duration_minutes, 15.0);
    }

    #[test]
    fn test_sunday_is_day_zero() {
        let trip = trip_at("2024-06-02 23:59:59", "2024-06-03 00:10:00");
        let derived = DerivedFields::from_trip(&trip);

        assert_eq!(derived.day_of_week, 0);
        assert_eq!(derived.hour, 23);
    }

    #[test]
    fn test_duration_signed_not_clamped() {
        let trip = trip_at("2024-06-01 08:15:00", "2024-06-01 08:00:00");
        let derived = DerivedFields::from_trip(&trip);

        assert_eq!(derived.duration_minutes, -15.0);
    }

    #[test]
    fn test_fractional_minutes_preserved() {
        let trip = trip_at("2024-06-01 08:00:00", "2024-06-01 08:00:30");
        let derived = DerivedFields::from_trip(&trip);

        assert_eq!(derived.duration_minutes, 0.5);
    }

    #[test]
    fn test_haversine_zero_for_same_point() {
        assert_eq!(haversine_m(0.0, 0.0, 0.0, 0.0), 0.0);
        assert_eq!(haversine_m(41.8964, -87.6610, 41.8964, -87.6610), 0.0);
    }

    #[test]
    fn test_haversine_one_degree_longitude_at_equator() {
        let d = haversine_m(0.0, 0.0, 0.0, 1.0);
        // One degree of longitude at the equator is ~111.2 km.
        assert!((d - 111_000.0).abs() < 111_000.0 * 0.01, "got {d}");
    }

    #[test]
    fn test_haversine_symmetry() {
        let ab = haversine_m(41.8964, -87.6610, 41.9122, -87.6346);
        let ba = haversine_m(41.9122, -87.6346, 41.8964, -87.6610);
        assert!((ab - ba).abs() < 1e-9);
        assert!(ab > 0.0);
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let trip = trip_at("2024-03-15 17:42:10", "2024-03-15 18:01:55");
        assert_eq!(DerivedFields::from_trip(&trip), DerivedFields::from_trip(&trip));
    }

    #[test]
    fn test_non_finite_distance_flagged_invalid() {
        let mut trip = trip_at("2024-06-01 08:00:00", "2024-06-01 08:15:00");
        trip.start_lat = f64::NAN;
        let derived = DerivedFields::from_trip(&trip);

        assert!(!derived.has_valid_distance());
    }

    #[test]
    fn test_month_boundaries() {
        let jan = trip_at("2024-01-01 00:00:00", "2024-01-01 00:05:00");
        let dec = trip_at("2024-12-31 12:00:00", "2024-12-31 12:05:00");

        assert_eq!(DerivedFields::from_trip(&jan).month, 1);
        assert_eq!(DerivedFields::from_trip(&dec).month, 12);
    }
}
