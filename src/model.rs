//! Core domain types: raw extract rows, the canonical [`TripRecord`], and the
//! row-level error taxonomy applied while converting one into the other.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Vehicle categories present in source extracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RideableType {
    ClassicBike,
    ElectricBike,
    ElectricScooter,
}

impl RideableType {
    pub const ALL: [RideableType; 3] = [
        RideableType::ClassicBike,
        RideableType::ElectricBike,
        RideableType::ElectricScooter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RideableType::ClassicBike => "classic_bike",
            RideableType::ElectricBike => "electric_bike",
            RideableType::ElectricScooter => "electric_scooter",
        }
    }

    pub fn is_electric(&self) -> bool {
        matches!(
            self,
            RideableType::ElectricBike | RideableType::ElectricScooter
        )
    }
}

impl FromStr for RideableType {
    type Err = RowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "classic_bike" => Ok(RideableType::ClassicBike),
            "electric_bike" => Ok(RideableType::ElectricBike),
            "electric_scooter" => Ok(RideableType::ElectricScooter),
            other => Err(RowError::UnknownCategory {
                field: "rideable_type",
                value: other.to_string(),
            }),
        }
    }
}

/// Rider membership class, the primary grouping key for every aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberClass {
    Casual,
    Member,
}

impl MemberClass {
    pub const ALL: [MemberClass; 2] = [MemberClass::Casual, MemberClass::Member];

    pub fn as_str(&self) -> &'static str {
        match self {
            MemberClass::Casual => "casual",
            MemberClass::Member => "member",
        }
    }
}

impl fmt::Display for MemberClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemberClass {
    type Err = RowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "casual" => Ok(MemberClass::Casual),
            "member" => Ok(MemberClass::Member),
            other => Err(RowError::UnknownCategory {
                field: "member_casual",
                value: other.to_string(),
            }),
        }
    }
}

/// One row as it appears in a source extract, before validation.
///
/// Mirrors the 13-column extract schema. The station id columns are carried
/// through deserialization and dropped on conversion; nothing downstream
/// reads them.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTripRow {
    pub ride_id: String,
    pub rideable_type: String,
    pub started_at: String,
    pub ended_at: String,
    pub start_station_name: Option<String>,
    pub start_station_id: Option<String>,
    pub end_station_name: Option<String>,
    pub end_station_id: Option<String>,
    pub start_lat: Option<f64>,
    pub start_lng: Option<f64>,
    pub end_lat: Option<f64>,
    pub end_lng: Option<f64>,
    pub member_casual: String,
}

/// A validated trip in the canonical store. Immutable once accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRecord {
    pub ride_id: String,
    pub rideable_type: RideableType,
    pub started_at: NaiveDateTime,
    pub ended_at: NaiveDateTime,
    pub start_station_name: Option<String>,
    pub end_station_name: Option<String>,
    pub start_lat: f64,
    pub start_lng: f64,
    pub end_lat: f64,
    pub end_lng: f64,
    pub member_casual: MemberClass,
}

/// Why a single extract row was not accepted. Row-level only; none of these
/// abort a batch.
#[derive(Debug, Error)]
pub enum RowError {
    #[error("missing coordinate field {0}")]
    MissingCoordinate(&'static str),
    #[error("unparseable timestamp in {field}: {value:?}")]
    BadTimestamp { field: &'static str, value: String },
    #[error("unrecognized {field} value {value:?}")]
    UnknownCategory { field: &'static str, value: String },
    #[error("malformed row: {0}")]
    Malformed(String),
}

impl RowError {
    /// Validation errors are geometry rejections; everything else counts as a
    /// parse failure in load reports.
    pub fn is_validation(&self) -> bool {
        matches!(self, RowError::MissingCoordinate(_))
    }
}

/// Accept/reject predicate over a raw row's geolocation.
///
/// A trip without both endpoints has no defined distance, and admitting it
/// would corrupt every distance-based aggregate downstream.
pub fn validate_geometry(raw: &RawTripRow) -> Result<(), RowError> {
    coordinates(raw).map(|_| ())
}

fn coordinates(raw: &RawTripRow) -> Result<(f64, f64, f64, f64), RowError> {
    Ok((
        raw.start_lat
            .ok_or(RowError::MissingCoordinate("start_lat"))?,
        raw.start_lng
            .ok_or(RowError::MissingCoordinate("start_lng"))?,
        raw.end_lat.ok_or(RowError::MissingCoordinate("end_lat"))?,
        raw.end_lng.ok_or(RowError::MissingCoordinate("end_lng"))?,
    ))
}

/// Extracts carry naive local timestamps in either space- or T-separated
/// form, with optional fractional seconds. No timezone conversion.
fn parse_timestamp(field: &'static str, value: &str) -> Result<NaiveDateTime, RowError> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f"))
        .map_err(|_| RowError::BadTimestamp {
            field,
            value: value.to_string(),
        })
}

impl TripRecord {
    /// Validates and converts a raw extract row into a canonical record.
    ///
    /// Geometry is checked first, so a row that is both incomplete and
    /// malformed is reported as a validation rejection.
    pub fn from_raw(raw: RawTripRow) -> Result<Self, RowError> {
        let (start_lat, start_lng, end_lat, end_lng) = coordinates(&raw)?;

        let rideable_type = raw.rideable_type.parse()?;
        let member_casual = raw.member_casual.parse()?;
        let started_at = parse_timestamp("started_at", &raw.started_at)?;
        let ended_at = parse_timestamp("ended_at", &raw.ended_at)?;

        Ok(TripRecord {
            ride_id: raw.ride_id,
            rideable_type,
            started_at,
            ended_at,
            start_station_name: raw.start_station_name,
            end_station_name: raw.end_station_name,
            start_lat,
            start_lng,
            end_lat,
            end_lng,
            member_casual,
        })
    }
}
