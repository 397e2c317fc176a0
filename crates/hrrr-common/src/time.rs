//! Time handling utilities for meteorological data.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Parse an ISO 8601 instant.
///
/// Accepts a full RFC 3339 datetime, a naive datetime (assumed UTC), or a
/// bare date (resolved to midnight UTC).
pub fn parse_instant(s: &str) -> Result<DateTime<Utc>, TimeParseError> {
    // Try full datetime with timezone
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // Try without timezone (assume UTC)
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    // Try date only
    if let Ok(nd) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let ndt = nd.and_hms_opt(0, 0, 0).expect("midnight is always valid");
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    Err(TimeParseError::InvalidFormat(s.to_string()))
}

/// Parse an ISO 8601 instant used as the end of an inclusive range.
///
/// A bare date resolves to the last representable instant of that day, so a
/// range ending on `2023-09-30` includes every timestamp within that day.
/// Full datetimes resolve exactly as [`parse_instant`] does.
pub fn parse_range_end(s: &str) -> Result<DateTime<Utc>, TimeParseError> {
    if let Ok(nd) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let ndt = nd
            .and_hms_milli_opt(23, 59, 59, 999)
            .expect("end of day is always valid");
        return Ok(Utc.from_utc_datetime(&ndt));
    }
    parse_instant(s)
}

/// An inclusive time range for queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Parse a start/end pair. The end is resolved per [`parse_range_end`].
    pub fn parse(start: &str, end: &str) -> Result<Self, TimeParseError> {
        Ok(Self::new(parse_instant(start)?, parse_range_end(end)?))
    }

    /// Containment is inclusive on both ends.
    pub fn contains(&self, dt: &DateTime<Utc>) -> bool {
        dt >= &self.start && dt <= &self.end
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// CF-style epoch units for numeric time coordinates.
///
/// Parses unit strings of the form `"<step> since <instant>"`, e.g.
/// `"seconds since 1970-01-01T00:00:00"`, and converts between raw
/// coordinate values and UTC instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CfTimeUnits {
    base: DateTime<Utc>,
    step_seconds: i64,
}

impl CfTimeUnits {
    /// Parse a CF units string. Returns an error for unknown step words or
    /// unparseable base instants.
    pub fn parse(units: &str) -> Result<Self, TimeParseError> {
        let (step, base) = units
            .split_once(" since ")
            .ok_or_else(|| TimeParseError::InvalidUnits(units.to_string()))?;

        let step_seconds = match step.trim() {
            "seconds" | "second" => 1,
            "minutes" | "minute" => 60,
            "hours" | "hour" => 3600,
            "days" | "day" => 86_400,
            _ => return Err(TimeParseError::InvalidUnits(units.to_string())),
        };

        Ok(Self {
            base: parse_instant(base.trim())?,
            step_seconds,
        })
    }

    /// Decode a raw coordinate value to a UTC instant.
    pub fn decode(&self, value: f64) -> DateTime<Utc> {
        let millis = value * self.step_seconds as f64 * 1000.0;
        self.base + Duration::milliseconds(millis.round() as i64)
    }

    /// Encode a UTC instant as a raw coordinate value.
    pub fn encode(&self, dt: DateTime<Utc>) -> f64 {
        let millis = (dt - self.base).num_milliseconds() as f64;
        millis / 1000.0 / self.step_seconds as f64
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TimeParseError {
    #[error("Invalid time format: {0}")]
    InvalidFormat(String),

    #[error("Invalid time units: {0}")]
    InvalidUnits(String),
}
