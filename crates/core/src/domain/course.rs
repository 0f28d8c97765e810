// Course Offering Domain Model

use super::error::{DomainError, Result};
use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Course offering identifier
pub type CourseId = i64;

/// Student identifier
pub type StudentId = i64;

const TIME_FORMAT: &str = "%H:%M";

/// Course offering status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CourseStatus {
    Active,
    Full,
    Inactive,
}

impl std::fmt::Display for CourseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CourseStatus::Active => write!(f, "ACTIVE"),
            CourseStatus::Full => write!(f, "FULL"),
            CourseStatus::Inactive => write!(f, "INACTIVE"),
        }
    }
}

impl FromStr for CourseStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ACTIVE" => Ok(CourseStatus::Active),
            "FULL" => Ok(CourseStatus::Full),
            "INACTIVE" => Ok(CourseStatus::Inactive),
            other => Err(DomainError::UnknownVariant {
                kind: "course status",
                value: other.to_string(),
            }),
        }
    }
}

/// Weekly meeting slot, half-open `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub day: Weekday,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeSlot {
    pub fn new(day: Weekday, start: NaiveTime, end: NaiveTime) -> Result<Self> {
        if start >= end {
            return Err(DomainError::InvalidTimeSlot(format!(
                "start {} must be before end {}",
                start.format(TIME_FORMAT),
                end.format(TIME_FORMAT)
            )));
        }
        Ok(Self { day, start, end })
    }

    /// Parse `("Mon", "09:00", "10:30")` style values as stored in the catalog
    pub fn parse(day: &str, start: &str, end: &str) -> Result<Self> {
        let day = Weekday::from_str(day.trim())
            .map_err(|_| DomainError::InvalidTimeSlot(format!("unknown day '{}'", day)))?;
        let start = parse_time(start)?;
        let end = parse_time(end)?;
        Self::new(day, start, end)
    }

    pub fn start_str(&self) -> String {
        self.start.format(TIME_FORMAT).to_string()
    }

    pub fn end_str(&self) -> String {
        self.end.format(TIME_FORMAT).to_string()
    }
}

impl std::fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}-{}", self.day, self.start_str(), self.end_str())
    }
}

fn parse_time(raw: &str) -> Result<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| DomainError::InvalidTimeSlot(format!("invalid time '{}'", raw)))
}

/// Course offering as seen by the enrollment engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseOffering {
    pub id: CourseId,
    pub code: String,
    pub title: String,
    /// Academic term, e.g. `2026-FALL`
    pub term: String,
    pub credits: i32,
    pub max_capacity: i32,
    pub current_enrollment: i32,
    /// Optimistic-lock token, bumped by exactly 1 on every seat mutation
    pub version: i64,
    pub status: CourseStatus,
    pub prerequisites: Vec<String>,
    pub time_slots: Vec<TimeSlot>,
}

impl CourseOffering {
    pub fn is_full(&self) -> bool {
        self.current_enrollment >= self.max_capacity
    }

    pub fn is_inactive(&self) -> bool {
        self.status == CourseStatus::Inactive
    }

    pub fn available_seats(&self) -> i32 {
        (self.max_capacity - self.current_enrollment).max(0)
    }

    /// Compute the seat mutation for `delta` (+1 take a seat, -1 release one)
    ///
    /// The result carries the version the caller must still observe for the
    /// compare-and-swap to apply.
    pub fn seat_change(&self, delta: i32) -> Result<SeatChange> {
        let new_enrollment = self.current_enrollment + delta;
        if new_enrollment > self.max_capacity {
            return Err(DomainError::CapacityViolation {
                course_id: self.id,
                reason: format!(
                    "{} enrolled would exceed capacity {}",
                    new_enrollment, self.max_capacity
                ),
            });
        }
        if new_enrollment < 0 {
            return Err(DomainError::CapacityViolation {
                course_id: self.id,
                reason: "enrollment count cannot go below zero".to_string(),
            });
        }

        let new_status = match self.status {
            CourseStatus::Inactive => CourseStatus::Inactive,
            _ if new_enrollment >= self.max_capacity => CourseStatus::Full,
            _ => CourseStatus::Active,
        };

        Ok(SeatChange {
            course_id: self.id,
            expected_version: self.version,
            new_version: self.version + 1,
            new_enrollment,
            new_status,
        })
    }

    /// Apply a committed seat change to this in-memory copy
    pub fn apply(&mut self, change: &SeatChange) {
        self.current_enrollment = change.new_enrollment;
        self.version = change.new_version;
        self.status = change.new_status;
    }
}

/// Parse the catalog's comma-separated prerequisite list
pub fn parse_prerequisites(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(str::to_string)
        .collect()
}

/// A conditional seat-count update: applies only while `version == expected_version`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatChange {
    pub course_id: CourseId,
    pub expected_version: i64,
    pub new_version: i64,
    pub new_enrollment: i32,
    pub new_status: CourseStatus,
}
