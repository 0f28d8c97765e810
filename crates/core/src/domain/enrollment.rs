// Enrollment Domain Model

use super::course::{CourseId, StudentId, TimeSlot};
use super::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Enrollment row identifier
pub type EnrollmentId = i64;

/// Enrollment status
///
/// `PENDING -> {CONFIRMED, WAITLISTED, REJECTED}`, `CONFIRMED | WAITLISTED -> DROPPED`,
/// `WAITLISTED -> CONFIRMED` on promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentStatus {
    Pending,
    Confirmed,
    Waitlisted,
    Rejected,
    Dropped,
}

impl EnrollmentStatus {
    /// Non-terminal rows block a new attempt for the same (student, course)
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            EnrollmentStatus::Pending | EnrollmentStatus::Confirmed | EnrollmentStatus::Waitlisted
        )
    }

    pub fn can_transition_to(&self, next: EnrollmentStatus) -> bool {
        use EnrollmentStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Waitlisted)
                | (Pending, Rejected)
                | (Pending, Dropped)
                | (Waitlisted, Confirmed)
                | (Waitlisted, Dropped)
                | (Confirmed, Dropped)
        )
    }
}

impl std::fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnrollmentStatus::Pending => write!(f, "PENDING"),
            EnrollmentStatus::Confirmed => write!(f, "CONFIRMED"),
            EnrollmentStatus::Waitlisted => write!(f, "WAITLISTED"),
            EnrollmentStatus::Rejected => write!(f, "REJECTED"),
            EnrollmentStatus::Dropped => write!(f, "DROPPED"),
        }
    }
}

impl FromStr for EnrollmentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PENDING" => Ok(EnrollmentStatus::Pending),
            "CONFIRMED" => Ok(EnrollmentStatus::Confirmed),
            "WAITLISTED" => Ok(EnrollmentStatus::Waitlisted),
            "REJECTED" => Ok(EnrollmentStatus::Rejected),
            "DROPPED" => Ok(EnrollmentStatus::Dropped),
            other => Err(DomainError::UnknownVariant {
                kind: "enrollment status",
                value: other.to_string(),
            }),
        }
    }
}

/// Persisted enrollment row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub status: EnrollmentStatus,
    /// Set only while WAITLISTED; 1-based and contiguous per course
    pub waitlist_position: Option<i32>,
    pub grade: Option<String>,
    pub rejection_reason: Option<String>,
    /// Queue job that produced this row (used to replay reclaimed jobs)
    pub job_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub dropped_at: Option<i64>,
}

impl Enrollment {
    fn transition(&mut self, next: EnrollmentStatus, now_millis: i64) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidStateTransition {
                entity: "enrollment",
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.updated_at = now_millis;
        Ok(())
    }

    /// WAITLISTED -> CONFIRMED, clears the waitlist position
    pub fn promote(&mut self, now_millis: i64) -> Result<()> {
        if self.status != EnrollmentStatus::Waitlisted {
            return Err(DomainError::InvalidStateTransition {
                entity: "enrollment",
                from: self.status.to_string(),
                to: "CONFIRMED (promotion)".to_string(),
            });
        }
        self.transition(EnrollmentStatus::Confirmed, now_millis)?;
        self.waitlist_position = None;
        Ok(())
    }

    /// Any non-terminal status -> DROPPED
    pub fn drop_out(&mut self, now_millis: i64) -> Result<()> {
        self.transition(EnrollmentStatus::Dropped, now_millis)?;
        self.waitlist_position = None;
        self.dropped_at = Some(now_millis);
        Ok(())
    }
}

/// Enrollment row about to be inserted (id assigned by the store)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEnrollment {
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub status: EnrollmentStatus,
    pub waitlist_position: Option<i32>,
    pub rejection_reason: Option<String>,
    pub job_id: Option<String>,
    pub created_at: i64,
}

impl NewEnrollment {
    fn base(student_id: StudentId, course_id: CourseId, job_id: Option<String>, now: i64) -> Self {
        Self {
            student_id,
            course_id,
            status: EnrollmentStatus::Pending,
            waitlist_position: None,
            rejection_reason: None,
            job_id,
            created_at: now,
        }
    }

    pub fn confirmed(
        student_id: StudentId,
        course_id: CourseId,
        job_id: Option<String>,
        now: i64,
    ) -> Self {
        Self {
            status: EnrollmentStatus::Confirmed,
            ..Self::base(student_id, course_id, job_id, now)
        }
    }

    pub fn waitlisted(
        student_id: StudentId,
        course_id: CourseId,
        position: i32,
        job_id: Option<String>,
        now: i64,
    ) -> Self {
        Self {
            status: EnrollmentStatus::Waitlisted,
            waitlist_position: Some(position),
            ..Self::base(student_id, course_id, job_id, now)
        }
    }

    pub fn rejected(
        student_id: StudentId,
        course_id: CourseId,
        reason: impl Into<String>,
        job_id: Option<String>,
        now: i64,
    ) -> Self {
        Self {
            status: EnrollmentStatus::Rejected,
            rejection_reason: Some(reason.into()),
            ..Self::base(student_id, course_id, job_id, now)
        }
    }
}

/// A CONFIRMED enrollment from the student's history, joined with its course
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmedEnrollment {
    pub enrollment_id: EnrollmentId,
    pub course_id: CourseId,
    pub course_code: String,
    pub term: String,
    pub credits: i32,
    pub grade: Option<String>,
    pub time_slots: Vec<TimeSlot>,
}
