// Transaction port for atomic enrollment operations

use crate::domain::{
    AuditEntry, ConfirmedEnrollment, CourseId, CourseOffering, Enrollment, EnrollmentId,
    NewEnrollment, SeatChange, StudentId,
};
use crate::error::Result;
use async_trait::async_trait;

/// Transaction trait for atomic multi-step operations
#[async_trait]
pub trait Transaction: Send {
    /// Commit the transaction
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Entry point to the enrollment store
///
/// All seat, enrollment, waitlist and audit writes go through a transaction
/// from `begin`; the remaining methods are read-only projections.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    /// Begin a write transaction (serialized against other writers)
    async fn begin(&self) -> Result<Box<dyn EnrollmentTransaction>>;

    /// WAITLISTED rows for a course, ordered by position
    async fn waitlist(&self, course_id: CourseId) -> Result<Vec<Enrollment>>;

    async fn find_enrollment(&self, id: EnrollmentId) -> Result<Option<Enrollment>>;
}

/// Enrollment operations within a transaction
#[async_trait]
pub trait EnrollmentTransaction: Transaction {
    async fn get_course(&mut self, course_id: CourseId) -> Result<Option<CourseOffering>>;

    async fn student_exists(&mut self, student_id: StudentId) -> Result<bool>;

    /// CONFIRMED enrollments of a student, optionally restricted to one term
    async fn list_confirmed_enrollments(
        &mut self,
        student_id: StudentId,
        term: Option<&str>,
    ) -> Result<Vec<ConfirmedEnrollment>>;

    /// The PENDING / CONFIRMED / WAITLISTED row for the pair, if any
    async fn find_active_enrollment(
        &mut self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>>;

    /// Row written by a given queue job, if that job already committed
    async fn find_enrollment_by_job(&mut self, job_id: &str) -> Result<Option<Enrollment>>;

    async fn find_enrollment_by_id(&mut self, id: EnrollmentId) -> Result<Option<Enrollment>>;

    async fn insert_enrollment(&mut self, new: &NewEnrollment) -> Result<Enrollment>;

    async fn update_enrollment(&mut self, enrollment: &Enrollment) -> Result<()>;

    /// Conditional seat update; `false` when the stored version moved on
    async fn compare_and_swap_seats(&mut self, change: &SeatChange) -> Result<bool>;

    /// `MAX(waitlist_position) + 1` for the course (1 when empty)
    async fn next_waitlist_position(&mut self, course_id: CourseId) -> Result<i32>;

    /// WAITLISTED row with the smallest position
    async fn next_waitlisted(&mut self, course_id: CourseId) -> Result<Option<Enrollment>>;

    /// Decrement every waitlist position greater than `position`
    async fn shift_waitlist_after(&mut self, course_id: CourseId, position: i32) -> Result<u64>;

    async fn append_audit(&mut self, entry: &AuditEntry) -> Result<()>;
}
