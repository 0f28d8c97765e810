// Domain Layer - Pure business entities and invariants

pub mod audit;
pub mod course;
pub mod enrollment;
pub mod error;
pub mod job;

// Re-exports
pub use audit::{AuditAction, AuditEntry, ENTITY_ENROLLMENT};
pub use course::{
    parse_prerequisites, CourseId, CourseOffering, CourseStatus, SeatChange, StudentId, TimeSlot,
};
pub use enrollment::{
    ConfirmedEnrollment, Enrollment, EnrollmentId, EnrollmentStatus, NewEnrollment,
};
pub use error::DomainError;
pub use job::{EnrollmentJob, EnrollmentOutcome, FailureKind, JobFailure, JobId, JobState};
