// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid state transition for {entity}: {from} -> {to}")]
    InvalidStateTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("Invalid time slot: {0}")]
    InvalidTimeSlot(String),

    #[error("Unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },

    #[error("Capacity violation on course {course_id}: {reason}")]
    CapacityViolation { course_id: i64, reason: String },
}

pub type Result<T> = std::result::Result<T, DomainError>;
