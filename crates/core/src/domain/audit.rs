// Audit Trail Entry (append-only)

use super::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Entity type recorded for enrollment audit entries
pub const ENTITY_ENROLLMENT: &str = "enrollment";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Enroll,
    Waitlisted,
    EnrollRejected,
    Drop,
    PromotedFromWaitlist,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditAction::Enroll => write!(f, "ENROLL"),
            AuditAction::Waitlisted => write!(f, "WAITLISTED"),
            AuditAction::EnrollRejected => write!(f, "ENROLL_REJECTED"),
            AuditAction::Drop => write!(f, "DROP"),
            AuditAction::PromotedFromWaitlist => write!(f, "PROMOTED_FROM_WAITLIST"),
        }
    }
}

impl FromStr for AuditAction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ENROLL" => Ok(AuditAction::Enroll),
            "WAITLISTED" => Ok(AuditAction::Waitlisted),
            "ENROLL_REJECTED" => Ok(AuditAction::EnrollRejected),
            "DROP" => Ok(AuditAction::Drop),
            "PROMOTED_FROM_WAITLIST" => Ok(AuditAction::PromotedFromWaitlist),
            other => Err(DomainError::UnknownVariant {
                kind: "audit action",
                value: other.to_string(),
            }),
        }
    }
}

/// Immutable record of who did what to which enrollment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Student id or `system` for engine-initiated changes (promotion)
    pub actor: String,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: i64,
    pub changes: serde_json::Value,
    pub created_at: i64,
}

impl AuditEntry {
    pub fn enrollment(
        actor: impl Into<String>,
        action: AuditAction,
        enrollment_id: i64,
        changes: serde_json::Value,
        now_millis: i64,
    ) -> Self {
        Self {
            actor: actor.into(),
            action,
            entity_type: ENTITY_ENROLLMENT.to_string(),
            entity_id: enrollment_id,
            changes,
            created_at: now_millis,
        }
    }
}
