// Waitlist Manager
//
// Positions are 1-based and contiguous per course. Every operation runs on
// the caller's transaction so it commits or rolls back with the seat change
// that triggered it.

use crate::application::capacity;
use crate::domain::{
    AuditAction, AuditEntry, CourseId, Enrollment, NewEnrollment, StudentId,
};
use crate::error::{AppError, Result};
use crate::port::EnrollmentTransaction;
use serde_json::json;
use tracing::info;

/// Actor recorded for engine-initiated promotions
pub const SYSTEM_ACTOR: &str = "system";

/// Insert a WAITLISTED row at the tail of the course's waitlist
pub async fn append(
    tx: &mut dyn EnrollmentTransaction,
    student_id: StudentId,
    course_id: CourseId,
    job_id: Option<String>,
    now_millis: i64,
) -> Result<Enrollment> {
    let position = tx.next_waitlist_position(course_id).await?;
    let enrollment = tx
        .insert_enrollment(&NewEnrollment::waitlisted(
            student_id, course_id, position, job_id, now_millis,
        ))
        .await?;

    info!(
        student_id,
        course_id,
        position,
        enrollment_id = enrollment.id,
        "Student waitlisted"
    );
    Ok(enrollment)
}

/// Promote the head of the waitlist into a freed seat
///
/// Reloads the course so the seat CAS sees the version written by the
/// preceding release. Returns the promoted enrollment, or `None` when the
/// waitlist is empty or no seat is free.
pub async fn promote_next(
    tx: &mut dyn EnrollmentTransaction,
    course_id: CourseId,
    now_millis: i64,
) -> Result<Option<Enrollment>> {
    let mut course = tx
        .get_course(course_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Course {} not found", course_id)))?;

    if course.is_full() {
        return Ok(None);
    }

    let Some(mut head) = tx.next_waitlisted(course_id).await? else {
        return Ok(None);
    };
    let position = head.waitlist_position.ok_or_else(|| {
        AppError::InvalidState(format!(
            "waitlisted enrollment {} has no position",
            head.id
        ))
    })?;

    capacity::acquire_seat(tx, &mut course).await?;

    head.promote(now_millis)?;
    tx.update_enrollment(&head).await?;
    tx.shift_waitlist_after(course_id, position).await?;

    tx.append_audit(&AuditEntry::enrollment(
        SYSTEM_ACTOR,
        AuditAction::PromotedFromWaitlist,
        head.id,
        json!({
            "student_id": head.student_id,
            "course_id": course_id,
            "from": "WAITLISTED",
            "to": "CONFIRMED",
            "previous_position": position,
            "course_version": course.version,
        }),
        now_millis,
    ))
    .await?;

    info!(
        course_id,
        student_id = head.student_id,
        enrollment_id = head.id,
        previous_position = position,
        "Promoted from waitlist"
    );
    Ok(Some(head))
}

/// Drop a WAITLISTED enrollment and close the gap behind it
pub async fn withdraw(
    tx: &mut dyn EnrollmentTransaction,
    enrollment: &mut Enrollment,
    now_millis: i64,
) -> Result<i32> {
    let position = enrollment.waitlist_position.ok_or_else(|| {
        AppError::InvalidState(format!(
            "waitlisted enrollment {} has no position",
            enrollment.id
        ))
    })?;

    enrollment.drop_out(now_millis)?;
    tx.update_enrollment(enrollment).await?;
    tx.shift_waitlist_after(enrollment.course_id, position).await?;
    Ok(position)
}
