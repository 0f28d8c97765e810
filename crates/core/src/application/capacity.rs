// Capacity Ledger - the only path that mutates a course's seat count

use crate::domain::CourseOffering;
use crate::error::{AppError, Result};
use crate::port::EnrollmentTransaction;
use tracing::debug;

/// Take one seat on `course` via compare-and-swap on its version
///
/// On success `course` reflects the committed count, version and status.
/// A lost race surfaces as the retryable `ConcurrentModification`.
pub async fn acquire_seat(
    tx: &mut dyn EnrollmentTransaction,
    course: &mut CourseOffering,
) -> Result<()> {
    apply_delta(tx, course, 1).await
}

/// Give one seat back on `course` (drop of a CONFIRMED enrollment)
pub async fn release_seat(
    tx: &mut dyn EnrollmentTransaction,
    course: &mut CourseOffering,
) -> Result<()> {
    apply_delta(tx, course, -1).await
}

async fn apply_delta(
    tx: &mut dyn EnrollmentTransaction,
    course: &mut CourseOffering,
    delta: i32,
) -> Result<()> {
    let change = course.seat_change(delta)?;

    if !tx.compare_and_swap_seats(&change).await? {
        return Err(AppError::ConcurrentModification(format!(
            "course {} changed since version {}",
            course.id, change.expected_version
        )));
    }

    debug!(
        course_id = course.id,
        version = change.new_version,
        enrolled = change.new_enrollment,
        status = %change.new_status,
        "Seat count updated"
    );
    course.apply(&change);
    Ok(())
}
