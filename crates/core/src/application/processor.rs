// Enrollment Processor - one job, one transaction

use crate::application::retry::RetryPolicy;
use crate::application::validator::{rejection_reason, Conflict, ConflictValidator};
use crate::application::{capacity, waitlist};
use crate::domain::{
    AuditAction, AuditEntry, Enrollment, EnrollmentId, EnrollmentJob, EnrollmentOutcome,
    EnrollmentStatus, NewEnrollment, StudentId,
};
use crate::config::EngineConfig;
use crate::error::{AppError, Result};
use crate::port::{EnrollmentStore, EnrollmentTransaction, TimeProvider};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// What the transaction body decided; both variants are committed
enum Decision {
    Admitted(EnrollmentOutcome),
    Rejected(String),
}

/// Result of a drop, including the waitlist entry that took the seat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropOutcome {
    pub enrollment: Enrollment,
    pub promoted: Option<Enrollment>,
}

pub struct EnrollmentProcessor {
    store: Arc<dyn EnrollmentStore>,
    validator: ConflictValidator,
    time_provider: Arc<dyn TimeProvider>,
    /// Attempt ceiling for drops that hit a transient error
    drop_attempts: i32,
    drop_backoff: RetryPolicy,
}

impl EnrollmentProcessor {
    pub fn new(
        store: Arc<dyn EnrollmentStore>,
        validator: ConflictValidator,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        let defaults = EngineConfig::default();
        Self {
            store,
            validator,
            time_provider,
            drop_attempts: defaults.max_attempts,
            drop_backoff: RetryPolicy::new(defaults.backoff_base_ms, defaults.backoff_factor),
        }
    }

    /// Override the drop retry ceiling and its backoff
    pub fn with_drop_retry(mut self, max_attempts: i32, backoff: RetryPolicy) -> Self {
        self.drop_attempts = max_attempts.max(1);
        self.drop_backoff = backoff;
        self
    }

    /// Process one claimed job inside a single write transaction
    ///
    /// Business rule violations commit a REJECTED row plus its audit entry
    /// and then return `AppError::Validation`. Every other error rolls the
    /// transaction back and leaves enrollment state untouched.
    pub async fn process(&self, job: &EnrollmentJob) -> Result<EnrollmentOutcome> {
        let mut tx = self.store.begin().await?;

        match self.decide(tx.as_mut(), job).await {
            Ok(Decision::Admitted(outcome)) => {
                tx.commit().await?;
                Ok(outcome)
            }
            Ok(Decision::Rejected(reason)) => {
                tx.commit().await?;
                Err(AppError::Validation(reason))
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(job_id = %job.id, error = %rollback_err, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn decide(
        &self,
        tx: &mut dyn EnrollmentTransaction,
        job: &EnrollmentJob,
    ) -> Result<Decision> {
        let now = self.time_provider.now_millis();
        let (student_id, course_id) = (job.student_id, job.course_id);

        // A reclaimed job whose earlier attempt already admitted the student.
        // REJECTED rows are history: the rules run again against current state.
        if let Some(existing) = tx
            .find_enrollment_by_job(&job.id)
            .await?
            .filter(|e| e.status != EnrollmentStatus::Rejected)
        {
            info!(job_id = %job.id, enrollment_id = existing.id, "Replaying committed outcome");
            return Ok(Decision::Admitted(EnrollmentOutcome {
                enrollment_id: existing.id,
                status: existing.status,
                waitlist_position: existing.waitlist_position,
            }));
        }

        // 1. Course and student
        let mut course = tx
            .get_course(course_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Course {} not found", course_id)))?;
        if course.is_inactive() {
            return Err(AppError::NotFound(format!(
                "Course {} is not open for enrollment",
                course.code
            )));
        }
        if !tx.student_exists(student_id).await? {
            return Err(AppError::NotFound(format!("Student {} not found", student_id)));
        }

        // 2. Existing non-terminal enrollment; REJECTED rows are history only
        let existing = tx.find_active_enrollment(student_id, course_id).await?;
        if let Some(conflict) = self.validator.check_already_enrolled(existing.as_ref()) {
            return Err(AppError::Validation(conflict.to_string()));
        }

        // 3. Rules against the current CONFIRMED history
        let history = tx.list_confirmed_enrollments(student_id, None).await?;
        let conflicts = self.validator.validate(&course, &history);
        if !conflicts.is_empty() {
            return self.reject(tx, job, &conflicts, now).await;
        }

        // 4. Full course goes to the waitlist
        if course.is_full() {
            let enrollment =
                waitlist::append(tx, student_id, course_id, Some(job.id.clone()), now).await?;
            tx.append_audit(&AuditEntry::enrollment(
                student_id.to_string(),
                AuditAction::Waitlisted,
                enrollment.id,
                json!({
                    "course_id": course_id,
                    "job_id": job.id,
                    "position": enrollment.waitlist_position,
                }),
                now,
            ))
            .await?;

            return Ok(Decision::Admitted(EnrollmentOutcome {
                enrollment_id: enrollment.id,
                status: EnrollmentStatus::Waitlisted,
                waitlist_position: enrollment.waitlist_position,
            }));
        }

        // 5. Seat via CAS, 6. CONFIRMED row
        capacity::acquire_seat(tx, &mut course).await?;
        let enrollment = tx
            .insert_enrollment(&NewEnrollment::confirmed(
                student_id,
                course_id,
                Some(job.id.clone()),
                now,
            ))
            .await?;
        tx.append_audit(&AuditEntry::enrollment(
            student_id.to_string(),
            AuditAction::Enroll,
            enrollment.id,
            json!({
                "course_id": course_id,
                "job_id": job.id,
                "course_version": course.version,
                "current_enrollment": course.current_enrollment,
            }),
            now,
        ))
        .await?;

        info!(
            job_id = %job.id,
            student_id,
            course_id,
            enrollment_id = enrollment.id,
            "Enrollment confirmed"
        );
        Ok(Decision::Admitted(EnrollmentOutcome {
            enrollment_id: enrollment.id,
            status: EnrollmentStatus::Confirmed,
            waitlist_position: None,
        }))
    }

    async fn reject(
        &self,
        tx: &mut dyn EnrollmentTransaction,
        job: &EnrollmentJob,
        conflicts: &[Conflict],
        now: i64,
    ) -> Result<Decision> {
        let reason = rejection_reason(conflicts);
        let enrollment = tx
            .insert_enrollment(&NewEnrollment::rejected(
                job.student_id,
                job.course_id,
                reason.clone(),
                Some(job.id.clone()),
                now,
            ))
            .await?;
        tx.append_audit(&AuditEntry::enrollment(
            job.student_id.to_string(),
            AuditAction::EnrollRejected,
            enrollment.id,
            json!({
                "course_id": job.course_id,
                "job_id": job.id,
                "reason": reason,
                "conflicts": conflicts,
            }),
            now,
        ))
        .await?;

        info!(job_id = %job.id, reason = %reason, "Enrollment rejected");
        Ok(Decision::Rejected(reason))
    }

    /// Drop an enrollment owned by `student_id`
    ///
    /// A CONFIRMED drop releases the seat and promotes the waitlist head in
    /// the same transaction; a WAITLISTED drop closes the position gap.
    /// Lost seat races are retried with fresh state.
    pub async fn drop_enrollment(
        &self,
        enrollment_id: EnrollmentId,
        student_id: StudentId,
    ) -> Result<DropOutcome> {
        let mut attempt = 1;
        loop {
            match self.drop_once(enrollment_id, student_id).await {
                Err(e) if e.is_retryable() && attempt < self.drop_attempts => {
                    let delay_ms = self
                        .drop_backoff
                        .backoff_delay_ms(&enrollment_id.to_string(), attempt);
                    warn!(enrollment_id, attempt, delay_ms, error = %e, "Retrying drop");
                    tokio::time::sleep(Duration::from_millis(delay_ms.max(0) as u64)).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn drop_once(
        &self,
        enrollment_id: EnrollmentId,
        student_id: StudentId,
    ) -> Result<DropOutcome> {
        let mut tx = self.store.begin().await?;
        match self.drop_in_tx(tx.as_mut(), enrollment_id, student_id).await {
            Ok(outcome) => {
                tx.commit().await?;
                Ok(outcome)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(enrollment_id, error = %rollback_err, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn drop_in_tx(
        &self,
        tx: &mut dyn EnrollmentTransaction,
        enrollment_id: EnrollmentId,
        student_id: StudentId,
    ) -> Result<DropOutcome> {
        let now = self.time_provider.now_millis();
        let mut enrollment = tx
            .find_enrollment_by_id(enrollment_id)
            .await?
            .filter(|e| e.student_id == student_id)
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Enrollment {} not found for student {}",
                    enrollment_id, student_id
                ))
            })?;

        let previous = enrollment.status;
        let mut promoted = None;
        let mut released_position = None;

        match previous {
            EnrollmentStatus::Confirmed => {
                let mut course = tx.get_course(enrollment.course_id).await?.ok_or_else(|| {
                    AppError::NotFound(format!("Course {} not found", enrollment.course_id))
                })?;
                enrollment.drop_out(now)?;
                tx.update_enrollment(&enrollment).await?;
                capacity::release_seat(tx, &mut course).await?;
                promoted = waitlist::promote_next(tx, course.id, now).await?;
            }
            EnrollmentStatus::Waitlisted => {
                released_position = Some(waitlist::withdraw(tx, &mut enrollment, now).await?);
            }
            EnrollmentStatus::Pending => {
                enrollment.drop_out(now)?;
                tx.update_enrollment(&enrollment).await?;
            }
            EnrollmentStatus::Dropped | EnrollmentStatus::Rejected => {
                return Err(AppError::Validation(format!(
                    "Enrollment {} is already {}",
                    enrollment_id, previous
                )));
            }
        }

        tx.append_audit(&AuditEntry::enrollment(
            student_id.to_string(),
            AuditAction::Drop,
            enrollment.id,
            json!({
                "course_id": enrollment.course_id,
                "from": previous,
                "to": EnrollmentStatus::Dropped,
                "waitlist_position": released_position,
                "promoted_enrollment_id": promoted.as_ref().map(|p: &Enrollment| p.id),
            }),
            now,
        ))
        .await?;

        info!(
            enrollment_id,
            student_id,
            course_id = enrollment.course_id,
            from = %previous,
            promoted = ?promoted.as_ref().map(|p| p.id),
            "Enrollment dropped"
        );
        Ok(DropOutcome {
            enrollment,
            promoted,
        })
    }
}
