// SQLite Transaction Implementation
//
// Writers open with BEGIN IMMEDIATE so the write lock is taken up front; a
// deferred transaction that reads first and upgrades later fails with
// SQLITE_BUSY instead of waiting on busy_timeout.

use crate::error::map_sqlx_error;
use crate::rows::{into_enrollments, load_confirmed, load_course, EnrollmentRow};
use async_trait::async_trait;
use enrollment_core::domain::{
    AuditEntry, ConfirmedEnrollment, CourseId, CourseOffering, Enrollment, EnrollmentId,
    NewEnrollment, SeatChange, StudentId,
};
use enrollment_core::error::{AppError, Result};
use enrollment_core::port::{EnrollmentStore, EnrollmentTransaction, Transaction};
use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use tracing::warn;

const ENROLLMENT_COLUMNS: &str = "id, student_id, course_id, status, waitlist_position, grade, \
     rejection_reason, job_id, created_at, updated_at, dropped_at";

pub struct SqliteEnrollmentStore {
    pool: SqlitePool,
}

impl SqliteEnrollmentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EnrollmentStore for SqliteEnrollmentStore {
    async fn begin(&self) -> Result<Box<dyn EnrollmentTransaction>> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *conn)
            .await
            .map_err(map_sqlx_error)?;

        Ok(Box::new(SqliteEnrollmentTransaction { conn: Some(conn) }))
    }

    async fn waitlist(&self, course_id: CourseId) -> Result<Vec<Enrollment>> {
        let rows = sqlx::query_as::<_, EnrollmentRow>(&format!(
            "SELECT {} FROM enrollments WHERE course_id = ? AND status = 'WAITLISTED' \
             ORDER BY waitlist_position ASC",
            ENROLLMENT_COLUMNS
        ))
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        into_enrollments(rows)
    }

    async fn find_enrollment(&self, id: EnrollmentId) -> Result<Option<Enrollment>> {
        let row = sqlx::query_as::<_, EnrollmentRow>(&format!(
            "SELECT {} FROM enrollments WHERE id = ?",
            ENROLLMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(EnrollmentRow::into_enrollment).transpose()
    }
}

/// One open write transaction on a pooled connection
pub struct SqliteEnrollmentTransaction {
    conn: Option<PoolConnection<Sqlite>>,
}

impl SqliteEnrollmentTransaction {
    fn conn(&mut self) -> Result<&mut SqliteConnection> {
        self.conn
            .as_deref_mut()
            .ok_or_else(|| AppError::InvalidState("transaction already finished".to_string()))
    }

    async fn finish(&mut self, statement: &str) -> Result<()> {
        let mut conn = self
            .conn
            .take()
            .ok_or_else(|| AppError::InvalidState("transaction already finished".to_string()))?;

        if let Err(e) = sqlx::query(statement).execute(&mut *conn).await {
            // A failed COMMIT leaves the transaction open; close it before
            // the connection goes back to the pool
            if let Err(rollback_err) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                warn!(error = %rollback_err, "Rollback after failed {} also failed", statement);
                drop(conn.detach());
            }
            return Err(map_sqlx_error(e));
        }
        Ok(())
    }
}

impl Drop for SqliteEnrollmentTransaction {
    fn drop(&mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };
        // Dropped without commit/rollback: roll back off the async path
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                        warn!(error = %e, "Rollback of abandoned transaction failed");
                        drop(conn.detach());
                    }
                });
            }
            Err(_) => drop(conn.detach()),
        }
    }
}

#[async_trait]
impl Transaction for SqliteEnrollmentTransaction {
    async fn commit(mut self: Box<Self>) -> Result<()> {
        self.finish("COMMIT").await
    }

    async fn rollback(mut self: Box<Self>) -> Result<()> {
        self.finish("ROLLBACK").await
    }
}

#[async_trait]
impl EnrollmentTransaction for SqliteEnrollmentTransaction {
    async fn get_course(&mut self, course_id: CourseId) -> Result<Option<CourseOffering>> {
        load_course(self.conn()?, course_id).await
    }

    async fn student_exists(&mut self, student_id: StudentId) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT id FROM students WHERE id = ?")
            .bind(student_id)
            .fetch_optional(self.conn()?)
            .await
            .map_err(map_sqlx_error)?;
        Ok(found.is_some())
    }

    async fn list_confirmed_enrollments(
        &mut self,
        student_id: StudentId,
        term: Option<&str>,
    ) -> Result<Vec<ConfirmedEnrollment>> {
        load_confirmed(self.conn()?, student_id, term).await
    }

    async fn find_active_enrollment(
        &mut self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>> {
        let sql = format!(
            "SELECT {} FROM enrollments WHERE student_id = ? AND course_id = ? \
             AND status IN ('PENDING', 'CONFIRMED', 'WAITLISTED') LIMIT 1",
            ENROLLMENT_COLUMNS
        );
        let row = sqlx::query_as::<_, EnrollmentRow>(&sql)
            .bind(student_id)
            .bind(course_id)
            .fetch_optional(self.conn()?)
            .await
            .map_err(map_sqlx_error)?;

        row.map(EnrollmentRow::into_enrollment).transpose()
    }

    async fn find_enrollment_by_job(&mut self, job_id: &str) -> Result<Option<Enrollment>> {
        let sql = format!(
            "SELECT {} FROM enrollments WHERE job_id = ? ORDER BY id DESC LIMIT 1",
            ENROLLMENT_COLUMNS
        );
        let row = sqlx::query_as::<_, EnrollmentRow>(&sql)
            .bind(job_id)
            .fetch_optional(self.conn()?)
            .await
            .map_err(map_sqlx_error)?;

        row.map(EnrollmentRow::into_enrollment).transpose()
    }

    async fn find_enrollment_by_id(&mut self, id: EnrollmentId) -> Result<Option<Enrollment>> {
        let sql = format!("SELECT {} FROM enrollments WHERE id = ?", ENROLLMENT_COLUMNS);
        let row = sqlx::query_as::<_, EnrollmentRow>(&sql)
            .bind(id)
            .fetch_optional(self.conn()?)
            .await
            .map_err(map_sqlx_error)?;

        row.map(EnrollmentRow::into_enrollment).transpose()
    }

    async fn insert_enrollment(&mut self, new: &NewEnrollment) -> Result<Enrollment> {
        let sql = format!(
            r#"
            INSERT INTO enrollments (
                student_id, course_id, status, waitlist_position,
                rejection_reason, job_id, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            ENROLLMENT_COLUMNS
        );
        let row = sqlx::query_as::<_, EnrollmentRow>(&sql)
            .bind(new.student_id)
            .bind(new.course_id)
            .bind(new.status.to_string())
            .bind(new.waitlist_position)
            .bind(&new.rejection_reason)
            .bind(&new.job_id)
            .bind(new.created_at)
            .bind(new.created_at)
            .fetch_one(self.conn()?)
            .await
            .map_err(map_sqlx_error)?;

        row.into_enrollment()
    }

    async fn update_enrollment(&mut self, enrollment: &Enrollment) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE enrollments
            SET status = ?, waitlist_position = ?, grade = ?, rejection_reason = ?,
                updated_at = ?, dropped_at = ?
            WHERE id = ?
            "#,
        )
        .bind(enrollment.status.to_string())
        .bind(enrollment.waitlist_position)
        .bind(&enrollment.grade)
        .bind(&enrollment.rejection_reason)
        .bind(enrollment.updated_at)
        .bind(enrollment.dropped_at)
        .bind(enrollment.id)
        .execute(self.conn()?)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Enrollment {} not found",
                enrollment.id
            )));
        }
        Ok(())
    }

    async fn compare_and_swap_seats(&mut self, change: &SeatChange) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE courses
            SET current_enrollment = ?, version = ?, status = ?,
                updated_at = CAST(strftime('%s', 'now') AS INTEGER) * 1000
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(change.new_enrollment)
        .bind(change.new_version)
        .bind(change.new_status.to_string())
        .bind(change.course_id)
        .bind(change.expected_version)
        .execute(self.conn()?)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn next_waitlist_position(&mut self, course_id: CourseId) -> Result<i32> {
        let max: Option<i32> = sqlx::query_scalar(
            "SELECT MAX(waitlist_position) FROM enrollments \
             WHERE course_id = ? AND status = 'WAITLISTED'",
        )
        .bind(course_id)
        .fetch_one(self.conn()?)
        .await
        .map_err(map_sqlx_error)?;

        Ok(max.unwrap_or(0) + 1)
    }

    async fn next_waitlisted(&mut self, course_id: CourseId) -> Result<Option<Enrollment>> {
        let sql = format!(
            "SELECT {} FROM enrollments WHERE course_id = ? AND status = 'WAITLISTED' \
             ORDER BY waitlist_position ASC LIMIT 1",
            ENROLLMENT_COLUMNS
        );
        let row = sqlx::query_as::<_, EnrollmentRow>(&sql)
            .bind(course_id)
            .fetch_optional(self.conn()?)
            .await
            .map_err(map_sqlx_error)?;

        row.map(EnrollmentRow::into_enrollment).transpose()
    }

    async fn shift_waitlist_after(&mut self, course_id: CourseId, position: i32) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE enrollments
            SET waitlist_position = waitlist_position - 1
            WHERE course_id = ? AND status = 'WAITLISTED' AND waitlist_position > ?
            "#,
        )
        .bind(course_id)
        .bind(position)
        .execute(self.conn()?)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn append_audit(&mut self, entry: &AuditEntry) -> Result<()> {
        let changes = serde_json::to_string(&entry.changes)?;
        sqlx::query(
            r#"
            INSERT INTO audit_log (actor, action, entity_type, entity_id, changes, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.actor)
        .bind(entry.action.to_string())
        .bind(&entry.entity_type)
        .bind(entry.entity_id)
        .bind(changes)
        .bind(entry.created_at)
        .execute(self.conn()?)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}
