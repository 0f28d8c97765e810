// Course catalog and student registry
//
// The engine only reads the catalog while processing; these writes serve
// seeding, operator tooling and tests.

use crate::error::map_sqlx_error;
use crate::rows::load_course;
use enrollment_core::domain::{
    AuditAction, AuditEntry, CourseId, CourseOffering, CourseStatus, EnrollmentId, StudentId,
};
use enrollment_core::error::{AppError, Result};
use enrollment_core::port::TimeProvider;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;

pub struct SqliteCatalog {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

#[derive(sqlx::FromRow)]
struct AuditRow {
    actor: String,
    action: String,
    entity_type: String,
    entity_id: i64,
    changes: String,
    created_at: i64,
}

impl SqliteCatalog {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }

    pub async fn add_student(&self, id: StudentId, name: &str) -> Result<()> {
        sqlx::query("INSERT INTO students (id, name, created_at) VALUES (?, ?, ?)")
            .bind(id)
            .bind(name)
            .bind(self.time_provider.now_millis())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    /// Insert or update a course and replace its time slots
    ///
    /// Seat count and version are owned by the engine and are never touched
    /// on update.
    pub async fn upsert_course(&self, course: &CourseOffering) -> Result<()> {
        let now = self.time_provider.now_millis();
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        sqlx::query(
            r#"
            INSERT INTO courses (
                id, code, title, term, credits, max_capacity, current_enrollment,
                version, status, prerequisites, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                code = excluded.code,
                title = excluded.title,
                term = excluded.term,
                credits = excluded.credits,
                max_capacity = excluded.max_capacity,
                status = excluded.status,
                prerequisites = excluded.prerequisites,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(course.id)
        .bind(&course.code)
        .bind(&course.title)
        .bind(&course.term)
        .bind(course.credits)
        .bind(course.max_capacity)
        .bind(course.current_enrollment)
        .bind(course.version)
        .bind(course.status.to_string())
        .bind(course.prerequisites.join(","))
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query("DELETE FROM course_time_slots WHERE course_id = ?")
            .bind(course.id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        for slot in &course.time_slots {
            sqlx::query(
                "INSERT INTO course_time_slots (course_id, day_of_week, start_time, end_time) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(course.id)
            .bind(slot.day.to_string())
            .bind(slot.start_str())
            .bind(slot.end_str())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        info!(course_id = course.id, code = %course.code, term = %course.term, "Course upserted");
        Ok(())
    }

    pub async fn set_course_status(&self, course_id: CourseId, status: CourseStatus) -> Result<()> {
        let result = sqlx::query("UPDATE courses SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(self.time_provider.now_millis())
            .bind(course_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Course {} not found", course_id)));
        }
        Ok(())
    }

    /// Record a final grade on a confirmed enrollment (prerequisite credit)
    pub async fn record_grade(&self, enrollment_id: EnrollmentId, grade: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE enrollments SET grade = ?, updated_at = ? \
             WHERE id = ? AND status = 'CONFIRMED'",
        )
        .bind(grade)
        .bind(self.time_provider.now_millis())
        .bind(enrollment_id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Confirmed enrollment {} not found",
                enrollment_id
            )));
        }
        Ok(())
    }

    pub async fn get_course(&self, course_id: CourseId) -> Result<Option<CourseOffering>> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
        load_course(&mut conn, course_id).await
    }

    /// Recount of CONFIRMED rows, for checking the cached seat count
    pub async fn count_confirmed(&self, course_id: CourseId) -> Result<i64> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM enrollments WHERE course_id = ? AND status = 'CONFIRMED'",
        )
        .bind(course_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)
    }

    /// Audit trail of one enrollment, oldest first
    pub async fn audit_entries(&self, enrollment_id: EnrollmentId) -> Result<Vec<AuditEntry>> {
        let rows: Vec<AuditRow> = sqlx::query_as(
            r#"
            SELECT actor, action, entity_type, entity_id, changes, created_at
            FROM audit_log
            WHERE entity_type = 'enrollment' AND entity_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(enrollment_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|row| -> Result<AuditEntry> {
                Ok(AuditEntry {
                    actor: row.actor,
                    action: row.action.parse::<AuditAction>()?,
                    entity_type: row.entity_type,
                    entity_id: row.entity_id,
                    changes: serde_json::from_str(&row.changes)?,
                    created_at: row.created_at,
                })
            })
            .collect()
    }
}
