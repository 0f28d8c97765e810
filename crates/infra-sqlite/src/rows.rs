// Row types and shared loaders for catalog and enrollment tables

use crate::error::map_sqlx_error;
use enrollment_core::domain::{
    parse_prerequisites, ConfirmedEnrollment, CourseId, CourseOffering, Enrollment, TimeSlot,
};
use enrollment_core::error::{AppError, Result};
use sqlx::SqliteConnection;

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct CourseRow {
    id: i64,
    code: String,
    title: String,
    term: String,
    credits: i32,
    max_capacity: i32,
    current_enrollment: i32,
    version: i64,
    status: String,
    prerequisites: String,
}

impl CourseRow {
    fn into_course(self, time_slots: Vec<TimeSlot>) -> Result<CourseOffering> {
        Ok(CourseOffering {
            id: self.id,
            code: self.code,
            title: self.title,
            term: self.term,
            credits: self.credits,
            max_capacity: self.max_capacity,
            current_enrollment: self.current_enrollment,
            version: self.version,
            status: self.status.parse()?,
            prerequisites: parse_prerequisites(&self.prerequisites),
            time_slots,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TimeSlotRow {
    day_of_week: String,
    start_time: String,
    end_time: String,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct EnrollmentRow {
    id: i64,
    student_id: i64,
    course_id: i64,
    status: String,
    waitlist_position: Option<i32>,
    grade: Option<String>,
    rejection_reason: Option<String>,
    job_id: Option<String>,
    created_at: i64,
    updated_at: i64,
    dropped_at: Option<i64>,
}

impl EnrollmentRow {
    pub(crate) fn into_enrollment(self) -> Result<Enrollment> {
        Ok(Enrollment {
            id: self.id,
            student_id: self.student_id,
            course_id: self.course_id,
            status: self.status.parse()?,
            waitlist_position: self.waitlist_position,
            grade: self.grade,
            rejection_reason: self.rejection_reason,
            job_id: self.job_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
            dropped_at: self.dropped_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ConfirmedRow {
    enrollment_id: i64,
    course_id: i64,
    course_code: String,
    term: String,
    credits: i32,
    grade: Option<String>,
}

pub(crate) fn into_enrollments(rows: Vec<EnrollmentRow>) -> Result<Vec<Enrollment>> {
    rows.into_iter().map(EnrollmentRow::into_enrollment).collect()
}

pub(crate) async fn load_time_slots(
    conn: &mut SqliteConnection,
    course_id: CourseId,
) -> Result<Vec<TimeSlot>> {
    let rows = sqlx::query_as::<_, TimeSlotRow>(
        "SELECT day_of_week, start_time, end_time FROM course_time_slots \
         WHERE course_id = ? ORDER BY id",
    )
    .bind(course_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(map_sqlx_error)?;

    rows.into_iter()
        .map(|r| TimeSlot::parse(&r.day_of_week, &r.start_time, &r.end_time).map_err(AppError::from))
        .collect()
}

pub(crate) async fn load_course(
    conn: &mut SqliteConnection,
    course_id: CourseId,
) -> Result<Option<CourseOffering>> {
    let row = sqlx::query_as::<_, CourseRow>(
        "SELECT id, code, title, term, credits, max_capacity, current_enrollment, version, \
         status, prerequisites FROM courses WHERE id = ?",
    )
    .bind(course_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(map_sqlx_error)?;

    match row {
        Some(row) => {
            let slots = load_time_slots(conn, course_id).await?;
            Ok(Some(row.into_course(slots)?))
        }
        None => Ok(None),
    }
}

pub(crate) async fn load_confirmed(
    conn: &mut SqliteConnection,
    student_id: i64,
    term: Option<&str>,
) -> Result<Vec<ConfirmedEnrollment>> {
    let rows = sqlx::query_as::<_, ConfirmedRow>(
        r#"
        SELECT e.id AS enrollment_id, c.id AS course_id, c.code AS course_code,
               c.term AS term, c.credits AS credits, e.grade AS grade
        FROM enrollments e
        JOIN courses c ON c.id = e.course_id
        WHERE e.student_id = ?1 AND e.status = 'CONFIRMED'
          AND (?2 IS NULL OR c.term = ?2)
        ORDER BY e.id
        "#,
    )
    .bind(student_id)
    .bind(term)
    .fetch_all(&mut *conn)
    .await
    .map_err(map_sqlx_error)?;

    let mut history = Vec::with_capacity(rows.len());
    for row in rows {
        let time_slots = load_time_slots(conn, row.course_id).await?;
        history.push(ConfirmedEnrollment {
            enrollment_id: row.enrollment_id,
            course_id: row.course_id,
            course_code: row.course_code,
            term: row.term,
            credits: row.credits,
            grade: row.grade,
            time_slots,
        });
    }
    Ok(history)
}
