// In-memory enrollment store for unit tests
//
// A transaction works on a snapshot taken at `begin` and publishes it on
// commit, so rollback is simply dropping the snapshot.

use crate::domain::{
    AuditAction, AuditEntry, ConfirmedEnrollment, CourseId, CourseOffering, CourseStatus,
    Enrollment, EnrollmentId, EnrollmentStatus, NewEnrollment, SeatChange, StudentId,
};
use crate::error::Result;
use crate::port::{EnrollmentStore, EnrollmentTransaction, Transaction};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

pub fn course(id: CourseId, code: &str, capacity: i32) -> CourseOffering {
    CourseOffering {
        id,
        code: code.to_string(),
        title: format!("{} title", code),
        term: "2026-FALL".to_string(),
        credits: 3,
        max_capacity: capacity,
        current_enrollment: 0,
        version: 0,
        status: CourseStatus::Active,
        prerequisites: vec![],
        time_slots: vec![],
    }
}

#[derive(Debug, Clone, Default)]
struct State {
    students: HashSet<StudentId>,
    courses: BTreeMap<CourseId, CourseOffering>,
    enrollments: Vec<Enrollment>,
    audit: Vec<AuditEntry>,
    next_id: EnrollmentId,
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
    fail_next_cas: Arc<Mutex<bool>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_student(&self, id: StudentId) {
        self.state.lock().unwrap().students.insert(id);
    }

    pub fn add_course(&self, course: CourseOffering) {
        self.state.lock().unwrap().courses.insert(course.id, course);
    }

    pub fn course(&self, id: CourseId) -> CourseOffering {
        self.state.lock().unwrap().courses[&id].clone()
    }

    pub fn enrollments(&self) -> Vec<Enrollment> {
        self.state.lock().unwrap().enrollments.clone()
    }

    pub fn audit_actions(&self) -> Vec<AuditAction> {
        self.state
            .lock()
            .unwrap()
            .audit
            .iter()
            .map(|a| a.action)
            .collect()
    }

    /// Make the next seat CAS report a version mismatch
    pub fn fail_next_cas(&self) {
        *self.fail_next_cas.lock().unwrap() = true;
    }
}

#[async_trait]
impl EnrollmentStore for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn EnrollmentTransaction>> {
        let snapshot = self.state.lock().unwrap().clone();
        Ok(Box::new(InMemoryTx {
            store: self.clone(),
            work: snapshot,
        }))
    }

    async fn waitlist(&self, course_id: CourseId) -> Result<Vec<Enrollment>> {
        let mut rows: Vec<_> = self
            .enrollments()
            .into_iter()
            .filter(|e| e.course_id == course_id && e.status == EnrollmentStatus::Waitlisted)
            .collect();
        rows.sort_by_key(|e| e.waitlist_position);
        Ok(rows)
    }

    async fn find_enrollment(&self, id: EnrollmentId) -> Result<Option<Enrollment>> {
        Ok(self.enrollments().into_iter().find(|e| e.id == id))
    }
}

struct InMemoryTx {
    store: InMemoryStore,
    work: State,
}

#[async_trait]
impl Transaction for InMemoryTx {
    async fn commit(self: Box<Self>) -> Result<()> {
        *self.store.state.lock().unwrap() = self.work;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl EnrollmentTransaction for InMemoryTx {
    async fn get_course(&mut self, course_id: CourseId) -> Result<Option<CourseOffering>> {
        Ok(self.work.courses.get(&course_id).cloned())
    }

    async fn student_exists(&mut self, student_id: StudentId) -> Result<bool> {
        Ok(self.work.students.contains(&student_id))
    }

    async fn list_confirmed_enrollments(
        &mut self,
        student_id: StudentId,
        term: Option<&str>,
    ) -> Result<Vec<ConfirmedEnrollment>> {
        Ok(self
            .work
            .enrollments
            .iter()
            .filter(|e| e.student_id == student_id && e.status == EnrollmentStatus::Confirmed)
            .filter_map(|e| {
                let c = self.work.courses.get(&e.course_id)?;
                if term.is_some_and(|t| t != c.term) {
                    return None;
                }
                Some(ConfirmedEnrollment {
                    enrollment_id: e.id,
                    course_id: c.id,
                    course_code: c.code.clone(),
                    term: c.term.clone(),
                    credits: c.credits,
                    grade: e.grade.clone(),
                    time_slots: c.time_slots.clone(),
                })
            })
            .collect())
    }

    async fn find_active_enrollment(
        &mut self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>> {
        Ok(self
            .work
            .enrollments
            .iter()
            .find(|e| e.student_id == student_id && e.course_id == course_id && e.status.is_active())
            .cloned())
    }

    async fn find_enrollment_by_job(&mut self, job_id: &str) -> Result<Option<Enrollment>> {
        Ok(self
            .work
            .enrollments
            .iter()
            .rev()
            .find(|e| e.job_id.as_deref() == Some(job_id))
            .cloned())
    }

    async fn find_enrollment_by_id(&mut self, id: EnrollmentId) -> Result<Option<Enrollment>> {
        Ok(self.work.enrollments.iter().find(|e| e.id == id).cloned())
    }

    async fn insert_enrollment(&mut self, new: &NewEnrollment) -> Result<Enrollment> {
        self.work.next_id += 1;
        let row = Enrollment {
            id: self.work.next_id,
            student_id: new.student_id,
            course_id: new.course_id,
            status: new.status,
            waitlist_position: new.waitlist_position,
            grade: None,
            rejection_reason: new.rejection_reason.clone(),
            job_id: new.job_id.clone(),
            created_at: new.created_at,
            updated_at: new.created_at,
            dropped_at: None,
        };
        self.work.enrollments.push(row.clone());
        Ok(row)
    }

    async fn update_enrollment(&mut self, enrollment: &Enrollment) -> Result<()> {
        if let Some(row) = self
            .work
            .enrollments
            .iter_mut()
            .find(|e| e.id == enrollment.id)
        {
            *row = enrollment.clone();
        }
        Ok(())
    }

    async fn compare_and_swap_seats(&mut self, change: &SeatChange) -> Result<bool> {
        if std::mem::take(&mut *self.store.fail_next_cas.lock().unwrap()) {
            return Ok(false);
        }
        match self.work.courses.get_mut(&change.course_id) {
            Some(c) if c.version == change.expected_version => {
                c.apply(change);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn next_waitlist_position(&mut self, course_id: CourseId) -> Result<i32> {
        Ok(self
            .work
            .enrollments
            .iter()
            .filter(|e| e.course_id == course_id && e.status == EnrollmentStatus::Waitlisted)
            .filter_map(|e| e.waitlist_position)
            .max()
            .unwrap_or(0)
            + 1)
    }

    async fn next_waitlisted(&mut self, course_id: CourseId) -> Result<Option<Enrollment>> {
        Ok(self
            .work
            .enrollments
            .iter()
            .filter(|e| e.course_id == course_id && e.status == EnrollmentStatus::Waitlisted)
            .min_by_key(|e| e.waitlist_position)
            .cloned())
    }

    async fn shift_waitlist_after(&mut self, course_id: CourseId, position: i32) -> Result<u64> {
        let mut shifted = 0;
        for e in self.work.enrollments.iter_mut().filter(|e| {
            e.course_id == course_id && e.status == EnrollmentStatus::Waitlisted
        }) {
            if let Some(p) = e.waitlist_position.as_mut() {
                if *p > position {
                    *p -= 1;
                    shifted += 1;
                }
            }
        }
        Ok(shifted)
    }

    async fn append_audit(&mut self, entry: &AuditEntry) -> Result<()> {
        self.work.audit.push(entry.clone());
        Ok(())
    }
}
