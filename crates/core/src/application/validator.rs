// Conflict Validator - pure enrollment rule checks

use crate::domain::{ConfirmedEnrollment, CourseOffering, Enrollment, EnrollmentStatus, TimeSlot};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A business rule that blocks an enrollment attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Conflict {
    AlreadyEnrolled {
        status: EnrollmentStatus,
    },
    MissingPrerequisites {
        missing: Vec<String>,
    },
    TimeConflict {
        course_code: String,
        existing: TimeSlot,
        candidate: TimeSlot,
    },
    CreditLimitExceeded {
        current: i32,
        adding: i32,
        max: i32,
    },
}

impl std::fmt::Display for Conflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Conflict::AlreadyEnrolled { status } => {
                write!(f, "Already enrolled in this course (status {})", status)
            }
            Conflict::MissingPrerequisites { missing } => {
                write!(f, "Missing prerequisites: {}", missing.join(", "))
            }
            Conflict::TimeConflict {
                course_code,
                existing,
                candidate,
            } => write!(
                f,
                "Time conflict with {} on {}: {}-{} overlaps {}-{}",
                course_code,
                candidate.day,
                candidate.start_str(),
                candidate.end_str(),
                existing.start_str(),
                existing.end_str()
            ),
            Conflict::CreditLimitExceeded {
                current,
                adding,
                max,
            } => write!(
                f,
                "Credit limit exceeded: {} + {} = {} > {}",
                current,
                adding,
                current + adding,
                max
            ),
        }
    }
}

/// Half-open overlap: same weekday and `start1 < end2 && start2 < end1`
pub fn time_slots_overlap(a: &TimeSlot, b: &TimeSlot) -> bool {
    a.day == b.day && a.start < b.end && b.start < a.end
}

/// Stateless rule checks over a course and the student's CONFIRMED history
///
/// Checks never touch storage; the processor loads the inputs inside its
/// transaction and hands them in.
#[derive(Debug, Clone)]
pub struct ConflictValidator {
    max_credits_per_term: i32,
}

impl ConflictValidator {
    pub fn new(max_credits_per_term: i32) -> Self {
        Self {
            max_credits_per_term,
        }
    }

    pub fn max_credits_per_term(&self) -> i32 {
        self.max_credits_per_term
    }

    pub fn check_already_enrolled(&self, existing: Option<&Enrollment>) -> Option<Conflict> {
        existing
            .filter(|e| e.status.is_active())
            .map(|e| Conflict::AlreadyEnrolled { status: e.status })
    }

    /// Every prerequisite code must be a CONFIRMED enrollment with a grade
    pub fn check_prerequisites(
        &self,
        course: &CourseOffering,
        history: &[ConfirmedEnrollment],
    ) -> Option<Conflict> {
        if course.prerequisites.is_empty() {
            return None;
        }

        let completed: HashSet<&str> = history
            .iter()
            .filter(|h| h.grade.is_some())
            .map(|h| h.course_code.as_str())
            .collect();

        let missing: Vec<String> = course
            .prerequisites
            .iter()
            .filter(|code| !completed.contains(code.as_str()))
            .cloned()
            .collect();

        if missing.is_empty() {
            None
        } else {
            Some(Conflict::MissingPrerequisites { missing })
        }
    }

    /// First overlapping slot against same-term CONFIRMED courses
    pub fn check_time_conflicts(
        &self,
        course: &CourseOffering,
        history: &[ConfirmedEnrollment],
    ) -> Option<Conflict> {
        for held in history.iter().filter(|h| h.term == course.term) {
            for existing in &held.time_slots {
                for candidate in &course.time_slots {
                    if time_slots_overlap(existing, candidate) {
                        return Some(Conflict::TimeConflict {
                            course_code: held.course_code.clone(),
                            existing: *existing,
                            candidate: *candidate,
                        });
                    }
                }
            }
        }
        None
    }

    pub fn check_credit_limit(
        &self,
        course: &CourseOffering,
        history: &[ConfirmedEnrollment],
    ) -> Option<Conflict> {
        let current: i32 = history
            .iter()
            .filter(|h| h.term == course.term)
            .map(|h| h.credits)
            .sum();

        if current + course.credits > self.max_credits_per_term {
            Some(Conflict::CreditLimitExceeded {
                current,
                adding: course.credits,
                max: self.max_credits_per_term,
            })
        } else {
            None
        }
    }

    /// Run prerequisite, time and credit checks in that order
    pub fn validate(
        &self,
        course: &CourseOffering,
        history: &[ConfirmedEnrollment],
    ) -> Vec<Conflict> {
        [
            self.check_prerequisites(course, history),
            self.check_time_conflicts(course, history),
            self.check_credit_limit(course, history),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// Rejection reason recorded on the enrollment row and the failed job
pub fn rejection_reason(conflicts: &[Conflict]) -> String {
    conflicts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CourseStatus;
    use chrono::Weekday;

    fn slot(day: &str, start: &str, end: &str) -> TimeSlot {
        TimeSlot::parse(day, start, end).unwrap()
    }

    fn course(credits: i32, prerequisites: &[&str], slots: Vec<TimeSlot>) -> CourseOffering {
        CourseOffering {
            id: 100,
            code: "CS301".to_string(),
            title: "Algorithms".to_string(),
            term: "2026-FALL".to_string(),
            credits,
            max_capacity: 30,
            current_enrollment: 0,
            version: 0,
            status: CourseStatus::Active,
            prerequisites: prerequisites.iter().map(|s| s.to_string()).collect(),
            time_slots: slots,
        }
    }

    fn held(code: &str, term: &str, credits: i32, grade: Option<&str>, slots: Vec<TimeSlot>) -> ConfirmedEnrollment {
        ConfirmedEnrollment {
            enrollment_id: 1,
            course_id: 1,
            course_code: code.to_string(),
            term: term.to_string(),
            credits,
            grade: grade.map(str::to_string),
            time_slots: slots,
        }
    }

    #[test]
    fn test_overlapping_slots_conflict() {
        let a = slot("Mon", "09:00", "10:00");
        let b = slot("Mon", "09:30", "10:30");
        assert!(time_slots_overlap(&a, &b));
        assert!(time_slots_overlap(&b, &a));
    }

    #[test]
    fn test_touching_slots_do_not_conflict() {
        let a = slot("Mon", "09:00", "10:00");
        let b = slot("Mon", "10:00", "11:00");
        assert!(!time_slots_overlap(&a, &b));
    }

    #[test]
    fn test_different_days_do_not_conflict() {
        let a = slot("Mon", "09:00", "10:00");
        let b = TimeSlot { day: Weekday::Tue, ..a };
        assert!(!time_slots_overlap(&a, &b));
    }

    #[test]
    fn test_time_conflict_only_within_term() {
        let validator = ConflictValidator::new(18);
        let candidate = course(3, &[], vec![slot("Mon", "09:30", "10:30")]);

        let other_term = vec![held("CS101", "2026-SPRING", 3, None, vec![slot("Mon", "09:00", "10:00")])];
        assert!(validator.check_time_conflicts(&candidate, &other_term).is_none());

        let same_term = vec![held("CS101", "2026-FALL", 3, None, vec![slot("Mon", "09:00", "10:00")])];
        let conflict = validator.check_time_conflicts(&candidate, &same_term).unwrap();
        assert!(conflict.to_string().contains("CS101"));
    }

    #[test]
    fn test_prerequisites_need_a_grade() {
        let validator = ConflictValidator::new(18);
        let candidate = course(3, &["CS101", "MATH200"], vec![]);
        let history = vec![
            held("CS101", "2025-FALL", 3, Some("A"), vec![]),
            held("MATH200", "2026-FALL", 3, None, vec![]),
        ];

        match validator.check_prerequisites(&candidate, &history) {
            Some(Conflict::MissingPrerequisites { missing }) => {
                assert_eq!(missing, vec!["MATH200".to_string()]);
            }
            other => panic!("expected missing prerequisites, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_prerequisites_are_listed_individually() {
        let validator = ConflictValidator::new(18);
        let candidate = course(3, &["CS101", "CS102"], vec![]);
        let conflict = validator.check_prerequisites(&candidate, &[]).unwrap();
        assert_eq!(conflict.to_string(), "Missing prerequisites: CS101, CS102");
    }

    #[test]
    fn test_credit_overflow() {
        let validator = ConflictValidator::new(18);
        let candidate = course(4, &[], vec![]);
        let history = vec![
            held("A", "2026-FALL", 4, None, vec![]),
            held("B", "2026-FALL", 4, None, vec![]),
            held("C", "2026-FALL", 4, None, vec![]),
            held("D", "2026-FALL", 4, None, vec![]),
            // Different term does not count
            held("E", "2026-SPRING", 6, None, vec![]),
        ];

        let conflict = validator.check_credit_limit(&candidate, &history).unwrap();
        assert_eq!(
            conflict,
            Conflict::CreditLimitExceeded {
                current: 16,
                adding: 4,
                max: 18
            }
        );
        assert_eq!(conflict.to_string(), "Credit limit exceeded: 16 + 4 = 20 > 18");
    }

    #[test]
    fn test_credit_limit_is_inclusive() {
        let validator = ConflictValidator::new(18);
        let candidate = course(2, &[], vec![]);
        let history = vec![held("A", "2026-FALL", 16, None, vec![])];
        assert!(validator.check_credit_limit(&candidate, &history).is_none());
    }

    #[test]
    fn test_validate_is_deterministic() {
        let validator = ConflictValidator::new(6);
        let candidate = course(4, &["CS101"], vec![slot("Tue", "13:00", "14:00")]);
        let history = vec![held("X", "2026-FALL", 3, None, vec![slot("Tue", "13:30", "15:00")])];

        let first = rejection_reason(&validator.validate(&candidate, &history));
        let second = rejection_reason(&validator.validate(&candidate, &history));
        assert_eq!(first, second);
        assert!(first.starts_with("Missing prerequisites: CS101; Time conflict with X"));
        assert!(first.ends_with("Credit limit exceeded: 3 + 4 = 7 > 6"));
    }
}
