//! Concurrency guarantees under parallel workers
//!
//! Capacity is never exceeded, every seat mutation bumps the version exactly
//! once, and transient store failures are retried up to the attempt ceiling.

mod common;

use common::{FlakyStore, Harness, MAX_ATTEMPTS};
use enrollment_core::application::SubmitRequest;
use enrollment_core::domain::{EnrollmentStatus, FailureKind, JobState};
use enrollment_core::error::AppError;
use enrollment_core::port::{EnrollmentStore, JobQueue};
use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_capacity_holds_under_parallel_workers() {
    const CAPACITY: i32 = 5;
    const EXTRA: i64 = 7;

    let h = Harness::new().await;
    let students: Vec<i64> = (1..=CAPACITY as i64 + EXTRA).collect();
    h.add_students(students.iter().copied()).await;
    h.add_course(10, "CS101", 3, CAPACITY, &[]).await;

    let jobs = futures::future::join_all(students.iter().map(|&s| h.submit(s, 10))).await;
    h.drain(6).await;

    let mut confirmed = 0;
    let mut positions = Vec::new();
    for job_id in &jobs {
        let job = h.job(job_id).await;
        assert_eq!(job.state, JobState::Completed, "{:?}", job.failure);
        let outcome = job.outcome.unwrap();
        match outcome.status {
            EnrollmentStatus::Confirmed => confirmed += 1,
            EnrollmentStatus::Waitlisted => positions.push(outcome.waitlist_position.unwrap()),
            other => panic!("unexpected outcome {}", other),
        }
    }
    assert_eq!(confirmed, CAPACITY);
    positions.sort_unstable();
    assert_eq!(positions, (1..=EXTRA as i32).collect::<Vec<_>>());

    // Cached seat count agrees with the rows, version counts seat mutations
    let course = h.course(10).await;
    assert_eq!(course.current_enrollment, CAPACITY);
    assert_eq!(h.catalog.count_confirmed(10).await.unwrap(), CAPACITY as i64);
    assert_eq!(course.version, CAPACITY as i64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_last_seat_goes_to_exactly_one_student() {
    let h = Harness::new().await;
    h.add_students([1, 2]).await;
    h.add_course(10, "CS101", 3, 1, &[]).await;

    let a = h.submit(1, 10).await;
    let b = h.submit(2, 10).await;
    h.drain(2).await;

    let mut statuses = Vec::new();
    for job_id in [a, b] {
        statuses.push(h.job(&job_id).await.outcome.unwrap().status);
    }

    assert!(statuses.contains(&EnrollmentStatus::Confirmed));
    assert!(statuses.contains(&EnrollmentStatus::Waitlisted));
    assert_eq!(h.course(10).await.current_enrollment, 1);

    let waitlist = h.store.waitlist(10).await.unwrap();
    assert_eq!(waitlist.len(), 1);
    assert_eq!(waitlist[0].waitlist_position, Some(1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_submissions_admit_one_job() {
    let h = Harness::new().await;
    h.add_students([1]).await;
    h.add_course(10, "CS101", 3, 5, &[]).await;

    let results = futures::future::join_all((0..8).map(|_| {
        h.queue.submit(SubmitRequest {
            student_id: 1,
            course_id: 10,
            correlation_id: None,
        })
    }))
    .await;

    let accepted = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(accepted, 1);
    for err in results.into_iter().filter_map(|r| r.err()) {
        assert!(matches!(err, AppError::AlreadyActive(_)), "{:?}", err);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_drops_and_submissions_interleave_without_overbooking() {
    const CAPACITY: i32 = 3;

    let h = Harness::new().await;
    h.add_students(1..=8).await;
    h.add_course(10, "CS101", 3, CAPACITY, &[]).await;

    for s in 1..=6 {
        h.submit(s, 10).await;
    }
    h.drain(3).await;

    let confirmed: Vec<_> = h
        .job_queue
        .find_by_state(JobState::Completed)
        .await
        .unwrap()
        .into_iter()
        .filter_map(|job| job.outcome.map(|o| (o, job.student_id)))
        .filter(|(o, _)| o.status == EnrollmentStatus::Confirmed)
        .collect();
    assert_eq!(confirmed.len(), CAPACITY as usize);

    // Drop every confirmed seat while two more students join the line
    let drops = futures::future::join_all(
        confirmed
            .iter()
            .map(|(o, student)| h.processor.drop_enrollment(o.enrollment_id, *student)),
    );
    let submits = async {
        h.submit(7, 10).await;
        h.submit(8, 10).await;
        h.drain(2).await;
    };
    let (drop_results, ()) = futures::join!(drops, submits);

    let mut promoted = HashSet::new();
    for result in drop_results {
        if let Some(p) = result.unwrap().promoted {
            assert!(promoted.insert(p.id), "enrollment promoted twice");
        }
    }

    let course = h.course(10).await;
    assert_eq!(course.current_enrollment, CAPACITY);
    assert_eq!(h.catalog.count_confirmed(10).await.unwrap(), CAPACITY as i64);

    // Remaining waitlist is contiguous from 1
    let positions: Vec<i32> = h
        .store
        .waitlist(10)
        .await
        .unwrap()
        .iter()
        .map(|e| e.waitlist_position.unwrap())
        .collect();
    assert_eq!(positions, (1..=positions.len() as i32).collect::<Vec<_>>());
    assert_eq!(positions.len() + CAPACITY as usize, 5);
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let mut flaky = None;
    let h = Harness::with_store(|inner| {
        let store = Arc::new(FlakyStore::new(inner, 1));
        flaky = Some(store.clone());
        store as Arc<dyn EnrollmentStore>
    })
    .await;
    let flaky = flaky.unwrap();
    h.add_students([1]).await;
    h.add_course(10, "CS101", 3, 5, &[]).await;

    let job_id = h.submit(1, 10).await;
    h.drain(1).await;

    let job = h.job(&job_id).await;
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.attempts, 2);
    assert!(job.last_error.unwrap().contains("database is locked"));
    assert_eq!(flaky.begins.load(Ordering::SeqCst), 2);
    assert_eq!(h.course(10).await.current_enrollment, 1);
}

#[tokio::test]
async fn test_retries_exhausted_fails_job_without_side_effects() {
    let h = Harness::with_store(|inner| {
        Arc::new(FlakyStore::new(inner, usize::MAX)) as Arc<dyn EnrollmentStore>
    })
    .await;
    h.add_students([1]).await;
    h.add_course(10, "CS101", 3, 5, &[]).await;

    let job_id = h.submit(1, 10).await;
    h.drain(1).await;

    let job = h.job(&job_id).await;
    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.attempts, MAX_ATTEMPTS);
    let failure = job.failure.unwrap();
    assert_eq!(failure.kind, FailureKind::RetriesExhausted);
    assert!(failure.reason.starts_with("Gave up after 3 attempts"));

    let course = h.course(10).await;
    assert_eq!(course.current_enrollment, 0);
    assert_eq!(course.version, 0);

    // Manual retry gives a fresh budget
    let retried = h.queue.retry_failed(&job_id).await.unwrap();
    assert_eq!(retried.state, JobState::Waiting);
    assert_eq!(retried.attempts, 0);
}
