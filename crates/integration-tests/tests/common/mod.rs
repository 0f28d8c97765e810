//! Shared fixture: file-backed SQLite database with the full service graph
#![allow(dead_code)]

use async_trait::async_trait;
use enrollment_core::application::{
    ConflictValidator, EnqueueSettings, EnrollmentProcessor, EnrollmentQueue, JobEvents,
    JobStatusTracker, RecoveryService, RetryPolicy, SubmitRequest, Worker,
};
use enrollment_core::domain::{
    CourseId, CourseOffering, CourseStatus, Enrollment, EnrollmentId, EnrollmentJob, JobState,
    StudentId, TimeSlot,
};
use enrollment_core::error::{AppError, Result};
use enrollment_core::port::id_provider::UuidProvider;
use enrollment_core::port::time_provider::SystemTimeProvider;
use enrollment_core::port::{EnrollmentStore, EnrollmentTransaction, JobQueue, TimeProvider};
use enrollment_infra_sqlite::{
    create_pool, run_migrations, SqliteCatalog, SqliteEnrollmentStore, SqliteJobQueue,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const TERM: &str = "2026-FALL";
pub const MAX_CREDITS: i32 = 18;
pub const MAX_ATTEMPTS: i32 = 3;
/// Short backoff so retried jobs come back quickly
pub const BACKOFF_BASE_MS: i64 = 10;
const DRAIN_TIMEOUT: Duration = Duration::from_secs(20);

pub struct Harness {
    pub catalog: SqliteCatalog,
    pub job_queue: Arc<dyn JobQueue>,
    pub store: Arc<dyn EnrollmentStore>,
    pub queue: Arc<EnrollmentQueue>,
    pub processor: Arc<EnrollmentProcessor>,
    pub status: Arc<JobStatusTracker>,
    pub events: JobEvents,
    pub time: Arc<dyn TimeProvider>,
    db_path: PathBuf,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_store(|store| store).await
    }

    /// Build the harness with a wrapped enrollment store (fault injection)
    pub async fn with_store(
        wrap: impl FnOnce(Arc<dyn EnrollmentStore>) -> Arc<dyn EnrollmentStore>,
    ) -> Self {
        let db_path =
            std::env::temp_dir().join(format!("enrollment-it-{}.db", uuid::Uuid::new_v4()));
        let pool = create_pool(&db_path.to_string_lossy()).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let time: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
        let catalog = SqliteCatalog::new(pool.clone(), time.clone());
        let job_queue: Arc<dyn JobQueue> = Arc::new(SqliteJobQueue::new(pool.clone()));
        let store = wrap(Arc::new(SqliteEnrollmentStore::new(pool)));
        let events = JobEvents::default();

        let processor = Arc::new(
            EnrollmentProcessor::new(store.clone(), ConflictValidator::new(MAX_CREDITS), time.clone())
                .with_drop_retry(MAX_ATTEMPTS, RetryPolicy::new(BACKOFF_BASE_MS, 2.0)),
        );
        let queue = Arc::new(EnrollmentQueue::new(
            job_queue.clone(),
            Arc::new(UuidProvider),
            time.clone(),
            EnqueueSettings {
                max_attempts: MAX_ATTEMPTS,
                seconds_per_job: 1,
            },
        ));
        let status = Arc::new(JobStatusTracker::new(job_queue.clone(), events.clone()));

        Self {
            catalog,
            job_queue,
            store,
            queue,
            processor,
            status,
            events,
            time,
            db_path,
        }
    }

    pub fn worker(&self, id: &str) -> Worker {
        Worker::new(
            id,
            self.job_queue.clone(),
            self.processor.clone(),
            Arc::new(RetryPolicy::new(BACKOFF_BASE_MS, 2.0)),
            self.time.clone(),
            self.events.clone(),
        )
    }

    pub fn recovery(&self, stall_timeout_ms: i64) -> RecoveryService {
        RecoveryService::new(
            self.job_queue.clone(),
            self.time.clone(),
            self.events.clone(),
            stall_timeout_ms,
        )
    }

    pub async fn add_students(&self, ids: impl IntoIterator<Item = StudentId>) {
        for id in ids {
            self.catalog
                .add_student(id, &format!("student-{}", id))
                .await
                .unwrap();
        }
    }

    /// Add an active course; slots are `(day, start, end)` triples
    pub async fn add_course(
        &self,
        id: CourseId,
        code: &str,
        credits: i32,
        capacity: i32,
        slots: &[(&str, &str, &str)],
    ) {
        let course = CourseOffering {
            id,
            code: code.to_string(),
            title: format!("{} title", code),
            term: TERM.to_string(),
            credits,
            max_capacity: capacity,
            current_enrollment: 0,
            version: 0,
            status: CourseStatus::Active,
            prerequisites: vec![],
            time_slots: slots
                .iter()
                .map(|(day, start, end)| TimeSlot::parse(day, start, end).unwrap())
                .collect(),
        };
        self.catalog.upsert_course(&course).await.unwrap();
    }

    pub async fn course(&self, id: CourseId) -> CourseOffering {
        self.catalog.get_course(id).await.unwrap().unwrap()
    }

    pub async fn submit(&self, student_id: StudentId, course_id: CourseId) -> String {
        self.queue
            .submit(SubmitRequest {
                student_id,
                course_id,
                correlation_id: None,
            })
            .await
            .unwrap()
            .job_id
    }

    pub async fn job(&self, job_id: &str) -> EnrollmentJob {
        self.job_queue.find_by_id(job_id).await.unwrap().unwrap()
    }

    pub async fn enrollment(&self, id: EnrollmentId) -> Enrollment {
        self.store.find_enrollment(id).await.unwrap().unwrap()
    }

    async fn unfinished(&self) -> i64 {
        let mut total = 0;
        for state in [JobState::Waiting, JobState::Active, JobState::Stalled] {
            total += self.job_queue.count_by_state(state).await.unwrap();
        }
        total
    }

    /// Run `workers` workers concurrently until no job is left unfinished
    pub async fn drain(&self, workers: usize) {
        let workers: Vec<Worker> = (0..workers)
            .map(|n| self.worker(&format!("it-worker-{}", n)))
            .collect();
        let deadline = Instant::now() + DRAIN_TIMEOUT;

        futures::future::join_all(workers.iter().map(|worker| async move {
            loop {
                assert!(Instant::now() < deadline, "queue did not drain in time");
                match worker.process_next_job().await {
                    Ok(true) => {}
                    Ok(false) | Err(_) => {
                        if self.unfinished().await == 0 {
                            break;
                        }
                        tokio::time::sleep(Duration::from_millis(5)).await;
                    }
                }
            }
        }))
        .await;
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut path = self.db_path.clone().into_os_string();
            path.push(suffix);
            std::fs::remove_file(path).ok();
        }
    }
}

/// Store whose first `failures` calls to `begin` fail with a database error
pub struct FlakyStore {
    inner: Arc<dyn EnrollmentStore>,
    remaining_failures: AtomicUsize,
    pub begins: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: Arc<dyn EnrollmentStore>, failures: usize) -> Self {
        Self {
            inner,
            remaining_failures: AtomicUsize::new(failures),
            begins: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl EnrollmentStore for FlakyStore {
    async fn begin(&self) -> Result<Box<dyn EnrollmentTransaction>> {
        self.begins.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(AppError::Database("database is locked".to_string()));
        }
        self.inner.begin().await
    }

    async fn waitlist(&self, course_id: CourseId) -> Result<Vec<Enrollment>> {
        self.inner.waitlist(course_id).await
    }

    async fn find_enrollment(&self, id: EnrollmentId) -> Result<Option<Enrollment>> {
        self.inner.find_enrollment(id).await
    }
}
