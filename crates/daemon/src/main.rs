//! Enrollment Engine - Main Entry Point
//!
//! Composition root: wires the SQLite adapters into the core use cases and
//! runs the worker pool, stall monitor, maintenance scheduler and JSON-RPC
//! server until Ctrl+C.

mod logging;
mod settings;
mod telemetry;

use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use enrollment_api_rpc::{RpcHandler, RpcServer, RpcServerConfig};
use enrollment_core::application::{
    shutdown_channel, spawn_workers, ConflictValidator, EnqueueSettings, EnrollmentProcessor,
    EnrollmentQueue, JobEvents, JobStatusTracker, MaintenanceScheduler, RecoveryService,
    RetryPolicy, Worker,
};
use enrollment_core::port::id_provider::UuidProvider;
use enrollment_core::port::time_provider::SystemTimeProvider;
use enrollment_core::port::{EnrollmentStore, JobQueue, TimeProvider};
use enrollment_infra_sqlite::{create_pool, run_migrations, SqliteEnrollmentStore, SqliteJobQueue};
use settings::Settings;

const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Grace period for in-flight jobs on shutdown
const WORKER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Configuration and logging
    let settings = Settings::load()?;
    let _log_guard = logging::init(&settings)?;
    let engine = settings.engine.clone();

    info!("Enrollment Engine v{} starting...", VERSION);

    // 2. Database
    let db_path = settings.database_path()?;
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create database directory {}", parent.display()))?;
    }
    info!(db_path = %db_path.display(), "Initializing database...");

    let pool = create_pool(&db_path.to_string_lossy())
        .await
        .context("DB pool creation failed")?;
    run_migrations(&pool).await.context("Migration failed")?;

    // 3. Dependency wiring
    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let job_queue: Arc<dyn JobQueue> = Arc::new(SqliteJobQueue::new(pool.clone()));
    let store: Arc<dyn EnrollmentStore> = Arc::new(SqliteEnrollmentStore::new(pool.clone()));
    let events = JobEvents::default();

    let processor = Arc::new(
        EnrollmentProcessor::new(
            store.clone(),
            ConflictValidator::new(engine.max_credits_per_term),
            time_provider.clone(),
        )
        .with_drop_retry(
            engine.max_attempts,
            RetryPolicy::new(engine.backoff_base_ms, engine.backoff_factor),
        ),
    );
    let retry_policy = Arc::new(RetryPolicy::new(engine.backoff_base_ms, engine.backoff_factor));
    let queue = Arc::new(EnrollmentQueue::new(
        job_queue.clone(),
        Arc::new(UuidProvider),
        time_provider.clone(),
        EnqueueSettings {
            max_attempts: engine.max_attempts,
            seconds_per_job: engine.seconds_per_job,
        },
    ));
    let status = Arc::new(JobStatusTracker::new(job_queue.clone(), events.clone()));
    let recovery = Arc::new(RecoveryService::new(
        job_queue.clone(),
        time_provider.clone(),
        events.clone(),
        engine.stall_timeout_ms,
    ));
    let maintenance = Arc::new(MaintenanceScheduler::new(
        job_queue.clone(),
        time_provider.clone(),
        engine.completed_retention_ms,
        engine.failed_retention_ms,
        engine.maintenance_interval(),
    ));

    // 4. Start-up recovery: claims left by a previous process are stale
    info!("Running crash recovery...");
    match recovery.recover_on_startup().await {
        Ok(count) => info!(recovered_jobs = count, "Crash recovery completed"),
        Err(e) => error!(error = %e, "Crash recovery failed"),
    }

    // 5. Worker pool
    let (shutdown_tx, shutdown) = shutdown_channel();
    let pid = std::process::id();
    let workers: Vec<Worker> = (1..=engine.worker_count)
        .map(|n| {
            Worker::new(
                format!("worker-{}-{}", pid, n),
                job_queue.clone(),
                processor.clone(),
                retry_policy.clone(),
                time_provider.clone(),
                events.clone(),
            )
        })
        .collect();
    info!(worker_count = workers.len(), "Starting workers...");
    let worker_handles = spawn_workers(workers, &shutdown);

    // 6. Stall monitor and maintenance
    let stall_monitor = tokio::spawn(
        recovery
            .clone()
            .run(engine.stall_check_interval(), shutdown.clone()),
    );
    let maintenance_task = tokio::spawn(maintenance.clone().run(shutdown.clone()));

    // 7. JSON-RPC server
    let rpc_server = RpcServer::new(
        RpcServerConfig {
            host: settings.rpc_host.clone(),
            port: settings.rpc_port,
        },
        RpcHandler::new(queue, processor, status, store, maintenance),
    );
    let (rpc_addr, rpc_handle) = rpc_server
        .start()
        .await
        .map_err(|e| anyhow!("RPC server start failed: {}", e))?;

    info!(rpc_addr = %rpc_addr, "System ready. Press Ctrl+C to shutdown");

    // 8. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    // 9. Graceful shutdown: stop intake first, then let in-flight jobs finish
    if let Err(e) = rpc_handle.stop() {
        warn!(error = %e, "RPC server already stopped");
    }
    shutdown_tx.shutdown();

    for handle in worker_handles {
        match tokio::time::timeout(WORKER_SHUTDOWN_TIMEOUT, handle).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => error!(error = %e, "Worker exited with error"),
            Ok(Err(e)) => error!(error = %e, "Worker task panicked"),
            Err(_) => warn!("Worker did not stop in time; its job will be reclaimed as stalled"),
        }
    }
    let _ = tokio::join!(stall_monitor, maintenance_task);
    pool.close().await;
    telemetry::shutdown();

    info!("Shutdown complete.");
    Ok(())
}
