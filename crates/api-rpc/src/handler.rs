//! RPC Method Handlers
//!
//! Thin adapters from wire types to the core use cases. No business rule is
//! evaluated here.

use crate::error::to_rpc_error;
use crate::types::{
    CancelParams, CancelResponse, CleanResponse, DropParams, DropResponse, PromotedEnrollment,
    RetryParams, RetryResponse, StatsResponse, StatusParams, StatusResponse, SubmitParams,
    SubmitResponse, WaitlistEntry, WaitlistParams, WaitlistResponse,
};
use enrollment_core::application::{
    EnrollmentProcessor, EnrollmentQueue, JobStatusTracker, MaintenanceScheduler, SubmitRequest,
};
use enrollment_core::domain::JobState;
use enrollment_core::port::EnrollmentStore;
use jsonrpsee::types::ErrorObjectOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Upper bound for `wait_ms` on status polls
const MAX_STATUS_WAIT: Duration = Duration::from_secs(30);

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    queue: Arc<EnrollmentQueue>,
    processor: Arc<EnrollmentProcessor>,
    status: Arc<JobStatusTracker>,
    store: Arc<dyn EnrollmentStore>,
    maintenance: Arc<MaintenanceScheduler>,
    start_time: Instant,
}

impl RpcHandler {
    pub fn new(
        queue: Arc<EnrollmentQueue>,
        processor: Arc<EnrollmentProcessor>,
        status: Arc<JobStatusTracker>,
        store: Arc<dyn EnrollmentStore>,
        maintenance: Arc<MaintenanceScheduler>,
    ) -> Self {
        Self {
            queue,
            processor,
            status,
            store,
            maintenance,
            start_time: Instant::now(),
        }
    }

    /// enrollment.submit.v1
    pub async fn submit(&self, params: SubmitParams) -> Result<SubmitResponse, ErrorObjectOwned> {
        let receipt = self
            .queue
            .submit(SubmitRequest {
                student_id: params.student_id,
                course_id: params.course_id,
                correlation_id: params.correlation_id,
            })
            .await
            .map_err(to_rpc_error)?;

        Ok(SubmitResponse {
            job_id: receipt.job_id,
            state: JobState::Waiting,
            enqueued_at: receipt.enqueued_at,
            estimated_wait_secs: receipt.estimated_wait_secs,
        })
    }

    /// enrollment.drop.v1
    pub async fn drop_enrollment(
        &self,
        params: DropParams,
    ) -> Result<DropResponse, ErrorObjectOwned> {
        let outcome = self
            .processor
            .drop_enrollment(params.enrollment_id, params.student_id)
            .await
            .map_err(to_rpc_error)?;

        Ok(DropResponse {
            enrollment_id: outcome.enrollment.id,
            status: outcome.enrollment.status,
            promoted: outcome.promoted.map(|e| PromotedEnrollment {
                enrollment_id: e.id,
                student_id: e.student_id,
            }),
        })
    }

    /// enrollment.status.v1
    pub async fn status(&self, params: StatusParams) -> Result<StatusResponse, ErrorObjectOwned> {
        let result = match params.wait_ms {
            Some(wait_ms) if wait_ms > 0 => {
                let timeout = Duration::from_millis(wait_ms).min(MAX_STATUS_WAIT);
                self.status.wait_for_terminal(&params.job_id, timeout).await
            }
            _ => self.status.get_status(&params.job_id).await,
        };
        result.map_err(to_rpc_error)
    }

    /// enrollment.cancel.v1
    pub async fn cancel(&self, params: CancelParams) -> Result<CancelResponse, ErrorObjectOwned> {
        self.queue
            .cancel(&params.job_id)
            .await
            .map_err(to_rpc_error)?;

        Ok(CancelResponse {
            job_id: params.job_id,
            cancelled: true,
        })
    }

    /// enrollment.waitlist.v1
    pub async fn waitlist(
        &self,
        params: WaitlistParams,
    ) -> Result<WaitlistResponse, ErrorObjectOwned> {
        let rows = self
            .store
            .waitlist(params.course_id)
            .await
            .map_err(to_rpc_error)?;

        Ok(WaitlistResponse {
            course_id: params.course_id,
            entries: rows.iter().filter_map(WaitlistEntry::from_enrollment).collect(),
        })
    }

    /// admin.stats.v1
    pub async fn stats(&self) -> Result<StatsResponse, ErrorObjectOwned> {
        let queue = self.queue.stats().await.map_err(to_rpc_error)?;
        Ok(StatsResponse {
            queue,
            uptime_seconds: self.start_time.elapsed().as_secs(),
        })
    }

    /// admin.retry.v1
    pub async fn retry(&self, params: RetryParams) -> Result<RetryResponse, ErrorObjectOwned> {
        let job = self
            .queue
            .retry_failed(&params.job_id)
            .await
            .map_err(to_rpc_error)?;

        Ok(RetryResponse {
            job_id: job.id,
            state: job.state,
        })
    }

    /// admin.clean.v1
    pub async fn clean(&self) -> Result<CleanResponse, ErrorObjectOwned> {
        self.maintenance.run_now().await.map_err(to_rpc_error)
    }
}
