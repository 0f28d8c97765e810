//! Enrollment Client Implementation

use crate::error::{Result, SdkError};
use crate::types::{
    CancelResponse, CleanResponse, DropRequest, DropResponse, JobRequest, JobStatus,
    RetryResponse, StatsResponse, StatusRequest, SubmitRequest, SubmitResponse, WaitlistRequest,
    WaitlistResponse,
};
use jsonrpsee::core::client::ClientT;
use jsonrpsee::core::params::ObjectParams;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::{Duration, Instant};

/// Server-side cap on a single long poll
const MAX_POLL_WAIT: Duration = Duration::from_secs(30);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(45);

/// Enrollment Engine Client
///
/// # Example
///
/// ```no_run
/// use enrollment_sdk::EnrollmentClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = EnrollmentClient::connect("http://127.0.0.1:9630").await?;
/// # Ok(())
/// # }
/// ```
pub struct EnrollmentClient {
    client: HttpClient,
}

/// Serialize a request struct as named JSON-RPC params
fn named_params<T: Serialize>(request: &T) -> Result<ObjectParams> {
    let mut params = ObjectParams::new();
    match serde_json::to_value(request)? {
        serde_json::Value::Object(fields) => {
            for (name, value) in fields {
                params.insert(&name, value)?;
            }
            Ok(params)
        }
        other => Err(SdkError::Other(format!(
            "Request must serialize to an object, got {}",
            other
        ))),
    }
}

impl EnrollmentClient {
    /// Connect to the daemon
    ///
    /// * `url` - RPC endpoint URL (e.g., `http://127.0.0.1:9630`)
    pub async fn connect(url: impl AsRef<str>) -> Result<Self> {
        let url = url.as_ref();

        let client = HttpClientBuilder::default()
            .request_timeout(REQUEST_TIMEOUT)
            .build(url)
            .map_err(|e| SdkError::Connection(format!("Failed to create client: {}", e)))?;

        Ok(Self { client })
    }

    async fn call<T: DeserializeOwned, P: Serialize>(&self, method: &str, request: &P) -> Result<T> {
        let params = named_params(request)?;
        Ok(self.client.request(method, params).await?)
    }

    /// Queue an enrollment request
    ///
    /// ```no_run
    /// # use enrollment_sdk::{EnrollmentClient, SubmitRequest};
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// # let client = EnrollmentClient::connect("http://127.0.0.1:9630").await?;
    /// let receipt = client.submit(SubmitRequest {
    ///     student_id: 1,
    ///     course_id: 10,
    ///     correlation_id: None,
    /// }).await?;
    ///
    /// println!("Job ID: {}", receipt.job_id);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn submit(&self, request: SubmitRequest) -> Result<SubmitResponse> {
        self.call("enrollment.submit.v1", &request).await
    }

    /// Drop an enrollment owned by `student_id`
    pub async fn drop_enrollment(&self, enrollment_id: i64, student_id: i64) -> Result<DropResponse> {
        self.call(
            "enrollment.drop.v1",
            &DropRequest {
                enrollment_id,
                student_id,
            },
        )
        .await
    }

    /// Current state of a job
    pub async fn status(&self, job_id: impl Into<String>) -> Result<JobStatus> {
        self.call(
            "enrollment.status.v1",
            &StatusRequest {
                job_id: job_id.into(),
                wait_ms: None,
            },
        )
        .await
    }

    /// Wait until a job completes or fails
    ///
    /// Issues long polls of at most 30s each until `timeout` elapses.
    ///
    /// ```no_run
    /// # use enrollment_sdk::EnrollmentClient;
    /// # use std::time::Duration;
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// # let client = EnrollmentClient::connect("http://127.0.0.1:9630").await?;
    /// let status = client.wait_for_terminal("job-123", Duration::from_secs(60)).await?;
    /// if let Some(outcome) = status.outcome {
    ///     println!("{:?}", outcome.status);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn wait_for_terminal(
        &self,
        job_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<JobStatus> {
        let job_id = job_id.into();
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let wait = remaining.min(MAX_POLL_WAIT);
            let status: JobStatus = self
                .call(
                    "enrollment.status.v1",
                    &StatusRequest {
                        job_id: job_id.clone(),
                        wait_ms: Some(wait.as_millis() as u64),
                    },
                )
                .await?;

            if status.state.is_terminal() {
                return Ok(status);
            }
            if remaining.is_zero() || Instant::now() >= deadline {
                return Err(SdkError::Timeout(job_id));
            }
        }
    }

    /// Cancel a job that no worker has claimed
    pub async fn cancel(&self, job_id: impl Into<String>) -> Result<CancelResponse> {
        self.call(
            "enrollment.cancel.v1",
            &JobRequest {
                job_id: job_id.into(),
            },
        )
        .await
    }

    /// Ordered waitlist of a course
    pub async fn waitlist(&self, course_id: i64) -> Result<WaitlistResponse> {
        self.call("enrollment.waitlist.v1", &WaitlistRequest { course_id })
            .await
    }

    /// Queue statistics
    pub async fn stats(&self) -> Result<StatsResponse> {
        Ok(self.client.request("admin.stats.v1", rpc_params![]).await?)
    }

    /// Move a failed job back to waiting
    pub async fn retry(&self, job_id: impl Into<String>) -> Result<RetryResponse> {
        self.call(
            "admin.retry.v1",
            &JobRequest {
                job_id: job_id.into(),
            },
        )
        .await
    }

    /// Purge expired completed and failed jobs
    pub async fn clean(&self) -> Result<CleanResponse> {
        Ok(self.client.request("admin.clean.v1", rpc_params![]).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonrpsee::core::traits::ToRpcParams;
    use tokio_test::assert_ok;

    #[test]
    fn test_named_params_are_an_object() {
        let params = assert_ok!(named_params(&JobRequest {
            job_id: "job-1".to_string(),
        }));
        let raw = assert_ok!(params.to_rpc_params()).unwrap();
        let value: serde_json::Value = serde_json::from_str(raw.get()).unwrap();
        assert_eq!(value, serde_json::json!({"job_id": "job-1"}));
    }
}
