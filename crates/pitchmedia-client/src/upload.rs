//! Upload orchestration.
//!
//! Each attempt obtains a fresh destination from the trust boundary (expired
//! or consumed destinations are never reused), checks expiry defensively
//! before transferring, streams the bytes with progress callbacks, and backs
//! off exponentially on transient failures. Authentication failures abort
//! immediately.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;

use crate::retry::RetryPolicy;
use crate::transport::{ByteTransport, TransferError, UploadProgressFn};
use crate::{ClientError, TrustBoundary};

pub struct UploadOrchestrator {
    boundary: Arc<dyn TrustBoundary>,
    transport: Arc<dyn ByteTransport>,
    policy: RetryPolicy,
}

impl UploadOrchestrator {
    pub fn new(
        boundary: Arc<dyn TrustBoundary>,
        transport: Arc<dyn ByteTransport>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            boundary,
            transport,
            policy,
        }
    }

    /// Transfer `data` to remote storage and return the final resource URL.
    ///
    /// No local state is retained across calls; a retried upload simply
    /// requests a new destination and transfers again.
    pub async fn upload_with_retry(
        &self,
        data: Bytes,
        filename: &str,
        content_type: &str,
        on_progress: &UploadProgressFn,
    ) -> Result<String, TransferError> {
        let mut last_error = TransferError::Transient("upload was never attempted".to_string());

        for attempt in 0..self.policy.total_attempts() {
            match self
                .attempt_once(data.clone(), filename, content_type, on_progress)
                .await
            {
                Ok(final_url) => {
                    tracing::info!(file = %filename, attempt, url = %final_url, "upload complete");
                    return Ok(final_url);
                }
                Err(error) => {
                    if !self.policy.should_retry(&error, attempt) {
                        if error.is_retryable() {
                            tracing::warn!(
                                file = %filename,
                                attempt,
                                error = %error,
                                "upload failed, retry budget exhausted"
                            );
                        } else {
                            tracing::error!(
                                file = %filename,
                                attempt,
                                error = %error,
                                "upload failed with non-retryable error"
                            );
                        }
                        return Err(error);
                    }
                    let delay = self.policy.delay_after(attempt);
                    tracing::warn!(
                        file = %filename,
                        attempt,
                        error = %error,
                        delay_ms = delay.as_millis() as u64,
                        "upload attempt failed, backing off"
                    );
                    last_error = error;
                    tokio::time::sleep(delay).await;
                }
            }
        }
        Err(last_error)
    }

    async fn attempt_once(
        &self,
        data: Bytes,
        filename: &str,
        content_type: &str,
        on_progress: &UploadProgressFn,
    ) -> Result<String, TransferError> {
        // Fresh destination per attempt: they are time-limited and the
        // boundary may invalidate them after one use.
        let destination = self
            .boundary
            .request_upload_destination(filename, content_type)
            .await
            .map_err(classify_client_error)?;

        // Defensive expiry check: do not rely on the remote endpoint to
        // reject a late transfer.
        if destination.is_expired(Utc::now()) {
            tracing::warn!(
                file = %filename,
                expires_at = %destination.expires_at,
                "destination expired on receipt, skipping transfer"
            );
            return Err(TransferError::Expired);
        }

        self.transport
            .put(&destination.upload_url, content_type, data, on_progress)
            .await?;

        Ok(destination.final_file_url)
    }
}

fn classify_client_error(error: ClientError) -> TransferError {
    match error {
        ClientError::MissingToken => TransferError::Precondition(error.to_string()),
        ClientError::Unauthorized(msg) => TransferError::Unauthorized(msg),
        other => TransferError::Transient(other.to_string()),
    }
}
