//! Byte transfer to a pre-authorized destination.
//!
//! [`HttpTransport`] streams the payload in chunks so `{loaded, total,
//! percentage}` progress can be reported as the transfer proceeds. Failure
//! signatures split into authentication problems (never retried) and
//! everything else (transient).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use pitchmedia_core::{ErrorClass, UploadProgress};

const CHUNK_SIZE: usize = 64 * 1024;

/// Progress callback for one transfer.
pub type UploadProgressFn = Arc<dyn Fn(UploadProgress) + Send + Sync>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransferError {
    /// Authentication/authorization signature on the transfer or the
    /// destination request. Not transient; aborts immediately.
    #[error("upload not authorized: {0}")]
    Unauthorized(String),

    /// A local precondition failed before any network activity.
    #[error("upload precondition failed: {0}")]
    Precondition(String),

    /// Recoverable failure: network error, 5xx, or an expired destination.
    #[error("transient upload failure: {0}")]
    Transient(String),

    /// The destination was already expired on receipt; the transfer was not
    /// attempted.
    #[error("upload destination expired before transfer")]
    Expired,
}

impl TransferError {
    pub fn class(&self) -> ErrorClass {
        match self {
            TransferError::Unauthorized(_) => ErrorClass::Unauthorized,
            TransferError::Precondition(_) => ErrorClass::Precondition,
            TransferError::Transient(_) | TransferError::Expired => ErrorClass::Transient,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class().is_recoverable()
    }
}

/// Transfers raw bytes to a pre-authorized URL.
#[async_trait]
pub trait ByteTransport: Send + Sync {
    async fn put(
        &self,
        url: &str,
        content_type: &str,
        body: Bytes,
        on_progress: &UploadProgressFn,
    ) -> Result<(), TransferError>;
}

/// Streaming PUT over reqwest.
#[derive(Clone, Debug, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ByteTransport for HttpTransport {
    async fn put(
        &self,
        url: &str,
        content_type: &str,
        body: Bytes,
        on_progress: &UploadProgressFn,
    ) -> Result<(), TransferError> {
        let total = body.len() as u64;
        let loaded = Arc::new(AtomicU64::new(0));

        let chunks: Vec<Bytes> = (0..body.len())
            .step_by(CHUNK_SIZE)
            .map(|start| body.slice(start..(start + CHUNK_SIZE).min(body.len())))
            .collect();

        let progress = on_progress.clone();
        let counter = loaded.clone();
        let stream = futures::stream::iter(chunks.into_iter().map(move |chunk| {
            let sent = counter.fetch_add(chunk.len() as u64, Ordering::SeqCst) + chunk.len() as u64;
            progress(UploadProgress::new(sent, total));
            Ok::<_, std::io::Error>(chunk)
        }));

        let response = self
            .client
            .put(url)
            // Content type must exactly match what the destination was
            // pre-authorized for.
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header(reqwest::header::CONTENT_LENGTH, total)
            .body(reqwest::Body::wrap_stream(stream))
            .send()
            .await
            .map_err(|e| TransferError::Transient(format!("transfer failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(TransferError::Unauthorized(format!(
                "destination rejected transfer with {status}"
            )));
        }
        if !status.is_success() {
            return Err(TransferError::Transient(format!(
                "destination returned {status}"
            )));
        }
        Ok(())
    }
}
