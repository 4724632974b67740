//! HTTP client for the trust boundary plus the upload orchestrator.
//!
//! The trust boundary issues pre-authorized upload destinations and persists
//! video metadata; it is treated as an opaque collaborator behind the
//! [`TrustBoundary`] trait. Byte transfers go through [`ByteTransport`] so
//! retry behavior can be exercised without a network.

pub mod retry;
pub mod transport;
pub mod upload;

pub use retry::RetryPolicy;
pub use transport::{ByteTransport, HttpTransport, TransferError, UploadProgressFn};
pub use upload::UploadOrchestrator;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use pitchmedia_core::{UploadDestination, VideoMetadataRequest, VideoRecord};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Missing bearer token. A local precondition failure, not a network
    /// error.
    #[error("Missing auth token. Set PITCHMEDIA_API_TOKEN")]
    MissingToken,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("API request failed: {0}")]
    Request(String),

    #[error("API rejected the request: {0}")]
    Api(String),

    #[error("Failed to parse API response: {0}")]
    Decode(String),
}

/// Conventional success/error envelope used by the trust boundary. The
/// optional fields stay free of `serde(default)` so the derive places no
/// `Default` bound on `T`; absent fields deserialize to `None` regardless.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    pub message: Option<String>,
    pub data: Option<T>,
}

/// Operations the pipeline consumes from the trust boundary.
#[async_trait]
pub trait TrustBoundary: Send + Sync {
    /// `POST /upload-url`: obtain a fresh, time-limited upload destination.
    /// Called once per upload attempt; destinations are never reused.
    async fn request_upload_destination(
        &self,
        filename: &str,
        content_type: &str,
    ) -> Result<UploadDestination, ClientError>;

    /// `POST /pitch-sultan/videos`: persist the metadata record. This is the
    /// commit point of the pipeline.
    async fn save_video_metadata(
        &self,
        request: &VideoMetadataRequest,
    ) -> Result<VideoRecord, ClientError>;
}

/// Bearer-token HTTP client for the trust boundary.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    pub fn new(base_url: String, token: Option<String>) -> Result<Self, ClientError> {
        let token = match token {
            Some(t) if !t.trim().is_empty() => t,
            _ => return Err(ClientError::MissingToken),
        };
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ClientError::Request(format!("building HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Create a client from PITCHMEDIA_API_URL / PITCHMEDIA_API_TOKEN.
    pub fn from_env() -> Result<Self, ClientError> {
        let base_url = std::env::var("PITCHMEDIA_API_URL")
            .or_else(|_| std::env::var("API_URL"))
            .unwrap_or_else(|_| "http://localhost:3000".to_string());
        let token = std::env::var("PITCHMEDIA_API_TOKEN")
            .or_else(|_| std::env::var("JWT_TOKEN"))
            .ok();
        Self::new(base_url, token)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// POST a JSON body and unwrap the `{success, message, data}` envelope.
    async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let url = self.build_url(path);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .json(body)
            .send()
            .await
            .map_err(|e| ClientError::Request(format!("sending request: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            let text = response.text().await.unwrap_or_default();
            return Err(ClientError::Unauthorized(format!("{status}: {text}")));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ClientError::Request(format!("{status}: {text}")));
        }

        let envelope: ApiEnvelope<T> = response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;

        if !envelope.success {
            return Err(ClientError::Api(
                envelope
                    .message
                    .unwrap_or_else(|| "request was not successful".to_string()),
            ));
        }
        envelope
            .data
            .ok_or_else(|| ClientError::Decode("missing data in successful response".to_string()))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadUrlRequest<'a> {
    filename: &'a str,
    mime_type: &'a str,
}

#[async_trait]
impl TrustBoundary for ApiClient {
    async fn request_upload_destination(
        &self,
        filename: &str,
        content_type: &str,
    ) -> Result<UploadDestination, ClientError> {
        self.post_json(
            "/upload-url",
            &UploadUrlRequest {
                filename,
                mime_type: content_type,
            },
        )
        .await
    }

    async fn save_video_metadata(
        &self,
        request: &VideoMetadataRequest,
    ) -> Result<VideoRecord, ClientError> {
        self.post_json("/pitch-sultan/videos", request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_token_is_a_precondition_failure() {
        let err = ApiClient::new("http://localhost:3000".to_string(), None).unwrap_err();
        assert!(matches!(err, ClientError::MissingToken));
        let err = ApiClient::new("http://localhost:3000".to_string(), Some("  ".to_string()))
            .unwrap_err();
        assert!(matches!(err, ClientError::MissingToken));
    }

    #[test]
    fn base_url_is_normalized() {
        let client =
            ApiClient::new("http://api.example.com/".to_string(), Some("tok".to_string()))
                .unwrap();
        assert_eq!(client.base_url(), "http://api.example.com");
        assert_eq!(client.build_url("/upload-url"), "http://api.example.com/upload-url");
    }

    #[test]
    fn envelope_failure_carries_server_message() {
        // VideoRecord has no Default impl; decoding must not require one,
        // and absent optional fields come back as None.
        let raw = r#"{"success": false, "message": "quota exceeded"}"#;
        let envelope: ApiEnvelope<VideoRecord> = serde_json::from_str(raw).unwrap();
        assert!(!envelope.success);
        assert_eq!(envelope.message.as_deref(), Some("quota exceeded"));
        assert!(envelope.data.is_none());
    }

    #[test]
    fn envelope_success_carries_data() {
        let raw = r#"{
            "success": true,
            "message": null,
            "data": {"url": "https://storage.example.com/get/a.mp4", "fileName": "a.mp4", "title": "Pitch", "description": ""}
        }"#;
        let envelope: ApiEnvelope<VideoRecord> = serde_json::from_str(raw).unwrap();
        assert!(envelope.success);
        let record = envelope.data.unwrap();
        assert_eq!(record.file_name, "a.mp4");
        assert!(record.thumbnail_url.is_none());
    }
}
