use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A pre-authorized, time-limited upload destination issued by the trust
/// boundary.
///
/// Single-use-intent: one destination is obtained per upload attempt and is
/// consumed by exactly one successful transfer or discarded. Destinations
/// from failed attempts are never reused.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadDestination {
    /// Pre-authorized transfer target (PUT).
    pub upload_url: String,
    /// Public URL of the object once the transfer completes.
    pub final_file_url: String,
    /// Expiry of the pre-authorization.
    pub expires_at: DateTime<Utc>,
}

impl UploadDestination {
    /// Defensive expiry check performed locally before attempting the
    /// transfer, rather than relying on the remote endpoint to reject a late
    /// PUT.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn destination(expires_at: DateTime<Utc>) -> UploadDestination {
        UploadDestination {
            upload_url: "https://storage.example.com/put/abc".to_string(),
            final_file_url: "https://storage.example.com/get/abc".to_string(),
            expires_at,
        }
    }

    #[test]
    fn expiry_boundary() {
        let now = Utc::now();
        assert!(destination(now - Duration::seconds(1)).is_expired(now));
        assert!(destination(now).is_expired(now));
        assert!(!destination(now + Duration::seconds(60)).is_expired(now));
    }
}
