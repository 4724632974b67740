use serde::{Deserialize, Serialize};

/// What the user is submitting: descriptive fields plus the file identity.
#[derive(Debug, Clone)]
pub struct VideoSubmission {
    pub sec_user_id: String,
    pub title: String,
    pub description: String,
    pub file_name: String,
    pub content_type: String,
    pub tags: Vec<String>,
}

/// Measured attributes of the input file, fed to the validation gate. These
/// come from upstream (the player/UI already knows them) or from a probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoAttributes {
    pub file_size: u64,
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
}

impl VideoAttributes {
    pub fn is_portrait(&self) -> bool {
        self.height > self.width
    }
}

/// Stream information parsed from the transcoder's analysis output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaProbe {
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
}

/// Body of the metadata-persist call, the commit step, sent only after the
/// video transfer has succeeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadataRequest {
    pub sec_user_id: String,
    pub url: String,
    pub file_name: String,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    pub tags: Vec<String>,
}

/// The persisted metadata record returned by the trust boundary. Its absence
/// after a crash means nothing happened: no partial or duplicate state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    pub url: String,
    pub file_name: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn portrait_check() {
        let portrait = VideoAttributes {
            file_size: 1,
            duration_secs: 10.0,
            width: 720,
            height: 1280,
        };
        let landscape = VideoAttributes {
            width: 1280,
            height: 720,
            ..portrait
        };
        let square = VideoAttributes {
            width: 720,
            height: 720,
            ..portrait
        };
        assert!(portrait.is_portrait());
        assert!(!landscape.is_portrait());
        assert!(!square.is_portrait());
    }

    #[test]
    fn metadata_request_omits_absent_optionals() {
        let req = VideoMetadataRequest {
            sec_user_id: "u-1".to_string(),
            url: "https://storage.example.com/get/a.mp4".to_string(),
            file_name: "a.mp4".to_string(),
            title: "Pitch".to_string(),
            description: "".to_string(),
            file_size: None,
            thumbnail_url: None,
            tags: vec![],
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("fileSize").is_none());
        assert!(json.get("thumbnailUrl").is_none());
        assert_eq!(json["secUserId"], "u-1");
    }
}
