use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Timestamp layout used in image ids, upload filenames and support request ids.
pub const KEY_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// A visitor who has entered their name at least once.
/// Keyed by display name in `users.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub first_seen: NaiveDateTime,
    pub last_seen: NaiveDateTime,
}

/// Metadata for one uploaded image, keyed by `{username}_{timestamp}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub username: String,
    pub filename: String,
    pub description: String,
    pub uploaded_at: NaiveDateTime,
    pub filepath: String,
}

/// A submitted support form, keyed by `req_{timestamp}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub subject: String,
    pub message: String,
    pub timestamp: NaiveDateTime,
    pub ip_address: Option<String>,
}

// ==================== Request Types ====================

#[derive(Debug, Deserialize)]
pub struct NameForm {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SupportForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct FrameRequest {
    pub image: Option<String>,
}

// ==================== Response Types ====================

/// Result of classifying one webcam frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameResponse {
    pub success: bool,
    pub face_detected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FrameResponse {
    pub fn detected(description: Option<String>) -> Self {
        Self {
            success: true,
            face_detected: true,
            message: Some("Face detected!".to_string()),
            description,
            error: None,
        }
    }

    pub fn searching() -> Self {
        Self {
            success: true,
            face_detected: false,
            message: Some("Looking for faces...".to_string()),
            description: None,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            face_detected: false,
            message: None,
            description: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: NaiveDateTime,
}
