//! Mattermost REST API v4 payloads.
//!
//! # Wire Format
//!
//! Custom status (`PUT /api/v4/users/{user_id}/status/custom`):
//! ```json
//! { "emoji": "spotik", "text": "Song A – Artist X" }
//! ```
//!
//! Custom emoji (`GET /api/v4/emoji/name/{name}`):
//! ```json
//! { "id": "emoji-id", "name": "spotik", "creator_id": "user-id", "create_at": 1700000000000 }
//! ```
//!
//! Emoji creation (`POST /api/v4/emoji`) is a multipart form with an `emoji`
//! part holding [`NewEmoji`] as JSON and an `image` part with the picture.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CustomStatus<'a> {
    pub emoji: &'a str,
    pub text: &'a str,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Emoji {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub creator_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NewEmoji<'a> {
    pub name: &'a str,
    pub creator_id: &'a str,
}

/// Error document returned with unsuccessful statuses.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct AppError {
    #[serde(default)]
    pub id: String,
    pub message: String,
    #[serde(default)]
    pub status_code: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_status_serializes_emoji_and_text() {
        let status = CustomStatus {
            emoji: "spotik",
            text: "Song A – Artist X",
        };
        assert_eq!(
            serde_json::to_string(&status).unwrap(),
            r#"{"emoji":"spotik","text":"Song A – Artist X"}"#
        );
    }

    #[test]
    fn parses_app_error() {
        let body = r#"{"id": "api.emoji.get_by_name.app_error", "message": "Emoji not found", "detailed_error": "", "request_id": "r", "status_code": 404}"#;
        let error: AppError = serde_json::from_str(body).unwrap();
        assert_eq!(error.message, "Emoji not found");
        assert_eq!(error.status_code, 404);
    }
}
