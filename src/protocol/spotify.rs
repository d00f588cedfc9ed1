//! Spotify accounts service and Web API payloads.
//!
//! # Wire Format
//!
//! Token response of `POST /api/token`:
//! ```json
//! {
//!     "access_token": "BQC...",
//!     "token_type": "Bearer",
//!     "expires_in": 3600,
//!     "scope": "user-read-currently-playing user-read-playback-state",
//!     "refresh_token": "AQD..."
//! }
//! ```
//!
//! `refresh_token` is only present when exchanging an authorization code.
//!
//! Currently playing item of `GET /v1/me/player/currently-playing`:
//! ```json
//! {
//!     "is_playing": true,
//!     "currently_playing_type": "track",
//!     "item": {
//!         "name": "Song A",
//!         "artists": [{ "name": "Artist X" }],
//!         "album": { "images": [{ "url": "https://i.scdn.co/image/...", "width": 640, "height": 640 }] }
//!     }
//! }
//! ```
//!
//! When nothing is playing, the endpoint answers `204 No Content`.

use std::time::Duration;

use serde::Deserialize;
use serde_with::{serde_as, DefaultOnNull, DurationSeconds};
use url::Url;

use crate::tokens::{AccessToken, RefreshToken};

/// Response of the token endpoint.
///
/// Secrets redact themselves in `Debug` output.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Token {
    pub access_token: AccessToken,

    #[serde(default)]
    pub token_type: String,

    /// Lifetime of the access token. Not tracked: a new token is exchanged
    /// every cycle.
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    #[serde(default)]
    pub expires_in: Option<Duration>,

    #[serde(default)]
    pub scope: Option<String>,

    #[serde(default)]
    pub refresh_token: Option<RefreshToken>,
}

/// Playback snapshot of the current user.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct CurrentlyPlaying {
    #[serde(default)]
    pub is_playing: bool,

    /// `track`, `episode`, `ad` or `unknown`
    #[serde(default)]
    pub currently_playing_type: Option<String>,

    /// Absent during ads and private sessions.
    #[serde(default)]
    pub item: Option<Item>,
}

/// A track or podcast episode.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Item {
    pub name: String,

    /// Empty for episodes.
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub artists: Vec<Artist>,

    /// Absent for episodes.
    #[serde(default)]
    pub album: Option<Album>,

    /// Episode artwork.
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub images: Vec<Image>,

    /// Podcast of an episode.
    #[serde(default)]
    pub show: Option<Show>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Artist {
    pub name: String,
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Album {
    /// Ordered widest first.
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub images: Vec<Image>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Image {
    pub url: Url,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Show {
    pub name: String,
}

/// Error document of the accounts service, e.g.
/// `{"error": "invalid_grant", "error_description": "Refresh token revoked"}`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct AuthError {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}
