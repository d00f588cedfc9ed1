//! What the user is listening to, and how that reads as a chat status.

use std::fmt;

use url::Url;

use crate::protocol::spotify::CurrentlyPlaying;

/// Separator between the track name and its artists.
pub const SEPARATOR: &str = " – ";

/// Playback state as read from the music service once per cycle.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq)]
pub enum PlaybackState {
    Playing {
        track: String,
        /// In the order the service lists them.
        artists: Vec<String>,
        /// Primary artwork: the first image the service lists.
        artwork: Option<Url>,
    },
    #[default]
    Idle,
}

impl PlaybackState {
    /// Derives the status text, using `idle` while nothing plays.
    ///
    /// # Examples
    ///
    /// ```rust
    /// let state = PlaybackState::Playing {
    ///     track: "Song A".into(),
    ///     artists: vec!["Artist X".into(), "Artist Y".into()],
    ///     artwork: None,
    /// };
    /// assert_eq!(state.status_text("idle"), "Song A – Artist X, Artist Y");
    /// ```
    #[must_use]
    pub fn status_text(&self, idle: &str) -> String {
        match self {
            Self::Playing { track, artists, .. } if artists.is_empty() => track.clone(),
            Self::Playing { track, artists, .. } => {
                format!("{track}{SEPARATOR}{}", artists.join(", "))
            }
            Self::Idle => idle.to_owned(),
        }
    }

    /// Artwork to show as the status icon, only while playing.
    #[must_use]
    pub fn artwork(&self) -> Option<&Url> {
        match self {
            Self::Playing { artwork, .. } => artwork.as_ref(),
            Self::Idle => None,
        }
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing { .. })
    }
}

/// Normalizes a currently-playing document.
///
/// Paused playback and items without metadata (ads, private sessions) are
/// [`PlaybackState::Idle`]. Episodes list their show as the artist.
impl From<CurrentlyPlaying> for PlaybackState {
    fn from(playing: CurrentlyPlaying) -> Self {
        if !playing.is_playing {
            return Self::Idle;
        }

        let Some(item) = playing.item else {
            return Self::Idle;
        };

        let mut artists: Vec<String> = item
            .artists
            .into_iter()
            .map(|artist| artist.name)
            .collect();
        if artists.is_empty() {
            artists.extend(item.show.map(|show| show.name));
        }

        let artwork = item
            .album
            .and_then(|album| album.images.into_iter().next())
            .or_else(|| item.images.into_iter().next())
            .map(|image| image.url);

        Self::Playing {
            track: item.name,
            artists,
            artwork,
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Playing { .. } => write!(f, "{}", self.status_text("")),
            Self::Idle => write!(f, "idle"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn currently_playing(body: &str) -> CurrentlyPlaying {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn joins_artists_in_order() {
        let state = PlaybackState::from(currently_playing(
            r#"{"is_playing": true, "item": {"name": "Song A",
                "artists": [{"name": "Artist X"}, {"name": "Artist Y"}],
                "album": {"images": []}}}"#,
        ));
        assert_eq!(state.status_text("idle"), "Song A – Artist X, Artist Y");
        assert_eq!(state.artwork(), None);
    }

    #[test]
    fn takes_first_album_image() {
        let state = PlaybackState::from(currently_playing(
            r#"{"is_playing": true, "item": {"name": "Song A",
                "artists": [{"name": "Artist X"}],
                "album": {"images": [{"url": "https://img/640"}, {"url": "https://img/64"}]}}}"#,
        ));
        assert_eq!(state.artwork().map(Url::as_str), Some("https://img/640"));
    }

    #[test]
    fn paused_playback_is_idle() {
        let state = PlaybackState::from(currently_playing(
            r#"{"is_playing": false, "item": {"name": "Song A", "artists": []}}"#,
        ));
        assert_eq!(state, PlaybackState::Idle);
        assert_eq!(state.status_text("⏹ Not playing"), "⏹ Not playing");
    }

    #[test]
    fn missing_item_is_idle() {
        let state = PlaybackState::from(currently_playing(r#"{"is_playing": true, "item": null}"#));
        assert!(!state.is_playing());
    }

    #[test]
    fn episode_uses_show_and_own_images() {
        let state = PlaybackState::from(currently_playing(
            r#"{"is_playing": true, "currently_playing_type": "episode", "item": {
                "name": "Episode 1", "show": {"name": "Pod"},
                "images": [{"url": "https://img/episode"}]}}"#,
        ));
        assert_eq!(state.status_text("idle"), "Episode 1 – Pod");
        assert_eq!(
            state.artwork().map(Url::as_str),
            Some("https://img/episode")
        );
    }
}
