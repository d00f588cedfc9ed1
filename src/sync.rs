//! Change detection between what plays and what the chat status shows.
//!
//! The [`Synchronizer`] compares a fresh [`PlaybackState`] against the
//! [`SyncState`] remembered from earlier cycles and only touches the chat
//! server when the derived status text differs. When it does, the status
//! icon is replaced first (if the artwork changed) so that viewers never see
//! new text next to a stale icon, then the status text is published.
//!
//! # Tracking policy
//!
//! Remote calls are best-effort. Whatever their outcome, the tracked
//! values are advanced to what was attempted:
//! * a failed icon replacement never blocks the status text
//! * a failed publish is not retried on the next tick, so a persistently
//!   failing call cannot mask further track changes
//!
//! Only a further change of the derived values triggers a new attempt.

use async_trait::async_trait;
use url::Url;

use crate::{error::Result, tokens::AccessToken, track::PlaybackState};

/// Where playback is read from.
#[async_trait]
pub trait Source: Send + Sync {
    /// Exchanges the long-lived credential for an access token.
    ///
    /// # Errors
    ///
    /// Fails when the exchange is rejected or the service is unreachable.
    /// The current cycle is abandoned in that case.
    async fn access_token(&self) -> Result<AccessToken>;

    /// Reads what is currently playing.
    ///
    /// Read failures are logged and reported as [`PlaybackState::Idle`] so
    /// that the loop stays alive; the next tick confirms or corrects it.
    async fn now_playing(&self, token: &AccessToken) -> PlaybackState;
}

/// Where presence is written to.
#[async_trait]
pub trait Presence: Send + Sync {
    /// Replaces the image of the custom emoji `emoji_name` with `artwork`.
    ///
    /// # Errors
    ///
    /// Fails when the artwork cannot be downloaded or the emoji cannot be
    /// looked up, deleted or created.
    async fn update_emoji(&self, artwork: &Url, emoji_name: &str) -> Result<()>;

    /// Sets the custom status to `text` with `emoji_name` as its icon.
    ///
    /// # Errors
    ///
    /// Fails when the chat server rejects the status or is unreachable.
    async fn publish_status(&self, text: &str, emoji_name: &str) -> Result<()>;
}

/// What was last sent to the chat server.
///
/// Lives as long as the process; a restart begins with nothing tracked so
/// that the first cycle always publishes.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq)]
pub struct SyncState {
    /// Status text last published, or attempted.
    pub last_status: Option<String>,
    /// Artwork last uploaded as the emoji image, or attempted.
    pub last_artwork: Option<Url>,
}

impl SyncState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets everything so that the next cycle publishes unconditionally.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Outcome of one reconciliation.
#[derive(Debug)]
pub enum Report {
    /// The derived status text matches what was published last.
    Unchanged,

    Changed {
        status: String,
        /// `None` when the artwork did not change or there is none.
        emoji: Option<Result<()>>,
        published: Result<()>,
    },
}

impl Report {
    #[must_use]
    pub fn is_changed(&self) -> bool {
        matches!(self, Self::Changed { .. })
    }

    /// Whether every remote call that was made succeeded.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        match self {
            Self::Unchanged => true,
            Self::Changed {
                emoji, published, ..
            } => published.is_ok() && emoji.as_ref().is_none_or(Result::is_ok),
        }
    }
}

/// Drives the emoji updater and status publisher on change.
#[derive(Debug)]
pub struct Synchronizer<P> {
    presence: P,
    emoji_name: String,
    idle_status: String,
}

impl<P> Synchronizer<P>
where
    P: Presence,
{
    pub fn new(presence: P, emoji_name: &str, idle_status: &str) -> Self {
        Self {
            presence,
            emoji_name: emoji_name.to_owned(),
            idle_status: idle_status.to_owned(),
        }
    }

    pub fn presence(&self) -> &P {
        &self.presence
    }

    /// Brings the chat status in line with `fresh`.
    ///
    /// Makes no remote calls when the derived status text is unchanged.
    pub async fn reconcile(&self, fresh: &PlaybackState, state: &mut SyncState) -> Report {
        let status = fresh.status_text(&self.idle_status);
        if state.last_status.as_deref() == Some(status.as_str()) {
            info!("track unchanged");
            return Report::Unchanged;
        }

        debug!("status changed: {:?} -> {status:?}", state.last_status);

        let mut emoji = None;
        if let Some(artwork) = fresh.artwork() {
            if state.last_artwork.as_ref() != Some(artwork) {
                let result = self.presence.update_emoji(artwork, &self.emoji_name).await;
                match &result {
                    Ok(()) => info!("emoji {} updated", self.emoji_name),
                    Err(e) => error!("emoji update failed: {e}"),
                }

                // Consumed even on failure; see the module documentation.
                state.last_artwork = Some(artwork.clone());
                emoji = Some(result);
            }
        }

        let published = self
            .presence
            .publish_status(&status, &self.emoji_name)
            .await;
        match &published {
            Ok(()) => info!("status updated: {status}"),
            Err(e) => error!("status update failed: {e}"),
        }

        // Consumed even on failure; see the module documentation.
        state.last_status = Some(status.clone());

        Report::Changed {
            status,
            emoji,
            published,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::error::Error;

    /// A call made against [`Recorder`].
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub(crate) enum Call {
        Emoji(String),
        Status(String),
    }

    /// Presence that records calls and fails on demand.
    #[derive(Debug, Default)]
    pub(crate) struct Recorder {
        pub calls: Mutex<Vec<Call>>,
        pub fail_emoji: bool,
        pub fail_status: bool,
    }

    impl Recorder {
        pub fn take(&self) -> Vec<Call> {
            std::mem::take(&mut *self.calls.lock().unwrap())
        }
    }

    #[async_trait]
    impl Presence for Recorder {
        async fn update_emoji(&self, artwork: &Url, _emoji_name: &str) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Emoji(artwork.to_string()));
            if self.fail_emoji {
                return Err(Error::unavailable("emoji upload failed"));
            }
            Ok(())
        }

        async fn publish_status(&self, text: &str, _emoji_name: &str) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Status(text.to_owned()));
            if self.fail_status {
                return Err(Error::unavailable("status publish failed"));
            }
            Ok(())
        }
    }

    pub(crate) fn playing(track: &str, artist: &str, artwork: Option<&str>) -> PlaybackState {
        PlaybackState::Playing {
            track: track.to_owned(),
            artists: vec![artist.to_owned()],
            artwork: artwork.map(|url| Url::parse(url).unwrap()),
        }
    }

    const IDLE: &str = "⏹ Not playing";
    const ART1: &str = "https://i.scdn.co/image/art1";
    const ART2: &str = "https://i.scdn.co/image/art2";

    fn synchronizer(presence: Recorder) -> Synchronizer<Recorder> {
        Synchronizer::new(presence, "spotik", IDLE)
    }

    #[tokio::test]
    async fn first_idle_cycle_publishes_idle_text_without_emoji() {
        let sync = synchronizer(Recorder::default());
        let mut state = SyncState::new();

        let report = sync.reconcile(&PlaybackState::Idle, &mut state).await;

        assert!(report.is_changed());
        assert_eq!(sync.presence().take(), vec![Call::Status(IDLE.into())]);
        assert_eq!(state.last_status.as_deref(), Some(IDLE));
        assert_eq!(state.last_artwork, None);
    }

    #[tokio::test]
    async fn same_state_twice_makes_no_second_call() {
        let sync = synchronizer(Recorder::default());
        let mut state = SyncState::new();
        let fresh = playing("Song A", "Artist X", Some(ART1));

        sync.reconcile(&fresh, &mut state).await;
        assert_eq!(
            sync.presence().take(),
            vec![
                Call::Emoji(ART1.into()),
                Call::Status("Song A – Artist X".into())
            ]
        );

        let report = sync.reconcile(&fresh, &mut state).await;
        assert!(!report.is_changed());
        assert!(sync.presence().take().is_empty());
    }

    #[tokio::test]
    async fn new_track_with_same_artwork_skips_emoji() {
        let sync = synchronizer(Recorder::default());
        let mut state = SyncState::new();

        sync.reconcile(&playing("Song A", "Artist X", Some(ART1)), &mut state)
            .await;
        sync.presence().take();

        sync.reconcile(&playing("Song B", "Artist X", Some(ART1)), &mut state)
            .await;
        assert_eq!(
            sync.presence().take(),
            vec![Call::Status("Song B – Artist X".into())]
        );
    }

    #[tokio::test]
    async fn new_artwork_updates_emoji_before_status() {
        let sync = synchronizer(Recorder::default());
        let mut state = SyncState::new();

        sync.reconcile(&playing("Song A", "Artist X", Some(ART1)), &mut state)
            .await;
        sync.presence().take();

        sync.reconcile(&playing("Song C", "Artist Z", Some(ART2)), &mut state)
            .await;
        assert_eq!(
            sync.presence().take(),
            vec![
                Call::Emoji(ART2.into()),
                Call::Status("Song C – Artist Z".into())
            ]
        );
        assert_eq!(state.last_artwork.as_ref().map(Url::as_str), Some(ART2));
    }

    #[tokio::test]
    async fn playing_to_idle_publishes_idle_text_once() {
        let sync = synchronizer(Recorder::default());
        let mut state = SyncState::new();

        sync.reconcile(&playing("Song A", "Artist X", Some(ART1)), &mut state)
            .await;
        sync.presence().take();

        sync.reconcile(&PlaybackState::Idle, &mut state).await;
        sync.reconcile(&PlaybackState::Idle, &mut state).await;
        assert_eq!(sync.presence().take(), vec![Call::Status(IDLE.into())]);

        // Idle has no artwork, so the icon stays and is not re-uploaded when
        // the same album resumes.
        assert_eq!(state.last_artwork.as_ref().map(Url::as_str), Some(ART1));
        sync.reconcile(&playing("Song A", "Artist X", Some(ART1)), &mut state)
            .await;
        assert_eq!(
            sync.presence().take(),
            vec![Call::Status("Song A – Artist X".into())]
        );
    }

    #[tokio::test]
    async fn emoji_failure_does_not_block_status() {
        let sync = synchronizer(Recorder {
            fail_emoji: true,
            ..Recorder::default()
        });
        let mut state = SyncState::new();

        let report = sync
            .reconcile(&playing("Song A", "Artist X", Some(ART1)), &mut state)
            .await;

        assert!(!report.is_ok());
        let Report::Changed {
            emoji, published, ..
        } = report
        else {
            panic!("expected a change");
        };
        assert!(emoji.is_some_and(|result| result.is_err()));
        assert!(published.is_ok());
        assert_eq!(state.last_artwork.as_ref().map(Url::as_str), Some(ART1));
    }

    #[tokio::test]
    async fn failed_publish_is_not_retried() {
        let sync = synchronizer(Recorder {
            fail_status: true,
            ..Recorder::default()
        });
        let mut state = SyncState::new();
        let fresh = playing("Song A", "Artist X", None);

        let report = sync.reconcile(&fresh, &mut state).await;
        assert!(!report.is_ok());
        assert_eq!(state.last_status.as_deref(), Some("Song A – Artist X"));

        let report = sync.reconcile(&fresh, &mut state).await;
        assert!(!report.is_changed());
        assert_eq!(
            sync.presence().take(),
            vec![Call::Status("Song A – Artist X".into())]
        );
    }

    #[tokio::test]
    async fn every_distinct_transition_publishes_exactly_once() {
        let sync = synchronizer(Recorder::default());
        let mut state = SyncState::new();
        let states = [
            PlaybackState::Idle,
            playing("Song A", "Artist X", None),
            playing("Song B", "Artist X", None),
            PlaybackState::Idle,
            playing("Song A", "Artist Y", None),
        ];

        for fresh in &states {
            sync.reconcile(fresh, &mut state).await;
        }

        let published: Vec<_> = sync
            .presence()
            .take()
            .into_iter()
            .filter(|call| matches!(call, Call::Status(_)))
            .collect();
        assert_eq!(published.len(), states.len());
        assert_eq!(published[4], Call::Status("Song A – Artist Y".into()));
    }

    #[tokio::test]
    async fn clearing_state_republishes() {
        let sync = synchronizer(Recorder::default());
        let mut state = SyncState::new();
        let fresh = playing("Song A", "Artist X", Some(ART1));

        sync.reconcile(&fresh, &mut state).await;
        sync.presence().take();

        state.clear();
        sync.reconcile(&fresh, &mut state).await;
        assert_eq!(sync.presence().take().len(), 2);
    }
}
