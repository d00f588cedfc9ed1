use std::time::Duration;

use url::Url;

use crate::{
    error::{Error, Result},
    tokens::{ChatToken, ClientSecret, RefreshToken},
};

/// Whether a new cycle may start while the previous one is still running.
#[derive(Copy, Clone, Debug, Default, Hash, PartialEq, Eq)]
pub enum Overlap {
    /// Fire every tick regardless of cycles in flight.
    #[default]
    Allow,
    /// Skip a tick while the previous cycle has not finished.
    Skip,
}

/// Spotify application credentials and endpoints.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: ClientSecret,

    /// Absent for the authorization helper, which is how it is obtained.
    pub refresh_token: Option<RefreshToken>,

    pub accounts_url: Url,
    pub api_url: Url,
}

impl SpotifyConfig {
    pub const ACCOUNTS_URL: &'static str = "https://accounts.spotify.com";
    pub const API_URL: &'static str = "https://api.spotify.com";

    /// Creates a configuration against the public Spotify endpoints.
    ///
    /// # Errors
    ///
    /// Will return `Err` if `client_id` is empty.
    pub fn new(client_id: &str, client_secret: ClientSecret) -> Result<Self> {
        let client_id = client_id.trim();
        if client_id.is_empty() {
            return Err(Error::invalid_argument("client id must not be empty"));
        }

        Ok(Self {
            client_id: client_id.to_owned(),
            client_secret,
            refresh_token: None,
            accounts_url: Url::parse(Self::ACCOUNTS_URL)?,
            api_url: Url::parse(Self::API_URL)?,
        })
    }
}

/// Chat server endpoint and the user whose custom status is mirrored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MattermostConfig {
    pub server_url: Url,
    pub user_id: String,
    pub token: ChatToken,
    pub emoji_name: String,
}

impl MattermostConfig {
    pub const DEFAULT_EMOJI_NAME: &'static str = "spotik";

    /// # Errors
    ///
    /// Will return `Err` if the user id is empty or the emoji name contains
    /// characters other than lowercase letters, digits, `-`, `_` and `+`.
    pub fn new(server_url: Url, user_id: &str, token: ChatToken, emoji_name: &str) -> Result<Self> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(Error::invalid_argument("chat user id must not be empty"));
        }

        let valid_char = |chr: char| {
            chr.is_ascii_lowercase() || chr.is_ascii_digit() || matches!(chr, '-' | '_' | '+')
        };
        if emoji_name.is_empty() || !emoji_name.chars().all(valid_char) {
            return Err(Error::invalid_argument(format!(
                "emoji name \"{emoji_name}\" is invalid"
            )));
        }

        Ok(Self {
            server_url,
            user_id: user_id.to_owned(),
            token,
            emoji_name: emoji_name.to_owned(),
        })
    }
}

/// Settings of the live-sync process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub app_name: String,
    pub app_version: String,
    pub user_agent: String,

    pub spotify: SpotifyConfig,
    pub mattermost: MattermostConfig,

    /// Status text published while nothing is playing.
    pub idle_status: String,

    pub interval: Duration,
    pub overlap: Overlap,
}

impl Config {
    pub const DEFAULT_IDLE_STATUS: &'static str = "⏹ Not playing";
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

    /// # Errors
    ///
    /// Will return `Err` if no valid `User-Agent` can be built.
    pub fn new(spotify: SpotifyConfig, mattermost: MattermostConfig) -> Result<Self> {
        Ok(Self {
            app_name: env!("CARGO_PKG_NAME").to_owned(),
            app_version: env!("CARGO_PKG_VERSION").to_owned(),
            user_agent: user_agent()?,
            spotify,
            mattermost,
            idle_status: Self::DEFAULT_IDLE_STATUS.to_owned(),
            interval: Self::DEFAULT_INTERVAL,
            overlap: Overlap::default(),
        })
    }

    /// # Errors
    ///
    /// Will return `Err` if the interval is shorter than one second.
    pub fn with_interval(mut self, interval: Duration) -> Result<Self> {
        if interval < Duration::from_secs(1) {
            return Err(Error::invalid_argument(format!(
                "poll interval must be at least one second, not {interval:?}"
            )));
        }

        self.interval = interval;
        Ok(self)
    }

    /// # Errors
    ///
    /// Will return `Err` if the text is blank.
    pub fn with_idle_status(mut self, text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Err(Error::invalid_argument("idle status must not be blank"));
        }

        text.clone_into(&mut self.idle_status);
        Ok(self)
    }
}

/// Builds the `User-Agent` sent with every request.
///
/// Format: `spotimost/0.1.0 (Rust; linux/6.8)`
///
/// # Errors
///
/// Will return `Err` if the application name, version, OS name or OS version
/// would produce a malformed product token.
pub fn user_agent() -> Result<String> {
    let app_name = env!("CARGO_PKG_NAME");
    let app_version = env!("CARGO_PKG_VERSION");

    // Additional `User-Agent` string checks on top of `reqwest::HeaderValue`.
    let illegal_chars = |chr| chr == '/' || chr == ';';
    if app_name.is_empty()
        || app_name.contains(illegal_chars)
        || app_version.is_empty()
        || app_version.contains(illegal_chars)
    {
        return Err(Error::internal(format!(
            "application name and/or version invalid (\"{app_name}\"; \"{app_version}\")"
        )));
    }

    let os_name = match std::env::consts::OS {
        "macos" => "osx",
        other => other,
    };
    let os_version = sysinfo::System::os_version()
        .filter(|version| !version.is_empty() && !version.contains(illegal_chars))
        .unwrap_or_else(|| String::from("0"));
    if os_name.is_empty() || os_name.contains(illegal_chars) {
        return Err(Error::internal(format!("os name invalid (\"{os_name}\")")));
    }

    let user_agent = format!("{app_name}/{app_version} (Rust; {os_name}/{os_version})");
    trace!("user agent: {user_agent}");

    Ok(user_agent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn mattermost() -> MattermostConfig {
        MattermostConfig::new(
            Url::parse("https://chat.example.com").unwrap(),
            "u1",
            "chat-token".parse().unwrap(),
            MattermostConfig::DEFAULT_EMOJI_NAME,
        )
        .unwrap()
    }

    fn spotify() -> SpotifyConfig {
        SpotifyConfig::new("client", "secret".parse().unwrap()).unwrap()
    }

    #[test]
    fn defaults_follow_reference_deployment() {
        let config = Config::new(spotify(), mattermost()).unwrap();
        assert_eq!(config.interval, Duration::from_secs(5));
        assert_eq!(config.overlap, Overlap::Allow);
        assert_eq!(config.idle_status, "⏹ Not playing");
        assert_eq!(config.mattermost.emoji_name, "spotik");
        assert_eq!(
            config.spotify.accounts_url.as_str(),
            "https://accounts.spotify.com/"
        );
    }

    #[test]
    fn rejects_sub_second_interval() {
        let err = Config::new(spotify(), mattermost())
            .unwrap()
            .with_interval(Duration::from_millis(200))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
    }

    #[test]
    fn rejects_invalid_emoji_names() {
        for name in ["", "Spotik", "spo tik", "spo:tik"] {
            let result = MattermostConfig::new(
                Url::parse("https://chat.example.com").unwrap(),
                "u1",
                "chat-token".parse().unwrap(),
                name,
            );
            assert!(result.is_err(), "{name:?} should be rejected");
        }
    }

    #[test]
    fn user_agent_names_crate_and_os() {
        let user_agent = user_agent().unwrap();
        assert!(user_agent.starts_with("spotimost/"), "{user_agent}");
        assert!(user_agent.contains("(Rust; "), "{user_agent}");
    }
}
