//! Spotify accounts service and Web API client.
//!
//! Provides the two reads every cycle starts with:
//! * [`Spotify::access_token`] exchanges the refresh token for a
//!   short-lived access token. Nothing is cached: every cycle exchanges
//!   again, so expiry never needs tracking.
//! * [`Spotify::now_playing`] reads the currently playing item and
//!   normalizes it into a [`PlaybackState`].
//!
//! It also implements the authorization-code exchange used once by the
//! authorization helper to obtain the refresh token.

use async_trait::async_trait;
use base64::prelude::*;
use reqwest::{
    header::{HeaderValue, AUTHORIZATION},
    StatusCode, Url,
};

use crate::{
    config::SpotifyConfig,
    error::{Error, ErrorKind, Result},
    http::{self, Client as HttpClient},
    protocol::{self, spotify},
    sync::Source,
    tokens::{AccessToken, RefreshToken},
    track::PlaybackState,
};

pub struct Spotify {
    http_client: HttpClient,
    config: SpotifyConfig,

    /// `Basic base64(client_id:client_secret)`, marked sensitive.
    client_auth: HeaderValue,
}

impl Spotify {
    /// Scopes requested during authorization.
    pub const SCOPES: &'static str = "user-read-currently-playing user-read-playback-state";

    /// # Errors
    ///
    /// Will return `Err` if the HTTP client cannot be built or the client
    /// credentials do not form a valid header.
    pub fn new(config: SpotifyConfig, user_agent: &str) -> Result<Self> {
        let credentials = format!("{}:{}", config.client_id, config.client_secret);
        let mut client_auth =
            HeaderValue::from_str(&format!("Basic {}", BASE64_STANDARD.encode(credentials)))?;
        client_auth.set_sensitive(true);

        Ok(Self {
            http_client: HttpClient::new(user_agent)?,
            config,
            client_auth,
        })
    }

    /// The consent page to send the user to.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the accounts URL cannot be a base URL.
    pub fn authorize_url(&self, redirect_uri: &Url) -> Result<Url> {
        let mut url = http::endpoint(&self.config.accounts_url, &["authorize"])?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", redirect_uri.as_str())
            .append_pair("scope", Self::SCOPES);
        Ok(url)
    }

    /// Exchanges the refresh token for a fresh access token.
    ///
    /// # Errors
    ///
    /// Will return `Err` if:
    /// - no refresh token is configured
    /// - the accounts service rejects the credentials
    /// - the HTTP request fails
    pub async fn access_token(&self) -> Result<AccessToken> {
        let refresh_token = self
            .config
            .refresh_token
            .as_ref()
            .ok_or_else(|| Error::failed_precondition("no refresh token configured"))?;

        let token = self
            .token(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
            ])
            .await?;

        debug!("access token acquired");
        Ok(token.access_token)
    }

    /// Exchanges an authorization code for a refresh token.
    ///
    /// `redirect_uri` must be the one the code was issued for.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the code is rejected, the HTTP request fails or
    /// the response carries no refresh token.
    pub async fn exchange_code(&self, code: &str, redirect_uri: &Url) -> Result<RefreshToken> {
        let token = self
            .token(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri.as_str()),
            ])
            .await?;

        token
            .refresh_token
            .ok_or_else(|| Error::data_loss("token response carries no refresh token"))
    }

    async fn token(&self, form: &[(&str, &str)]) -> Result<spotify::Token> {
        let url = http::endpoint(&self.config.accounts_url, &["api", "token"])?;
        let request = self
            .http_client
            .post(url)
            .header(AUTHORIZATION, self.client_auth.clone())
            .form(form);

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| Error::new(e.kind, format!("token exchange: {}", e.error)))?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            // The accounts service answers 400 `invalid_grant` for revoked
            // or mistyped refresh tokens and authorization codes.
            let mut error = Error::from_status("token exchange", status);
            if status == StatusCode::BAD_REQUEST {
                error.kind = ErrorKind::Unauthenticated;
            }
            if let Ok(details) = serde_json::from_str::<spotify::AuthError>(&body) {
                let description = details.error_description.unwrap_or_default();
                error = Error::new(
                    error.kind,
                    format!("{}: {} {description}", error.error, details.error)
                        .trim_end()
                        .to_owned(),
                );
            }
            return Err(error);
        }

        protocol::json(&body, "token")
    }

    /// Reads what is currently playing.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the HTTP request fails, the status is
    /// unsuccessful or the body cannot be decoded.
    pub async fn try_now_playing(&self, token: &AccessToken) -> Result<PlaybackState> {
        let mut url = http::endpoint(
            &self.config.api_url,
            &["v1", "me", "player", "currently-playing"],
        )?;
        url.query_pairs_mut()
            .append_pair("additional_types", "track,episode");
        let request = self.http_client.get(url).bearer_auth(token);

        let response = self.http_client.execute(request).await?;
        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(PlaybackState::Idle);
        }
        if !status.is_success() {
            return Err(Error::from_status("currently playing", status));
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(PlaybackState::Idle);
        }

        let playing: spotify::CurrentlyPlaying = protocol::json(&body, "currently playing")?;
        Ok(playing.into())
    }

    /// Reads what is currently playing, reporting failures as idle.
    pub async fn now_playing(&self, token: &AccessToken) -> PlaybackState {
        match self.try_now_playing(token).await {
            Ok(state) => {
                trace!("now playing: {state}");
                state
            }
            Err(e) => {
                error!("reading currently playing failed, assuming idle: {e}");
                PlaybackState::Idle
            }
        }
    }
}

#[async_trait]
impl Source for Spotify {
    async fn access_token(&self) -> Result<AccessToken> {
        Spotify::access_token(self).await
    }

    async fn now_playing(&self, token: &AccessToken) -> PlaybackState {
        Spotify::now_playing(self, token).await
    }
}
