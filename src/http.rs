//! HTTP client with rate limiting shared by all remote calls.
//!
//! This module provides a wrapper around `reqwest::Client` that adds:
//! * Request rate limiting so that overlapping cycles cannot flood the
//!   Spotify or Mattermost APIs
//! * A consistent `User-Agent`, keep-alive and read timeout
//!
//! # Example
//!
//! ```rust
//! use spotimost::http::Client;
//!
//! let client = Client::new(&user_agent)?;
//! let request = client.request(Method::GET, url).bearer_auth(token);
//! let response = client.execute(request).await?;
//! ```

use std::{future::Future, num::NonZeroU32, time::Duration};

use futures_util::FutureExt;
use governor::{DefaultDirectRateLimiter, Quota};
use reqwest::{Method, RequestBuilder, Url};

use crate::error::{Error, Result};

/// HTTP client with built-in rate limiting.
pub struct Client {
    /// Unlimited request client.
    ///
    /// Direct access to underlying client without rate limiting.
    pub unlimited: reqwest::Client,

    rate_limiter: DefaultDirectRateLimiter,
}

impl Client {
    /// Rolling window for the rate limit.
    const RATE_LIMIT_INTERVAL: Duration = Duration::from_secs(1);

    /// Maximum calls per interval. Mattermost's default server-side limit
    /// is 10 requests per second per user.
    const RATE_LIMIT_CALLS_PER_INTERVAL: u8 = 10;

    /// Duration to keep idle connections alive between cycles.
    const KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Duration to wait for individual network reads.
    ///
    /// Keeps a stalled request from holding a cycle much longer than the
    /// polling interval.
    const READ_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// Returns error if the TLS backend cannot be initialized or the user
    /// agent is not a valid header value.
    ///
    /// # Panics
    ///
    /// Panics if rate limit parameters are zero.
    pub fn new(user_agent: &str) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .tcp_keepalive(Self::KEEPALIVE_TIMEOUT)
            .read_timeout(Self::READ_TIMEOUT)
            .user_agent(user_agent);

        let replenish_interval =
            Self::RATE_LIMIT_INTERVAL / u32::from(Self::RATE_LIMIT_CALLS_PER_INTERVAL);
        let quota = Quota::with_period(replenish_interval)
            .expect("quota time interval is zero")
            .allow_burst(
                NonZeroU32::new(Self::RATE_LIMIT_CALLS_PER_INTERVAL.into())
                    .expect("calls per interval is zero"),
            );

        Ok(Self {
            unlimited: http_client.build()?,
            rate_limiter: governor::RateLimiter::direct(quota),
        })
    }

    /// Starts building a request with specified method and URL.
    ///
    /// Execute it with [`Client::execute`] to go through the rate limiter.
    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.unlimited.request(method, url)
    }

    /// Starts building a GET request.
    pub fn get(&self, url: Url) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    /// Starts building a POST request.
    pub fn post(&self, url: Url) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    /// Starts building a PUT request.
    pub fn put(&self, url: Url) -> RequestBuilder {
        self.request(Method::PUT, url)
    }

    /// Starts building a DELETE request.
    pub fn delete(&self, url: Url) -> RequestBuilder {
        self.request(Method::DELETE, url)
    }

    /// Executes a request with rate limiting.
    ///
    /// Only transport failures are errors: unsuccessful HTTP statuses are
    /// returned as responses for the caller to interpret.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// * The request cannot be built
    /// * A network error occurs
    pub fn execute(
        &self,
        request: RequestBuilder,
    ) -> impl Future<Output = Result<reqwest::Response>> + '_ {
        let request = request.build();
        let throttle = self.rate_limiter.until_ready();
        throttle.then(move |()| async move {
            let request = request?;
            trace!("{} {}", request.method(), request.url());
            let response = self.unlimited.execute(request).await?;
            Ok::<_, Error>(response)
        })
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}

/// Appends path segments to a base URL.
///
/// Segments are percent-encoded and any path of `base` is kept, so that
/// servers hosted under a subpath work.
///
/// # Errors
///
/// Will return `Err` if `base` cannot carry a path, like `mailto:` URLs.
///
/// # Examples
///
/// ```rust
/// let base = Url::parse("https://chat.example.com/mattermost/")?;
/// let url = endpoint(&base, &["api", "v4", "emoji"])?;
/// assert_eq!(url.as_str(), "https://chat.example.com/mattermost/api/v4/emoji");
/// ```
pub fn endpoint(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| Error::invalid_argument(format!("{base} cannot be a base URL")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_keeps_subpath_and_encodes_segments() {
        let base = Url::parse("https://chat.example.com/mattermost/").unwrap();
        let url = endpoint(&base, &["api", "v4", "emoji", "name", "a b"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://chat.example.com/mattermost/api/v4/emoji/name/a%20b"
        );

        let base = Url::parse("https://accounts.spotify.com").unwrap();
        let url = endpoint(&base, &["api", "token"]).unwrap();
        assert_eq!(url.as_str(), "https://accounts.spotify.com/api/token");
    }

    #[test]
    fn endpoint_rejects_cannot_be_a_base() {
        let base = Url::parse("mailto:someone@example.com").unwrap();
        assert!(endpoint(&base, &["api"]).is_err());
    }
}
