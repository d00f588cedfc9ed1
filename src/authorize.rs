//! One-shot web flow that obtains a Spotify refresh token.
//!
//! Visiting `/` redirects to the Spotify consent page. After consent, Spotify
//! redirects back to `/callback` with an authorization code, which is
//! exchanged for a refresh token. The token is shown on the page and handed
//! out through the receiver returned by [`router`], after which the helper
//! is expected to shut down.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use tokio::sync::{oneshot, Mutex};
use url::Url;

use crate::{spotify::Spotify, tokens::RefreshToken};

struct Authorizer {
    spotify: Spotify,
    redirect_uri: Url,
    done: Mutex<Option<oneshot::Sender<RefreshToken>>>,
}

#[derive(Debug, Default, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Builds the routes of the authorization helper.
///
/// `redirect_uri` must be registered with the Spotify application and point
/// at the `/callback` route. The receiver resolves with the first refresh
/// token obtained.
pub fn router(spotify: Spotify, redirect_uri: Url) -> (Router, oneshot::Receiver<RefreshToken>) {
    let (done_tx, done_rx) = oneshot::channel();
    let authorizer = Arc::new(Authorizer {
        spotify,
        redirect_uri,
        done: Mutex::new(Some(done_tx)),
    });

    let router = Router::new()
        .route("/", get(consent))
        .route("/callback", get(callback))
        .with_state(authorizer);

    (router, done_rx)
}

async fn consent(State(authorizer): State<Arc<Authorizer>>) -> Response {
    match authorizer.spotify.authorize_url(&authorizer.redirect_uri) {
        Ok(url) => Redirect::temporary(url.as_str()).into_response(),
        Err(e) => {
            error!("{e}");
            page(StatusCode::INTERNAL_SERVER_ERROR, "Error", &e.to_string())
        }
    }
}

async fn callback(
    State(authorizer): State<Arc<Authorizer>>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    if let Some(error) = query.error {
        let description = query.error_description.unwrap_or_default();
        warn!("authorization denied: {error} {description}");
        return page(
            StatusCode::BAD_REQUEST,
            "Authorization failed",
            &format!("{error} {description}"),
        );
    }

    let Some(code) = query.code.filter(|code| !code.is_empty()) else {
        return page(StatusCode::BAD_REQUEST, "Error", "no code provided");
    };

    let refresh_token = match authorizer
        .spotify
        .exchange_code(&code, &authorizer.redirect_uri)
        .await
    {
        Ok(refresh_token) => refresh_token,
        Err(e) => {
            error!("token exchange failed: {e}");
            return page(
                StatusCode::BAD_GATEWAY,
                "Error obtaining token",
                &e.to_string(),
            );
        }
    };

    info!("refresh token obtained");
    let body = format!(
        "<p><strong>Refresh token:</strong></p><pre>{}</pre>\
         <p>Copy it to SPOTIFY_REFRESH_TOKEN in your .env file.</p>",
        escape(refresh_token.as_str())
    );

    if let Some(done) = authorizer.done.lock().await.take() {
        let _ = done.send(refresh_token);
    }

    Html(format!("<h2>Done!</h2>{body}")).into_response()
}

fn page(status: StatusCode, title: &str, message: &str) -> Response {
    let html = format!("<h2>{}</h2><p>{}</p>", escape(title), escape(message));
    (status, Html(html)).into_response()
}

/// Escapes text for inclusion in HTML element content.
fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for chr in text.chars() {
        match chr {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(chr),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;
    use wiremock::{
        matchers::{body_string_contains, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;
    use crate::config::SpotifyConfig;

    const REDIRECT: &str = "http://localhost:8888/callback";

    fn authorizer(accounts: &str) -> (Router, oneshot::Receiver<RefreshToken>) {
        let mut config = SpotifyConfig::new("client", "secret".parse().unwrap()).unwrap();
        config.accounts_url = Url::parse(accounts).unwrap();
        let spotify = Spotify::new(config, "spotimost-test/0").unwrap();
        router(spotify, Url::parse(REDIRECT).unwrap())
    }

    async fn get(router: Router, uri: &str) -> (StatusCode, String, Option<String>) {
        let response = router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let location = response
            .headers()
            .get("location")
            .map(|value| value.to_str().unwrap().to_owned());
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap(), location)
    }

    #[tokio::test]
    async fn index_redirects_to_consent() {
        let (router, _) = authorizer(SpotifyConfig::ACCOUNTS_URL);
        let (status, _, location) = get(router, "/").await;

        assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
        let location = Url::parse(&location.unwrap()).unwrap();
        assert_eq!(location.path(), "/authorize");
        let query: Vec<(String, String)> = location.query_pairs().into_owned().collect();
        assert!(query.contains(&("client_id".into(), "client".into())));
        assert!(query.contains(&("response_type".into(), "code".into())));
        assert!(query.contains(&("redirect_uri".into(), REDIRECT.into())));
        assert!(query.contains(&(
            "scope".into(),
            "user-read-currently-playing user-read-playback-state".into()
        )));
    }

    #[tokio::test]
    async fn callback_without_code_is_rejected() {
        let (router, _) = authorizer(SpotifyConfig::ACCOUNTS_URL);
        let (status, body, _) = get(router, "/callback").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("no code provided"), "{body}");
    }

    #[tokio::test]
    async fn denied_consent_shows_error() {
        let (router, _) = authorizer(SpotifyConfig::ACCOUNTS_URL);
        let (status, body, _) = get(router, "/callback?error=access_denied").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("access_denied"), "{body}");
    }

    #[tokio::test]
    async fn callback_exchanges_code_and_hands_out_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"access_token": "access", "token_type": "Bearer", "expires_in": 3600,
                    "refresh_token": "refresh-123"}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let (router, done) = authorizer(&server.uri());
        let (status, body, _) = get(router, "/callback?code=abc").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<pre>refresh-123</pre>"), "{body}");
        assert_eq!(done.await.unwrap().as_str(), "refresh-123");
    }

    #[tokio::test]
    async fn failed_exchange_keeps_waiting() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string(
                r#"{"error": "invalid_grant", "error_description": "Invalid authorization code"}"#,
            ))
            .mount(&server)
            .await;

        let (router, mut done) = authorizer(&server.uri());
        let (status, body, _) = get(router.clone(), "/callback?code=stale").await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body.contains("Error obtaining token"), "{body}");
        assert!(body.contains("invalid_grant"), "{body}");
        assert_eq!(done.try_recv(), Err(oneshot::error::TryRecvError::Empty));
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape("<b>\"a\" & 'b'</b>"),
            "&lt;b&gt;&quot;a&quot; &amp; &#39;b&#39;&lt;/b&gt;"
        );
    }
}
