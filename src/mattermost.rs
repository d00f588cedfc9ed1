//! Mattermost REST API v4 client.
//!
//! Writes presence for one user:
//! * [`Mattermost::publish_status`] sets the custom status text and icon.
//! * [`Mattermost::update_emoji`] swaps the image behind the custom emoji
//!   used as that icon.
//!
//! Custom emoji cannot be edited in place. Replacing one means looking it up
//! by name, deleting it if it exists and creating a new one under the same
//! name; creating first would conflict with the existing name.

use async_trait::async_trait;
use reqwest::{
    header::CONTENT_TYPE,
    multipart::{Form, Part},
    Response, StatusCode, Url,
};

use crate::{
    config::MattermostConfig,
    error::{Error, Result},
    http::{self, Client as HttpClient},
    protocol::{self, mattermost},
    sync::Presence,
};

pub struct Mattermost {
    http_client: HttpClient,
    config: MattermostConfig,
}

impl Mattermost {
    /// Largest image accepted as an emoji by a default server configuration.
    pub const MAX_EMOJI_SIZE: usize = 1024 * 1024;

    /// # Errors
    ///
    /// Will return `Err` if the HTTP client cannot be built.
    pub fn new(config: MattermostConfig, user_agent: &str) -> Result<Self> {
        Ok(Self {
            http_client: HttpClient::new(user_agent)?,
            config,
        })
    }

    fn api(&self, segments: &[&str]) -> Result<Url> {
        let mut path = vec!["api", "v4"];
        path.extend_from_slice(segments);
        http::endpoint(&self.config.server_url, &path)
    }

    /// Turns an unsuccessful response into an error, keeping the server's
    /// message when there is one.
    async fn check(operation: &str, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let mut error = Error::from_status(operation, status);
        if let Ok(body) = response.text().await {
            if let Ok(details) = serde_json::from_str::<mattermost::AppError>(&body) {
                error = Error::new(error.kind, format!("{}: {}", error.error, details.message));
            }
        }

        Err(error)
    }

    /// Sets the custom status of the configured user.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the request fails or is rejected.
    pub async fn publish_status(&self, text: &str, emoji_name: &str) -> Result<()> {
        let url = self.api(&["users", &self.config.user_id, "status", "custom"])?;
        let status = mattermost::CustomStatus {
            emoji: emoji_name,
            text,
        };
        let request = self
            .http_client
            .put(url)
            .bearer_auth(&self.config.token)
            .json(&status);

        let response = self.http_client.execute(request).await?;
        Self::check("status publish", response).await?;
        Ok(())
    }

    /// Looks up a custom emoji by name.
    ///
    /// Returns `Ok(None)` when no emoji has that name.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the request fails or is rejected for any other
    /// reason than the emoji not existing.
    pub async fn find_emoji(&self, name: &str) -> Result<Option<mattermost::Emoji>> {
        let url = self.api(&["emoji", "name", name])?;
        let request = self.http_client.get(url).bearer_auth(&self.config.token);

        let response = self.http_client.execute(request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = Self::check("emoji lookup", response).await?.text().await?;
        protocol::json(&body, "emoji lookup").map(Some)
    }

    /// Deletes a custom emoji by id.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the request fails or is rejected.
    pub async fn delete_emoji(&self, id: &str) -> Result<()> {
        let url = self.api(&["emoji", id])?;
        let request = self.http_client.delete(url).bearer_auth(&self.config.token);

        let response = self.http_client.execute(request).await?;
        Self::check("emoji delete", response).await?;
        Ok(())
    }

    /// Creates a custom emoji owned by the configured user.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the request fails or is rejected, for instance
    /// because an emoji with the same name still exists.
    pub async fn create_emoji(
        &self,
        name: &str,
        image: Vec<u8>,
        mime: &str,
    ) -> Result<mattermost::Emoji> {
        let url = self.api(&["emoji"])?;
        let emoji = serde_json::to_string(&mattermost::NewEmoji {
            name,
            creator_id: &self.config.user_id,
        })?;
        let image = Part::bytes(image)
            .file_name(format!("{name}.{}", extension(mime)))
            .mime_str(mime)?;
        let form = Form::new().text("emoji", emoji).part("image", image);
        let request = self
            .http_client
            .post(url)
            .bearer_auth(&self.config.token)
            .multipart(form);

        let response = self.http_client.execute(request).await?;
        let body = Self::check("emoji create", response).await?.text().await?;
        protocol::json(&body, "emoji create")
    }

    /// Downloads artwork, returning its bytes and MIME type.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the request fails, is rejected or the image is
    /// larger than [`Self::MAX_EMOJI_SIZE`].
    pub async fn download(&self, url: &Url) -> Result<(Vec<u8>, String)> {
        let request = self.http_client.get(url.clone());
        let response = self.http_client.execute(request).await?;
        let mut response = Self::check("artwork download", response).await?;

        let mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .filter(|value| value.starts_with("image/"))
            .unwrap_or("image/jpeg")
            .to_owned();

        if let Some(length) = response.content_length() {
            if length > Self::MAX_EMOJI_SIZE as u64 {
                return Err(Error::resource_exhausted(format!(
                    "artwork of {length} bytes exceeds the emoji limit"
                )));
            }
        }

        // Without a `Content-Length` the size is only known while reading.
        let mut image = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if image.len() + chunk.len() > Self::MAX_EMOJI_SIZE {
                return Err(Error::resource_exhausted(format!(
                    "artwork exceeds the emoji limit of {} bytes",
                    Self::MAX_EMOJI_SIZE
                )));
            }
            image.extend_from_slice(&chunk);
        }

        Ok((image, mime))
    }

    /// Replaces the image of the custom emoji `emoji_name` with `artwork`.
    ///
    /// # Errors
    ///
    /// Will return `Err` if any step fails: download, lookup, delete or
    /// create. Steps after a failure are not attempted.
    pub async fn update_emoji(&self, artwork: &Url, emoji_name: &str) -> Result<()> {
        let (image, mime) = self.download(artwork).await?;
        trace!("downloaded {} bytes of {mime} artwork", image.len());

        match self.find_emoji(emoji_name).await? {
            Some(existing) => {
                debug!("deleting emoji {emoji_name} ({})", existing.id);
                self.delete_emoji(&existing.id).await?;
            }
            None => debug!("emoji {emoji_name} does not exist yet"),
        }

        let created = self.create_emoji(emoji_name, image, &mime).await?;
        debug!("created emoji {} ({})", created.name, created.id);

        Ok(())
    }
}

/// File extension for an image MIME type.
fn extension(mime: &str) -> &str {
    match mime {
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "jpg",
    }
}

#[async_trait]
impl Presence for Mattermost {
    async fn update_emoji(&self, artwork: &Url, emoji_name: &str) -> Result<()> {
        Mattermost::update_emoji(self, artwork, emoji_name).await
    }

    async fn publish_status(&self, text: &str, emoji_name: &str) -> Result<()> {
        Mattermost::publish_status(self, text, emoji_name).await
    }
}
