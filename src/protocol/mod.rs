//! Wire types for the remote APIs.
//!
//! # Submodules
//!
//! * [`spotify`] - Accounts service token responses and the currently
//!   playing item of the Web API
//! * [`mattermost`] - Custom status and custom emoji payloads
//!
//! The types mirror the JSON documents exchanged with the services and
//! carry no behavior beyond (de)serialization. Conversion into domain types
//! such as [`PlaybackState`](crate::track::PlaybackState) happens in the
//! service clients.

pub mod mattermost;
pub mod spotify;

use std::fmt::Debug;

use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Decodes a response body of the `origin` endpoint.
///
/// The decoded document is traced. On failure the raw body is traced
/// instead, and the error names `origin`.
///
/// # Errors
///
/// Will return `Err` if the body is not valid JSON or does not match `T`.
pub fn json<T>(body: &str, origin: &str) -> Result<T>
where
    T: DeserializeOwned + Debug,
{
    serde_json::from_str(body)
        .inspect(|document| trace!("{origin}: {document:#?}"))
        .map_err(|e| {
            trace!("{origin} body: {body}");
            let message = format!("decoding {origin} response: {e}");
            Error::new(Error::from(e).kind, message)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn mismatched_document_names_origin() {
        let err = json::<mattermost::Emoji>(r#"{"name": "spotik"}"#, "emoji lookup").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
        assert!(
            err.to_string().contains("decoding emoji lookup response"),
            "{err}"
        );
    }
}
