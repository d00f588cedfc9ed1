//! Secret credentials passed between the configuration, the Spotify accounts
//! service and the chat server.
//!
//! All types redact their contents in `Debug` output so that they can be
//! logged as part of larger structures. `Display` yields the raw secret and
//! is only meant for building request headers and bodies. Deserializing
//! goes through `FromStr`, so tokens read from a response are validated
//! like configured ones.

use std::{fmt, str::FromStr};

use serde_with::DeserializeFromStr;
use veil::Redact;

use crate::error::Error;

/// Checks that a secret is non-empty and free of whitespace.
fn validate(kind: &str, secret: &str) -> Result<(), Error> {
    if secret.is_empty() {
        return Err(Error::invalid_argument(format!("{kind} must not be empty")));
    }

    if secret.contains(char::is_whitespace) {
        return Err(Error::invalid_argument(format!(
            "{kind} must not contain whitespace"
        )));
    }

    Ok(())
}

/// Short-lived bearer token for the Spotify Web API.
///
/// Expiry is not tracked: a fresh token is exchanged every cycle.
#[derive(Clone, PartialEq, Eq, Hash, DeserializeFromStr, Redact)]
#[redact(all)]
pub struct AccessToken(String);

/// Long-lived credential that is exchanged for [`AccessToken`]s.
///
/// Obtained once through the authorization helper.
#[derive(Clone, PartialEq, Eq, Hash, DeserializeFromStr, Redact)]
#[redact(all)]
pub struct RefreshToken(String);

/// Bearer token of the chat user whose status is mirrored.
#[derive(Clone, PartialEq, Eq, Hash, Redact)]
#[redact(all)]
pub struct ChatToken(String);

/// OAuth client secret of the registered Spotify application.
#[derive(Clone, PartialEq, Eq, Hash, Redact)]
#[redact(all)]
pub struct ClientSecret(String);

macro_rules! secret {
    ($name:ident, $kind:literal) => {
        impl $name {
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                validate($kind, s)?;
                Ok(Self(s.to_owned()))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

secret!(AccessToken, "access token");
secret!(RefreshToken, "refresh token");
secret!(ChatToken, "chat token");
secret!(ClientSecret, "client secret");
