//! Mirrors what plays on Spotify into a Mattermost custom status.
//!
//! Every few seconds the [`scheduler`] reads the currently playing item from
//! [`spotify`] and hands it to the [`sync`] module, which decides what to
//! send to [`mattermost`]:
//! * the status text `Track – Artist, Artist`, or an idle text
//! * the album artwork, uploaded as the custom emoji shown next to it
//!
//! Nothing is sent while the status text stays the same.
//!
//! The [`authorize`] module serves the one-time web flow that yields the
//! Spotify refresh token the loop runs on.
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_panics_doc)]

#[macro_use]
extern crate log;

pub mod authorize;
pub mod config;
pub mod error;
pub mod http;
pub mod mattermost;
pub mod protocol;
pub mod scheduler;
pub mod signal;
pub mod spotify;
pub mod sync;
pub mod tokens;
pub mod track;
