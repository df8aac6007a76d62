//! # API Module
//!
//! HTTP endpoints of the short-lived local server that runs during
//! `partymix auth`.
//!
//! - [`callback`] - receives Spotify's redirect and exchanges the
//!   authorization code for a token (PKCE).
//! - [`health`] - reports status and version.
//!
//! Both are plain axum handlers; routing lives in [`crate::server`].

mod callback;
mod health;

pub use callback::callback;
pub use health::health;
