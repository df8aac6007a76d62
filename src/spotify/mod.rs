//! # Spotify Integration Module
//!
//! Thin async wrappers around the Spotify Web API endpoints partymix needs.
//! Every call takes a bearer token explicitly; token lifecycle lives in
//! [`crate::management`].
//!
//! ## Submodules
//!
//! - [`auth`] - OAuth 2.0 authorization code flow with PKCE, token exchange
//!   and refresh.
//! - [`search`] - catalog track search with field filters.
//! - [`playlist`] - creating a playlist for the current user and filling it.
//! - [`player`] - Connect device listing, playback state and transport
//!   controls, plus [`player::WebPlaybackApi`] for the playback controller.
//!
//! ## Errors
//!
//! Non-success responses are turned into [`crate::error::Error`] by
//! [`ensure_success`]: `401` becomes [`Error::Auth`], anything else becomes
//! [`Error::Api`] carrying the status and Spotify's error message.
//!
//! ## API Coverage
//!
//! - `POST /api/token` - token exchange and refresh
//! - `GET /search` - track search
//! - `GET /me` - current user
//! - `POST /users/{user_id}/playlists` - create playlist
//! - `POST /playlists/{playlist_id}/tracks` - add tracks
//! - `GET /me/player/devices` - Connect devices
//! - `GET /me/player` - current playback
//! - `PUT /me/player/play`, `PUT /me/player/pause`, `PUT /me/player/seek`

use reqwest::{Response, StatusCode};

use crate::{Res, error::Error, types::ApiErrorResponse};

pub mod auth;
pub mod player;
pub mod playlist;
pub mod search;

/// Passes successful responses through and converts everything else into
/// the crate error.
pub(crate) async fn ensure_success(response: Response) -> Res<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = match response.json::<ApiErrorResponse>().await {
        Ok(body) => body.error.message,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
    };

    if status == StatusCode::UNAUTHORIZED {
        return Err(Error::Auth(message));
    }

    Err(Error::Api {
        status: status.as_u16(),
        message,
    })
}
