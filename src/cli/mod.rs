//! # CLI Module
//!
//! User-facing command implementations. Each function here is what one
//! `partymix` subcommand does; argument parsing lives in `main.rs`.
//!
//! - [`auth`] - Spotify OAuth with PKCE.
//! - [`search`] - track search, results are kept for row references.
//! - [`playlist_add`], [`playlist_remove`], [`playlist_show`],
//!   [`playlist_clear`], [`playlist_save`] - the working playlist.
//! - [`play`] - interactive player driving a Connect device.
//!
//! Output goes through the crate's console macros. Unrecoverable problems
//! use [`crate::error!`], which exits the process.
//!
//! ## Typical session
//!
//! ```bash
//! partymix auth
//! partymix search "dancing queen" --artist abba
//! partymix playlist add 1 3
//! partymix play 1
//! partymix playlist save --name "Friday"
//! ```

mod auth;
mod play;
mod playlist;
mod search;

pub use auth::auth;
pub use play::PlayerInput;
pub use play::parse_player_input;
pub use play::play;
pub use playlist::add as playlist_add;
pub use playlist::clear as playlist_clear;
pub use playlist::remove as playlist_remove;
pub use playlist::save as playlist_save;
pub use playlist::show as playlist_show;
pub use search::search;

use crate::{error, management::TokenManager};

/// A usable access token, or exit with a hint to authenticate.
async fn require_token() -> String {
    let mut token_mgr = match TokenManager::load().await {
        Ok(t) => t,
        Err(e) => error!(
            "Failed to load token. Please run partymix auth\n Error: {}",
            e
        ),
    };

    match token_mgr.get_valid_token().await {
        Some(token) => token,
        None => error!("Token expired and could not be refreshed. Please run partymix auth"),
    }
}
