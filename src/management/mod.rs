mod auth;
mod playlist;

pub use auth::TokenManager;
pub use auth::TokenProvider;
pub use auth::is_expired_at;
pub use playlist::LIST_LAST_SEARCH;
pub use playlist::LIST_WORKING_PLAYLIST;
pub use playlist::TrackListManager;
