//! Configuration management for partymix.
//!
//! Values come from environment variables, optionally seeded from a `.env`
//! file in the local data directory:
//!
//! 1. Environment variables (highest priority)
//! 2. `.env` file in the local data directory
//! 3. Application defaults (where applicable)
//!
//! [`PlayerConfig`] groups the tuning knobs of the playback controller.

use std::{env, path::PathBuf, str::FromStr, time::Duration};

use crate::{Res, error::Error};

const APP_DIR: &str = "partymix";

/// Returns the application's directory inside the local data directory.
///
/// - Linux: `~/.local/share/partymix`
/// - macOS: `~/Library/Application Support/partymix`
/// - Windows: `%LOCALAPPDATA%/partymix`
pub fn data_dir() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(APP_DIR);
    path
}

/// Loads environment variables from `partymix/.env` in the local data directory.
///
/// A missing file is fine, since every setting can also come from the
/// process environment. A file that exists but cannot be parsed is an error.
pub async fn load_env() -> Res<()> {
    let path = data_dir().join(".env");
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent).await?;
    }

    match dotenv::from_path(&path) {
        Ok(()) => Ok(()),
        Err(dotenv::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("no env file at {}", path.display());
            Ok(())
        }
        Err(e) => Err(Error::Config(format!(
            "cannot load {}: {}",
            path.display(),
            e
        ))),
    }
}

fn required(name: &str) -> Res<String> {
    env::var(name).map_err(|_| Error::Config(format!("{name} must be set")))
}

fn or_default(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T: FromStr>(name: &str, default: T) -> Res<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{name} has an invalid value: {raw}"))),
        Err(_) => Ok(default),
    }
}

/// Address the local OAuth callback server binds to.
pub fn server_addr() -> String {
    or_default("SERVER_ADDRESS", "127.0.0.1:5173")
}

/// Client ID of the application registered with Spotify.
pub fn spotify_client_id() -> Res<String> {
    required("SPOTIFY_API_AUTH_CLIENT_ID")
}

/// Callback URL Spotify redirects to after authorization. Must match the
/// redirect URI registered for the application.
pub fn spotify_redirect_uri() -> String {
    or_default("SPOTIFY_API_REDIRECT_URI", "http://127.0.0.1:5173/callback")
}

pub fn spotify_scope() -> String {
    or_default(
        "SPOTIFY_API_AUTH_SCOPE",
        "streaming user-read-playback-state user-modify-playback-state user-read-private \
         user-read-email playlist-modify-public playlist-modify-private",
    )
}

pub fn spotify_apiauth_url() -> String {
    or_default(
        "SPOTIFY_API_AUTH_URL",
        "https://accounts.spotify.com/authorize",
    )
}

pub fn spotify_apiurl() -> String {
    or_default("SPOTIFY_API_URL", "https://api.spotify.com/v1")
}

pub fn spotify_apitoken_url() -> String {
    or_default(
        "SPOTIFY_API_TOKEN_URL",
        "https://accounts.spotify.com/api/token",
    )
}

/// What happens to the locally selected track when starting it remotely fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrackChangePolicy {
    /// Keep the new track selected; only the error is reported.
    #[default]
    Optimistic,
    /// Restore the previously selected track.
    Rollback,
}

impl FromStr for TrackChangePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "optimistic" => Ok(TrackChangePolicy::Optimistic),
            "rollback" => Ok(TrackChangePolicy::Rollback),
            other => Err(format!("unknown track change policy: {other}")),
        }
    }
}

/// Tuning of the playback session controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerConfig {
    /// Period of the local progress interpolation.
    pub tick_interval: Duration,
    /// Period of the authoritative state poll.
    pub poll_interval: Duration,
    /// Width of the window before the end of a track that counts as "ending".
    pub near_end_window: Duration,
    pub track_change: TrackChangePolicy,
    /// Extra attempts for commands that failed transiently. Never applied
    /// to rejected credentials.
    pub command_retries: u8,
    /// Name of the Connect device to prefer.
    pub device_name: String,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(1000),
            poll_interval: Duration::from_millis(1000),
            near_end_window: Duration::from_millis(1000),
            track_change: TrackChangePolicy::Optimistic,
            command_retries: 0,
            device_name: "Party Mix Web Player".to_string(),
        }
    }
}

impl PlayerConfig {
    /// Reads overrides from `PARTYMIX_*` environment variables.
    pub fn from_env() -> Res<Self> {
        let defaults = Self::default();

        let millis = |name: &str, default: Duration| -> Res<Duration> {
            let ms = parse_or(name, default.as_millis() as u64)?;
            if ms == 0 {
                return Err(Error::Config(format!("{name} must be greater than zero")));
            }
            Ok(Duration::from_millis(ms))
        };

        let track_change = match env::var("PARTYMIX_TRACK_CHANGE") {
            Ok(raw) => raw.parse().map_err(Error::Config)?,
            Err(_) => defaults.track_change,
        };

        Ok(Self {
            tick_interval: millis("PARTYMIX_TICK_MS", defaults.tick_interval)?,
            poll_interval: millis("PARTYMIX_POLL_MS", defaults.poll_interval)?,
            near_end_window: Duration::from_millis(parse_or(
                "PARTYMIX_NEAR_END_MS",
                defaults.near_end_window.as_millis() as u64,
            )?),
            track_change,
            command_retries: parse_or("PARTYMIX_COMMAND_RETRIES", defaults.command_retries)?,
            device_name: or_default("PARTYMIX_DEVICE_NAME", &defaults.device_name),
        })
    }

    pub fn near_end_ms(&self) -> u64 {
        self.near_end_window.as_millis() as u64
    }

    pub fn tick_ms(&self) -> u64 {
        self.tick_interval.as_millis() as u64
    }
}
