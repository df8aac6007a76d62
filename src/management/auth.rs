use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::{Res, config, playback::AuthProvider, spotify, types::Token};

/// Seconds before expiry at which a token is refreshed.
const REFRESH_MARGIN_SECS: u64 = 240;

pub struct TokenManager {
    token: Token,
}

impl TokenManager {
    pub fn new(token: Token) -> Self {
        TokenManager { token }
    }

    pub async fn load() -> Res<Self> {
        let content = async_fs::read_to_string(Self::token_path()).await?;
        let token: Token = serde_json::from_str(&content)?;
        Ok(Self { token })
    }

    pub async fn persist(&self) -> Res<()> {
        let path = Self::token_path();
        if let Some(parent) = path.parent() {
            async_fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(&self.token)?;
        async_fs::write(path, json).await?;
        Ok(())
    }

    /// Removes stored credentials. A missing file counts as removed.
    pub async fn clear() -> Res<()> {
        match async_fs::remove_file(Self::token_path()).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// The access token, refreshed first if it is about to expire. `None`
    /// when it is expired and cannot be refreshed.
    pub async fn get_valid_token(&mut self) -> Option<String> {
        if self.is_expired() {
            match spotify::auth::refresh_token(&self.token.refresh_token).await {
                Ok(new_token) => {
                    self.token = new_token;
                    if let Err(e) = self.persist().await {
                        log::warn!("cannot store refreshed token: {e}");
                    }
                }
                Err(e) => {
                    log::warn!("token refresh failed: {e}");
                    return None;
                }
            }
        }

        Some(self.token.access_token.clone())
    }

    pub fn is_expired(&self) -> bool {
        is_expired_at(&self.token, Utc::now().timestamp() as u64)
    }

    fn token_path() -> PathBuf {
        config::data_dir().join("cache").join("token.json")
    }

    pub fn current_token(&self) -> &Token {
        &self.token
    }
}

/// Whether `token` should be refreshed at `now` (unix seconds).
pub fn is_expired_at(token: &Token, now: u64) -> bool {
    let expires_at = token.obtained_at.saturating_add(token.expires_in);
    now >= expires_at.saturating_sub(REFRESH_MARGIN_SECS)
}

/// [`AuthProvider`] over the locally stored token.
pub struct TokenProvider {
    manager: Mutex<Option<TokenManager>>,
}

impl TokenProvider {
    pub fn new(manager: Option<TokenManager>) -> Self {
        Self {
            manager: Mutex::new(manager),
        }
    }

    /// Loads the stored token. No stored token is not an error, the
    /// provider just never hands one out.
    pub async fn load() -> Self {
        match TokenManager::load().await {
            Ok(manager) => Self::new(Some(manager)),
            Err(e) => {
                log::debug!("no stored token: {e}");
                Self::new(None)
            }
        }
    }
}

#[async_trait]
impl AuthProvider for TokenProvider {
    async fn valid_token(&self) -> Option<String> {
        let mut manager = self.manager.lock().await;
        manager.as_mut()?.get_valid_token().await
    }

    async fn invalidate(&self) {
        self.manager.lock().await.take();
        if let Err(e) = TokenManager::clear().await {
            log::warn!("cannot remove stored token: {e}");
        }
    }
}
