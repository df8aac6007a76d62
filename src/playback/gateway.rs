//! Outbound transport commands.
//!
//! Requests are queued to a single worker task and executed in submission
//! order against the device, so the controller never waits on the network.
//! Every executed request produces exactly one [`GatewayOutcome`] on the
//! outcome channel, stamped with the session generation it was issued in.
//! After shutdown queued requests are dropped, while one already in flight
//! still completes and reports. Starting a specific track goes through the REST boundary
//! ([`PlaybackApi`]); toggling and seeking go to the session handle.

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{
    Res,
    error::{ErrorKind, PlaybackError},
    playback::session::{AuthProvider, RemoteSession},
    types::Track,
};

const RETRY_DELAY: Duration = Duration::from_millis(500);

/// The REST call that starts a given track on a given device.
#[async_trait]
pub trait PlaybackApi: Send + Sync {
    async fn start_playback(&self, token: &str, device_id: &str, track_uri: &str) -> Res<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayRequest {
    Play {
        track: Track,
        device_id: String,
        /// Track that was current before this one was selected.
        previous: Option<Track>,
    },
    TogglePlay,
    Seek {
        position_ms: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayOutcome {
    /// Session the request was issued in.
    pub generation: u64,
    pub request: GatewayRequest,
    pub result: Result<(), PlaybackError>,
}

#[derive(Debug)]
pub struct CommandGateway {
    requests: mpsc::UnboundedSender<GatewayRequest>,
    closed: Arc<AtomicBool>,
}

impl CommandGateway {
    pub fn spawn(
        session: Arc<dyn RemoteSession>,
        api: Arc<dyn PlaybackApi>,
        auth: Arc<dyn AuthProvider>,
        retries: u8,
        generation: u64,
        outcomes: mpsc::UnboundedSender<GatewayOutcome>,
    ) -> Self {
        let (requests, mut rx) = mpsc::unbounded_channel::<GatewayRequest>();
        let closed = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&closed);

        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                if stop.load(Ordering::Acquire) {
                    log::debug!("gateway closed, dropping {request:?}");
                    break;
                }
                log::debug!("executing {request:?}");
                let result = match &request {
                    GatewayRequest::Play {
                        track, device_id, ..
                    } => match auth.valid_token().await {
                        Some(token) => {
                            with_retries(retries, || {
                                api.start_playback(&token, device_id, &track.uri)
                            })
                            .await
                        }
                        None => Err(PlaybackError::auth_expired("no valid access token")),
                    },
                    GatewayRequest::TogglePlay => {
                        with_retries(retries, || session.toggle_play()).await
                    }
                    GatewayRequest::Seek { position_ms } => {
                        with_retries(retries, || session.seek(*position_ms)).await
                    }
                };

                if let Err(e) = &result {
                    log::warn!("command failed: {e}");
                }

                let outcome = GatewayOutcome {
                    generation,
                    request,
                    result,
                };
                if outcomes.send(outcome).is_err() {
                    break;
                }
            }
        });

        Self { requests, closed }
    }

    /// Queues a request. Returns `false` once the worker is gone.
    pub fn submit(&self, request: GatewayRequest) -> bool {
        self.requests.send(request).is_ok()
    }

    /// Stops accepting and starting requests.
    pub fn shutdown(self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// Runs `op` once plus up to `retries` more times while it fails
/// transiently. Rejected credentials are never retried.
pub async fn with_retries<F, Fut>(retries: u8, mut op: F) -> Result<(), PlaybackError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Res<()>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(()) => return Ok(()),
            Err(e)
                if attempt < retries
                    && e.is_transient()
                    && e.playback_kind() != ErrorKind::AuthExpired =>
            {
                attempt += 1;
                log::debug!("transient failure, retry {attempt}/{retries}: {e}");
                tokio::time::sleep(RETRY_DELAY).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
}
