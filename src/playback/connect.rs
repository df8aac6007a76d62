//! A [`RemoteSession`] backed by the Spotify Connect Web API.
//!
//! The Web API has no push channel, so a watcher task polls the device list
//! and the player state and turns differences into [`SessionEvent`]s.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    Res,
    error::Error,
    playback::session::{
        AuthProvider, Listener, ListenerId, RemoteSession, SessionEvent, SessionProvider,
        StateSnapshot,
    },
    spotify::player,
    types::CurrentPlaybackResponse,
};

/// Position differences beyond normal playback drift that count as a jump.
const POSITION_DRIFT_MS: u64 = 2000;

/// Opens [`WebApiSession`]s. Built once by the application root.
pub struct WebApiSessionProvider {
    auth: Arc<dyn AuthProvider>,
    device_name: String,
    watch_interval: Duration,
}

impl WebApiSessionProvider {
    pub fn new(auth: Arc<dyn AuthProvider>, device_name: String, watch_interval: Duration) -> Self {
        Self {
            auth,
            device_name,
            watch_interval,
        }
    }
}

#[async_trait]
impl SessionProvider for WebApiSessionProvider {
    async fn open(&self) -> Res<Arc<dyn RemoteSession>> {
        Ok(Arc::new(WebApiSession::new(
            Arc::clone(&self.auth),
            self.device_name.clone(),
            self.watch_interval,
        )))
    }
}

#[derive(Default)]
struct Listeners {
    senders: Mutex<HashMap<ListenerId, mpsc::UnboundedSender<SessionEvent>>>,
    next_id: AtomicU64,
}

impl Listeners {
    fn lock(&self) -> MutexGuard<'_, HashMap<ListenerId, mpsc::UnboundedSender<SessionEvent>>> {
        self.senders.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn add(&self) -> Listener {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, events) = mpsc::unbounded_channel();
        self.lock().insert(id, tx);
        Listener { id, events }
    }

    fn remove(&self, id: ListenerId) {
        self.lock().remove(&id);
    }

    fn clear(&self) {
        self.lock().clear();
    }

    fn emit(&self, event: SessionEvent) {
        log::trace!("emitting {event:?}");
        self.lock().retain(|_, tx| tx.send(event.clone()).is_ok());
    }
}

pub struct WebApiSession {
    auth: Arc<dyn AuthProvider>,
    device_name: String,
    watch_interval: Duration,
    listeners: Arc<Listeners>,
    device_id: Mutex<Option<String>>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl WebApiSession {
    pub fn new(auth: Arc<dyn AuthProvider>, device_name: String, watch_interval: Duration) -> Self {
        Self {
            auth,
            device_name,
            watch_interval,
            listeners: Arc::new(Listeners::default()),
            device_id: Mutex::new(None),
            watcher: Mutex::new(None),
        }
    }

    async fn token(&self) -> Res<String> {
        self.auth
            .valid_token()
            .await
            .ok_or_else(|| Error::Auth("no valid access token".to_string()))
    }

    fn device_id(&self) -> Option<String> {
        self.device_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn stop_watcher(&self) {
        let watcher = self
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(watcher) = watcher {
            watcher.abort();
        }
    }
}

#[async_trait]
impl RemoteSession for WebApiSession {
    async fn connect(&self) -> Res<bool> {
        let token = self.token().await?;
        let devices = player::devices(&token).await?;

        let Some(device_id) =
            player::choose_device(&devices, &self.device_name).and_then(|d| d.id.clone())
        else {
            log::warn!("no Connect device available");
            return Ok(false);
        };

        log::debug!("using device {device_id}");
        *self.device_id.lock().unwrap_or_else(PoisonError::into_inner) = Some(device_id.clone());

        let watcher = tokio::spawn(watch(
            Arc::clone(&self.auth),
            Arc::clone(&self.listeners),
            device_id,
            self.watch_interval,
        ));

        self.stop_watcher();
        *self.watcher.lock().unwrap_or_else(PoisonError::into_inner) = Some(watcher);
        Ok(true)
    }

    fn disconnect(&self) {
        self.stop_watcher();
        self.listeners.clear();
        log::debug!("session disconnected");
    }

    fn add_listener(&self) -> Listener {
        self.listeners.add()
    }

    fn remove_listener(&self, id: ListenerId) {
        self.listeners.remove(id);
    }

    async fn toggle_play(&self) -> Res<()> {
        let token = self.token().await?;
        let device_id = self.device_id();

        match player::current_playback(&token).await? {
            Some(playback) if playback.is_playing => {
                player::pause(&token, device_id.as_deref()).await
            }
            _ => player::resume(&token, device_id.as_deref()).await,
        }
    }

    async fn seek(&self, position_ms: u64) -> Res<()> {
        let token = self.token().await?;
        player::seek(&token, self.device_id().as_deref(), position_ms).await
    }

    async fn current_state(&self) -> Res<Option<StateSnapshot>> {
        let token = self.token().await?;
        Ok(player::current_playback(&token)
            .await?
            .as_ref()
            .map(to_snapshot))
    }
}

impl Drop for WebApiSession {
    fn drop(&mut self) {
        self.stop_watcher();
    }
}

pub fn to_snapshot(playback: &CurrentPlaybackResponse) -> StateSnapshot {
    StateSnapshot {
        paused: !playback.is_playing,
        position_ms: playback.progress_ms.unwrap_or(0),
        duration_ms: playback.item.as_ref().map_or(0, |i| i.duration_ms),
        track_uri: playback.item.as_ref().map(|i| i.uri.clone()),
    }
}

/// Whether `next` differs from `previous` in a way listeners care about:
/// presence, paused flag, track, or a position jump beyond drift after
/// `elapsed_ms` of playback.
pub fn is_significant_change(
    previous: Option<&StateSnapshot>,
    next: Option<&StateSnapshot>,
    elapsed_ms: u64,
) -> bool {
    match (previous, next) {
        (None, None) => false,
        (Some(_), None) | (None, Some(_)) => true,
        (Some(prev), Some(next)) => {
            if prev.paused != next.paused || prev.track_uri != next.track_uri {
                return true;
            }
            let expected = if prev.paused {
                prev.position_ms
            } else {
                prev.position_ms.saturating_add(elapsed_ms)
            };
            expected.abs_diff(next.position_ms) > POSITION_DRIFT_MS
        }
    }
}

async fn watch(
    auth: Arc<dyn AuthProvider>,
    listeners: Arc<Listeners>,
    device_id: String,
    period: Duration,
) {
    let mut interval = tokio::time::interval(period);
    let mut ready = false;
    let mut last: Option<StateSnapshot> = None;
    let mut last_seen = tokio::time::Instant::now();

    loop {
        interval.tick().await;

        let Some(token) = auth.valid_token().await else {
            listeners.emit(SessionEvent::AuthenticationError(
                "no valid access token".to_string(),
            ));
            break;
        };

        let present = match player::devices(&token).await {
            Ok(devices) => devices
                .iter()
                .any(|d| d.id.as_deref() == Some(device_id.as_str())),
            Err(Error::Auth(message)) => {
                listeners.emit(SessionEvent::AuthenticationError(message));
                break;
            }
            Err(e) => {
                log::debug!("device check failed: {e}");
                continue;
            }
        };

        if present != ready {
            ready = present;
            let device_id = device_id.clone();
            listeners.emit(if ready {
                SessionEvent::Ready { device_id }
            } else {
                SessionEvent::NotReady { device_id }
            });
        }
        if !ready {
            continue;
        }

        let snapshot = match player::current_playback(&token).await {
            Ok(playback) => playback
                .filter(|p| {
                    p.device
                        .as_ref()
                        .is_none_or(|d| d.id.as_deref() == Some(device_id.as_str()))
                })
                .as_ref()
                .map(to_snapshot),
            Err(Error::Auth(message)) => {
                listeners.emit(SessionEvent::AuthenticationError(message));
                break;
            }
            Err(e) => {
                log::debug!("state check failed: {e}");
                continue;
            }
        };

        let now = tokio::time::Instant::now();
        let elapsed_ms = now.duration_since(last_seen).as_millis() as u64;
        last_seen = now;

        if is_significant_change(last.as_ref(), snapshot.as_ref(), elapsed_ms) {
            listeners.emit(SessionEvent::StateChanged(snapshot.clone()));
        }
        last = snapshot;
    }

    log::debug!("watcher for {device_id} stopped");
}
