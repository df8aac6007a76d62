use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use partymix::{
    Res,
    config::{PlayerConfig, TrackChangePolicy},
    error::{Error, ErrorKind},
    playback::{
        AuthProvider, Controller, ControllerEvent, Listener, ListenerId, PlaybackApi,
        RemoteSession, SessionEvent, SessionProvider, StateSnapshot, Status, Transport,
    },
    types::Track,
};
use tokio::{sync::mpsc, time::sleep};

// Fakes

#[derive(Default)]
struct FakeSession {
    listeners: Mutex<HashMap<ListenerId, mpsc::UnboundedSender<SessionEvent>>>,
    next_id: AtomicU64,
    refuse: bool,
    state: Mutex<Option<StateSnapshot>>,
    calls: Mutex<Vec<String>>,
    polls: AtomicUsize,
}

impl FakeSession {
    fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    fn emit(&self, event: SessionEvent) {
        for tx in self.listeners.lock().unwrap().values() {
            let _ = tx.send(event.clone());
        }
    }

    fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }

    fn set_state(&self, state: Option<StateSnapshot>) {
        *self.state.lock().unwrap() = state;
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

#[async_trait]
impl RemoteSession for FakeSession {
    async fn connect(&self) -> Res<bool> {
        self.record("connect");
        Ok(!self.refuse)
    }

    fn disconnect(&self) {
        self.record("disconnect");
    }

    fn add_listener(&self) -> Listener {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, events) = mpsc::unbounded_channel();
        self.listeners.lock().unwrap().insert(id, tx);
        Listener { id, events }
    }

    fn remove_listener(&self, id: ListenerId) {
        self.record("remove_listener");
        self.listeners.lock().unwrap().remove(&id);
    }

    async fn toggle_play(&self) -> Res<()> {
        self.record("toggle");
        Ok(())
    }

    async fn seek(&self, position_ms: u64) -> Res<()> {
        self.record(format!("seek:{position_ms}"));
        Ok(())
    }

    async fn current_state(&self) -> Res<Option<StateSnapshot>> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().unwrap().clone())
    }
}

#[derive(Default)]
struct FakeProvider {
    sessions: Mutex<VecDeque<Arc<FakeSession>>>,
}

impl FakeProvider {
    fn with(sessions: Vec<Arc<FakeSession>>) -> Self {
        Self {
            sessions: Mutex::new(sessions.into()),
        }
    }
}

#[async_trait]
impl SessionProvider for FakeProvider {
    async fn open(&self) -> Res<Arc<dyn RemoteSession>> {
        match self.sessions.lock().unwrap().pop_front() {
            Some(session) => Ok(session as Arc<dyn RemoteSession>),
            None => Err(Error::Config("no session available".to_string())),
        }
    }
}

#[derive(Default)]
struct FakeApi {
    plays: Mutex<Vec<String>>,
    /// Status codes to fail the next calls with, in order.
    failures: Mutex<VecDeque<u16>>,
    /// How long the next call takes.
    delay: Mutex<Option<Duration>>,
}

impl FakeApi {
    fn fail_next(&self, status: u16) {
        self.failures.lock().unwrap().push_back(status);
    }

    fn delay_next(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    fn plays(&self) -> Vec<String> {
        self.plays.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlaybackApi for FakeApi {
    async fn start_playback(&self, token: &str, device_id: &str, track_uri: &str) -> Res<()> {
        assert_eq!(token, "token");
        assert_eq!(device_id, "device-1");
        self.plays.lock().unwrap().push(track_uri.to_string());

        let delay = self.delay.lock().unwrap().take();
        if let Some(delay) = delay {
            sleep(delay).await;
        }

        match self.failures.lock().unwrap().pop_front() {
            Some(status) => Err(Error::Api {
                status,
                message: format!("failed with {status}"),
            }),
            None => Ok(()),
        }
    }
}

struct FakeAuth {
    token: Mutex<Option<String>>,
    invalidations: AtomicUsize,
}

impl Default for FakeAuth {
    fn default() -> Self {
        Self {
            token: Mutex::new(Some("token".to_string())),
            invalidations: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AuthProvider for FakeAuth {
    async fn valid_token(&self) -> Option<String> {
        self.token.lock().unwrap().clone()
    }

    async fn invalidate(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        self.token.lock().unwrap().take();
    }
}

// Harness

struct Harness {
    controller: Controller,
    session: Arc<FakeSession>,
    api: Arc<FakeApi>,
    auth: Arc<FakeAuth>,
}

/// Lets every task run until idle, then advances virtual time by 1ms.
async fn settle() {
    sleep(Duration::from_millis(1)).await;
}

/// Polling effectively disabled so only pushed events change the state.
fn quiet_config() -> PlayerConfig {
    PlayerConfig {
        poll_interval: Duration::from_secs(3600),
        ..PlayerConfig::default()
    }
}

fn track(id: &str) -> Track {
    Track {
        id: id.to_string(),
        title: format!("Title {id}"),
        artist: "Artist".to_string(),
        album: "Album".to_string(),
        duration: "3:20".to_string(),
        duration_ms: 200_000,
        popularity: 50,
        preview_url: None,
        image_url: None,
        uri: format!("spotify:track:{id}"),
    }
}

fn uri(id: &str) -> String {
    format!("spotify:track:{id}")
}

fn abc() -> Vec<Track> {
    vec![track("a"), track("b"), track("c")]
}

fn snapshot(playing: bool, position_ms: u64, duration_ms: u64) -> StateSnapshot {
    StateSnapshot {
        paused: !playing,
        position_ms,
        duration_ms,
        track_uri: None,
    }
}

fn reporting(id: &str, position_ms: u64) -> StateSnapshot {
    StateSnapshot {
        paused: false,
        position_ms,
        duration_ms: 200_000,
        track_uri: Some(uri(id)),
    }
}

async fn start_with(provider: FakeProvider, session: Arc<FakeSession>, config: PlayerConfig) -> Harness {
    let api = Arc::new(FakeApi::default());
    let auth = Arc::new(FakeAuth::default());
    let controller = Controller::spawn(
        Arc::new(provider),
        Arc::clone(&api) as Arc<dyn PlaybackApi>,
        Arc::clone(&auth) as Arc<dyn AuthProvider>,
        config,
    );
    settle().await;

    Harness {
        controller,
        session,
        api,
        auth,
    }
}

async fn start(config: PlayerConfig) -> Harness {
    let session = Arc::new(FakeSession::default());
    let provider = FakeProvider::with(vec![Arc::clone(&session)]);
    start_with(provider, session, config).await
}

async fn ready(config: PlayerConfig) -> Harness {
    let h = start(config).await;
    h.session.emit(SessionEvent::Ready {
        device_id: "device-1".to_string(),
    });
    settle().await;
    h
}

// Lifecycle

#[tokio::test(start_paused = true)]
async fn test_connects_and_becomes_ready() {
    let h = start(quiet_config()).await;
    assert_eq!(h.controller.snapshot().status, Status::Connecting);
    assert_eq!(h.session.count("connect"), 1);
    assert_eq!(h.session.listener_count(), 1);

    h.session.emit(SessionEvent::Ready {
        device_id: "device-1".to_string(),
    });
    settle().await;

    let state = h.controller.snapshot();
    assert_eq!(state.status, Status::Ready(Transport::Idle));
    assert!(state.is_active);
    assert!(!state.is_playing);
}

#[tokio::test(start_paused = true)]
async fn test_status_follows_authoritative_updates() {
    let h = ready(quiet_config()).await;

    h.session
        .emit(SessionEvent::StateChanged(Some(snapshot(true, 0, 200_000))));
    settle().await;
    assert_eq!(
        h.controller.snapshot().status,
        Status::Ready(Transport::Playing)
    );

    h.session
        .emit(SessionEvent::StateChanged(Some(snapshot(false, 500, 200_000))));
    settle().await;
    let state = h.controller.snapshot();
    assert_eq!(state.status, Status::Ready(Transport::Paused));
    assert_eq!(state.position_ms, 500);
    assert_eq!(state.duration_ms, 200_000);
}

#[tokio::test(start_paused = true)]
async fn test_not_ready_deactivates_and_blocks_commands() {
    let h = ready(quiet_config()).await;
    h.controller.set_candidates(abc());

    h.session.emit(SessionEvent::NotReady {
        device_id: "device-1".to_string(),
    });
    settle().await;
    assert!(!h.controller.snapshot().is_active);

    h.controller.play(track("a"));
    settle().await;

    let state = h.controller.snapshot();
    assert_eq!(state.error.map(|e| e.kind), Some(ErrorKind::DeviceUnavailable));
    assert!(h.api.plays().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_open_failure_is_initialization_failure() {
    let session = Arc::new(FakeSession::default());
    let h = start_with(FakeProvider::default(), session, quiet_config()).await;

    let state = h.controller.snapshot();
    assert_eq!(
        state.status,
        Status::Error(ErrorKind::InitializationFailure)
    );
    assert_eq!(
        state.error.map(|e| e.kind),
        Some(ErrorKind::InitializationFailure)
    );
}

#[tokio::test(start_paused = true)]
async fn test_refused_connect_is_terminal() {
    let session = Arc::new(FakeSession::refusing());
    let provider = FakeProvider::with(vec![Arc::clone(&session)]);
    let h = start_with(provider, session, quiet_config()).await;

    assert_eq!(
        h.controller.snapshot().status,
        Status::Error(ErrorKind::InitializationFailure)
    );

    // Nothing revives a failed session short of reconnecting.
    h.session.emit(SessionEvent::Ready {
        device_id: "device-1".to_string(),
    });
    h.controller.play(track("a"));
    settle().await;
    assert_eq!(
        h.controller.snapshot().status,
        Status::Error(ErrorKind::InitializationFailure)
    );
    assert!(h.api.plays().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_account_error_is_initialization_failure() {
    let h = ready(quiet_config()).await;

    h.session
        .emit(SessionEvent::AccountError("premium required".to_string()));
    settle().await;

    assert_eq!(
        h.controller.snapshot().status,
        Status::Error(ErrorKind::InitializationFailure)
    );
}

// Progress ticker

#[tokio::test(start_paused = true)]
async fn test_repeated_updates_keep_a_single_ticker() {
    let h = ready(quiet_config()).await;

    for _ in 0..5 {
        h.session
            .emit(SessionEvent::StateChanged(Some(snapshot(true, 10_000, 200_000))));
    }
    settle().await;
    assert_eq!(h.controller.snapshot().position_ms, 10_000);

    sleep(Duration::from_millis(1000)).await;
    assert_eq!(h.controller.snapshot().position_ms, 11_000);

    sleep(Duration::from_millis(2000)).await;
    assert_eq!(h.controller.snapshot().position_ms, 13_000);
}

#[tokio::test(start_paused = true)]
async fn test_ticker_stops_when_paused() {
    let h = ready(quiet_config()).await;

    h.session
        .emit(SessionEvent::StateChanged(Some(snapshot(true, 0, 200_000))));
    settle().await;
    sleep(Duration::from_millis(2000)).await;
    assert_eq!(h.controller.snapshot().position_ms, 2_000);

    h.session
        .emit(SessionEvent::StateChanged(Some(snapshot(false, 2_500, 200_000))));
    settle().await;
    sleep(Duration::from_millis(5000)).await;
    assert_eq!(h.controller.snapshot().position_ms, 2_500);
}

#[tokio::test(start_paused = true)]
async fn test_interpolation_never_passes_duration() {
    let h = ready(quiet_config()).await;

    h.session
        .emit(SessionEvent::StateChanged(Some(snapshot(true, 8_500, 10_000))));
    settle().await;
    sleep(Duration::from_millis(5000)).await;

    assert_eq!(h.controller.snapshot().position_ms, 10_000);
}

// Track selection

#[tokio::test(start_paused = true)]
async fn test_play_sets_track_and_starts_it_on_device() {
    let h = ready(quiet_config()).await;
    let mut events = h.controller.subscribe();

    h.controller.play(track("a"));
    settle().await;

    assert_eq!(h.controller.snapshot().current_track, Some(track("a")));
    assert_eq!(h.api.plays(), vec![uri("a")]);

    let mut changed = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let ControllerEvent::TrackChanged(t) = event {
            changed.push(t.id);
        }
    }
    assert_eq!(changed, vec!["a".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_next_and_previous_walk_the_candidates() {
    let h = ready(quiet_config()).await;
    h.controller.set_candidates(abc());

    h.controller.play(track("b"));
    h.controller.play_next();
    settle().await;
    assert_eq!(h.controller.snapshot().current_track, Some(track("c")));

    h.controller.play_next();
    settle().await;
    assert_eq!(h.controller.snapshot().current_track, Some(track("a")));

    h.controller.play_previous();
    settle().await;
    assert_eq!(h.controller.snapshot().current_track, Some(track("c")));

    assert_eq!(
        h.api.plays(),
        vec![uri("b"), uri("c"), uri("a"), uri("c")]
    );
}

#[tokio::test(start_paused = true)]
async fn test_previous_without_current_track_picks_last() {
    let h = ready(quiet_config()).await;
    h.controller.set_candidates(abc());

    h.controller.play_previous();
    settle().await;

    assert_eq!(h.controller.snapshot().current_track, Some(track("c")));
}

#[tokio::test(start_paused = true)]
async fn test_next_with_no_candidates_is_a_no_op() {
    let h = ready(quiet_config()).await;

    h.controller.play_next();
    settle().await;

    let state = h.controller.snapshot();
    assert_eq!(state.current_track, None);
    assert_eq!(state.error, None);
    assert!(h.api.plays().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_play_before_ready_reports_device_unavailable() {
    let h = start(quiet_config()).await;

    h.controller.play(track("a"));
    settle().await;

    let state = h.controller.snapshot();
    assert_eq!(state.current_track, None);
    assert_eq!(state.error.map(|e| e.kind), Some(ErrorKind::DeviceUnavailable));
    assert_eq!(
        state.status,
        Status::Error(ErrorKind::DeviceUnavailable)
    );
    assert!(h.api.plays().is_empty());
}

// Transport

#[tokio::test(start_paused = true)]
async fn test_toggle_goes_to_session() {
    let h = ready(quiet_config()).await;

    h.controller.toggle_play();
    settle().await;

    assert_eq!(h.session.count("toggle"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_seek_inside_track_seeks() {
    let h = ready(quiet_config()).await;
    h.session
        .emit(SessionEvent::StateChanged(Some(snapshot(true, 0, 200_000))));
    settle().await;

    h.controller.seek(100_000);
    settle().await;

    assert_eq!(h.session.count("seek:100000"), 1);
    assert!(h.api.plays().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_seek_into_final_second_skips_to_next() {
    let h = ready(quiet_config()).await;
    h.controller.set_candidates(abc());
    h.controller.play(track("a"));
    h.session
        .emit(SessionEvent::StateChanged(Some(snapshot(true, 0, 200_000))));
    settle().await;

    h.controller.seek(199_500);
    settle().await;

    assert_eq!(h.api.plays(), vec![uri("a"), uri("b")]);
    assert_eq!(h.controller.snapshot().current_track, Some(track("b")));
    assert!(h.session.calls().iter().all(|c| !c.starts_with("seek")));
}

// Reconciliation

#[tokio::test(start_paused = true)]
async fn test_poll_applies_authoritative_state() {
    let h = ready(PlayerConfig::default()).await;
    h.session.set_state(Some(snapshot(false, 42_000, 200_000)));

    sleep(Duration::from_millis(1000)).await;

    let state = h.controller.snapshot();
    assert_eq!(state.position_ms, 42_000);
    assert_eq!(state.status, Status::Ready(Transport::Paused));
}

#[tokio::test(start_paused = true)]
async fn test_near_end_advances_exactly_once() {
    let h = ready(PlayerConfig::default()).await;
    h.controller.set_candidates(abc());
    h.controller.play(track("a"));
    settle().await;

    // The remote keeps reporting the end of the track for several polls.
    h.session.set_state(Some(snapshot(true, 199_500, 200_000)));
    sleep(Duration::from_millis(3001)).await;

    assert!(h.session.polls.load(Ordering::SeqCst) >= 3);
    assert_eq!(h.api.plays(), vec![uri("a"), uri("b")]);

    // A fresh track re-arms the guard.
    h.session.set_state(Some(snapshot(true, 1_000, 180_000)));
    sleep(Duration::from_millis(1000)).await;
    h.session.set_state(Some(snapshot(true, 179_500, 180_000)));
    sleep(Duration::from_millis(1000)).await;

    assert_eq!(h.api.plays(), vec![uri("a"), uri("b"), uri("c")]);
}

#[tokio::test(start_paused = true)]
async fn test_skip_near_the_end_advances_only_once() {
    let h = ready(PlayerConfig::default()).await;
    h.controller.set_candidates(abc());
    h.controller.play(track("a"));
    settle().await;

    // The remote still reports the end of `a` after the user moves on.
    h.session.set_state(Some(reporting("a", 199_200)));
    h.controller.seek(199_600);
    settle().await;
    sleep(Duration::from_millis(1000)).await;

    assert_eq!(h.api.plays(), vec![uri("a"), uri("b")]);
    assert_eq!(h.controller.snapshot().current_track, Some(track("b")));

    // Once `b` is reported, its own ending advances as usual.
    h.session.set_state(Some(reporting("b", 1_000)));
    sleep(Duration::from_millis(1000)).await;
    assert_eq!(h.controller.snapshot().position_ms, 1_000);
    h.session.set_state(Some(reporting("b", 199_500)));
    sleep(Duration::from_millis(1000)).await;

    assert_eq!(h.api.plays(), vec![uri("a"), uri("b"), uri("c")]);
}

#[tokio::test(start_paused = true)]
async fn test_near_end_does_not_advance_when_paused() {
    let h = ready(PlayerConfig::default()).await;
    h.controller.set_candidates(abc());
    h.controller.play(track("a"));
    settle().await;

    h.session.set_state(Some(snapshot(false, 199_500, 200_000)));
    sleep(Duration::from_millis(3001)).await;

    assert_eq!(h.api.plays(), vec![uri("a")]);
}

#[tokio::test(start_paused = true)]
async fn test_pushed_update_near_end_does_not_advance() {
    let h = ready(quiet_config()).await;
    h.controller.set_candidates(abc());
    h.controller.play(track("a"));
    h.session
        .emit(SessionEvent::StateChanged(Some(snapshot(true, 199_500, 200_000))));
    settle().await;

    assert_eq!(h.api.plays(), vec![uri("a")]);
}

// Failures

#[tokio::test(start_paused = true)]
async fn test_transport_failure_keeps_optimistic_track() {
    let h = ready(quiet_config()).await;
    h.api.fail_next(500);

    h.controller.play(track("a"));
    settle().await;

    let state = h.controller.snapshot();
    assert_eq!(state.current_track, Some(track("a")));
    assert_eq!(state.error.map(|e| e.kind), Some(ErrorKind::TransportFailure));
}

#[tokio::test(start_paused = true)]
async fn test_rollback_policy_restores_previous_track() {
    let config = PlayerConfig {
        track_change: TrackChangePolicy::Rollback,
        ..quiet_config()
    };
    let h = ready(config).await;

    h.controller.play(track("a"));
    settle().await;
    h.api.fail_next(502);
    h.controller.play(track("b"));
    settle().await;

    let state = h.controller.snapshot();
    assert_eq!(state.current_track, Some(track("a")));
    assert_eq!(state.error.map(|e| e.kind), Some(ErrorKind::TransportFailure));
}

#[tokio::test(start_paused = true)]
async fn test_missing_device_on_remote_is_device_unavailable() {
    let h = ready(quiet_config()).await;
    h.api.fail_next(404);

    h.controller.play(track("a"));
    settle().await;

    assert_eq!(
        h.controller.snapshot().error.map(|e| e.kind),
        Some(ErrorKind::DeviceUnavailable)
    );
}

#[tokio::test(start_paused = true)]
async fn test_auth_expired_invalidates_once() {
    let h = ready(quiet_config()).await;
    h.api.fail_next(401);

    h.controller.play(track("a"));
    settle().await;
    assert_eq!(
        h.controller.snapshot().error.map(|e| e.kind),
        Some(ErrorKind::AuthExpired)
    );

    // Credentials are gone now; further failures must not invalidate again.
    h.controller.play(track("b"));
    h.session
        .emit(SessionEvent::AuthenticationError("token revoked".to_string()));
    settle().await;

    assert_eq!(h.auth.invalidations.load(Ordering::SeqCst), 1);
    assert_eq!(
        h.controller.snapshot().status,
        Status::Error(ErrorKind::AuthExpired)
    );
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_are_retried_when_configured() {
    let config = PlayerConfig {
        command_retries: 2,
        ..quiet_config()
    };
    let h = ready(config).await;
    h.api.fail_next(503);

    h.controller.play(track("a"));
    sleep(Duration::from_millis(600)).await;

    assert_eq!(h.api.plays(), vec![uri("a"), uri("a")]);
    assert_eq!(h.controller.snapshot().error, None);
}

#[tokio::test(start_paused = true)]
async fn test_auth_failures_are_never_retried() {
    let config = PlayerConfig {
        command_retries: 3,
        ..quiet_config()
    };
    let h = ready(config).await;
    h.api.fail_next(401);

    h.controller.play(track("a"));
    sleep(Duration::from_millis(3000)).await;

    assert_eq!(h.api.plays(), vec![uri("a")]);
}

#[tokio::test(start_paused = true)]
async fn test_successful_update_clears_error_and_dismiss_clears_too() {
    let h = start(quiet_config()).await;

    h.controller.play(track("a"));
    settle().await;
    assert!(h.controller.snapshot().error.is_some());

    h.controller.dismiss_error();
    settle().await;
    assert_eq!(h.controller.snapshot().error, None);

    h.session.emit(SessionEvent::Ready {
        device_id: "device-1".to_string(),
    });
    settle().await;
    h.api.fail_next(500);
    h.controller.play(track("a"));
    settle().await;
    assert!(h.controller.snapshot().error.is_some());

    h.session
        .emit(SessionEvent::StateChanged(Some(snapshot(true, 0, 200_000))));
    settle().await;
    let state = h.controller.snapshot();
    assert_eq!(state.error, None);
    assert_eq!(state.status, Status::Ready(Transport::Playing));
}

// Teardown

#[tokio::test(start_paused = true)]
async fn test_dispose_detaches_then_disconnects_once() {
    let h = ready(PlayerConfig::default()).await;
    h.session.set_state(Some(snapshot(true, 0, 200_000)));
    sleep(Duration::from_millis(1500)).await;

    let state = h.controller.watch();
    let Harness {
        controller,
        session,
        ..
    } = h;
    controller.dispose().await;

    let calls = session.calls();
    assert_eq!(session.count("disconnect"), 1);
    assert_eq!(
        &calls[calls.len() - 2..],
        &["remove_listener".to_string(), "disconnect".to_string()]
    );
    assert_eq!(session.listener_count(), 0);

    let disposed = state.borrow().clone();
    assert_eq!(disposed.status, Status::Disposed);
    assert!(!disposed.is_playing);

    // Neither timer survives teardown.
    let polls = session.polls.load(Ordering::SeqCst);
    sleep(Duration::from_millis(5000)).await;
    assert_eq!(session.polls.load(Ordering::SeqCst), polls);
    assert_eq!(*state.borrow(), disposed);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_the_handle_disposes() {
    let h = ready(quiet_config()).await;
    let session = Arc::clone(&h.session);

    drop(h);
    settle().await;

    assert_eq!(session.count("disconnect"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_replaces_the_session() {
    let first = Arc::new(FakeSession::default());
    let second = Arc::new(FakeSession::default());
    let provider = FakeProvider::with(vec![Arc::clone(&first), Arc::clone(&second)]);
    let h = start_with(provider, Arc::clone(&first), quiet_config()).await;

    first.emit(SessionEvent::Ready {
        device_id: "device-1".to_string(),
    });
    settle().await;

    h.controller.reconnect();
    settle().await;

    assert_eq!(first.count("disconnect"), 1);
    assert_eq!(first.listener_count(), 0);
    assert_eq!(second.count("connect"), 1);
    assert_eq!(second.listener_count(), 1);
    assert_eq!(h.controller.snapshot().status, Status::Connecting);

    // The registry was cleared, so commands wait for the new device.
    h.controller.play(track("a"));
    settle().await;
    assert_eq!(
        h.controller.snapshot().error.map(|e| e.kind),
        Some(ErrorKind::DeviceUnavailable)
    );

    second.emit(SessionEvent::Ready {
        device_id: "device-1".to_string(),
    });
    settle().await;
    h.controller.dismiss_error();
    h.controller.play(track("a"));
    settle().await;
    assert_eq!(h.api.plays(), vec![uri("a")]);
}

#[tokio::test(start_paused = true)]
async fn test_outcome_from_a_replaced_session_is_ignored() {
    let first = Arc::new(FakeSession::default());
    let second = Arc::new(FakeSession::default());
    let provider = FakeProvider::with(vec![Arc::clone(&first), Arc::clone(&second)]);
    let config = PlayerConfig {
        track_change: TrackChangePolicy::Rollback,
        ..quiet_config()
    };
    let h = start_with(provider, Arc::clone(&first), config).await;
    first.emit(SessionEvent::Ready {
        device_id: "device-1".to_string(),
    });
    settle().await;

    h.controller.play(track("a"));
    settle().await;

    // Starting `b` is still in flight when the session is replaced.
    h.api.delay_next(Duration::from_millis(500));
    h.api.fail_next(502);
    h.controller.play(track("b"));
    settle().await;
    h.controller.reconnect();
    settle().await;
    sleep(Duration::from_millis(600)).await;

    assert_eq!(h.api.plays(), vec![uri("a"), uri("b")]);
    let state = h.controller.snapshot();
    assert_eq!(state.current_track, Some(track("b")));
    assert_eq!(state.error, None);
    assert_eq!(state.status, Status::Connecting);
}
