//! The playback session controller.
//!
//! A [`Controller`] is a cheap handle to a single task that owns the remote
//! session, the device registry, the state store and both timers. Everything
//! that can change playback state (UI commands, pushed session events, timer
//! ticks, poll results, command outcomes) arrives at that task as a
//! [`Message`] and is applied by one reducer, so no two updates interleave.
//!
//! Readers get snapshots through [`Controller::snapshot`] or
//! [`Controller::watch`] and notifications through
//! [`Controller::subscribe`]. Commands return immediately; failures show up
//! in [`PlaybackState::error`] and as [`ControllerEvent::Failed`].

use std::{ops::ControlFlow, sync::Arc};

use tokio::{
    sync::{broadcast, mpsc, watch},
    task::{JoinHandle, JoinSet},
    time::{Instant, Interval, MissedTickBehavior, interval_at},
};

use crate::{
    Res,
    config::{PlayerConfig, TrackChangePolicy},
    error::{ErrorKind, PlaybackError},
    playback::{
        device::DeviceRegistry,
        gateway::{CommandGateway, GatewayOutcome, GatewayRequest, PlaybackApi},
        sequencer::{Direction, TrackSequencer},
        session::{
            AuthProvider, Listener, RemoteSession, SessionEvent, SessionProvider, StateSnapshot,
        },
        state::{NearEndGuard, PlaybackState, StateStore, Status},
        ticker::ProgressTicker,
    },
    types::Track,
};

const EVENT_CAPACITY: usize = 64;

/// Requests accepted from the UI layer.
#[derive(Debug, Clone)]
pub enum Command {
    Play(Track),
    Next,
    Previous,
    TogglePlay,
    Seek(u64),
    SetCandidates(Arc<[Track]>),
    DismissError,
    Reconnect,
    Dispose,
}

/// Notifications for the UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    TrackChanged(Track),
    StatusChanged(Status),
    Failed(PlaybackError),
}

#[derive(Debug)]
enum Message {
    Command(Command),
    Session(SessionEvent),
    Tick,
    Reconcile,
    Connected { generation: u64, result: Res<bool> },
    Polled { generation: u64, result: Res<Option<StateSnapshot>> },
    Completed(GatewayOutcome),
}

/// Handle to a running playback session controller.
pub struct Controller {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<PlaybackState>,
    events: broadcast::Sender<ControllerEvent>,
    task: JoinHandle<()>,
}

impl Controller {
    /// Starts a controller. A session is opened from `provider` right away.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        provider: Arc<dyn SessionProvider>,
        api: Arc<dyn PlaybackApi>,
        auth: Arc<dyn AuthProvider>,
        config: PlayerConfig,
    ) -> Self {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(PlaybackState::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();

        let runner = Runner {
            ticker: ProgressTicker::new(config.tick_interval),
            guard: NearEndGuard::new(config.near_end_ms()),
            config,
            provider,
            api,
            auth,
            commands: commands_rx,
            internal_tx,
            internal_rx,
            outcomes_tx,
            outcomes_rx,
            link: None,
            generation: 0,
            store: StateStore::new(),
            registry: DeviceRegistry::new(),
            poll_timer: None,
            poll_in_flight: false,
            background: JoinSet::new(),
            sequencer: TrackSequencer::default(),
            auth_invalidated: false,
            state_tx,
            events: events.clone(),
            last_status: Status::Uninitialized,
        };

        let task = tokio::spawn(runner.run());

        Self {
            commands,
            state,
            events,
            task,
        }
    }

    pub fn snapshot(&self) -> PlaybackState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<PlaybackState> {
        self.state.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub fn play(&self, track: Track) {
        self.send(Command::Play(track));
    }

    pub fn play_next(&self) {
        self.send(Command::Next);
    }

    pub fn play_previous(&self) {
        self.send(Command::Previous);
    }

    pub fn toggle_play(&self) {
        self.send(Command::TogglePlay);
    }

    pub fn seek(&self, position_ms: u64) {
        self.send(Command::Seek(position_ms));
    }

    pub fn set_candidates(&self, candidates: impl Into<Arc<[Track]>>) {
        self.send(Command::SetCandidates(candidates.into()));
    }

    pub fn dismiss_error(&self) {
        self.send(Command::DismissError);
    }

    /// Replaces the remote session with a freshly opened one.
    pub fn reconnect(&self) {
        self.send(Command::Reconnect);
    }

    /// Tears the controller down and waits until the session is
    /// disconnected. Terminal.
    pub async fn dispose(self) {
        self.send(Command::Dispose);
        if let Err(e) = self.task.await {
            log::error!("controller task ended abnormally: {e}");
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            log::debug!("controller is gone, dropping command");
        }
    }
}

struct Link {
    session: Arc<dyn RemoteSession>,
    listener: Listener,
    gateway: CommandGateway,
}

struct Runner {
    config: PlayerConfig,
    provider: Arc<dyn SessionProvider>,
    api: Arc<dyn PlaybackApi>,
    auth: Arc<dyn AuthProvider>,

    commands: mpsc::UnboundedReceiver<Command>,
    internal_tx: mpsc::UnboundedSender<Message>,
    internal_rx: mpsc::UnboundedReceiver<Message>,
    outcomes_tx: mpsc::UnboundedSender<GatewayOutcome>,
    outcomes_rx: mpsc::UnboundedReceiver<GatewayOutcome>,

    link: Option<Link>,
    /// Bumped on every new session so late results of an old one are
    /// ignored.
    generation: u64,

    store: StateStore,
    registry: DeviceRegistry,
    ticker: ProgressTicker,
    poll_timer: Option<Interval>,
    poll_in_flight: bool,
    background: JoinSet<()>,
    sequencer: TrackSequencer,
    guard: NearEndGuard,
    auth_invalidated: bool,

    state_tx: watch::Sender<PlaybackState>,
    events: broadcast::Sender<ControllerEvent>,
    last_status: Status,
}

impl Runner {
    async fn run(mut self) {
        self.open_session().await;
        self.publish();

        loop {
            let message = tokio::select! {
                biased;

                command = self.commands.recv() => {
                    // All handles dropped: same as an explicit dispose.
                    Message::Command(command.unwrap_or(Command::Dispose))
                }
                event = next_session_event(&mut self.link) => Message::Session(event),
                Some(message) = self.internal_rx.recv() => message,
                Some(outcome) = self.outcomes_rx.recv() => Message::Completed(outcome),
                () = self.ticker.tick() => Message::Tick,
                () = next_poll(&mut self.poll_timer) => Message::Reconcile,
            };

            if self.handle(message).await.is_break() {
                break;
            }
            self.publish();
        }

        self.detach();
        self.store.dispose();
        self.publish();
        log::debug!("controller disposed");
    }

    async fn handle(&mut self, message: Message) -> ControlFlow<()> {
        match message {
            Message::Command(Command::Dispose) => return ControlFlow::Break(()),
            Message::Command(command) => self.on_command(command).await,
            Message::Session(event) => self.on_session_event(event).await,
            Message::Tick => {
                self.store.interpolate(self.config.tick_ms());
                log::trace!("tick, position {}ms", self.store.state().position_ms);
            }
            Message::Reconcile => self.start_poll(),
            Message::Connected { generation, result } => {
                if generation == self.generation {
                    self.on_connected(result).await;
                }
            }
            Message::Polled { generation, result } => {
                if generation == self.generation {
                    self.poll_in_flight = false;
                    self.on_polled(result).await;
                }
            }
            Message::Completed(outcome) => {
                if outcome.generation == self.generation {
                    self.on_outcome(outcome).await;
                } else {
                    log::debug!("dropping outcome of session {}", outcome.generation);
                }
            }
        }
        ControlFlow::Continue(())
    }

    async fn on_command(&mut self, command: Command) {
        log::debug!("command {command:?}");

        match command {
            Command::SetCandidates(candidates) => {
                self.sequencer.set_candidates(candidates);
                return;
            }
            Command::DismissError => {
                self.store.clear_error();
                return;
            }
            Command::Reconnect => {
                self.reconnect().await;
                return;
            }
            _ => {}
        }

        if !self.store.is_live() {
            log::warn!("ignoring {command:?}, the player is not usable");
            return;
        }

        match command {
            Command::Play(track) => self.start_track(track),
            Command::Next => self.skip(Direction::Next),
            Command::Previous => self.skip(Direction::Previous),
            Command::TogglePlay => {
                if self.require_device().is_some() {
                    self.submit(GatewayRequest::TogglePlay);
                }
            }
            Command::Seek(position_ms) => self.seek(position_ms),
            Command::SetCandidates(_)
            | Command::DismissError
            | Command::Reconnect
            | Command::Dispose => {}
        }
    }

    fn skip(&mut self, direction: Direction) {
        let Some(track) = self
            .sequencer
            .resolve(self.store.current_track(), direction)
            .cloned()
        else {
            log::debug!("no candidates to skip {direction:?} to");
            return;
        };
        self.start_track(track);
    }

    /// Selects `track` immediately and asks the device to start it.
    fn start_track(&mut self, track: Track) {
        let Some(device_id) = self.require_device() else {
            return;
        };

        log::debug!("starting {} on {device_id}", track.uri);
        self.guard.expect(&track.uri);
        let previous = self.store.set_current_track(Some(track.clone()));
        let _ = self.events.send(ControllerEvent::TrackChanged(track.clone()));

        self.submit(GatewayRequest::Play {
            track,
            device_id,
            previous,
        });
    }

    fn seek(&mut self, position_ms: u64) {
        let duration_ms = self.store.state().duration_ms;

        // Seeking into the final window behaves like skipping ahead.
        if position_ms.saturating_add(self.config.near_end_ms()) >= duration_ms {
            log::debug!("seek to {position_ms}ms of {duration_ms}ms, skipping to next");
            self.skip(Direction::Next);
            return;
        }

        if self.require_device().is_some() {
            self.submit(GatewayRequest::Seek { position_ms });
        }
    }

    fn require_device(&mut self) -> Option<String> {
        let required = self.registry.require().map(str::to_string);
        match required {
            Ok(id) => Some(id),
            Err(e) => {
                self.report(e);
                None
            }
        }
    }

    fn submit(&mut self, request: GatewayRequest) {
        let submitted = self
            .link
            .as_ref()
            .is_some_and(|link| link.gateway.submit(request));
        if !submitted {
            self.report(PlaybackError::device_unavailable());
        }
    }

    async fn on_session_event(&mut self, event: SessionEvent) {
        log::debug!("session event {event:?}");

        match event {
            SessionEvent::Ready { device_id } => {
                self.registry.on_ready(&device_id);
                self.store.on_device_ready();
            }
            SessionEvent::NotReady { device_id } => {
                self.registry.on_not_ready(&device_id);
                self.store.on_device_not_ready();
                self.ticker.cancel();
            }
            SessionEvent::StateChanged(Some(snapshot)) => {
                if self.guard.is_stale(&snapshot) {
                    log::trace!("ignoring pushed update for the previous track");
                } else if self.store.apply_authoritative(&snapshot) {
                    self.guard.observe_push(&snapshot);
                    self.ticker.reset(!snapshot.paused);
                }
            }
            SessionEvent::StateChanged(None) => {}
            SessionEvent::InitializationError(message) => {
                self.fail(PlaybackError::initialization(message));
            }
            SessionEvent::AuthenticationError(message) => {
                self.auth_expired(PlaybackError::auth_expired(message)).await;
            }
            SessionEvent::AccountError(message) => {
                self.fail(PlaybackError::initialization(format!(
                    "account cannot stream: {message}"
                )));
            }
        }
    }

    async fn on_connected(&mut self, result: Res<bool>) {
        match result {
            Ok(true) => log::debug!("session connected, waiting for device"),
            Ok(false) => self.fail(PlaybackError::initialization(
                "remote session refused to connect",
            )),
            Err(e) => {
                let error = PlaybackError::from(e);
                if error.kind == ErrorKind::AuthExpired {
                    self.auth_expired(error).await;
                } else {
                    self.fail(PlaybackError::initialization(error.message));
                }
            }
        }
    }

    fn start_poll(&mut self) {
        while self.background.try_join_next().is_some() {}

        if self.poll_in_flight || !self.store.is_live() {
            return;
        }
        let Some(link) = &self.link else {
            return;
        };

        let session = Arc::clone(&link.session);
        let tx = self.internal_tx.clone();
        let generation = self.generation;
        self.poll_in_flight = true;
        self.background.spawn(async move {
            let result = session.current_state().await;
            let _ = tx.send(Message::Polled { generation, result });
        });
    }

    async fn on_polled(&mut self, result: Res<Option<StateSnapshot>>) {
        let snapshot = match result {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return,
            Err(e) => {
                let error = PlaybackError::from(e);
                if error.kind == ErrorKind::AuthExpired {
                    self.auth_expired(error).await;
                } else {
                    log::debug!("state poll failed: {error}");
                }
                return;
            }
        };

        if !self.store.is_live() {
            return;
        }

        log::trace!("polled {snapshot:?}");
        if self.guard.is_stale(&snapshot) {
            log::trace!("remote has not switched to {:?} yet", self.guard.expected());
            return;
        }

        let current_uri = self.store.current_track().map(|t| t.uri.as_str());
        if self.guard.observe_poll(&snapshot, current_uri) {
            log::debug!("track ending, advancing");
            self.skip(Direction::Next);
            return;
        }

        if self.store.apply_authoritative(&snapshot) {
            self.ticker.reset(!snapshot.paused);
        }
    }

    async fn on_outcome(&mut self, outcome: GatewayOutcome) {
        let error = match outcome.result {
            Ok(()) => {
                self.store.clear_error();
                return;
            }
            Err(e) => e,
        };

        if let GatewayRequest::Play {
            track, previous, ..
        } = &outcome.request
        {
            self.guard.forget(&track.uri);
            let still_current = self.store.current_track() == Some(track);
            if self.config.track_change == TrackChangePolicy::Rollback && still_current {
                log::debug!("rolling back to the previous track");
                self.store.set_current_track(previous.clone());
                if let Some(previous) = previous {
                    let _ = self
                        .events
                        .send(ControllerEvent::TrackChanged(previous.clone()));
                }
            }
        }

        if error.kind == ErrorKind::AuthExpired {
            self.auth_expired(error).await;
        } else {
            self.report(error);
        }
    }

    /// Records a failure. The caller may retry by issuing the command again.
    fn report(&mut self, error: PlaybackError) {
        log::debug!("reporting {error}");
        self.store.set_error(error.clone());
        let _ = self.events.send(ControllerEvent::Failed(error));
    }

    /// Rejected credentials: report, and hand recovery to the
    /// authentication provider once per session.
    async fn auth_expired(&mut self, error: PlaybackError) {
        self.report(error);
        if !self.auth_invalidated {
            self.auth_invalidated = true;
            self.auth.invalidate().await;
        }
    }

    fn fail(&mut self, error: PlaybackError) {
        log::warn!("player failed: {error}");
        self.ticker.cancel();
        self.poll_timer = None;
        self.store.fail(error.clone());
        let _ = self.events.send(ControllerEvent::Failed(error));
    }

    async fn open_session(&mut self) {
        self.generation += 1;
        self.auth_invalidated = false;
        self.poll_in_flight = false;

        let session = match self.provider.open().await {
            Ok(session) => session,
            Err(e) => {
                self.fail(PlaybackError::initialization(format!(
                    "cannot open a session: {e}"
                )));
                return;
            }
        };

        let listener = session.add_listener();
        let gateway = CommandGateway::spawn(
            Arc::clone(&session),
            Arc::clone(&self.api),
            Arc::clone(&self.auth),
            self.config.command_retries,
            self.generation,
            self.outcomes_tx.clone(),
        );

        self.store.begin_connecting();
        self.guard.rearm();

        let period = self.config.poll_interval;
        let mut poll_timer = interval_at(Instant::now() + period, period);
        poll_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.poll_timer = Some(poll_timer);

        let tx = self.internal_tx.clone();
        let generation = self.generation;
        let connecting = Arc::clone(&session);
        self.background.spawn(async move {
            let result = connecting.connect().await;
            let _ = tx.send(Message::Connected { generation, result });
        });

        self.link = Some(Link {
            session,
            listener,
            gateway,
        });
        log::debug!("session {} opened", self.generation);
    }

    async fn reconnect(&mut self) {
        log::info!("reconnecting playback session");
        self.detach();
        self.open_session().await;
    }

    /// Stops both timers, detaches from the session and disconnects it.
    /// Listeners go first so nothing fires against a half-torn-down state.
    fn detach(&mut self) {
        self.ticker.cancel();
        self.poll_timer = None;
        self.background.abort_all();
        self.poll_in_flight = false;

        if let Some(link) = self.link.take() {
            link.session.remove_listener(link.listener.id);
            drop(link.listener);
            link.gateway.shutdown();
            link.session.disconnect();
        }
        self.registry.clear();
    }

    fn publish(&mut self) {
        let snapshot = self.store.snapshot();

        if snapshot.status != self.last_status {
            log::debug!("status {:?} -> {:?}", self.last_status, snapshot.status);
            self.last_status = snapshot.status;
            let _ = self
                .events
                .send(ControllerEvent::StatusChanged(snapshot.status));
        }

        self.state_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}

async fn next_session_event(link: &mut Option<Link>) -> SessionEvent {
    match link {
        Some(link) => match link.listener.events.recv().await {
            Some(event) => event,
            None => std::future::pending().await,
        },
        None => std::future::pending().await,
    }
}

async fn next_poll(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}
