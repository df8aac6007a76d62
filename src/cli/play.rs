use std::{sync::Arc, time::Duration};

use indicatif::{ProgressBar, ProgressStyle};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
    time::timeout,
};

use crate::{
    config::PlayerConfig,
    error,
    error::ErrorKind,
    info,
    management::{LIST_LAST_SEARCH, LIST_WORKING_PLAYLIST, TokenProvider, TrackListManager},
    playback::{
        AuthProvider, Controller, ControllerEvent, PlaybackState, Status, Transport,
        WebApiSessionProvider,
    },
    spotify::player::WebPlaybackApi,
    success,
    types::Track,
    utils, warning,
};

const READY_TIMEOUT: Duration = Duration::from_secs(30);

/// A line typed into the interactive player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerInput {
    /// 1-based row of the candidate list.
    Play(usize),
    Next,
    Previous,
    Toggle,
    /// Target position in milliseconds.
    Seek(u64),
    Dismiss,
    Reconnect,
    Quit,
}

/// Parses one input line. A line of only spaces toggles playback; an empty
/// line means nothing.
pub fn parse_player_input(line: &str) -> Option<PlayerInput> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return (!line.is_empty()).then_some(PlayerInput::Toggle);
    }

    let mut parts = trimmed.split_whitespace();
    let command = parts.next()?.to_ascii_lowercase();
    let argument = parts.next();
    if parts.next().is_some() {
        return None;
    }

    match (command.as_str(), argument) {
        ("n" | "next", None) => Some(PlayerInput::Next),
        ("p" | "prev" | "previous", None) => Some(PlayerInput::Previous),
        ("space" | "toggle" | "t", None) => Some(PlayerInput::Toggle),
        ("seek" | "s", Some(secs)) => secs
            .parse::<u64>()
            .ok()
            .map(|s| PlayerInput::Seek(s.saturating_mul(1000))),
        ("dismiss" | "d", None) => Some(PlayerInput::Dismiss),
        ("reconnect" | "r", None) => Some(PlayerInput::Reconnect),
        ("q" | "quit" | "exit", None) => Some(PlayerInput::Quit),
        (row, None) => row
            .parse::<usize>()
            .ok()
            .filter(|row| *row > 0)
            .map(PlayerInput::Play),
        _ => None,
    }
}

/// Candidates: the last search result followed by the working playlist.
async fn load_candidates() -> Vec<Track> {
    let mut candidates = Vec::new();
    for name in [LIST_LAST_SEARCH, LIST_WORKING_PLAYLIST] {
        match TrackListManager::load(name).await {
            Ok(list) => candidates.extend_from_slice(list.tracks()),
            Err(e) => warning!("Failed to load {}: {}", name, e),
        }
    }
    candidates
}

pub async fn play(start: Option<usize>) {
    let config = match PlayerConfig::from_env() {
        Ok(config) => config,
        Err(e) => error!("Invalid player configuration: {}", e),
    };

    let candidates = load_candidates().await;
    if candidates.is_empty() {
        warning!("Nothing to play. Run partymix search or partymix playlist add first.");
        return;
    }

    let auth: Arc<dyn AuthProvider> = Arc::new(TokenProvider::load().await);
    if auth.valid_token().await.is_none() {
        error!("No valid token found. Please run partymix auth");
    }

    let provider = Arc::new(WebApiSessionProvider::new(
        Arc::clone(&auth),
        config.device_name.clone(),
        config.poll_interval,
    ));
    let controller = Controller::spawn(provider, Arc::new(WebPlaybackApi), auth, config);
    controller.set_candidates(candidates.clone());

    info!("Connecting to a Spotify Connect device...");
    if let Err(message) = wait_until_ready(&controller).await {
        controller.dispose().await;
        error!("Player is not available: {}", message);
    }
    success!("Device ready. {} tracks queued.", candidates.len());
    print_help();

    if let Some(row) = start {
        start_row(&controller, &candidates, row);
    }

    let bar = progress_bar();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut state = controller.watch();
    let mut events = controller.subscribe();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        log::warn!("cannot read input: {e}");
                        break;
                    }
                };
                match parse_player_input(&line) {
                    Some(PlayerInput::Quit) => break,
                    Some(input) => apply(&controller, &candidates, input),
                    None if line.is_empty() => {}
                    None => bar.suspend(|| warning!("Unknown command: {}", line.trim())),
                }
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = state.borrow_and_update().clone();
                render(&bar, &snapshot);
            }
            event = events.recv() => match event {
                Ok(ControllerEvent::TrackChanged(track)) => {
                    bar.suspend(|| info!("Now playing {} - {}", track.artist, track.title));
                }
                Ok(ControllerEvent::Failed(e)) => bar.suspend(|| warning!("{}", e)),
                Ok(ControllerEvent::StatusChanged(status)) => log::debug!("player status {status:?}"),
                Err(RecvError::Lagged(missed)) => log::debug!("missed {missed} player events"),
                Err(RecvError::Closed) => break,
            }
        }
    }

    bar.finish_and_clear();
    controller.dispose().await;
    success!("Player stopped.");
}

async fn wait_until_ready(controller: &Controller) -> Result<(), String> {
    let mut state = controller.watch();

    let waiting = async {
        loop {
            let status = state.borrow_and_update().status;
            match status {
                Status::Ready(_) => return Ok(()),
                Status::Error(ErrorKind::InitializationFailure | ErrorKind::AuthExpired) => {
                    let message = state
                        .borrow()
                        .error
                        .as_ref()
                        .map(ToString::to_string)
                        .unwrap_or_else(|| "initialization failed".to_string());
                    return Err(message);
                }
                _ => {}
            }
            if state.changed().await.is_err() {
                return Err("player stopped".to_string());
            }
        }
    };

    timeout(READY_TIMEOUT, waiting).await.unwrap_or_else(|_| {
        Err(format!(
            "no device became ready within {}s, open Spotify somewhere and retry",
            READY_TIMEOUT.as_secs()
        ))
    })
}

fn start_row(controller: &Controller, candidates: &[Track], row: usize) {
    match utils::pick_rows(candidates, &[row]).into_iter().next() {
        Some(track) => controller.play(track),
        None => warning!("There is no row {}.", row),
    }
}

fn apply(controller: &Controller, candidates: &[Track], input: PlayerInput) {
    match input {
        PlayerInput::Play(row) => start_row(controller, candidates, row),
        PlayerInput::Next => controller.play_next(),
        PlayerInput::Previous => controller.play_previous(),
        PlayerInput::Toggle => controller.toggle_play(),
        PlayerInput::Seek(position_ms) => controller.seek(position_ms),
        PlayerInput::Dismiss => controller.dismiss_error(),
        PlayerInput::Reconnect => controller.reconnect(),
        PlayerInput::Quit => {}
    }
}

fn print_help() {
    info!("Commands: <row> play | n next | p prev | space/toggle | seek <secs> | dismiss | reconnect | q quit");
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(1);
    bar.set_style(
        ProgressStyle::with_template("{prefix:>10.bold} [{bar:30.green/blue}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    bar
}

fn status_label(status: Status) -> &'static str {
    match status {
        Status::Uninitialized => "idle",
        Status::Connecting => "connecting",
        Status::Ready(Transport::Idle) => "ready",
        Status::Ready(Transport::Playing) => "playing",
        Status::Ready(Transport::Paused) => "paused",
        Status::Error(_) => "error",
        Status::Disposed => "stopped",
    }
}

fn render(bar: &ProgressBar, state: &PlaybackState) {
    let title = state
        .current_track
        .as_ref()
        .map(|t| format!("{} - {}", t.artist, t.title))
        .unwrap_or_else(|| "nothing selected".to_string());

    bar.set_length(state.duration_ms.max(1));
    bar.set_position(state.position_ms);
    bar.set_prefix(status_label(state.status));
    bar.set_message(format!(
        "{title}  {}/{}",
        utils::format_duration(state.position_ms),
        utils::format_duration(state.duration_ms)
    ));
}
