//! The locally believed truth about playback.
//!
//! [`StateStore`] is written only by the controller. Authoritative updates
//! (pushed events and polls) overwrite position and duration; the progress
//! ticker may only move the displayed position forward, clamped to the
//! duration. Near-end detection reads authoritative snapshots exclusively.

use serde::Serialize;

use crate::{
    error::{ErrorKind, PlaybackError},
    playback::session::StateSnapshot,
    types::Track,
};

/// What the transport is doing while the controller is ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Idle,
    Playing,
    Paused,
}

/// Controller-level state machine, as observed from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Uninitialized,
    Connecting,
    Ready(Transport),
    Error(ErrorKind),
    Disposed,
}

/// Snapshot handed to readers of the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaybackState {
    pub is_active: bool,
    pub is_playing: bool,
    pub position_ms: u64,
    /// `0` while unknown or no track is loaded.
    pub duration_ms: u64,
    pub current_track: Option<Track>,
    pub error: Option<PlaybackError>,
    pub status: Status,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            is_active: false,
            is_playing: false,
            position_ms: 0,
            duration_ms: 0,
            current_track: None,
            error: None,
            status: Status::Uninitialized,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Connecting,
    Ready,
    /// The session could not be stood up. Only a reconnect leaves this.
    Failed,
    Disposed,
}

#[derive(Debug)]
pub struct StateStore {
    state: PlaybackState,
    phase: Phase,
    last_authoritative: Option<StateSnapshot>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        Self {
            state: PlaybackState::default(),
            phase: Phase::Uninitialized,
            last_authoritative: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn snapshot(&self) -> PlaybackState {
        let mut state = self.state.clone();
        state.status = self.status();
        state
    }

    pub fn status(&self) -> Status {
        match (self.phase, &self.state.error) {
            (Phase::Disposed, _) => Status::Disposed,
            (Phase::Failed, _) => Status::Error(ErrorKind::InitializationFailure),
            (_, Some(e)) => Status::Error(e.kind),
            (Phase::Uninitialized, None) => Status::Uninitialized,
            (Phase::Connecting, None) => Status::Connecting,
            (Phase::Ready, None) => {
                if self.state.is_playing {
                    Status::Ready(Transport::Playing)
                } else if self.last_authoritative.is_none() {
                    Status::Ready(Transport::Idle)
                } else {
                    Status::Ready(Transport::Paused)
                }
            }
        }
    }

    /// Whether commands and updates may still change anything.
    pub fn is_live(&self) -> bool {
        !matches!(self.phase, Phase::Failed | Phase::Disposed)
    }

    pub fn begin_connecting(&mut self) {
        self.phase = Phase::Connecting;
        self.state.is_active = false;
        self.state.is_playing = false;
        self.state.error = None;
        self.last_authoritative = None;
    }

    pub fn on_device_ready(&mut self) {
        if !self.is_live() {
            return;
        }
        self.phase = Phase::Ready;
        self.state.is_active = true;
    }

    /// The only path that turns `is_active` off.
    pub fn on_device_not_ready(&mut self) {
        self.state.is_active = false;
        self.state.is_playing = false;
    }

    /// Applies a pushed or polled snapshot. Returns `false` when the store
    /// no longer accepts updates.
    pub fn apply_authoritative(&mut self, snapshot: &StateSnapshot) -> bool {
        if !self.is_live() {
            return false;
        }

        self.state.is_active = true;
        self.state.is_playing = !snapshot.paused;
        self.state.duration_ms = snapshot.duration_ms;
        self.state.position_ms = if snapshot.duration_ms > 0 {
            snapshot.position_ms.min(snapshot.duration_ms)
        } else {
            snapshot.position_ms
        };
        self.state.error = None;
        self.last_authoritative = Some(snapshot.clone());
        true
    }

    /// Moves the displayed position forward between authoritative updates.
    /// Without a known duration there is no bound, so the position waits for
    /// the next authoritative update instead.
    pub fn interpolate(&mut self, elapsed_ms: u64) {
        if !self.state.is_playing || self.state.duration_ms == 0 {
            return;
        }
        self.state.position_ms = self
            .state
            .position_ms
            .saturating_add(elapsed_ms)
            .min(self.state.duration_ms);
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.state.current_track.as_ref()
    }

    /// Replaces the current track and returns the previous one.
    pub fn set_current_track(&mut self, track: Option<Track>) -> Option<Track> {
        std::mem::replace(&mut self.state.current_track, track)
    }

    pub fn set_error(&mut self, error: PlaybackError) {
        self.state.error = Some(error);
    }

    pub fn clear_error(&mut self) {
        self.state.error = None;
    }

    pub fn fail(&mut self, error: PlaybackError) {
        self.phase = Phase::Failed;
        self.state.is_playing = false;
        self.state.error = Some(error);
    }

    pub fn dispose(&mut self) {
        self.phase = Phase::Disposed;
        self.state.is_playing = false;
    }
}

/// One-shot trigger for auto-advancing when a track is about to end.
///
/// Fires at most once per crossing into the final window of a track and
/// re-arms only after an authoritative update shows a position outside that
/// window, so repeated polls during the last second cannot skip twice.
///
/// Starting a track puts the guard in an expecting state: until the remote
/// reports that track, updates naming another track are stale and must be
/// ignored. It also never fires for a track other than the current one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NearEndGuard {
    window_ms: u64,
    armed: bool,
    expected_uri: Option<String>,
    stale_seen: u32,
}

/// Stale updates tolerated while waiting for a requested track. The remote
/// may report a relinked uri that never matches.
pub const STALE_UPDATE_LIMIT: u32 = 5;

impl NearEndGuard {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            armed: true,
            expected_uri: None,
            stale_seen: 0,
        }
    }

    pub fn is_near_end(&self, snapshot: &StateSnapshot) -> bool {
        snapshot.duration_ms > 0
            && snapshot.position_ms.saturating_add(self.window_ms) >= snapshot.duration_ms
    }

    /// A track was requested on the device.
    pub fn expect(&mut self, track_uri: &str) {
        self.expected_uri = Some(track_uri.to_string());
        self.stale_seen = 0;
    }

    /// The requested track will not start, stop waiting for it.
    pub fn forget(&mut self, track_uri: &str) {
        if self.expected_uri.as_deref() == Some(track_uri) {
            self.expected_uri = None;
        }
    }

    pub fn expected(&self) -> Option<&str> {
        self.expected_uri.as_deref()
    }

    /// Whether `snapshot` still describes the track that was playing before
    /// the expected one. A snapshot without a track uri cannot be told apart
    /// and counts as current. Seeing the expected track, or
    /// [`STALE_UPDATE_LIMIT`] stale updates, ends the wait.
    pub fn is_stale(&mut self, snapshot: &StateSnapshot) -> bool {
        match (&self.expected_uri, &snapshot.track_uri) {
            (Some(expected), Some(uri)) if expected != uri => {
                if self.stale_seen < STALE_UPDATE_LIMIT {
                    self.stale_seen += 1;
                    return true;
                }
                log::debug!("remote never reported {expected}, accepting {uri}");
                self.expected_uri = None;
                false
            }
            (Some(_), _) => {
                self.expected_uri = None;
                false
            }
            (None, _) => false,
        }
    }

    /// Evaluates a polled snapshot against the current track. `true` means
    /// "advance now".
    pub fn observe_poll(&mut self, snapshot: &StateSnapshot, current_uri: Option<&str>) -> bool {
        if let (Some(uri), Some(current)) = (snapshot.track_uri.as_deref(), current_uri) {
            if uri != current {
                return false;
            }
        }
        if !self.is_near_end(snapshot) {
            self.armed = true;
            return false;
        }
        if snapshot.paused || !self.armed {
            return false;
        }
        self.armed = false;
        true
    }

    /// Pushed updates never trigger an advance but may re-arm the guard.
    pub fn observe_push(&mut self, snapshot: &StateSnapshot) {
        if !self.is_near_end(snapshot) {
            self.armed = true;
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Back to the initial state, for a fresh session.
    pub fn rearm(&mut self) {
        self.armed = true;
        self.expected_uri = None;
    }
}
