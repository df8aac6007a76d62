//! Contracts of the remote playback session the controller drives.
//!
//! A [`RemoteSession`] is a live connection to one playback device. It
//! exposes transport controls, an authoritative state snapshot and a stream
//! of [`SessionEvent`]s delivered to listeners. Handles are obtained from a
//! [`SessionProvider`], which the application constructs once and passes to
//! every controller that needs a session.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::Res;

/// Authoritative playback state as reported by the remote side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSnapshot {
    pub paused: bool,
    pub position_ms: u64,
    pub duration_ms: u64,
    /// URI of the track the remote side is playing, when it says so.
    pub track_uri: Option<String>,
}

/// Events pushed by a remote session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Ready { device_id: String },
    NotReady { device_id: String },
    /// `None` when the remote side reports no playback at all.
    StateChanged(Option<StateSnapshot>),
    InitializationError(String),
    AuthenticationError(String),
    AccountError(String),
}

pub type ListenerId = u64;

/// A subscription to a session's events. Dropping it or passing its id to
/// [`RemoteSession::remove_listener`] detaches it.
#[derive(Debug)]
pub struct Listener {
    pub id: ListenerId,
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
}

/// A live connection to a playback device.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Starts the connection. `Ok(false)` means the remote side refused.
    async fn connect(&self) -> Res<bool>;

    fn disconnect(&self);

    fn add_listener(&self) -> Listener;

    fn remove_listener(&self, id: ListenerId);

    async fn toggle_play(&self) -> Res<()>;

    async fn seek(&self, position_ms: u64) -> Res<()>;

    async fn current_state(&self) -> Res<Option<StateSnapshot>>;
}

/// Creates session handles. Constructed once by the application root.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn open(&self) -> Res<Arc<dyn RemoteSession>>;
}

/// Supplies bearer tokens and owns recovery from rejected credentials.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// A token that is not known to be expired, if any.
    async fn valid_token(&self) -> Option<String>;

    /// Forgets stored credentials so the user has to authenticate again.
    async fn invalidate(&self);
}
