//! # Playback Session Controller
//!
//! Keeps one remote playback session (a Spotify Connect device) in sync
//! with the application: which track is current, whether it plays, where
//! it is, and what went wrong.
//!
//! ## Components
//!
//! - [`device`] - the device id assigned by the session and its readiness.
//! - [`state`] - the locally believed playback state, the status state
//!   machine and the near-end guard.
//! - [`ticker`] - local position interpolation between authoritative
//!   updates.
//! - [`sequencer`] - next/previous over the caller's candidate list.
//! - [`gateway`] - serialized outbound commands with a retry policy.
//! - [`session`] - the contracts a remote session, its provider and the
//!   authentication provider fulfil.
//! - [`connect`] - a session backed by the Connect Web API.
//! - [`controller`] - the actor tying everything together.
//!
//! ## Flow
//!
//! ```text
//! UI commands ──┐
//! session events┼──> Controller task ──> watch<PlaybackState>
//! ticks / polls ┤        │            └─> broadcast<ControllerEvent>
//! outcomes ─────┘        └──> CommandGateway ──> RemoteSession / PlaybackApi
//! ```

pub mod connect;
pub mod controller;
pub mod device;
pub mod gateway;
pub mod sequencer;
pub mod session;
pub mod state;
pub mod ticker;

pub use connect::{WebApiSession, WebApiSessionProvider};
pub use controller::{Command, Controller, ControllerEvent};
pub use device::DeviceRegistry;
pub use gateway::{CommandGateway, GatewayOutcome, GatewayRequest, PlaybackApi};
pub use sequencer::{Direction, TrackSequencer};
pub use session::{
    AuthProvider, Listener, ListenerId, RemoteSession, SessionEvent, SessionProvider,
    StateSnapshot,
};
pub use state::{NearEndGuard, Phase, PlaybackState, StateStore, Status, Transport};
pub use ticker::ProgressTicker;
