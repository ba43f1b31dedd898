//! # tunebox
//!
//! Embedded streaming jukebox core: continuous, controllable playback of a
//! sequence of remotely-resolved audio tracks.
//!
//! **Purpose:** drive an external streaming provider through login, track
//! resolution, and playback; buffer the decoded audio it delivers; and
//! traverse playlists with shuffle/repeat, all cooperatively cancellable
//! from a controller thread.
//!
//! **Architecture:** four independently-clocked actors glued together by two
//! monitors: a controller issuing commands, a per-track session run loop
//! pumping provider events, the provider's notification threads, and an
//! output pump draining the bounded audio FIFO into a cpal stream.
//!
//! The provider itself (authentication, catalog, decoding, DRM, transport)
//! is not implemented here; see [`provider`] for the boundary.

pub mod audio;
pub mod config;
pub mod error;
pub mod events;
pub mod playback;
pub mod provider;
pub mod task;

pub use audio::{AudioChunk, AudioFifo, StereoFrame};
pub use config::{load_config, Credentials, OutputConfig, PlayerConfig};
pub use error::{Error, Result};
pub use events::{SessionCommand, SessionEvent};
pub use playback::{
    PlaybackController, PlaybackSession, PlaybackStatus, Playlist, SessionFailure, SessionHandle,
    SessionOutcome,
};
pub use provider::{ProviderError, ProviderSession, SessionNotifier, StreamingProvider};
pub use task::{StopToken, Task};
