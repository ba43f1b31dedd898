//! Playback engine: session lifecycle and playlist sequencing

pub mod controller;
pub mod playlist;
pub mod session;

pub use controller::PlaybackController;
pub use playlist::{Playlist, PlaylistSequencer, SequenceStep};
pub use session::{
    PlaybackSession, PlaybackStatus, SessionFailure, SessionHandle, SessionOutcome,
};
