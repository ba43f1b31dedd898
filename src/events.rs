//! Session event values
//!
//! Provider callbacks never run playback logic on the thread that delivers
//! them. Each callback becomes a [`SessionEvent`] value pushed onto the
//! session's internal queue; the run loop drains the queue and dispatches one
//! event at a time, preserving delivery order. Controller pause/resume
//! requests travel the same path as [`SessionCommand`] values, so the
//! run-loop thread stays the only caller of provider operations.
//!
//! End-of-track is the exception: it is a latched flag on the session
//! monitor rather than a queued value, because the run loop acts on it after
//! the current drain regardless of how many other events are pending.

use crate::provider::ProviderError;

/// Asynchronous stimuli consumed by the session run loop.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Outcome of the login attempt started at session creation
    LoginComplete(Result<(), ProviderError>),

    /// The provider finished loading metadata for a pending track
    MetadataUpdated,

    /// The provider wants the run loop to pump its event processing
    Wake,

    /// Another client on the account took over playback
    PlayTokenLost,

    /// Free-form log line from the provider
    LogMessage(String),

    /// Controller request routed through the session queue
    Command(SessionCommand),
}

/// Controller-issued playback commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Pause,
    Resume,
}
