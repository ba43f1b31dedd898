//! Streaming provider boundary
//!
//! The provider supplies authentication, catalog resolution, decoding and
//! transport; this crate only drives it. Implementations hand decoded PCM
//! and lifecycle notifications back through the [`SessionNotifier`] they
//! receive at session creation, from whatever threads they own. The notifier
//! only records state and signals the session monitor; it never runs
//! playback logic on the provider's thread.

use crate::audio::fifo::AudioFifo;
use crate::audio::types::AudioChunk;
use crate::config::{Credentials, PlayerConfig};
use crate::events::SessionEvent;
use crate::playback::session::SessionShared;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors reported across the provider boundary.
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// Login rejected; terminal for the session, never retried
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Track URI invalid or unresolvable
    #[error("track not found: {0}")]
    TrackNotFound(String),

    /// Track resolved but its metadata has not arrived yet; a load retried
    /// after the next metadata notification may succeed
    #[error("track metadata not yet available")]
    TrackNotReady,

    /// Provider session could not be constructed
    #[error("session error: {0}")]
    Session(String),

    /// Anything else the provider wants to surface
    #[error("provider internal error: {0}")]
    Internal(String),
}

/// Factory for provider sessions.
pub trait StreamingProvider: Send + Sync {
    type Session: ProviderSession;

    /// Construct a session. The provider keeps the notifier and uses it for
    /// all asynchronous delivery for that session's lifetime.
    fn create_session(
        &self,
        config: &PlayerConfig,
        notifier: SessionNotifier,
    ) -> Result<Self::Session, ProviderError>;
}

/// One login's worth of provider state.
///
/// All methods are called from the session run-loop thread only. Dropping
/// the session releases it; the run loop drops it exactly once.
pub trait ProviderSession: Send {
    type Track: Send;

    /// Begin the login handshake; the outcome arrives later through
    /// [`SessionNotifier::login_complete`].
    fn login(&mut self, credentials: &Credentials) -> Result<(), ProviderError>;

    /// Resolve a track URI to a track handle.
    fn resolve_track(&mut self, uri: &str) -> Result<Self::Track, ProviderError>;

    /// Human-readable track name, once metadata is available.
    fn track_name(&self, track: &Self::Track) -> Option<String>;

    /// Load a resolved track for playback. Returns
    /// [`ProviderError::TrackNotReady`] while metadata is still in flight.
    fn load(&mut self, track: &Self::Track) -> Result<(), ProviderError>;

    /// Start (`true`) or pause (`false`) playback of the loaded track.
    fn play(&mut self, enabled: bool) -> Result<(), ProviderError>;

    /// Unload the loaded track, stopping frame delivery.
    fn unload(&mut self);

    /// Pump provider-internal event processing.
    ///
    /// Returns the provider's next-timeout hint; zero means more work is
    /// immediately pending and the caller should pump again.
    fn process_events(&mut self) -> Duration;
}

/// Handle the provider uses to deliver asynchronous notifications.
///
/// Clone + Send + Sync: the provider may call it from any of its threads.
#[derive(Clone)]
pub struct SessionNotifier {
    shared: Arc<SessionShared>,
    fifo: Arc<AudioFifo>,
}

impl SessionNotifier {
    pub(crate) fn new(shared: Arc<SessionShared>, fifo: Arc<AudioFifo>) -> Self {
        Self { shared, fifo }
    }

    /// Report the outcome of the login handshake.
    pub fn login_complete(&self, result: Result<(), ProviderError>) {
        self.shared.push_event(SessionEvent::LoginComplete(result));
    }

    /// Metadata became available for a previously-resolved track.
    pub fn metadata_updated(&self) {
        self.shared.push_event(SessionEvent::MetadataUpdated);
    }

    /// Ask the run loop to pump provider event processing.
    pub fn wake(&self) {
        self.shared.push_event(SessionEvent::Wake);
    }

    /// Deliver decoded PCM. Returns the number of frames accepted; zero
    /// means the buffer is full and the provider should redeliver later.
    pub fn deliver_frames(&self, chunk: AudioChunk) -> usize {
        self.fifo.push(chunk)
    }

    /// The loaded track finished playing.
    pub fn end_of_track(&self) {
        self.shared.set_end_of_track();
    }

    /// Another client took over playback on this account.
    pub fn play_token_lost(&self) {
        self.shared.push_event(SessionEvent::PlayTokenLost);
    }

    /// Relay a provider log line.
    pub fn log_message(&self, message: &str) {
        self.shared
            .push_event(SessionEvent::LogMessage(message.to_string()));
    }
}
