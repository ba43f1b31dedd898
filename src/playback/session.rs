//! Playback session state machine and run loop
//!
//! A [`PlaybackSession`] owns one provider session for the lifetime of one
//! track: create → login → resolve → load → play → end/stop. The run loop
//! executes inside a [`crate::task::Task`] and is the only thread that calls
//! provider operations; everything asynchronous reaches it as values on the
//! session monitor (see [`crate::events`]).
//!
//! Exactly one session may be materially active per process. The provider
//! session and track handles are owned values consumed by a single release
//! path, so a double unload/release cannot be written.

use crate::audio::fifo::AudioFifo;
use crate::config::{Credentials, PlayerConfig};
use crate::error::Error;
use crate::events::{SessionCommand, SessionEvent};
use crate::provider::{ProviderError, ProviderSession, SessionNotifier, StreamingProvider};
use crate::task::StopToken;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Upper bound on a single monitor wait, so the stop flag is polled even
/// when no notification arrives
const MONITOR_WAIT: Duration = Duration::from_millis(250);

/// Maximum pump calls per loop iteration before control returns to event
/// dispatch
const PUMP_BURST: usize = 64;

/// Externally visible playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    NotStarted,
    Playing,
    Paused,
    Stopped,
    Ended,
}

/// How a session run terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The track played to its natural end
    Ended,
    /// Cooperative stop was observed; a normal terminal transition, not an
    /// error
    Stopped,
    /// The session never reached (or lost) playback
    Failed(SessionFailure),
}

impl SessionOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, SessionOutcome::Failed(_))
    }
}

/// Reasons a session run can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionFailure {
    /// Rejected locally before any provider interaction
    MissingCredentials,
    /// Another session holds the process-wide slot
    SessionBusy,
    /// The provider could not construct a session
    SessionCreate,
    /// Login rejected; terminal, never retried
    Login,
    /// Track unresolvable or failed to load
    TrackLoad,
}

struct SessionInbox {
    events: VecDeque<SessionEvent>,
    track_uri: Option<String>,
    end_of_track: bool,
    status: PlaybackStatus,
}

/// Monitor bridging the run loop, the provider's notification threads and
/// the controller. All cross-thread session state lives behind this lock,
/// including the track URI handoff and the end-of-track flag.
pub(crate) struct SessionShared {
    inner: Mutex<SessionInbox>,
    cond: Condvar,
}

impl SessionShared {
    fn new() -> Self {
        Self {
            inner: Mutex::new(SessionInbox {
                events: VecDeque::new(),
                track_uri: None,
                end_of_track: false,
                status: PlaybackStatus::NotStarted,
            }),
            cond: Condvar::new(),
        }
    }

    pub(crate) fn push_event(&self, event: SessionEvent) {
        let mut inner = self.inner.lock().unwrap();
        inner.events.push_back(event);
        drop(inner);
        self.cond.notify_all();
    }

    pub(crate) fn set_end_of_track(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.end_of_track = true;
        drop(inner);
        self.cond.notify_all();
    }

    fn drain_events(&self) -> Vec<SessionEvent> {
        let mut inner = self.inner.lock().unwrap();
        inner.events.drain(..).collect()
    }

    fn end_of_track(&self) -> bool {
        self.inner.lock().unwrap().end_of_track
    }

    fn set_track_uri(&self, uri: Option<String>) {
        let mut inner = self.inner.lock().unwrap();
        inner.track_uri = uri;
        drop(inner);
        self.cond.notify_all();
    }

    fn has_track_uri(&self) -> bool {
        self.inner.lock().unwrap().track_uri.is_some()
    }

    fn set_status(&self, status: PlaybackStatus) {
        self.inner.lock().unwrap().status = status;
    }

    fn status(&self) -> PlaybackStatus {
        self.inner.lock().unwrap().status
    }

    /// Bounded wait for new activity. Returns immediately when something is
    /// already queued; never waits longer than `timeout`.
    fn wait_activity(&self, timeout: Duration) {
        let inner = self.inner.lock().unwrap();
        if inner.events.is_empty() && !inner.end_of_track {
            let _ = self.cond.wait_timeout(inner, timeout).unwrap();
        }
    }
}

/// Cheap handle onto a running session, used by the controller thread.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<SessionShared>,
}

impl SessionHandle {
    /// Request pause; applied by the run loop within one wait cycle.
    pub fn pause(&self) {
        self.shared
            .push_event(SessionEvent::Command(SessionCommand::Pause));
    }

    /// Request resume; applied by the run loop within one wait cycle.
    pub fn resume(&self) {
        self.shared
            .push_event(SessionEvent::Command(SessionCommand::Resume));
    }

    pub fn status(&self) -> PlaybackStatus {
        self.shared.status()
    }
}

// Process-wide provider session slot. Concurrent sessions are not
// supported; the guard releases the slot on every exit path.
static SESSION_SLOT: AtomicBool = AtomicBool::new(false);

struct SessionSlot;

impl SessionSlot {
    fn acquire() -> Result<SessionSlot, Error> {
        if SESSION_SLOT
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            Ok(SessionSlot)
        } else {
            Err(Error::SessionActive)
        }
    }
}

impl Drop for SessionSlot {
    fn drop(&mut self) {
        SESSION_SLOT.store(false, Ordering::Release);
    }
}

/// Provider-owned values for one run, consumed exactly once on release.
struct RunState<P: StreamingProvider> {
    session: P::Session,
    /// Loaded track, if playback has started
    track: Option<<P::Session as ProviderSession>::Track>,
    /// Resolved track still waiting for metadata
    pending: Option<<P::Session as ProviderSession>::Track>,
}

/// Drives one track through the provider.
pub struct PlaybackSession<P: StreamingProvider> {
    provider: Arc<P>,
    config: PlayerConfig,
    credentials: Credentials,
    track_uri: String,
    fifo: Arc<AudioFifo>,
    shared: Arc<SessionShared>,
    id: Uuid,
}

impl<P: StreamingProvider> PlaybackSession<P> {
    pub fn new(
        provider: Arc<P>,
        config: PlayerConfig,
        credentials: Credentials,
        track_uri: impl Into<String>,
        fifo: Arc<AudioFifo>,
    ) -> Self {
        Self {
            provider,
            config,
            credentials,
            track_uri: track_uri.into(),
            fifo,
            shared: Arc::new(SessionShared::new()),
            id: Uuid::new_v4(),
        }
    }

    /// Controller-side handle for pause/resume/status.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Run the session to completion, polling `stop` at bounded intervals.
    ///
    /// Consumes the session: each `PlaybackSession` drives at most one
    /// login/track lifetime.
    pub fn run(self, stop: &StopToken) -> SessionOutcome {
        info!("session {}: starting for {}", self.id, self.track_uri);

        if let Err(e) = self.credentials.validate() {
            warn!("session {}: refusing to start: {}", self.id, e);
            return SessionOutcome::Failed(SessionFailure::MissingCredentials);
        }

        let _slot = match SessionSlot::acquire() {
            Ok(slot) => slot,
            Err(e) => {
                error!("session {}: {}", self.id, e);
                return SessionOutcome::Failed(SessionFailure::SessionBusy);
            }
        };

        // Track switch: whatever the previous track left queued is stale.
        self.fifo.flush();
        self.shared.set_track_uri(Some(self.track_uri.clone()));

        let notifier = SessionNotifier::new(Arc::clone(&self.shared), Arc::clone(&self.fifo));
        let session = match self.provider.create_session(&self.config, notifier) {
            Ok(session) => session,
            Err(e) => {
                error!("session {}: unable to create provider session: {}", self.id, e);
                self.shared.set_track_uri(None);
                return SessionOutcome::Failed(SessionFailure::SessionCreate);
            }
        };

        let mut rs = RunState::<P> {
            session,
            track: None,
            pending: None,
        };

        if let Err(e) = rs.session.login(&self.credentials) {
            error!("session {}: login failed: {}", self.id, e);
            self.finish(rs, PlaybackStatus::NotStarted);
            return SessionOutcome::Failed(SessionFailure::Login);
        }

        loop {
            if stop.should_stop() {
                self.finish(rs, PlaybackStatus::Stopped);
                info!("session {}: stopped", self.id);
                return SessionOutcome::Stopped;
            }

            if !self.shared.has_track_uri() {
                self.shared.wait_activity(MONITOR_WAIT);
                continue;
            }

            let mut failure = None;
            for event in self.shared.drain_events() {
                if let Err(f) = self.dispatch(event, &mut rs) {
                    failure = Some(f);
                    break;
                }
            }
            if let Some(f) = failure {
                self.finish(rs, PlaybackStatus::NotStarted);
                return SessionOutcome::Failed(f);
            }

            if self.shared.end_of_track() {
                self.finish(rs, PlaybackStatus::Ended);
                info!("session {}: track ended", self.id);
                return SessionOutcome::Ended;
            }

            let mut hint = rs.session.process_events();
            let mut burst = 0;
            while hint.is_zero() && burst < PUMP_BURST && !stop.should_stop() {
                hint = rs.session.process_events();
                burst += 1;
            }

            let wait = if hint.is_zero() {
                Duration::from_millis(5)
            } else {
                hint.min(MONITOR_WAIT)
            };
            self.shared.wait_activity(wait);
        }
    }

    /// Dispatch one queued event. An `Err` return terminates the run with
    /// that failure after resources are released.
    fn dispatch(
        &self,
        event: SessionEvent,
        rs: &mut RunState<P>,
    ) -> Result<(), SessionFailure> {
        match event {
            SessionEvent::LoginComplete(Ok(())) => {
                debug!("session {}: login succeeded", self.id);
                match rs.session.resolve_track(&self.track_uri) {
                    Ok(track) => {
                        rs.pending = Some(track);
                        self.try_start(rs)
                    }
                    Err(e) => {
                        error!("session {}: track resolution failed: {}", self.id, e);
                        Err(SessionFailure::TrackLoad)
                    }
                }
            }
            SessionEvent::LoginComplete(Err(e)) => {
                error!("session {}: login failed: {}", self.id, e);
                Err(SessionFailure::Login)
            }
            SessionEvent::MetadataUpdated => self.try_start(rs),
            SessionEvent::Wake => Ok(()),
            SessionEvent::PlayTokenLost => {
                warn!(
                    "session {}: play token lost, another client took over",
                    self.id
                );
                self.fifo.flush();
                if rs.track.take().is_some() {
                    rs.session.unload();
                }
                rs.pending = None;
                self.shared.set_status(PlaybackStatus::NotStarted);
                Ok(())
            }
            SessionEvent::LogMessage(message) => {
                debug!("session {}: provider: {}", self.id, message);
                Ok(())
            }
            SessionEvent::Command(SessionCommand::Pause) => {
                if rs.track.is_some() && self.shared.status() == PlaybackStatus::Playing {
                    match rs.session.play(false) {
                        Ok(()) => {
                            self.shared.set_status(PlaybackStatus::Paused);
                            info!("session {}: playback paused", self.id);
                        }
                        Err(e) => warn!("session {}: pause failed: {}", self.id, e),
                    }
                }
                Ok(())
            }
            SessionEvent::Command(SessionCommand::Resume) => {
                if rs.track.is_some() && self.shared.status() == PlaybackStatus::Paused {
                    match rs.session.play(true) {
                        Ok(()) => {
                            self.shared.set_status(PlaybackStatus::Playing);
                            info!("session {}: playback resumed", self.id);
                        }
                        Err(e) => warn!("session {}: resume failed: {}", self.id, e),
                    }
                }
                Ok(())
            }
        }
    }

    /// Attempt to load and start the pending track. Retried from each
    /// metadata notification until the provider stops reporting
    /// `TrackNotReady`.
    fn try_start(&self, rs: &mut RunState<P>) -> Result<(), SessionFailure> {
        if rs.track.is_some() {
            return Ok(());
        }
        let track = match rs.pending.take() {
            Some(track) => track,
            None => return Ok(()),
        };

        match rs.session.load(&track) {
            Ok(()) => {
                rs.track = Some(track);
                if let Err(e) = rs.session.play(true) {
                    error!("session {}: play failed: {}", self.id, e);
                    return Err(SessionFailure::TrackLoad);
                }
                let name = rs
                    .track
                    .as_ref()
                    .and_then(|t| rs.session.track_name(t))
                    .unwrap_or_else(|| self.track_uri.clone());
                info!("session {}: now playing \"{}\"", self.id, name);
                self.shared.set_status(PlaybackStatus::Playing);
                Ok(())
            }
            Err(ProviderError::TrackNotReady) => {
                debug!("session {}: track metadata still loading", self.id);
                rs.pending = Some(track);
                Ok(())
            }
            Err(e) => {
                error!("session {}: failed to load track: {}", self.id, e);
                Err(SessionFailure::TrackLoad)
            }
        }
    }

    /// The single unload+release path. Consumes the provider-owned values,
    /// so it can only run once per session lifetime.
    fn finish(&self, mut rs: RunState<P>, status: PlaybackStatus) {
        if rs.track.take().is_some() {
            rs.session.unload();
        }
        rs.pending.take();
        drop(rs.session);
        self.shared.set_track_uri(None);
        self.shared.set_status(status);
        debug!("session {}: provider session released", self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_inbox_preserves_event_order() {
        let shared = SessionShared::new();
        shared.push_event(SessionEvent::Wake);
        shared.push_event(SessionEvent::MetadataUpdated);
        shared.push_event(SessionEvent::Command(SessionCommand::Pause));

        let events = shared.drain_events();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], SessionEvent::Wake));
        assert!(matches!(events[1], SessionEvent::MetadataUpdated));
        assert!(matches!(
            events[2],
            SessionEvent::Command(SessionCommand::Pause)
        ));
        assert!(shared.drain_events().is_empty());
    }

    #[test]
    fn test_end_of_track_is_latched_not_queued() {
        let shared = SessionShared::new();
        shared.set_end_of_track();
        assert!(shared.end_of_track());
        assert!(shared.drain_events().is_empty());
        // Still set after a drain
        assert!(shared.end_of_track());
    }

    #[test]
    fn test_wait_activity_returns_immediately_with_pending_event() {
        let shared = SessionShared::new();
        shared.push_event(SessionEvent::Wake);
        let start = std::time::Instant::now();
        shared.wait_activity(Duration::from_secs(5));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_wait_activity_is_bounded() {
        let shared = SessionShared::new();
        let start = std::time::Instant::now();
        shared.wait_activity(Duration::from_millis(20));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    #[serial]
    fn test_session_slot_is_exclusive() {
        let first = SessionSlot::acquire().unwrap();
        assert!(matches!(SessionSlot::acquire(), Err(Error::SessionActive)));
        drop(first);
        let again = SessionSlot::acquire().unwrap();
        drop(again);
    }
}
