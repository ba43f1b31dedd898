//! Playback controller
//!
//! The top of the stack: owns the provider, the shared decoded-audio FIFO
//! and at most one single-track task plus one playlist task. Commands flow
//! top-down (play, pause, resume, stop); outcomes flow back up through each
//! session's monitor and are logged here.

use crate::audio::fifo::AudioFifo;
use crate::config::{Credentials, PlayerConfig};
use crate::error::Result;
use crate::playback::playlist::{Playlist, PlaylistSequencer, SequenceStep};
use crate::playback::session::{PlaybackSession, SessionHandle, SessionOutcome};
use crate::provider::StreamingProvider;
use crate::task::{StopToken, Task};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

type ActiveHandle = Arc<Mutex<Option<SessionHandle>>>;

/// Parameters moved into a playback task.
struct PlayJob<P: StreamingProvider> {
    provider: Arc<P>,
    config: PlayerConfig,
    credentials: Credentials,
    fifo: Arc<AudioFifo>,
    active: ActiveHandle,
}

impl<P: StreamingProvider> PlayJob<P> {
    /// Run one session for `uri` on the current thread, keeping the active
    /// handle slot up to date around it.
    fn play_one(&self, uri: &str, stop: &StopToken) -> SessionOutcome {
        let session = PlaybackSession::new(
            Arc::clone(&self.provider),
            self.config.clone(),
            self.credentials.clone(),
            uri,
            Arc::clone(&self.fifo),
        );
        *self.active.lock().unwrap() = Some(session.handle());
        let outcome = session.run(stop);
        *self.active.lock().unwrap() = None;
        info!("track {} finished: {:?}", uri, outcome);
        outcome
    }
}

/// Sequences playback of single tracks and playlists over a provider.
pub struct PlaybackController<P: StreamingProvider + 'static> {
    provider: Arc<P>,
    config: PlayerConfig,
    credentials: Credentials,
    fifo: Arc<AudioFifo>,
    active: ActiveHandle,
    track_task: Option<Task>,
    list_task: Option<Task>,
}

impl<P: StreamingProvider + 'static> PlaybackController<P> {
    pub fn new(provider: Arc<P>, config: PlayerConfig, credentials: Credentials) -> Self {
        Self {
            provider,
            config,
            credentials,
            fifo: Arc::new(AudioFifo::new()),
            active: Arc::new(Mutex::new(None)),
            track_task: None,
            list_task: None,
        }
    }

    /// The FIFO the output stage should drain.
    pub fn fifo(&self) -> Arc<AudioFifo> {
        Arc::clone(&self.fifo)
    }

    /// Status handle for whichever session is currently active.
    pub fn active_session(&self) -> Option<SessionHandle> {
        self.active.lock().unwrap().clone()
    }

    /// Play a single track, stopping any previous single-track task first.
    pub fn play_track(&mut self, uri: impl Into<String>) -> Result<()> {
        if let Some(mut task) = self.track_task.take() {
            task.stop(true);
        }

        let uri = uri.into();
        let job = self.job();
        self.track_task = Some(Task::spawn("playback", (job, uri), run_track_job::<P>)?);
        Ok(())
    }

    /// Traverse a playlist, one track at a time, stopping any previous
    /// playlist task first.
    pub fn play_list(&mut self, playlist: Playlist) -> Result<()> {
        if let Some(mut task) = self.list_task.take() {
            task.stop(true);
        }

        let job = self.job();
        self.list_task = Some(Task::spawn(
            "playlist",
            (job, playlist),
            run_list_job::<P>,
        )?);
        Ok(())
    }

    /// True while a playlist task is running.
    pub fn playlist_active(&self) -> bool {
        self.list_task
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }

    /// True while a single-track task is running.
    pub fn track_active(&self) -> bool {
        self.track_task
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }

    /// Pause the active session, if any. Non-blocking.
    pub fn pause(&self) {
        if let Some(handle) = self.active_session() {
            handle.pause();
        }
    }

    /// Resume the active session, if any. Non-blocking.
    pub fn resume(&self) {
        if let Some(handle) = self.active_session() {
            handle.resume();
        }
    }

    /// Stop all playback and wait for the hosting tasks to exit.
    pub fn stop(&mut self) {
        if let Some(mut task) = self.track_task.take() {
            task.stop(true);
        }
        if let Some(mut task) = self.list_task.take() {
            task.stop(true);
        }
    }

    fn job(&self) -> PlayJob<P> {
        PlayJob {
            provider: Arc::clone(&self.provider),
            config: self.config.clone(),
            credentials: self.credentials.clone(),
            fifo: Arc::clone(&self.fifo),
            active: Arc::clone(&self.active),
        }
    }
}

fn run_track_job<P: StreamingProvider>((job, uri): (PlayJob<P>, String), stop: &StopToken) {
    job.play_one(&uri, stop);
}

fn run_list_job<P: StreamingProvider>(
    (job, playlist): (PlayJob<P>, Playlist),
    stop: &StopToken,
) {
    info!(
        "starting playlist of {} tracks (repeat={}, shuffle={})",
        playlist.len(),
        playlist.repeat,
        playlist.shuffle
    );

    let mut sequencer = PlaylistSequencer::new(playlist);
    let mut rng = rand::thread_rng();

    loop {
        if stop.should_stop() {
            info!("playlist stopped");
            return;
        }

        match sequencer.next_step(&mut rng) {
            SequenceStep::Finished => {
                info!("playlist finished");
                return;
            }
            SequenceStep::Skip(uri) => {
                debug!("skipping {} after previous failure", uri);
            }
            SequenceStep::Play(uri) => {
                let outcome = job.play_one(&uri, stop);
                if outcome.is_failure() {
                    sequencer.record_failure();
                }
            }
        }
    }
}
