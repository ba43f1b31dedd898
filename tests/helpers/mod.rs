//! Shared test helpers: a scripted in-memory streaming provider
//!
//! `MockProvider` stands in for the remote service. Its behavior is fixed by
//! a `Script` at construction and observable through shared `Counters`;
//! additional notifications (end-of-track, play-token-lost, log lines) can
//! be injected mid-run and are delivered from the provider's event pump.

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tunebox::{
    AudioChunk, Credentials, PlayerConfig, ProviderError, ProviderSession, SessionNotifier,
    StreamingProvider,
};

/// Notifications a test can inject mid-run.
#[derive(Debug, Clone)]
pub enum Inject {
    PlayTokenLost,
    EndOfTrack,
    Log(String),
}

/// Scripted provider behavior.
#[derive(Clone)]
pub struct Script {
    pub fail_create: bool,
    pub fail_login: bool,
    pub fail_resolve: HashSet<String>,
    /// First load reports metadata-not-ready, then a metadata notification
    /// arrives and the retry succeeds
    pub defer_metadata: bool,
    /// Chunks delivered before end-of-track; `usize::MAX` = never end
    pub chunks_per_track: usize,
    pub chunk_frames: usize,
    pub chunk_rate: u32,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            fail_create: false,
            fail_login: false,
            fail_resolve: HashSet::new(),
            defer_metadata: false,
            chunks_per_track: 3,
            chunk_frames: 441,
            chunk_rate: 44_100,
        }
    }
}

impl Script {
    pub fn endless() -> Self {
        Self {
            chunks_per_track: usize::MAX,
            ..Self::default()
        }
    }
}

/// Observable provider-side effects.
#[derive(Clone, Default)]
pub struct Counters {
    pub sessions_created: Arc<AtomicUsize>,
    pub logins: Arc<AtomicUsize>,
    pub loads: Arc<AtomicUsize>,
    pub unloads: Arc<AtomicUsize>,
    pub releases: Arc<AtomicUsize>,
    pub play_calls: Arc<Mutex<Vec<bool>>>,
    pub resolved: Arc<Mutex<Vec<String>>>,
}

impl Counters {
    pub fn sessions_created(&self) -> usize {
        self.sessions_created.load(Ordering::SeqCst)
    }
    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
    pub fn unloads(&self) -> usize {
        self.unloads.load(Ordering::SeqCst)
    }
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
    pub fn play_calls(&self) -> Vec<bool> {
        self.play_calls.lock().unwrap().clone()
    }
    pub fn resolved(&self) -> Vec<String> {
        self.resolved.lock().unwrap().clone()
    }
}

pub struct MockProvider {
    script: Script,
    pub counters: Counters,
    inject: Arc<Mutex<VecDeque<Inject>>>,
}

impl MockProvider {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            counters: Counters::default(),
            inject: Arc::new(Mutex::new(VecDeque::new())),
        })
    }

    /// Queue a notification for delivery from the session's event pump.
    pub fn inject(&self, event: Inject) {
        self.inject.lock().unwrap().push_back(event);
    }
}

impl StreamingProvider for MockProvider {
    type Session = MockSession;

    fn create_session(
        &self,
        _config: &PlayerConfig,
        notifier: SessionNotifier,
    ) -> Result<MockSession, ProviderError> {
        if self.script.fail_create {
            return Err(ProviderError::Session("provider refused".to_string()));
        }
        self.counters.sessions_created.fetch_add(1, Ordering::SeqCst);
        Ok(MockSession {
            notifier,
            script: self.script.clone(),
            counters: self.counters.clone(),
            inject: Arc::clone(&self.inject),
            login_reported: false,
            announce_metadata: false,
            metadata_deferred: self.script.defer_metadata,
            chunks_remaining: self.script.chunks_per_track,
            end_reported: false,
            loaded: false,
            playing: false,
        })
    }
}

pub struct MockTrack {
    pub uri: String,
}

pub struct MockSession {
    notifier: SessionNotifier,
    script: Script,
    counters: Counters,
    inject: Arc<Mutex<VecDeque<Inject>>>,
    login_reported: bool,
    announce_metadata: bool,
    metadata_deferred: bool,
    chunks_remaining: usize,
    end_reported: bool,
    loaded: bool,
    playing: bool,
}

impl MockSession {
    fn make_chunk(&self) -> AudioChunk {
        AudioChunk::new(
            vec![0i16; self.script.chunk_frames * 2],
            self.script.chunk_rate,
            2,
        )
    }
}

impl ProviderSession for MockSession {
    type Track = MockTrack;

    fn login(&mut self, _credentials: &Credentials) -> Result<(), ProviderError> {
        self.counters.logins.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn resolve_track(&mut self, uri: &str) -> Result<MockTrack, ProviderError> {
        self.counters.resolved.lock().unwrap().push(uri.to_string());
        if self.script.fail_resolve.contains(uri) {
            return Err(ProviderError::TrackNotFound(uri.to_string()));
        }
        Ok(MockTrack {
            uri: uri.to_string(),
        })
    }

    fn track_name(&self, track: &MockTrack) -> Option<String> {
        Some(format!("Track {}", track.uri))
    }

    fn load(&mut self, _track: &MockTrack) -> Result<(), ProviderError> {
        self.counters.loads.fetch_add(1, Ordering::SeqCst);
        if self.metadata_deferred {
            self.metadata_deferred = false;
            self.announce_metadata = true;
            return Err(ProviderError::TrackNotReady);
        }
        self.loaded = true;
        Ok(())
    }

    fn play(&mut self, enabled: bool) -> Result<(), ProviderError> {
        self.counters.play_calls.lock().unwrap().push(enabled);
        self.playing = enabled;
        Ok(())
    }

    fn unload(&mut self) {
        self.counters.unloads.fetch_add(1, Ordering::SeqCst);
        self.loaded = false;
        self.playing = false;
    }

    fn process_events(&mut self) -> Duration {
        if !self.login_reported {
            self.login_reported = true;
            let result = if self.script.fail_login {
                Err(ProviderError::Auth("bad credentials".to_string()))
            } else {
                Ok(())
            };
            self.notifier.login_complete(result);
            return Duration::ZERO;
        }

        if self.announce_metadata {
            self.announce_metadata = false;
            self.notifier.metadata_updated();
            return Duration::ZERO;
        }

        if let Some(inject) = self.inject.lock().unwrap().pop_front() {
            match inject {
                Inject::PlayTokenLost => self.notifier.play_token_lost(),
                Inject::EndOfTrack => self.notifier.end_of_track(),
                Inject::Log(message) => self.notifier.log_message(&message),
            }
            return Duration::ZERO;
        }

        if self.loaded && self.playing {
            if self.chunks_remaining == usize::MAX {
                let _ = self.notifier.deliver_frames(self.make_chunk());
                return Duration::ZERO;
            }
            if self.chunks_remaining > 0 {
                self.chunks_remaining -= 1;
                let _ = self.notifier.deliver_frames(self.make_chunk());
                return Duration::ZERO;
            }
            if !self.end_reported {
                self.end_reported = true;
                self.notifier.end_of_track();
                return Duration::ZERO;
            }
        }

        Duration::from_millis(10)
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        self.counters.releases.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn test_config() -> PlayerConfig {
    PlayerConfig::default()
}

pub fn good_credentials() -> Credentials {
    Credentials::new("listener", "secret")
}

/// Poll `cond` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
