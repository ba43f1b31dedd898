//! Cancellable background tasks
//!
//! A [`Task`] hosts exactly one named thread together with a cooperative stop
//! flag. The hosted function receives a typed parameter block by value (the
//! task never touches it again) and a [`StopToken`] it must poll at bounded
//! intervals. `Task::spawn` is the only way to start a task, so a task can
//! never be started twice.

use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

/// Shared cooperative stop flag.
///
/// Cloning yields another handle to the same flag.
#[derive(Debug, Clone)]
pub struct StopToken {
    flag: Arc<AtomicBool>,
}

impl StopToken {
    /// Create a fresh token that nothing has stopped yet.
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Non-blocking poll of the stop flag.
    pub fn should_stop(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Request cooperative shutdown of whatever observes this token.
    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }
}

impl Default for StopToken {
    fn default() -> Self {
        Self::new()
    }
}

/// A cancellable unit of background work.
pub struct Task {
    name: String,
    token: StopToken,
    thread: Option<JoinHandle<()>>,
}

impl Task {
    /// Spawn a named thread running `entry(params, &token)`.
    ///
    /// Ownership of `params` transfers to the hosted function. Returns as
    /// soon as the thread is created; there is no guarantee the function has
    /// begun executing.
    pub fn spawn<P, F>(name: &str, params: P, entry: F) -> Result<Task>
    where
        P: Send + 'static,
        F: FnOnce(P, &StopToken) + Send + 'static,
    {
        let token = StopToken::new();
        let thread_token = token.clone();

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || entry(params, &thread_token))
            .map_err(|e| Error::Task(format!("failed to spawn thread '{}': {}", name, e)))?;

        debug!("task '{}' started", name);

        Ok(Task {
            name: name.to_string(),
            token,
            thread: Some(handle),
        })
    }

    /// Set the cooperative stop flag; if `wait`, block until the hosted
    /// thread has exited.
    ///
    /// Idempotent: stopping an already-stopped task is a no-op. A panic in
    /// the hosted function is logged here, not propagated.
    pub fn stop(&mut self, wait: bool) {
        self.token.request_stop();

        if !wait {
            return;
        }

        if let Some(handle) = self.thread.take() {
            match handle.join() {
                Ok(()) => debug!("task '{}' joined", self.name),
                Err(_) => error!("task '{}' panicked", self.name),
            }
        }
    }

    /// Non-blocking poll of the stop flag.
    pub fn should_stop(&self) -> bool {
        self.token.should_stop()
    }

    /// True once the hosted thread has exited (or was never joined).
    pub fn is_finished(&self) -> bool {
        self.thread
            .as_ref()
            .map(|h| h.is_finished())
            .unwrap_or(true)
    }

    /// A clone of this task's stop token.
    pub fn token(&self) -> StopToken {
        self.token.clone()
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        // Never leak a detached thread past the owner's lifetime.
        self.stop(true);
    }
}
