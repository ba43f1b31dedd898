//! Bounded decoded-audio FIFO
//!
//! Bridges the provider's notification thread (producer) and the output pump
//! (consumer) with a single mutex + condition variable monitor. The queue
//! never holds more than one second of audio at the producing chunk's sample
//! rate; pushes beyond that bound are rejected rather than blocked, so the
//! producer thread is never stalled and the upstream decoder throttles
//! itself on the zero-accepted return.

use crate::audio::types::AudioChunk;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;
use tracing::trace;

struct FifoState {
    chunks: VecDeque<AudioChunk>,
    queued_frames: usize,
}

/// Bounded producer/consumer buffer of decoded audio chunks.
pub struct AudioFifo {
    state: Mutex<FifoState>,
    available: Condvar,
}

impl AudioFifo {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FifoState {
                chunks: VecDeque::new(),
                queued_frames: 0,
            }),
            available: Condvar::new(),
        }
    }

    /// Append a chunk, returning the number of frames accepted.
    ///
    /// Zero-frame chunks signal a decode discontinuity and are accepted as
    /// zero without queueing anything. A chunk that would push the queued
    /// total past one second at its own rate is rejected (returns 0) without
    /// blocking.
    pub fn push(&self, chunk: AudioChunk) -> usize {
        if chunk.frames == 0 {
            return 0;
        }

        let mut state = self.state.lock().unwrap();

        if state.queued_frames + chunk.frames > chunk.rate as usize {
            trace!(
                "fifo full ({} frames queued), rejecting {} frames",
                state.queued_frames,
                chunk.frames
            );
            return 0;
        }

        let accepted = chunk.frames;
        state.queued_frames += accepted;
        state.chunks.push_back(chunk);
        drop(state);

        self.available.notify_one();
        accepted
    }

    /// Remove and return the head chunk, blocking until one is queued.
    pub fn pop(&self) -> AudioChunk {
        let mut state = self.state.lock().unwrap();
        while state.chunks.is_empty() {
            state = self.available.wait(state).unwrap();
        }
        let chunk = state.chunks.pop_front().unwrap();
        state.queued_frames -= chunk.frames;
        chunk
    }

    /// Like [`pop`](Self::pop) but gives up after `timeout`, so a consumer
    /// can interleave stop-flag checks with its waits.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<AudioChunk> {
        let mut state = self.state.lock().unwrap();
        if state.chunks.is_empty() {
            let (guard, result) = self.available.wait_timeout(state, timeout).unwrap();
            state = guard;
            if result.timed_out() && state.chunks.is_empty() {
                return None;
            }
        }
        let chunk = state.chunks.pop_front()?;
        state.queued_frames -= chunk.frames;
        Some(chunk)
    }

    /// Atomically empty the queue and reset the running total.
    ///
    /// A concurrent consumer observes either the complete pre-flush contents
    /// or the empty post-flush state, never a partial drain.
    pub fn flush(&self) {
        let mut state = self.state.lock().unwrap();
        state.chunks.clear();
        state.queued_frames = 0;
    }

    /// Current queued total in sample frames.
    pub fn queued_frames(&self) -> usize {
        self.state.lock().unwrap().queued_frames
    }

    /// Current queued chunk count.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AudioFifo {
    fn default() -> Self {
        Self::new()
    }
}
