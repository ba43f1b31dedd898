//! Audio buffering and device output

pub mod fifo;
pub mod output;
pub mod types;

pub use fifo::AudioFifo;
pub use types::{AudioChunk, StereoFrame};
