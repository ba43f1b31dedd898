//! Audio output using cpal
//!
//! The output stage runs one dedicated thread that owns the cpal stream
//! (streams are not `Send`, so the device is opened inside the thread and
//! startup errors are handed back over a channel). The thread drains the
//! decoded-audio FIFO and feeds a lock-free ring; the cpal data callback
//! pops the ring and writes silence on underrun, so the real-time thread
//! never takes a lock.
//!
//! [`init`] may be called at most once per process; later calls return the
//! handle created by the first.

use crate::audio::fifo::AudioFifo;
use crate::audio::types::{AudioChunk, StereoFrame};
use crate::config::OutputConfig;
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use once_cell::sync::OnceCell;
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

static OUTPUT: OnceCell<OutputHandle> = OnceCell::new();

/// Handle onto the process-wide output stage.
pub struct OutputHandle {
    stop: Arc<AtomicBool>,
    thread: Mutex<Option<JoinHandle<()>>>,
    underruns: Arc<AtomicU64>,
    sample_rate: u32,
}

impl OutputHandle {
    /// The device rate everything is played at.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Total callback underruns so far.
    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }

    /// Stop the pump thread and close the stream. The FIFO itself is left
    /// untouched.
    pub fn shutdown(&self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread.lock().unwrap().take() {
            match handle.join() {
                Ok(()) => debug!("audio output thread joined"),
                Err(_) => error!("audio output thread panicked"),
            }
        }
    }
}

/// Initialize the output stage draining `fifo`.
///
/// The first call opens the device and starts the pump; subsequent calls
/// return the existing handle unchanged.
pub fn init(config: &OutputConfig, fifo: Arc<AudioFifo>) -> Result<&'static OutputHandle> {
    OUTPUT.get_or_try_init(|| start(config.clone(), fifo))
}

fn start(config: OutputConfig, fifo: Arc<AudioFifo>) -> Result<OutputHandle> {
    let ring = HeapRb::<StereoFrame>::new(config.ring_capacity);
    let (producer, consumer) = ring.split();

    let stop = Arc::new(AtomicBool::new(false));
    let underruns = Arc::new(AtomicU64::new(0));
    let sample_rate = config.sample_rate;

    let (ready_tx, ready_rx) = mpsc::channel();
    let thread_stop = Arc::clone(&stop);
    let thread_underruns = Arc::clone(&underruns);

    let handle = thread::Builder::new()
        .name("audio-output".to_string())
        .spawn(move || {
            output_thread(
                config,
                fifo,
                producer,
                consumer,
                thread_stop,
                thread_underruns,
                ready_tx,
            );
        })
        .map_err(|e| Error::AudioOutput(format!("failed to spawn output thread: {}", e)))?;

    match ready_rx.recv() {
        Ok(Ok(())) => Ok(OutputHandle {
            stop,
            thread: Mutex::new(Some(handle)),
            underruns,
            sample_rate,
        }),
        Ok(Err(e)) => {
            let _ = handle.join();
            Err(e)
        }
        Err(_) => {
            let _ = handle.join();
            Err(Error::AudioOutput(
                "output thread terminated during startup".to_string(),
            ))
        }
    }
}

fn output_thread(
    config: OutputConfig,
    fifo: Arc<AudioFifo>,
    mut producer: HeapProd<StereoFrame>,
    consumer: HeapCons<StereoFrame>,
    stop: Arc<AtomicBool>,
    underruns: Arc<AtomicU64>,
    ready: mpsc::Sender<Result<()>>,
) {
    let stream = match open_stream(&config, consumer, underruns) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready.send(Err(Error::AudioOutput(format!(
            "failed to start stream: {}",
            e
        ))));
        return;
    }
    let _ = ready.send(Ok(()));
    info!("audio output started at {} Hz", config.sample_rate);

    while !stop.load(Ordering::Relaxed) {
        if let Some(chunk) = fifo.pop_timeout(Duration::from_millis(100)) {
            push_chunk(&mut producer, &chunk, &config, &stop);
        }
    }

    drop(stream);
    debug!("audio output thread exiting");
}

/// Feed one chunk into the ring, waiting out a full ring in small sleeps.
/// Gives up mid-chunk once the stop flag is raised.
fn push_chunk(
    producer: &mut HeapProd<StereoFrame>,
    chunk: &AudioChunk,
    config: &OutputConfig,
    stop: &AtomicBool,
) {
    if chunk.rate != config.sample_rate {
        trace!(
            "chunk rate {} differs from output rate {}, playing as-is",
            chunk.rate,
            config.sample_rate
        );
    }

    for frame in chunk.iter_frames() {
        let mut frame = frame;
        loop {
            match producer.try_push(frame) {
                Ok(()) => break,
                Err(returned) => {
                    if stop.load(Ordering::Relaxed) {
                        return;
                    }
                    frame = returned;
                    thread::sleep(Duration::from_millis(1));
                }
            }
        }
    }
}

fn open_stream(
    config: &OutputConfig,
    consumer: HeapCons<StereoFrame>,
    underruns: Arc<AtomicU64>,
) -> Result<Stream> {
    let host = cpal::default_host();

    let device = match config.device.as_ref() {
        Some(name) => {
            let mut devices = host
                .output_devices()
                .map_err(|e| Error::AudioOutput(format!("failed to enumerate devices: {}", e)))?;

            match devices.find(|d| d.name().ok().as_deref() == Some(name.as_str())) {
                Some(device) => {
                    info!("using requested audio device: {}", name);
                    device
                }
                None => {
                    warn!("device '{}' not found, falling back to default", name);
                    host.default_output_device().ok_or_else(|| {
                        Error::AudioOutput(format!(
                            "device '{}' not found and no default device available",
                            name
                        ))
                    })?
                }
            }
        }
        None => host
            .default_output_device()
            .ok_or_else(|| Error::AudioOutput("no default output device found".to_string()))?,
    };

    let (stream_config, sample_format) = best_config(&device, config.sample_rate)?;
    debug!(
        "audio config: sample_rate={}, channels={}, format={:?}",
        stream_config.sample_rate.0, stream_config.channels, sample_format
    );

    match sample_format {
        SampleFormat::F32 => build_stream_f32(&device, &stream_config, consumer, underruns),
        SampleFormat::I16 => build_stream_i16(&device, &stream_config, consumer, underruns),
        other => Err(Error::AudioOutput(format!(
            "unsupported sample format: {:?}",
            other
        ))),
    }
}

/// Prefer stereo f32 at the configured rate; otherwise take whatever the
/// device calls its default.
fn best_config(device: &Device, target_rate: u32) -> Result<(StreamConfig, SampleFormat)> {
    let mut supported = device
        .supported_output_configs()
        .map_err(|e| Error::AudioOutput(format!("failed to get device configs: {}", e)))?;

    let preferred = supported.find(|c| {
        c.channels() == 2
            && c.min_sample_rate().0 <= target_rate
            && c.max_sample_rate().0 >= target_rate
            && c.sample_format() == SampleFormat::F32
    });

    if let Some(supported_config) = preferred {
        let sample_format = supported_config.sample_format();
        let stream_config = supported_config
            .with_sample_rate(cpal::SampleRate(target_rate))
            .config();
        return Ok((stream_config, sample_format));
    }

    let supported_config = device
        .default_output_config()
        .map_err(|e| Error::AudioOutput(format!("failed to get default config: {}", e)))?;
    let sample_format = supported_config.sample_format();
    Ok((supported_config.config(), sample_format))
}

fn build_stream_f32(
    device: &Device,
    config: &StreamConfig,
    mut consumer: HeapCons<StereoFrame>,
    underruns: Arc<AtomicU64>,
) -> Result<Stream> {
    let channels = config.channels as usize;

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    let sample = match consumer.try_pop() {
                        Some(sample) => sample,
                        None => {
                            let count = underruns.fetch_add(1, Ordering::Relaxed) + 1;
                            if count % 1000 == 0 {
                                trace!("audio ring underrun (total: {})", count);
                            }
                            StereoFrame::zero()
                        }
                    };

                    frame[0] = sample.left.clamp(-1.0, 1.0);
                    if channels > 1 {
                        frame[1] = sample.right.clamp(-1.0, 1.0);
                    }
                }
            },
            move |err| {
                error!("audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| Error::AudioOutput(format!("failed to build stream: {}", e)))?;

    Ok(stream)
}

fn build_stream_i16(
    device: &Device,
    config: &StreamConfig,
    mut consumer: HeapCons<StereoFrame>,
    underruns: Arc<AtomicU64>,
) -> Result<Stream> {
    let channels = config.channels as usize;

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    let sample = match consumer.try_pop() {
                        Some(sample) => sample,
                        None => {
                            underruns.fetch_add(1, Ordering::Relaxed);
                            StereoFrame::zero()
                        }
                    };

                    let left = sample.left.clamp(-1.0, 1.0);
                    let right = sample.right.clamp(-1.0, 1.0);
                    frame[0] = (left * i16::MAX as f32) as i16;
                    if channels > 1 {
                        frame[1] = (right * i16::MAX as f32) as i16;
                    }
                }
            },
            move |err| {
                error!("audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| Error::AudioOutput(format!("failed to build stream: {}", e)))?;

    Ok(stream)
}
