//! Audio capture: device → fixed-duration frames.
//!
//! # Design constraints
//!
//! The cpal input callback runs on an OS audio thread at elevated priority.
//! It must not allocate, block, or perform I/O, so it only writes into a
//! lock-free SPSC ring. A separate framer thread drains the ring, resamples
//! device-rate audio to the pipeline rate, slices it into fixed
//! `frame_samples()` blocks of i16 PCM and hands each `Frame` to the
//! consumer over a bounded channel.
//!
//! # Hand-off policy
//!
//! The hand-off queue is bounded. When the consumer lags, the *oldest*
//! queued frame is dropped to make room — a dropped frame cannot be
//! replayed, but the consumer always sees the most recent audio with
//! bounded staleness. Frames are delivered strictly in capture order.
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on most platforms, so the stream is created
//! and dropped on the framer thread; nothing device-shaped ever crosses a
//! thread boundary. Device ownership is exclusive: one `FrameSource`, one
//! device, released on every exit path via `Drop`.

pub mod device;
pub mod frame;
pub mod resample;
pub mod wav;

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::Result;
use frame::Frame;

#[cfg(feature = "audio-cpal")]
use crate::error::HarkError;

/// SPSC ring capacity between the RT callback and the framer thread.
/// 2^18 f32 samples ≈ 5.5 s at 48 kHz — ample slack for a slow consumer.
const RING_CAPACITY: usize = 1 << 18;

/// Framer sleep when the ring is empty (avoids spinning a core).
const EMPTY_SLEEP: Duration = Duration::from_millis(2);

/// Producing half of the frame hand-off queue.
///
/// Held by the framer thread; also constructible in-memory (paired with a
/// [`FrameStream`]) so gates and segmenters can be driven by scripted
/// frames in tests.
pub struct FrameSender {
    tx: Sender<Frame>,
    /// Receiver clone used only to evict the oldest frame on overflow.
    /// Because this clone keeps the channel connected, consumer departure
    /// is tracked through `open`, not through channel disconnection.
    evict_rx: Receiver<Frame>,
    open: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
}

impl FrameSender {
    /// Queue a frame, evicting the oldest queued frame if the channel is
    /// full. Returns `false` once the consumer is gone.
    pub fn send(&self, frame: Frame) -> bool {
        let mut frame = frame;
        loop {
            if !self.open.load(Ordering::SeqCst) {
                return false;
            }
            match self.tx.try_send(frame) {
                Ok(()) => return true,
                Err(TrySendError::Full(returned)) => {
                    if self.evict_rx.try_recv().is_ok() {
                        let n = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                        if n % 64 == 1 {
                            warn!(dropped = n, "frame hand-off full — dropping oldest frame");
                        }
                    }
                    frame = returned;
                }
                Err(TrySendError::Disconnected(_)) => return false,
            }
        }
    }
}

/// Consuming half of the frame hand-off queue: a lazy, blocking sequence
/// of frames in strict capture order.
pub struct FrameStream {
    rx: Receiver<Frame>,
    open: Arc<AtomicBool>,
}

impl FrameStream {
    /// Block until the next frame arrives. Returns `None` once the source
    /// has stopped (cancellation or device teardown) — the single blocking
    /// point in the pipeline.
    pub fn next(&mut self) -> Option<Frame> {
        self.rx.recv().ok()
    }
}

impl Drop for FrameStream {
    fn drop(&mut self) {
        // The producer must observe consumer departure even though its
        // eviction receiver keeps the channel itself connected.
        self.open.store(false, Ordering::SeqCst);
    }
}

/// Create a matched in-memory sender/stream pair with the given queue depth.
pub fn frame_channel(capacity: usize) -> (FrameSender, FrameStream) {
    let (tx, rx) = bounded(capacity.max(1));
    let open = Arc::new(AtomicBool::new(true));
    let sender = FrameSender {
        tx,
        evict_rx: rx.clone(),
        open: Arc::clone(&open),
        dropped: Arc::new(AtomicU64::new(0)),
    };
    (sender, FrameStream { rx, open })
}

/// Slices a mono f32 sample flow into fixed-size i16 frames.
///
/// Pure accumulation — no I/O, so frame assembly is testable without a
/// device.
pub struct FrameAssembler {
    frame_samples: usize,
    sample_rate: u32,
    pending: Vec<f32>,
}

impl FrameAssembler {
    pub fn new(frame_samples: usize, sample_rate: u32) -> Self {
        Self {
            frame_samples,
            sample_rate,
            pending: Vec::with_capacity(frame_samples * 2),
        }
    }

    /// Feed samples, returning every complete frame they finish. Partial
    /// tails stay buffered for the next call.
    pub fn push(&mut self, samples: &[f32]) -> Vec<Frame> {
        self.pending.extend_from_slice(samples);

        let mut frames = Vec::new();
        while self.pending.len() >= self.frame_samples {
            let pcm: Vec<i16> = self.pending[..self.frame_samples]
                .iter()
                .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
                .collect();
            self.pending.drain(..self.frame_samples);
            frames.push(Frame::new(pcm, self.sample_rate));
        }
        frames
    }
}

/// Handle to a live capture session producing [`Frame`]s.
///
/// Owns the device for its whole lifetime; dropping the source (or calling
/// [`FrameSource::stop`]) releases the device and ends the stream.
pub struct FrameSource {
    stream: FrameStream,
    running: Arc<AtomicBool>,
    framer: Option<JoinHandle<()>>,
}

impl FrameSource {
    /// Open the configured input device and start producing frames.
    ///
    /// Blocks until the device is confirmed open. Uses the config's
    /// hand-off capacity; see [`FrameSource::start_with`] for the wake
    /// gate's single-frame queue.
    ///
    /// # Errors
    /// Device open failure is fatal to the session and is returned here;
    /// no retry happens inside this component.
    pub fn start(config: &PipelineConfig) -> Result<Self> {
        Self::start_with(
            config,
            config.handoff_capacity,
            Arc::new(AtomicBool::new(true)),
        )
    }

    /// As [`FrameSource::start`] with an explicit queue depth and a shared
    /// run flag. Clearing the flag from any thread (a Ctrl-C handler, the
    /// session loop) makes the stream end promptly and releases the device
    /// — the cancellation path for `WakeGate::activate` and
    /// `UtteranceSegmenter::record_and_transcribe`.
    #[cfg(feature = "audio-cpal")]
    pub fn start_with(
        config: &PipelineConfig,
        capacity: usize,
        running: Arc<AtomicBool>,
    ) -> Result<Self> {
        config.validate()?;

        let (sender, stream) = frame_channel(capacity);
        let thread_running = Arc::clone(&running);
        let cfg = config.clone();

        // Sync ack: the framer thread reports device-open success/failure
        // before start() returns.
        let (open_tx, open_rx) = std::sync::mpsc::channel::<Result<u32>>();

        let framer = std::thread::Builder::new()
            .name("hark-framer".into())
            .spawn(move || capture_loop(cfg, sender, thread_running, open_tx))
            .map_err(|e| HarkError::AudioStream(format!("framer spawn: {e}")))?;

        match open_rx.recv() {
            Ok(Ok(device_rate)) => {
                info!(device_rate, "frame source started");
                Ok(Self {
                    stream,
                    running,
                    framer: Some(framer),
                })
            }
            Ok(Err(e)) => {
                running.store(false, Ordering::SeqCst);
                let _ = framer.join();
                Err(e)
            }
            Err(_) => {
                running.store(false, Ordering::SeqCst);
                let _ = framer.join();
                Err(HarkError::AudioStream("capture thread died during open".into()))
            }
        }
    }

    #[cfg(not(feature = "audio-cpal"))]
    pub fn start_with(
        _config: &PipelineConfig,
        _capacity: usize,
        _running: Arc<AtomicBool>,
    ) -> Result<Self> {
        Err(crate::error::HarkError::AudioStream(
            "compiled without audio-cpal feature".into(),
        ))
    }

    /// The frame sequence. Yields `None` after [`FrameSource::stop`] or a
    /// device error.
    pub fn frames(&mut self) -> &mut FrameStream {
        &mut self.stream
    }

    /// Signal the capture thread to tear down; the device is released once
    /// it exits. Idempotent.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.framer.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Framer thread body: owns the cpal stream end to end.
#[cfg(feature = "audio-cpal")]
fn capture_loop(
    config: PipelineConfig,
    sender: FrameSender,
    running: Arc<AtomicBool>,
    open_tx: std::sync::mpsc::Sender<Result<u32>>,
) {
    use ringbuf::traits::{Consumer, Split};
    use ringbuf::HeapRb;

    let (producer, mut consumer) = HeapRb::<f32>::new(RING_CAPACITY).split();

    let capture = match open_capture(&config, producer, Arc::clone(&running)) {
        Ok(c) => c,
        Err(e) => {
            let _ = open_tx.send(Err(e));
            return;
        }
    };
    let device_rate = capture.sample_rate;
    let _ = open_tx.send(Ok(device_rate));

    let mut converter =
        match resample::SampleRateConverter::new(device_rate, config.sample_rate_hz, 480) {
            Ok(c) => c,
            Err(e) => {
                warn!("capture ended: {e}");
                return;
            }
        };
    let mut assembler = FrameAssembler::new(config.frame_samples(), config.sample_rate_hz);
    let mut scratch = vec![0f32; 960];

    while running.load(Ordering::Relaxed) {
        let n = consumer.pop_slice(&mut scratch);
        if n == 0 {
            std::thread::sleep(EMPTY_SLEEP);
            continue;
        }

        let converted = converter.process(&scratch[..n]);
        for frame in assembler.push(&converted) {
            if !sender.send(frame) {
                debug!("frame consumer gone — stopping capture");
                running.store(false, Ordering::SeqCst);
                break;
            }
        }
    }

    // Stream drops here, releasing the audio device on this thread.
    drop(capture);
    debug!("capture loop exited");
}

#[cfg(feature = "audio-cpal")]
struct Capture {
    _stream: cpal::Stream,
    sample_rate: u32,
}

/// Build and play the cpal input stream. The callback mixes to mono and
/// pushes into the SPSC producer; overruns are logged and capture continues
/// (real-time audio cannot be replayed).
#[cfg(feature = "audio-cpal")]
fn open_capture(
    config: &PipelineConfig,
    mut producer: ringbuf::HeapProd<f32>,
    running: Arc<AtomicBool>,
) -> Result<Capture> {
    use cpal::traits::{DeviceTrait, StreamTrait};
    use cpal::{SampleFormat, SampleRate, StreamConfig};
    use ringbuf::traits::Producer;

    let host = cpal::default_host();
    let dev = device::resolve_input_device(&host, config.preferred_device.as_deref())?;

    info!(
        device = dev.name().unwrap_or_default().as_str(),
        "opening input device"
    );

    let supported = dev
        .default_input_config()
        .map_err(|e| HarkError::AudioDevice(e.to_string()))?;
    let sample_rate = supported.sample_rate().0;
    let channels = supported.channels() as usize;

    let stream_config = StreamConfig {
        channels: channels as u16,
        sample_rate: SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let running_f32 = Arc::clone(&running);
    let running_i16 = Arc::clone(&running);

    let stream = match supported.sample_format() {
        SampleFormat::F32 => {
            let mut mono: Vec<f32> = Vec::new();
            dev.build_input_stream(
                &stream_config,
                move |data: &[f32], _info| {
                    if !running_f32.load(Ordering::Relaxed) {
                        return;
                    }
                    let blocks = data.len() / channels;
                    mono.resize(blocks, 0.0);
                    for (i, block) in data.chunks_exact(channels).enumerate() {
                        mono[i] = block.iter().sum::<f32>() / channels as f32;
                    }
                    let written = producer.push_slice(&mono);
                    if written < mono.len() {
                        warn!("capture ring full: dropped {} samples", mono.len() - written);
                    }
                },
                |err| warn!("audio stream status: {err}"),
                None,
            )
        }
        SampleFormat::I16 => {
            let mut mono: Vec<f32> = Vec::new();
            dev.build_input_stream(
                &stream_config,
                move |data: &[i16], _info| {
                    if !running_i16.load(Ordering::Relaxed) {
                        return;
                    }
                    let blocks = data.len() / channels;
                    mono.resize(blocks, 0.0);
                    for (i, block) in data.chunks_exact(channels).enumerate() {
                        let sum: f32 = block.iter().map(|&s| s as f32 / 32768.0).sum();
                        mono[i] = sum / channels as f32;
                    }
                    let written = producer.push_slice(&mono);
                    if written < mono.len() {
                        warn!("capture ring full: dropped {} samples", mono.len() - written);
                    }
                },
                |err| warn!("audio stream status: {err}"),
                None,
            )
        }
        fmt => {
            return Err(HarkError::AudioStream(format!(
                "unsupported sample format: {fmt:?}"
            )))
        }
    }
    .map_err(|e| HarkError::AudioStream(e.to_string()))?;

    stream
        .play()
        .map_err(|e| HarkError::AudioStream(e.to_string()))?;

    Ok(Capture {
        _stream: stream,
        sample_rate,
    })
}
