//! Pipeline wiring: sources, arbitration, frame processing, and snapshot
//! publication.
//!
//! Frames arrive on whichever thread drives the active source. Each source
//! feeds its own processing path with its own buffers, so the two can deliver
//! concurrently during a failover window without sharing smoothing state. A
//! complete snapshot is published under the snapshot mutex before the view
//! listener is signaled, so the render thread never observes a half-updated
//! frame.
//!
//! Lock order: a primary-path frame may take the fallback-source lock (to
//! start or stop the microphone); the microphone's capture thread only ever
//! takes the fallback-path and snapshot locks. Nothing takes the primary-path
//! lock while holding either, so a `stop()` that joins the capture thread
//! cannot deadlock against in-flight frames.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{debug, error, info};

use crate::buffers::{frame_has_signal, SpectrumBuffers};
use crate::config::VizConfig;
use crate::error::VizResult;
use crate::source::{FrameListener, SourceKind, SpectralSource};
use crate::switcher::{FallbackGate, Transition};

/// A self-consistent copy of the most recent processed frame, published
/// atomically for the render thread.
#[derive(Debug, Clone, Serialize)]
pub struct SpectrumSnapshot {
    /// Immediate per-bin magnitudes in [0, 1].
    pub magnitudes: Vec<f32>,
    /// Time-smoothed per-bin magnitudes.
    pub smoothed: Vec<f32>,
    /// Which source produced the frame.
    pub source: SourceKind,
}

impl SpectrumSnapshot {
    fn empty() -> Self {
        Self {
            magnitudes: Vec::new(),
            smoothed: Vec::new(),
            source: SourceKind::SystemAudio,
        }
    }
}

/// Boundary to the display/view layer. The view owns draw scheduling,
/// gestures, and overlays; the pipeline reports data and source changes.
pub trait VisualizerListener: Send + Sync {
    /// A new frame has been processed and published.
    fn on_frame(&self, snapshot: &SpectrumSnapshot);

    /// The source of audio data has changed. Called exactly once per
    /// transition, never per frame.
    fn on_source_switched(&self, source: SourceKind);
}

/// Shared output side: the published snapshot plus the view listener.
struct SharedOutput {
    snapshot: Arc<Mutex<SpectrumSnapshot>>,
    listener: Arc<dyn VisualizerListener>,
}

impl SharedOutput {
    fn publish(&self, buffers: &SpectrumBuffers, source: SourceKind) {
        let snapshot = SpectrumSnapshot {
            magnitudes: buffers.magnitudes().to_vec(),
            smoothed: buffers.smoothed().to_vec(),
            source,
        };
        *self.snapshot.lock().unwrap() = snapshot.clone();
        self.listener.on_frame(&snapshot);
    }
}

type SharedSource = Arc<Mutex<Box<dyn SpectralSource>>>;

/// Processing path for primary-source frames: arbitration plus rendering
/// buffers.
struct PrimaryPath {
    gate: FallbackGate,
    buffers: SpectrumBuffers,
    fallback: SharedSource,
    fallback_listener: Arc<dyn FrameListener>,
    shared: Arc<SharedOutput>,
}

impl PrimaryPath {
    fn handle_frame(&mut self, frame: &[i8]) {
        if self.gate.primary_output_enabled() {
            let filled = match self.buffers.update_data(frame) {
                Ok(filled) => filled,
                Err(e) => {
                    error!("dropping primary frame: {}", e);
                    return;
                }
            };
            if let Some(Transition::StartFallback) = self.gate.observe_primary(filled) {
                // Bring the incoming source up before announcing the switch;
                // the outgoing primary keeps running so recovery can be seen.
                let started = self
                    .fallback
                    .lock()
                    .unwrap()
                    .start(self.fallback_listener.clone());
                match started {
                    Ok(()) => {
                        info!("switched to fallback source");
                        self.shared.listener.on_source_switched(SourceKind::Microphone);
                    }
                    Err(e) => {
                        error!("failed to start fallback source: {}", e);
                        self.gate.fallback_start_failed();
                    }
                }
            }
            if self.gate.primary_output_enabled() {
                self.shared.publish(&self.buffers, SourceKind::SystemAudio);
            }
        } else {
            // Muted: a pure non-zero scan is enough to watch for recovery,
            // skipping the magnitude lookups entirely.
            let filled = frame_has_signal(frame);
            if let Some(Transition::StopFallback) = self.gate.observe_primary(filled) {
                // Perform the skipped magnitude computation before handing
                // the frame onward, so the rendered data is never stale.
                if let Err(e) = self.buffers.update_data(frame) {
                    error!("dropping primary frame: {}", e);
                    return;
                }
                self.fallback.lock().unwrap().stop();
                info!("switched back to primary source");
                self.shared.listener.on_source_switched(SourceKind::SystemAudio);
                self.shared.publish(&self.buffers, SourceKind::SystemAudio);
            }
        }
    }
}

struct PrimaryFrameListener {
    path: Arc<Mutex<PrimaryPath>>,
}

impl FrameListener for PrimaryFrameListener {
    fn on_frame(&self, frame: &[i8]) {
        self.path.lock().unwrap().handle_frame(frame);
    }
}

/// Processing path for fallback-source frames: no arbitration, straight
/// through to the output.
struct FallbackPath {
    buffers: SpectrumBuffers,
    shared: Arc<SharedOutput>,
}

struct FallbackFrameListener {
    path: Arc<Mutex<FallbackPath>>,
}

impl FrameListener for FallbackFrameListener {
    fn on_frame(&self, frame: &[i8]) {
        let mut path = self.path.lock().unwrap();
        match path.buffers.update_data(frame) {
            Ok(_) => {
                let FallbackPath { buffers, shared } = &*path;
                shared.publish(buffers, SourceKind::Microphone);
            }
            Err(e) => error!("dropping fallback frame: {}", e),
        }
    }
}

/// Owns both sources and the data path between them and the view boundary.
pub struct VisualizerPipeline {
    config: VizConfig,
    primary: SharedSource,
    fallback: SharedSource,
    snapshot: Arc<Mutex<SpectrumSnapshot>>,
    primary_frame_width: usize,
    fallback_frame_width: usize,
    primary_tick_rate: u32,
    started: bool,
}

impl VisualizerPipeline {
    /// Wraps a primary source and a fallback source. Nothing is captured
    /// until [`start`](Self::start).
    pub fn new(
        config: VizConfig,
        primary: Box<dyn SpectralSource>,
        fallback: Box<dyn SpectralSource>,
    ) -> Self {
        let primary_frame_width = primary.output_size();
        let fallback_frame_width = fallback.output_size();
        let primary_tick_rate = primary.tick_rate_hz();
        Self {
            config,
            primary: Arc::new(Mutex::new(primary)),
            fallback: Arc::new(Mutex::new(fallback)),
            snapshot: Arc::new(Mutex::new(SpectrumSnapshot::empty())),
            primary_frame_width,
            fallback_frame_width,
            primary_tick_rate,
            started: false,
        }
    }

    /// Starts the primary source and wires both processing paths to the
    /// provided view listener. A no-op if already started.
    pub fn start(&mut self, listener: Arc<dyn VisualizerListener>) -> VizResult<()> {
        if self.started {
            return Ok(());
        }

        let ticks_start = seconds_to_ticks(self.config.fallback_start_secs, self.primary_tick_rate);
        let ticks_stop = seconds_to_ticks(self.config.fallback_stop_secs, self.primary_tick_rate);
        debug!(
            ticks_start,
            ticks_stop,
            tick_rate = self.primary_tick_rate,
            "starting pipeline"
        );

        let shared = Arc::new(SharedOutput {
            snapshot: self.snapshot.clone(),
            listener,
        });

        let fallback_listener: Arc<dyn FrameListener> = Arc::new(FallbackFrameListener {
            path: Arc::new(Mutex::new(FallbackPath {
                buffers: SpectrumBuffers::new(self.fallback_frame_width, self.config.smoothing_falloff),
                shared: shared.clone(),
            })),
        });

        let primary_listener: Arc<dyn FrameListener> = Arc::new(PrimaryFrameListener {
            path: Arc::new(Mutex::new(PrimaryPath {
                gate: FallbackGate::new(ticks_start, ticks_stop, self.config.switch_fuzz_ticks),
                buffers: SpectrumBuffers::new(self.primary_frame_width, self.config.smoothing_falloff),
                fallback: self.fallback.clone(),
                fallback_listener,
                shared,
            })),
        });

        self.primary.lock().unwrap().start(primary_listener)?;
        self.started = true;
        Ok(())
    }

    /// Stops both sources. Idempotent; no frame or switch callbacks fire
    /// after this returns.
    pub fn stop(&mut self) {
        if !self.started {
            return;
        }
        debug!("stopping pipeline");
        // Primary first: once it is quiet nothing can re-start the fallback.
        self.primary.lock().unwrap().stop();
        self.fallback.lock().unwrap().stop();
        self.started = false;
    }

    /// The most recently published snapshot, for pull-style render loops.
    pub fn latest_snapshot(&self) -> SpectrumSnapshot {
        self.snapshot.lock().unwrap().clone()
    }
}

impl Drop for VisualizerPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

fn seconds_to_ticks(seconds: f32, tick_rate_hz: u32) -> u32 {
    ((seconds * tick_rate_hz as f32).round() as u32).max(1)
}
