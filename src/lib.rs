//! Real-time scrolling spectrum visualizer pipeline.
//!
//! Turns a live audio stream into a continuously scrolling spectrum
//! visualization. Spectral frames come from one of two interchangeable
//! sources — a tap on the system's audio output, or the microphone — with a
//! hysteresis arbitrator failing over to the microphone when the system
//! output goes silent and recovering automatically. Raw sample pairs become
//! magnitudes and display colors through precomputed lookup tables, feed a
//! leaky-max smoothed analyzer, and are composited into a scrolling history
//! raster (the "voiceprint") by wraparound blits that stay seamless across
//! buffer boundaries in both horizontal and vertical layouts.
//!
//! The view layer is intentionally external: it owns windowing, draw
//! scheduling, and input, and talks to the pipeline through
//! [`VisualizerListener`], [`LayoutRenderer`], and
//! [`VisualizerPipeline::latest_snapshot`].
//!
//! Embedding binaries typically initialize logging with
//! `tracing_subscriber::fmt().with_env_filter(...)` before building a
//! pipeline.

pub mod buffers;
pub mod color;
pub mod config;
pub mod error;
pub mod fft;
pub mod pipeline;
pub mod render;
pub mod scroll;
pub mod source;
pub mod switcher;

pub use buffers::{frame_has_signal, kept_data_size, BinWidths, SpectrumBuffers};
pub use color::ColorCache;
pub use config::{ColorParams, ScrollStrategy, VizConfig};
pub use error::{VizError, VizResult};
pub use fft::ForwardFft;
pub use pipeline::{SpectrumSnapshot, VisualizerListener, VisualizerPipeline};
pub use render::{HorizRenderer, LayoutRenderer, VerticalRenderer};
pub use scroll::{DualSurfaceScroller, HorizScroller, Scroller, Surface, VerticalScroller};
pub use source::{
    FrameListener, MicrophoneSource, PlatformTap, SourceKind, SpectralSource, SystemAudioSource,
};
pub use switcher::{ArbitrationState, FallbackGate, Transition};
