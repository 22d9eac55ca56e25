//! Spectral audio sources.
//!
//! A source produces raw spectral frames from the device, suitable for use by
//! visualizations: the system-audio tap captures whatever applications are
//! playing, and the microphone tap transforms live input as a fallback.

mod microphone;
mod system;

pub use microphone::MicrophoneSource;
pub use system::{PlatformTap, SystemAudioSource};

use serde::Serialize;
use std::sync::Arc;

use crate::error::VizResult;

/// Which audio source is producing data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Device output, such as music from a player application.
    SystemAudio,
    /// The device microphone.
    Microphone,
}

/// Accepts raw spectral frames as produced by a source.
///
/// Frame layout: bytes 0 and 1 are the DC and Nyquist endcaps; bytes `2k` and
/// `2k + 1` for `k >= 1` are the real/imaginary pair of bin `k - 1`.
pub trait FrameListener: Send + Sync {
    fn on_frame(&self, frame: &[i8]);
}

/// Produces raw spectral frames from the device.
pub trait SpectralSource: Send {
    /// Starts capturing and retrieving audio data, forwarding it to the
    /// provided listener, or does nothing if capture is already started.
    /// Returns once retrieval is set up; frame delivery happens
    /// asynchronously until [`stop`](Self::stop).
    ///
    /// Fails with a configuration error if audio capture couldn't be enabled.
    fn start(&mut self, listener: Arc<dyn FrameListener>) -> VizResult<()>;

    /// Stops retrieving audio data, or does nothing if retrieval is already
    /// stopped. No frame delivery occurs after this returns.
    fn stop(&mut self);

    /// The length of the frames this instance passes to its listener.
    fn output_size(&self) -> usize;

    /// The fixed rate, in Hz, at which frames are delivered while started.
    fn tick_rate_hz(&self) -> u32;
}
