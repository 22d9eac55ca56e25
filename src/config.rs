//! Pipeline configuration.
//!
//! Every knob here is tunable without changing any behavior contract: the
//! defaults reproduce the stock look and failover feel of the visualizer.

use serde::{Deserialize, Serialize};

/// Surface arrangement for horizontally-scrolling voiceprints. Both render
/// identically; the dual arrangement trades memory for simpler seam writes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollStrategy {
    /// One surface with a wraparound write pointer.
    #[default]
    SingleSurface,
    /// Two adjacent surfaces swapping places as they scroll past.
    DualSurface,
}

/// Luminosity shaping for the precomputed color tables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorParams {
    /// Maximum luminosity value.
    pub max_luminosity: f32,
    /// Exponent used for exaggerating low luminosity values to make them
    /// more visible.
    pub luminosity_exponent: f32,
}

impl Default for ColorParams {
    fn default() -> Self {
        Self {
            max_luminosity: 0.5,
            luminosity_exponent: 0.85,
        }
    }
}

/// Tunable constants for the visualizer pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VizConfig {
    /// How quickly smoothed data may fall per tick. Smaller value = slower.
    pub smoothing_falloff: f32,
    /// Seconds of silent primary-source data before falling back to the
    /// microphone.
    pub fallback_start_secs: f32,
    /// Seconds of recovered primary-source data before switching back off
    /// the microphone. Kept shorter than `fallback_start_secs`: promotion
    /// back to the primary can afford to wait out transient audio.
    pub fallback_stop_secs: f32,
    /// Ticks of warm-up grace granted to a freshly started primary source
    /// before it can be judged silent.
    pub switch_fuzz_ticks: u32,
    /// How much lows/mids are exaggerated compared to highs in the per-bin
    /// display widths. Higher value = more exaggeration.
    pub bass_exaggeration: f32,
    /// Luminosity shaping for the color tables.
    pub color: ColorParams,
    /// Width in pixels of one painted voiceprint column/row, and the
    /// distance the scroll advances per composite.
    pub scroll_step: u32,
    /// Surface arrangement for the horizontal layout's voiceprint.
    pub horizontal_scroll: ScrollStrategy,
    /// Fraction of the display width given to the analyzer bars in the
    /// horizontal layout.
    pub analyzer_width_fraction: f32,
    /// Fraction of the display height given to the analyzer bars in the
    /// vertical layout.
    pub analyzer_height_fraction: f32,
    /// Microphone sample rates to probe, in order of preference.
    pub mic_sample_rates: Vec<u32>,
}

impl Default for VizConfig {
    fn default() -> Self {
        Self {
            smoothing_falloff: 0.15,
            fallback_start_secs: 5.0,
            fallback_stop_secs: 3.0,
            switch_fuzz_ticks: 10,
            bass_exaggeration: 1.5,
            color: ColorParams::default(),
            scroll_step: 5,
            horizontal_scroll: ScrollStrategy::default(),
            analyzer_width_fraction: 0.15,
            analyzer_height_fraction: 0.25,
            // 11025 clips off too much treble; 44100 is overkill but is the
            // rate most widely supported.
            mic_sample_rates: vec![16000, 22050, 44100],
        }
    }
}
