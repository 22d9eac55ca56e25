//! Spectrum frame processing: magnitude extraction, time smoothing, and
//! per-bin display-width scaling.

use tracing::trace;

use crate::color;
use crate::error::{VizError, VizResult};

/// Returns the number of frequency bins that result from a raw frame of the
/// provided width. The first two bytes are the DC and Nyquist endcaps; the
/// remaining bytes are real+imaginary pairs which recombine into one bin
/// each. Eg 6 -> 2, 10 -> 4.
pub fn kept_data_size(frame_width: usize) -> usize {
    frame_width / 2 - 1
}

/// Cheap signal-presence scan over a raw frame. Used while the frame's
/// magnitudes aren't being rendered, to skip the lookup work entirely.
pub fn frame_has_signal(frame: &[i8]) -> bool {
    frame.iter().any(|&b| b != 0)
}

/// Takes raw spectral frames and transforms them into spectrum data suitable
/// for rendering.
pub struct SpectrumBuffers {
    /// Immediate spectrum data; each value an amplitude in [0, 1].
    magnitudes: Vec<f32>,
    /// Time-smoothed spectrum data with the same dimensions as `magnitudes`,
    /// where values change gradually for smooth movement over time.
    smoothed: Vec<f32>,
    falloff: f32,
}

impl SpectrumBuffers {
    /// Creates buffers expecting raw frames of length `frame_width`.
    pub fn new(frame_width: usize, falloff: f32) -> Self {
        let kept = kept_data_size(frame_width);
        Self {
            magnitudes: vec![0.0; kept],
            smoothed: vec![0.0; kept],
            falloff,
        }
    }

    /// Processes a raw frame, updating the magnitude and smoothed buffers.
    /// Returns whether the frame contained any non-zero pair.
    ///
    /// Fails with a size-mismatch error if the frame's length disagrees with
    /// the width configured at construction.
    pub fn update_data(&mut self, frame: &[i8]) -> VizResult<bool> {
        let expected = (self.magnitudes.len() + 1) * 2;
        if frame.len() != expected {
            return Err(VizError::SizeMismatch {
                expected,
                actual: frame.len(),
            });
        }

        let mut value_found = false;
        // Combine and store the non-endcap real+imaginary pairs, pairwise
        // from index 2 onwards.
        for (bin, pair) in frame[2..].chunks_exact(2).enumerate() {
            let key = color::pair_key(pair[0], pair[1]);
            if key != 0 {
                value_found = true;
            }
            let magnitude = color::magnitude_for_key(key);
            self.magnitudes[bin] = magnitude;

            // Linear decrease in the smoothed value: avoids the appearance of
            // disconnectedness between analyzer and voiceprint without making
            // the analyzer look jittery.
            self.smoothed[bin] = magnitude.max(self.smoothed[bin] - self.falloff);
        }
        Ok(value_found)
    }

    /// Number of frequency bins.
    pub fn len(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitudes.is_empty()
    }

    /// Immediate per-bin magnitudes from the most recent frame.
    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }

    /// Time-smoothed per-bin magnitudes.
    pub fn smoothed(&self) -> &[f32] {
        &self.smoothed
    }
}

/// Per-bin display widths: "given bin i, how wide should it be on screen?"
///
/// Lows/mids get exaggerated over highs with a power-law redistribution,
/// normalized so the widths sum to the available display extent. The table
/// depends on the extent last passed to
/// [`update_view_scaling`](Self::update_view_scaling), which recomputes it.
pub struct BinWidths {
    widths: Vec<f32>,
    exaggeration: f32,
    last_extent: Option<u32>,
}

impl BinWidths {
    pub fn new(exaggeration: f32) -> Self {
        Self {
            widths: Vec::new(),
            exaggeration,
            last_extent: None,
        }
    }

    /// Recomputes the width table for `bin_count` bins across `extent`
    /// pixels. A no-op when neither has changed since the last call.
    pub fn update_view_scaling(&mut self, bin_count: usize, extent: u32) {
        if self.widths.len() == bin_count && self.last_extent == Some(extent) {
            return;
        }
        trace!(bin_count, extent, "updating view scaling");

        let n = bin_count;
        let p = self.exaggeration as f64;
        // width[i] = (n - i)^p * extent / sum_j (n - j)^p
        let total: f64 = (1..=n).map(|k| (k as f64).powf(p)).sum();
        self.widths.clear();
        self.widths.extend(
            (0..n).map(|i| (((n - i) as f64).powf(p) * extent as f64 / total) as f32),
        );
        self.last_extent = Some(extent);
    }

    /// The current width table. Empty until the first
    /// [`update_view_scaling`](Self::update_view_scaling) call.
    pub fn widths(&self) -> &[f32] {
        &self.widths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn frame_with_pair(width: usize, bin: usize, real: i8, imag: i8) -> Vec<i8> {
        let mut frame = vec![0i8; width];
        frame[2 + bin * 2] = real;
        frame[2 + bin * 2 + 1] = imag;
        frame
    }

    #[test]
    fn kept_data_size_drops_endcaps() {
        assert_eq!(kept_data_size(6), 2);
        assert_eq!(kept_data_size(10), 4);
        assert_eq!(kept_data_size(1024), 511);
    }

    #[test]
    fn rejects_mismatched_frame() {
        let mut buffers = SpectrumBuffers::new(1024, 0.15);
        assert!(matches!(
            buffers.update_data(&vec![0i8; 512]),
            Err(VizError::SizeMismatch { expected: 1024, actual: 512 })
        ));
    }

    #[test]
    fn zero_frame_reports_empty() {
        let mut buffers = SpectrumBuffers::new(1024, 0.15);
        assert_eq!(buffers.len(), 511);
        assert!(!buffers.update_data(&vec![0i8; 1024]).unwrap());
        assert!(buffers.magnitudes().iter().all(|&m| m == 0.0));
    }

    #[test]
    fn full_scale_pair_reports_filled() {
        let mut buffers = SpectrumBuffers::new(1024, 0.15);
        let frame = frame_with_pair(1024, 3, 127, 127);
        assert!(buffers.update_data(&frame).unwrap());
        assert_relative_eq!(buffers.magnitudes()[3], 1.0, epsilon = 1e-6);
        for (i, &m) in buffers.magnitudes().iter().enumerate() {
            if i != 3 {
                assert_eq!(m, 0.0);
            }
        }
    }

    #[test]
    fn single_axis_pair_reports_filled() {
        let mut buffers = SpectrumBuffers::new(1024, 0.15);
        let frame = frame_with_pair(1024, 0, 127, 0);
        assert!(buffers.update_data(&frame).unwrap());
        assert_relative_eq!(
            buffers.magnitudes()[0],
            std::f32::consts::FRAC_1_SQRT_2,
            epsilon = 1e-6
        );
    }

    #[test]
    fn endcaps_do_not_count_as_signal() {
        let mut buffers = SpectrumBuffers::new(8, 0.15);
        let mut frame = vec![0i8; 8];
        frame[0] = 127;
        frame[1] = -1;
        assert!(!buffers.update_data(&frame).unwrap());
        // The cheap scan, by contrast, looks at every byte.
        assert!(frame_has_signal(&frame));
    }

    #[test]
    fn smoothed_rises_instantly_and_decays_linearly() {
        let falloff = 0.15;
        let mut buffers = SpectrumBuffers::new(8, falloff);
        let loud = frame_with_pair(8, 0, 127, 127);
        let silent = vec![0i8; 8];

        buffers.update_data(&loud).unwrap();
        assert_relative_eq!(buffers.smoothed()[0], 1.0, epsilon = 1e-6);

        let mut expected = 1.0;
        for _ in 0..5 {
            buffers.update_data(&silent).unwrap();
            expected -= falloff;
            assert_relative_eq!(buffers.smoothed()[0], expected, epsilon = 1e-6);
        }
        // Never decays below the incoming magnitude.
        for _ in 0..10 {
            buffers.update_data(&silent).unwrap();
        }
        assert!(buffers.smoothed()[0] >= 0.0);
    }

    #[test]
    fn smoothed_never_exceeds_peak_seen() {
        let mut buffers = SpectrumBuffers::new(8, 0.15);
        let mid = frame_with_pair(8, 1, 64, 0);
        let peak = color::magnitude_for_key(color::pair_key(64, 0));
        for _ in 0..20 {
            buffers.update_data(&mid).unwrap();
            assert!(buffers.smoothed()[1] <= peak + 1e-6);
        }
    }

    #[test]
    fn widths_sum_to_extent() {
        for &(bins, extent) in &[(1usize, 1u32), (1, 640), (7, 480), (511, 1080), (255, 33)] {
            let mut widths = BinWidths::new(1.5);
            widths.update_view_scaling(bins, extent);
            let sum: f32 = widths.widths().iter().sum();
            assert_relative_eq!(sum, extent as f32, epsilon = extent as f32 * 1e-4);
        }
    }

    #[test]
    fn widths_exaggerate_low_bins() {
        let mut widths = BinWidths::new(1.5);
        widths.update_view_scaling(16, 320);
        let w = widths.widths();
        for i in 1..w.len() {
            assert!(w[i] < w[i - 1]);
        }
    }

    #[test]
    fn view_scaling_is_idempotent_for_unchanged_extent() {
        let mut widths = BinWidths::new(1.5);
        widths.update_view_scaling(16, 320);
        let before = widths.widths().to_vec();
        widths.update_view_scaling(16, 320);
        assert_eq!(before, widths.widths());
    }
}
