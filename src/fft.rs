//! Forward transform for the microphone capture path.
//!
//! The plan and its twiddle tables are built once at construction and reused
//! for every block; the output arrays are overwritten in place each call.
//! Not safe for concurrent calls on the same instance.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

use crate::error::{VizError, VizResult};

/// Power-of-two forward FFT over reusable real/imaginary buffers.
///
/// Input samples are 16-bit PCM, scaled down into the signed-8-bit range
/// during load so the resulting spectrum matches the byte layout the
/// system-audio tap delivers.
pub struct ForwardFft {
    size: usize,
    fft: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    real: Vec<f32>,
    imag: Vec<f32>,
}

impl ForwardFft {
    /// Plans a transform for sample blocks of length `size`.
    ///
    /// Fails with a configuration error if `size` is not a power of two.
    pub fn new(size: usize) -> VizResult<Self> {
        if size == 0 || !size.is_power_of_two() {
            return Err(VizError::Config(format!(
                "FFT size must be a power of two, got {}",
                size
            )));
        }
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        let scratch_len = fft.get_inplace_scratch_len();
        Ok(Self {
            size,
            fft,
            buffer: vec![Complex::new(0.0, 0.0); size],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            real: vec![0.0; size],
            imag: vec![0.0; size],
        })
    }

    /// Performs a forward transform on `samples`, overwriting the output
    /// arrays from the previous call.
    pub fn forward(&mut self, samples: &[i16]) -> VizResult<()> {
        if samples.len() != self.size {
            return Err(VizError::SizeMismatch {
                expected: self.size,
                actual: samples.len(),
            });
        }
        for (slot, &sample) in self.buffer.iter_mut().zip(samples) {
            slot.re = (sample / 128).clamp(-127, 127) as f32;
            slot.im = 0.0;
        }
        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);
        for (i, c) in self.buffer.iter().enumerate() {
            self.real[i] = c.re;
            self.imag[i] = c.im;
        }
        Ok(())
    }

    /// Block length this instance was planned for.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Real spectrum components from the most recent [`forward`](Self::forward).
    pub fn real(&self) -> &[f32] {
        &self.real
    }

    /// Imaginary spectrum components from the most recent [`forward`](Self::forward).
    pub fn imag(&self) -> &[f32] {
        &self.imag
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rejects_non_power_of_two_sizes() {
        assert!(ForwardFft::new(0).is_err());
        assert!(ForwardFft::new(1000).is_err());
        assert!(ForwardFft::new(1024).is_ok());
    }

    #[test]
    fn rejects_mismatched_block_length() {
        let mut fft = ForwardFft::new(64).unwrap();
        assert!(fft.forward(&[0i16; 63]).is_err());
    }

    #[test]
    fn dc_input_lands_in_bin_zero() {
        let mut fft = ForwardFft::new(64).unwrap();
        // Full-scale PCM clamps to 127 after the byte scale.
        fft.forward(&[i16::MAX; 64]).unwrap();
        assert_relative_eq!(fft.real()[0], 127.0 * 64.0, max_relative = 1e-4);
        for i in 1..64 {
            assert_relative_eq!(fft.real()[i], 0.0, epsilon = 0.05);
            assert_relative_eq!(fft.imag()[i], 0.0, epsilon = 0.05);
        }
    }

    #[test]
    fn impulse_yields_flat_spectrum() {
        let mut fft = ForwardFft::new(32).unwrap();
        let mut samples = [0i16; 32];
        samples[0] = 128 * 100;
        fft.forward(&samples).unwrap();
        for i in 0..32 {
            assert_relative_eq!(fft.real()[i], 100.0, epsilon = 0.05);
            assert_relative_eq!(fft.imag()[i], 0.0, epsilon = 0.05);
        }
    }

    #[test]
    fn sine_concentrates_in_its_bin() {
        const N: usize = 128;
        let mut fft = ForwardFft::new(N).unwrap();
        let samples: Vec<i16> = (0..N)
            .map(|i| {
                let phase = 2.0 * std::f64::consts::PI * 4.0 * i as f64 / N as f64;
                (phase.sin() * 127.0 * 128.0) as i16
            })
            .collect();
        fft.forward(&samples).unwrap();
        let magnitudes: Vec<f32> = (0..N / 2)
            .map(|i| (fft.real()[i].powi(2) + fft.imag()[i].powi(2)).sqrt())
            .collect();
        let peak = magnitudes
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap()
            .0;
        assert_eq!(peak, 4);
    }
}
