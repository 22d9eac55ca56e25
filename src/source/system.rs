//! System-audio tap: spectral frames from the output of any applications
//! producing audio, such as music players or games.

use std::sync::Arc;

use tracing::{debug, warn};

use super::{FrameListener, SpectralSource};
use crate::error::{VizError, VizResult};

/// Boundary to the platform's audio-output capture facility.
///
/// Implementations wrap whatever OS service exposes spectral capture of the
/// mixed output stream. The platform delivers frames on its own thread at the
/// rate negotiated in [`enable`](Self::enable); after
/// [`disable`](Self::disable) returns, no further deliveries may occur.
pub trait PlatformTap: Send {
    /// Reported `[min, max]` capture sizes. Some platforms report this range
    /// inverted or degenerate; callers normalize before use.
    fn capture_size_range(&self) -> (usize, usize);

    /// Maximum supported capture rate in Hz.
    fn max_capture_rate_hz(&self) -> u32;

    /// Begins delivering frames of `capture_size` bytes at `rate_hz` to the
    /// listener.
    fn enable(
        &mut self,
        capture_size: usize,
        rate_hz: u32,
        listener: Arc<dyn FrameListener>,
    ) -> VizResult<()>;

    /// Stops frame delivery. Idempotent.
    fn disable(&mut self);
}

/// Returns the largest power of two within the inclusive `[min, max]` range,
/// normalizing an inverted range first.
///
/// Fails with a configuration error if no power of two exists in range.
pub fn largest_power_of_two_in_range(mut min: usize, mut max: usize) -> VizResult<usize> {
    if min > max {
        warn!(min, max, "capture size range is backwards");
        std::mem::swap(&mut min, &mut max);
    }
    let mut largest = 0;
    let mut candidate = 2;
    while candidate <= max {
        if candidate >= min {
            largest = candidate;
        }
        candidate *= 2;
    }
    if largest == 0 {
        return Err(VizError::Config(format!(
            "unable to find a power of two within [{}, {}]",
            min, max
        )));
    }
    Ok(largest)
}

/// Spectral source backed by the platform's output-capture tap.
///
/// Negotiates the largest power-of-two capture width and the fastest rate the
/// platform supports. While any application is producing audio the tap
/// delivers its spectrum at that fixed rate; otherwise it may deliver
/// all-zero frames.
pub struct SystemAudioSource {
    tap: Box<dyn PlatformTap>,
    capture_size: usize,
    rate_hz: u32,
    enabled: bool,
}

impl SystemAudioSource {
    /// Wraps a platform tap, negotiating capture parameters up front.
    ///
    /// Fails with a configuration error if the reported capture-size range
    /// contains no power of two.
    pub fn new(tap: Box<dyn PlatformTap>) -> VizResult<Self> {
        let (min, max) = tap.capture_size_range();
        debug!(min, max, "capture size range");
        let capture_size = largest_power_of_two_in_range(min, max)?;
        let rate_hz = tap.max_capture_rate_hz();
        debug!(capture_size, rate_hz, "negotiated system tap capture");
        Ok(Self {
            tap,
            capture_size,
            rate_hz,
            enabled: false,
        })
    }
}

impl SpectralSource for SystemAudioSource {
    fn start(&mut self, listener: Arc<dyn FrameListener>) -> VizResult<()> {
        if self.enabled {
            return Ok(());
        }
        debug!(capture_size = self.capture_size, rate_hz = self.rate_hz, "starting system tap");
        self.tap.enable(self.capture_size, self.rate_hz, listener)?;
        self.enabled = true;
        Ok(())
    }

    fn stop(&mut self) {
        if !self.enabled {
            return;
        }
        debug!("stopping system tap");
        self.tap.disable();
        self.enabled = false;
    }

    fn output_size(&self) -> usize {
        self.capture_size
    }

    fn tick_rate_hz(&self) -> u32 {
        self.rate_hz
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn picks_largest_power_of_two() {
        assert_eq!(largest_power_of_two_in_range(128, 1024).unwrap(), 1024);
        assert_eq!(largest_power_of_two_in_range(128, 1500).unwrap(), 1024);
        assert_eq!(largest_power_of_two_in_range(2, 2).unwrap(), 2);
    }

    #[test]
    fn normalizes_backwards_range() {
        assert_eq!(largest_power_of_two_in_range(1024, 128).unwrap(), 1024);
    }

    #[test]
    fn fails_when_no_power_of_two_fits() {
        assert!(largest_power_of_two_in_range(33, 63).is_err());
        assert!(largest_power_of_two_in_range(3, 3).is_err());
    }

    struct CountingTap {
        enables: Arc<AtomicUsize>,
        disables: Arc<AtomicUsize>,
    }

    impl PlatformTap for CountingTap {
        fn capture_size_range(&self) -> (usize, usize) {
            // Backwards on purpose.
            (1024, 8)
        }

        fn max_capture_rate_hz(&self) -> u32 {
            20
        }

        fn enable(
            &mut self,
            capture_size: usize,
            rate_hz: u32,
            _listener: Arc<dyn FrameListener>,
        ) -> VizResult<()> {
            assert_eq!(capture_size, 1024);
            assert_eq!(rate_hz, 20);
            self.enables.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn disable(&mut self) {
            self.disables.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct NullListener;
    impl FrameListener for NullListener {
        fn on_frame(&self, _frame: &[i8]) {}
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let enables = Arc::new(AtomicUsize::new(0));
        let disables = Arc::new(AtomicUsize::new(0));
        let tap = CountingTap {
            enables: enables.clone(),
            disables: disables.clone(),
        };
        let mut source = SystemAudioSource::new(Box::new(tap)).unwrap();
        assert_eq!(source.output_size(), 1024);
        assert_eq!(source.tick_rate_hz(), 20);

        source.start(Arc::new(NullListener)).unwrap();
        source.start(Arc::new(NullListener)).unwrap();
        assert_eq!(enables.load(Ordering::SeqCst), 1);

        source.stop();
        source.stop();
        assert_eq!(disables.load(Ordering::SeqCst), 1);
    }
}
