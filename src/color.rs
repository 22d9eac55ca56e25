//! Precomputed spectrum-to-magnitude and magnitude-to-color tables.
//!
//! Each raw spectral data point is a signed real+imaginary byte pair. The
//! magnitude of the point is `sqrt(real^2 + imag^2)`, normalized so a
//! full-scale pair maps to 1.0. Computing that (and the HSL color derived
//! from it) per bin per frame would put a sqrt and a handful of branches on
//! the hot path, so the whole mapping is precalculated once at process start
//! and reduced to table lookups.

use std::sync::OnceLock;

use crate::config::ColorParams;

/// Key space for `(|real| << 7) + |imag|`: 128x128 plus the endcap row and
/// column reachable through `|-128|`.
const KEY_SPACE: usize = (128 << 7) + 128 + 1;

/// Quantization steps for the magnitude-to-color table.
const COLOR_STEPS: usize = 256;

/// Given a raw real+imaginary pair, returns the lookup key for the pair.
#[inline]
pub fn pair_key(real: i8, imag: i8) -> usize {
    ((real.unsigned_abs() as usize) << 7) + imag.unsigned_abs() as usize
}

fn magnitude_table() -> &'static [f32] {
    static TABLE: OnceLock<Vec<f32>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let max_combined = (2.0f64 * (127.0 * 127.0)).sqrt();
        let mut table = vec![0.0f32; KEY_SPACE];
        for i in 0..=128usize {
            for j in 0..=128usize {
                let key = (i << 7) + j;
                let value = (((i * i + j * j) as f64).sqrt() / max_combined) as f32;
                table[key] = value.min(1.0);
            }
        }
        table
    })
}

/// Returns the normalized magnitude in [0, 1] for a pair key.
#[inline]
pub fn magnitude_for_key(key: usize) -> f32 {
    magnitude_table()[key]
}

/// Precomputed magnitude-to-color table.
///
/// Immutable after construction. The process-wide instance is built once via
/// [`ColorCache::global`] and lives until process exit; there is no
/// reinitialization path.
pub struct ColorCache {
    colors: Vec<u32>,
}

impl ColorCache {
    /// Builds the color table for the given luminosity shaping.
    pub fn new(params: ColorParams) -> Self {
        let mut colors = Vec::with_capacity(COLOR_STEPS);
        for step in 0..COLOR_STEPS {
            let magnitude = step as f32 / (COLOR_STEPS - 1) as f32;
            let lum = value_to_lum(magnitude, &params);
            colors.push(value_to_color(magnitude, lum));
        }
        Self { colors }
    }

    /// Returns the process-wide cache, building it on first use. The params
    /// of the first caller win; later calls return the already-built table.
    pub fn global(params: &ColorParams) -> &'static ColorCache {
        static CACHE: OnceLock<ColorCache> = OnceLock::new();
        CACHE.get_or_init(|| ColorCache::new(*params))
    }

    /// Returns the packed `0xRRGGBB` display color for a magnitude in [0, 1].
    #[inline]
    pub fn color_for_magnitude(&self, magnitude: f32) -> u32 {
        let idx = (magnitude.clamp(0.0, 1.0) * (COLOR_STEPS - 1) as f32).round() as usize;
        self.colors[idx]
    }

    /// Returns the display color for a raw pair key.
    #[inline]
    pub fn color_for_key(&self, key: usize) -> u32 {
        self.color_for_magnitude(magnitude_for_key(key))
    }
}

/// Given a magnitude, returns an appropriate luminosity value: exponentially
/// compressed so low magnitudes stay visible, clamped to the configured cap.
fn value_to_lum(value: f32, params: &ColorParams) -> f32 {
    value.powf(params.luminosity_exponent).min(params.max_luminosity)
}

// HSL math. Saturation is always 1, which collapses the usual p/q terms.

const ONE_SIXTH: f32 = 1.0 / 6.0;
const ONE_THIRD: f32 = 1.0 / 3.0;
const ONE_HALF: f32 = 1.0 / 2.0;
const TWO_THIRDS: f32 = 2.0 / 3.0;

/// Given a magnitude and a luminosity for it, returns a packed `0xRRGGBB`
/// color. Hue runs from red (loud) through green to blue (quiet).
fn value_to_color(value: f32, lum: f32) -> u32 {
    let h = ONE_THIRD * (1.0 - value);
    let lum = lum * 2.0;
    if lum < 1.0 {
        pack_rgb(
            hue_to_rgb_val_with_p0(lum, h + ONE_THIRD),
            hue_to_rgb_val_with_p0(lum, h),
            hue_to_rgb_val_with_p0(lum, h - ONE_THIRD),
        )
    } else {
        let lum = lum - 1.0;
        pack_rgb(
            hue_to_rgb_val_with_q1(lum, h + ONE_THIRD),
            hue_to_rgb_val_with_q1(lum, h),
            hue_to_rgb_val_with_q1(lum, h - ONE_THIRD),
        )
    }
}

fn pack_rgb(r: f32, g: f32, b: f32) -> u32 {
    (((r * 255.0) as u32) << 16) | (((g * 255.0) as u32) << 8) | ((b * 255.0) as u32)
}

fn hue_to_rgb_val_with_p0(q: f32, t: f32) -> f32 {
    let t = if t < 0.0 { t + 1.0 } else { t };
    if t < ONE_SIXTH {
        q * 6.0 * t
    } else if t < ONE_HALF {
        q
    } else if t < TWO_THIRDS {
        q * (TWO_THIRDS - t) * 6.0
    } else {
        0.0
    }
}

fn hue_to_rgb_val_with_q1(p: f32, t: f32) -> f32 {
    let t = if t < 0.0 { t + 1.0 } else { t };
    if t < ONE_SIXTH {
        p + ((1.0 - p) * 6.0 * t)
    } else if t < ONE_HALF {
        1.0
    } else if t < TWO_THIRDS {
        p + ((1.0 - p) * (TWO_THIRDS - t) * 6.0)
    } else {
        p
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn magnitudes_are_normalized() {
        assert_eq!(magnitude_for_key(pair_key(0, 0)), 0.0);
        assert_relative_eq!(magnitude_for_key(pair_key(127, 127)), 1.0, epsilon = 1e-6);
        assert_relative_eq!(
            magnitude_for_key(pair_key(127, 0)),
            std::f32::consts::FRAC_1_SQRT_2,
            epsilon = 1e-6
        );
        // The sign of either component never matters.
        assert_eq!(pair_key(-64, 3), pair_key(64, -3));
    }

    #[test]
    fn magnitudes_never_exceed_one() {
        // |-128| lands beyond the nominal full-scale value; the table clamps.
        for key in 0..KEY_SPACE {
            let m = magnitude_for_key(key);
            assert!((0.0..=1.0).contains(&m), "key {} gave {}", key, m);
        }
    }

    #[test]
    fn silent_bins_are_black() {
        let cache = ColorCache::new(ColorParams::default());
        assert_eq!(cache.color_for_magnitude(0.0), 0x000000);
        assert_eq!(cache.color_for_key(pair_key(0, 0)), 0x000000);
    }

    #[test]
    fn loud_bins_are_red() {
        let cache = ColorCache::new(ColorParams::default());
        let color = cache.color_for_magnitude(1.0);
        let (r, g, b) = ((color >> 16) & 0xff, (color >> 8) & 0xff, color & 0xff);
        // Hue 0 at full magnitude, luminosity capped at 0.5: pure red.
        assert!(r > 200, "expected strong red channel, got {:06x}", color);
        assert_eq!(g, 0);
        assert_eq!(b, 0);
    }

    #[test]
    fn luminosity_cap_limits_brightness() {
        let params = ColorParams {
            max_luminosity: 0.1,
            ..ColorParams::default()
        };
        let dim = ColorCache::new(params);
        let bright = ColorCache::new(ColorParams::default());
        let (d, b) = (dim.color_for_magnitude(1.0), bright.color_for_magnitude(1.0));
        assert!((d >> 16) & 0xff < (b >> 16) & 0xff);
    }
}
