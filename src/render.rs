//! Layout renderers: composite the instantaneous analyzer bars and the
//! scrolling voiceprint onto a caller-provided surface.
//!
//! Coordinate system: 0,0 is top left; sizes are always in pixels.

use tracing::{debug, warn};

use crate::buffers::BinWidths;
use crate::color::ColorCache;
use crate::config::{ScrollStrategy, VizConfig};
use crate::pipeline::SpectrumSnapshot;
use crate::scroll::{DualSurfaceScroller, HorizScroller, Scroller, Surface, VerticalScroller};

const BLACK: u32 = 0x000000;

/// One visual layout of the spectrum display.
///
/// The view layer owns draw scheduling: it calls
/// [`resize`](Self::resize) when the display dimensions change and
/// [`render`](Self::render) once per draw cycle with the latest published
/// snapshot.
pub trait LayoutRenderer: Send {
    /// Notifies the renderer that the display dimensions have changed.
    /// Returns the data display extent used for scaling future incoming
    /// frames.
    fn resize(&mut self, width: u32, height: u32) -> u32;

    /// Renders the visualization's current state onto `target`.
    fn render(&mut self, snapshot: &SpectrumSnapshot, target: &mut Surface);
}

/// Landscape layout: analyzer bars on the right edge, voiceprint scrolling
/// leftward through the remaining width, bins stacked bottom-to-top.
pub struct HorizRenderer {
    cache: &'static ColorCache,
    widths: BinWidths,
    scroll_step: u32,
    analyzer_fraction: f32,
    strategy: ScrollStrategy,
    scroller: Option<Scroller>,
    analyzer_width: u32,
    analyzer_left: u32,
    view_height: u32,
}

impl HorizRenderer {
    pub fn new(config: &VizConfig) -> Self {
        Self {
            cache: ColorCache::global(&config.color),
            widths: BinWidths::new(config.bass_exaggeration),
            scroll_step: config.scroll_step,
            analyzer_fraction: config.analyzer_width_fraction,
            strategy: config.horizontal_scroll,
            scroller: None,
            analyzer_width: 0,
            analyzer_left: 0,
            view_height: 0,
        }
    }
}

impl LayoutRenderer for HorizRenderer {
    fn resize(&mut self, width: u32, height: u32) -> u32 {
        debug!(width, height, "horizontal layout resized");
        self.analyzer_width = (width as f32 * self.analyzer_fraction) as u32;
        self.analyzer_left = width - self.analyzer_width;
        self.scroller = Some(match self.strategy {
            ScrollStrategy::SingleSurface => {
                Scroller::Horiz(HorizScroller::new(self.analyzer_left, height, self.scroll_step))
            }
            ScrollStrategy::DualSurface => Scroller::Dual(DualSurfaceScroller::new(
                self.analyzer_left,
                height,
                self.scroll_step,
            )),
        });
        self.view_height = height;
        height
    }

    fn render(&mut self, snapshot: &SpectrumSnapshot, target: &mut Surface) {
        let Some(scroller) = self.scroller.as_mut() else {
            warn!("render before resize");
            return;
        };
        target.fill(BLACK);

        self.widths
            .update_view_scaling(snapshot.magnitudes.len(), self.view_height);
        let mut bottom = target.height() as f32;
        for (bin, &px_width) in self.widths.widths().iter().enumerate() {
            let top = bottom - px_width;

            let analyzer_val = snapshot.smoothed[bin];
            target.fill_rect(
                self.analyzer_left as f32,
                top,
                self.analyzer_left as f32 + analyzer_val * self.analyzer_width as f32,
                bottom,
                self.cache.color_for_magnitude(analyzer_val),
            );

            scroller.paint_span(top, bottom, self.cache.color_for_magnitude(snapshot.magnitudes[bin]));

            // Shift upwards to the new bottom.
            bottom = top;
        }

        scroller.composite_and_advance(target);
    }
}

/// Portrait layout: analyzer bars across the top, voiceprint scrolling
/// downward through the remaining height, bins running left-to-right.
pub struct VerticalRenderer {
    cache: &'static ColorCache,
    widths: BinWidths,
    scroll_step: u32,
    analyzer_fraction: f32,
    scroller: Option<Scroller>,
    analyzer_height: u32,
    view_width: u32,
}

impl VerticalRenderer {
    pub fn new(config: &VizConfig) -> Self {
        Self {
            cache: ColorCache::global(&config.color),
            widths: BinWidths::new(config.bass_exaggeration),
            scroll_step: config.scroll_step,
            analyzer_fraction: config.analyzer_height_fraction,
            scroller: None,
            analyzer_height: 0,
            view_width: 0,
        }
    }
}

impl LayoutRenderer for VerticalRenderer {
    fn resize(&mut self, width: u32, height: u32) -> u32 {
        debug!(width, height, "vertical layout resized");
        self.analyzer_height = (height as f32 * self.analyzer_fraction) as u32;
        self.scroller = Some(Scroller::Vertical(VerticalScroller::new(
            width,
            height - self.analyzer_height,
            self.analyzer_height,
            self.scroll_step,
        )));
        self.view_width = width;
        width
    }

    fn render(&mut self, snapshot: &SpectrumSnapshot, target: &mut Surface) {
        let Some(scroller) = self.scroller.as_mut() else {
            warn!("render before resize");
            return;
        };
        target.fill(BLACK);

        self.widths
            .update_view_scaling(snapshot.magnitudes.len(), self.view_width);
        let analyzer_height = self.analyzer_height as f32;
        let mut left = 0.0f32;
        for (bin, &px_width) in self.widths.widths().iter().enumerate() {
            let right = left + px_width;

            let analyzer_val = snapshot.smoothed[bin];
            target.fill_rect(
                left,
                analyzer_height - analyzer_val * analyzer_height,
                right,
                analyzer_height,
                self.cache.color_for_magnitude(analyzer_val),
            );

            scroller.paint_span(left, right, self.cache.color_for_magnitude(snapshot.magnitudes[bin]));

            // Shift rightwards to the new left.
            left = right;
        }

        scroller.composite_and_advance(target);
    }
}
