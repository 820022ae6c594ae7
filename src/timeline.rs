//! Elapsed time to horizontal pixel mapping for the scrolling spectrogram.

use std::ops::Range;

/// Map `elapsed_ms` within a window of `window_duration_ms` onto `[0, canvas_width_px]`.
///
/// The factor is clamped to `[0, 1]` before scaling, so negative or overshooting
/// elapsed times pin to the canvas edges. `window_duration_ms` must be positive.
pub fn map_to_pixels(elapsed_ms: f64, window_duration_ms: f64, canvas_width_px: u32) -> u32 {
    debug_assert!(window_duration_ms > 0.0);
    let factor = (elapsed_ms / window_duration_ms).clamp(0.0, 1.0);
    // NaN factors saturate to 0 in the cast.
    (canvas_width_px as f64 * factor).floor() as u32
}

/// A playback window laid across a canvas of fixed width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timeline {
    window_duration_ms: f64,
    canvas_width_px: u32,
}

impl Timeline {
    pub fn new(window_duration_ms: u32, canvas_width_px: u32) -> Self {
        Self {
            window_duration_ms: window_duration_ms.max(1) as f64,
            canvas_width_px,
        }
    }

    pub fn canvas_width(&self) -> u32 {
        self.canvas_width_px
    }

    pub fn window_duration_ms(&self) -> f64 {
        self.window_duration_ms
    }

    pub fn x_at(&self, elapsed_ms: f64) -> u32 {
        map_to_pixels(elapsed_ms, self.window_duration_ms, self.canvas_width_px)
    }

    /// Columns covered between two elapsed times: `[x(from), x(to))`.
    pub fn columns_between(&self, from_elapsed_ms: f64, to_elapsed_ms: f64) -> Range<u32> {
        let left = self.x_at(from_elapsed_ms);
        let right = self.x_at(to_elapsed_ms);
        left..right.max(left)
    }
}
