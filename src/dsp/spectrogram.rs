use std::ops::Range;

use crate::timeline::Timeline;

const BYTES_PER_PIXEL: usize = 4;
const OPAQUE: u8 = 255;

/// Number of snapshot bins whose frequency lies at or below `max_frequency_hz`.
///
/// `min(bin_count, ceil(max / (sample_rate / bin_count)))`; `None` keeps every bin.
pub fn column_height(bin_count: usize, sample_rate: u32, max_frequency_hz: Option<f64>) -> usize {
    let Some(max_frequency) = max_frequency_hz else {
        return bin_count;
    };
    if bin_count == 0 || sample_rate == 0 {
        return 0;
    }
    let hertz_per_bin = sample_rate as f64 / bin_count as f64;
    let max_frequency = max_frequency.min(sample_rate as f64).max(0.0);
    let required_bins = (max_frequency / hertz_per_bin).ceil() as usize;
    required_bins.min(bin_count)
}

/// RGBA8 pixel surface, row-major, row 0 at the top.
#[derive(Debug, Clone)]
pub struct PixelCanvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl PixelCanvas {
    /// Canvas filled with opaque black.
    pub fn new(width: u32, height: u32) -> Self {
        let mut canvas = Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * BYTES_PER_PIXEL],
        };
        canvas.clear();
        canvas
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        let mut px = [0u8; 4];
        px.copy_from_slice(&self.pixels[i..i + BYTES_PER_PIXEL]);
        Some(px)
    }

    pub fn clear(&mut self) {
        for px in self.pixels.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.copy_from_slice(&[0, 0, 0, OPAQUE]);
        }
    }

    fn put_column(&mut self, x: u32, column: &[u8]) {
        let stride = self.width as usize * BYTES_PER_PIXEL;
        let offset = x as usize * BYTES_PER_PIXEL;
        for (y, px) in column.chunks_exact(BYTES_PER_PIXEL).enumerate() {
            let i = y * stride + offset;
            self.pixels[i..i + BYTES_PER_PIXEL].copy_from_slice(px);
        }
    }
}

/// Turns frequency snapshots into grayscale columns and stamps them across
/// pixel ranges of a [`PixelCanvas`].
#[derive(Debug, Clone)]
pub struct SpectrogramPainter {
    max_frequency_hz: Option<f64>,
    sample_rate: u32,
    bin_count: usize,
    height: usize,
    column: Vec<u8>,
}

impl SpectrogramPainter {
    pub fn new(bin_count: usize, sample_rate: u32, max_frequency_hz: Option<f64>) -> Self {
        let height = column_height(bin_count, sample_rate, max_frequency_hz);
        Self {
            max_frequency_hz,
            sample_rate,
            bin_count,
            height,
            column: vec![0; height * BYTES_PER_PIXEL],
        }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Recompute the column height. Returns true when it changed.
    pub fn reconfigure(
        &mut self,
        bin_count: usize,
        sample_rate: u32,
        max_frequency_hz: Option<f64>,
    ) -> bool {
        self.bin_count = bin_count;
        self.sample_rate = sample_rate;
        self.max_frequency_hz = max_frequency_hz;
        let height = column_height(bin_count, sample_rate, max_frequency_hz);
        let changed = height != self.height;
        self.height = height;
        self.column.resize(height * BYTES_PER_PIXEL, 0);
        changed
    }

    /// Paint `snapshot` into every column in `columns`, lowest bin at the bottom row.
    /// Pixels outside `columns` are left untouched.
    pub fn paint(&mut self, canvas: &mut PixelCanvas, snapshot: &[u8], columns: Range<u32>) {
        let height = self.height.min(canvas.height() as usize);
        for src in 0..height {
            let amplitude = snapshot.get(src).copied().unwrap_or(0);
            let dest = (height - src - 1) * BYTES_PER_PIXEL;
            self.column[dest..dest + BYTES_PER_PIXEL]
                .copy_from_slice(&[amplitude, amplitude, amplitude, OPAQUE]);
        }
        let column = &self.column[..height * BYTES_PER_PIXEL];
        for x in columns.start..columns.end.min(canvas.width()) {
            canvas.put_column(x, column);
        }
    }
}

/// The scrolling spectrogram of one rehearsal: canvas, painter and timeline.
#[derive(Debug, Clone)]
pub struct Spectrogram {
    canvas: PixelCanvas,
    painter: SpectrogramPainter,
    timeline: Timeline,
}

impl Spectrogram {
    pub fn new(
        timeline: Timeline,
        bin_count: usize,
        sample_rate: u32,
        max_frequency_hz: Option<f64>,
    ) -> Self {
        let painter = SpectrogramPainter::new(bin_count, sample_rate, max_frequency_hz);
        let canvas = PixelCanvas::new(timeline.canvas_width(), painter.height() as u32);
        Self {
            canvas,
            painter,
            timeline,
        }
    }

    /// Track a new analysis layout; the canvas is rebuilt when its height changes.
    pub fn reconfigure(
        &mut self,
        bin_count: usize,
        sample_rate: u32,
        max_frequency_hz: Option<f64>,
    ) {
        if self.painter.reconfigure(bin_count, sample_rate, max_frequency_hz) {
            let height = self.painter.height();
            log::debug!(
                "spectrogram height now {height} rows ({bin_count} bins @ {sample_rate} Hz)"
            );
            self.canvas = PixelCanvas::new(self.timeline.canvas_width(), height as u32);
        }
    }

    /// `(width, height)` the host should size its drawing surface to.
    pub fn canvas_size(&self) -> (u32, u32) {
        (self.canvas.width(), self.canvas.height())
    }

    pub fn canvas(&self) -> &PixelCanvas {
        &self.canvas
    }

    pub fn clear(&mut self) {
        self.canvas.clear();
    }

    /// Paint the snapshot across the interval between two elapsed times.
    pub fn paint_interval(
        &mut self,
        snapshot: &[u8],
        previous_elapsed_ms: f64,
        now_elapsed_ms: f64,
    ) -> Range<u32> {
        let columns = self.timeline.columns_between(previous_elapsed_ms, now_elapsed_ms);
        self.painter.paint(&mut self.canvas, snapshot, columns.clone());
        columns
    }

    /// Pixel column of each reference mark, given the playback start offset.
    pub fn reference_columns(&self, marks_ms: &[u32], playback_start_ms: u32) -> Vec<u32> {
        marks_ms
            .iter()
            .map(|&m| self.timeline.x_at(m as f64 - playback_start_ms as f64))
            .collect()
    }
}
