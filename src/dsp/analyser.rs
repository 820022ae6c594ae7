use rtrb::{Consumer, Producer, RingBuffer};

use crate::dsp::fft::FftProcessor;
use crate::traits::SpectrumSource;
use crate::types::Sample;

pub const DEFAULT_FFT_SIZE: usize = 2048;
const SMOOTHING: f32 = 0.8;
const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;

/// Byte-magnitude spectrum of the most recent `fft_size` microphone samples.
///
/// Samples arrive from the input callback through an SPSC ring; each snapshot
/// drains the ring, windows the newest block, transforms it, smooths the
/// magnitudes over time and maps decibels onto `0..=255`.
pub struct SpectrumAnalyser {
    sample_rate: u32,
    fft_size: usize,
    incoming: Option<Consumer<Sample>>,
    history: Vec<f32>,
    write_pos: usize,
    window: Vec<f32>,
    frame: Vec<f32>,
    smoothed: Vec<f32>,
    fft: FftProcessor,
}

impl SpectrumAnalyser {
    /// Build an analyser plus the producer the audio thread feeds mono samples into.
    pub fn new(sample_rate: u32, fft_size: usize) -> (Self, Producer<Sample>) {
        let (prod, cons) = RingBuffer::new(fft_size * 8);
        let mut analyser = Self::detached(sample_rate, fft_size);
        analyser.incoming = Some(cons);
        (analyser, prod)
    }

    /// Analyser without a realtime feed; samples are supplied with [`Self::push_samples`].
    pub fn detached(sample_rate: u32, fft_size: usize) -> Self {
        let fft_size = fft_size.max(2);
        Self {
            sample_rate,
            fft_size,
            incoming: None,
            history: vec![0.0; fft_size],
            write_pos: 0,
            window: blackman_window(fft_size),
            frame: vec![0.0; fft_size],
            smoothed: vec![0.0; fft_size / 2],
            fft: FftProcessor::new(fft_size),
        }
    }

    pub fn push_samples(&mut self, samples: &[Sample]) {
        for &s in samples {
            self.history[self.write_pos] = s;
            self.write_pos = (self.write_pos + 1) % self.fft_size;
        }
    }

    fn drain_incoming(&mut self) {
        let Some(cons) = self.incoming.as_mut() else {
            return;
        };
        let available = cons.slots();
        if available == 0 {
            return;
        }
        let mut drained = Vec::with_capacity(available);
        while let Ok(s) = cons.pop() {
            drained.push(s);
        }
        self.push_samples(&drained);
    }

    fn analyse(&mut self) {
        // Oldest sample sits at write_pos.
        for i in 0..self.fft_size {
            let s = self.history[(self.write_pos + i) % self.fft_size];
            self.frame[i] = s * self.window[i];
        }
        let spectrum = match self.fft.process_forward(&mut self.frame) {
            Ok(spectrum) => spectrum,
            Err(e) => {
                log::warn!("spectrum transform failed: {e}");
                return;
            }
        };
        let scale = 1.0 / self.fft_size as f32;
        for (smoothed, bin) in self.smoothed.iter_mut().zip(spectrum.iter()) {
            let magnitude = bin.norm() * scale;
            *smoothed = SMOOTHING * *smoothed + (1.0 - SMOOTHING) * magnitude;
        }
    }
}

impl SpectrumSource for SpectrumAnalyser {
    fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn fill_frequency_snapshot(&mut self, buf: &mut [u8]) {
        self.drain_incoming();
        self.analyse();
        for (out, &mag) in buf.iter_mut().zip(self.smoothed.iter()) {
            *out = magnitude_to_byte(mag);
        }
    }
}

fn magnitude_to_byte(magnitude: f32) -> u8 {
    if magnitude <= 0.0 {
        return 0;
    }
    let db = 20.0 * magnitude.log10();
    let scaled = 255.0 * (db - MIN_DECIBELS) / (MAX_DECIBELS - MIN_DECIBELS);
    scaled.clamp(0.0, 255.0) as u8
}

fn blackman_window(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| {
            let x = 2.0 * std::f32::consts::PI * i as f32 / n as f32;
            0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos()
        })
        .collect()
}
