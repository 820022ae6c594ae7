use realfft::{FftError, RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex;
use std::sync::Arc;

/// Forward real FFT with buffers planned once and reused across frames.
pub struct FftProcessor {
    fft: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex<f32>>,
    spectrum: Vec<Complex<f32>>,
}

impl FftProcessor {
    pub fn new(len: usize) -> Self {
        let mut planner = RealFftPlanner::new();
        let fft = planner.plan_fft_forward(len);
        let spectrum = fft.make_output_vec();
        let scratch = fft.make_scratch_vec();
        Self {
            fft,
            scratch,
            spectrum,
        }
    }

    /// Transform `windowed` in place (it is used as scratch) and return the
    /// `len / 2 + 1` complex bins.
    pub fn process_forward(&mut self, windowed: &mut [f32]) -> Result<&[Complex<f32>], FftError> {
        self.fft
            .process_with_scratch(windowed, &mut self.spectrum, &mut self.scratch)?;
        Ok(&self.spectrum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pure_tone_peaks_at_its_bin() {
        let n = 256;
        let mut fft = FftProcessor::new(n);
        let mut frame: Vec<f32> = (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * 8.0 * i as f32 / n as f32).sin())
            .collect();
        let spectrum = fft.process_forward(&mut frame).unwrap();
        assert_eq!(spectrum.len(), n / 2 + 1);
        let peak = spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.norm().total_cmp(&b.1.norm()))
            .map(|(i, _)| i);
        assert_eq!(peak, Some(8));
    }

    #[test]
    fn wrong_input_length_is_an_error() {
        let mut fft = FftProcessor::new(64);
        let mut frame = vec![0.0f32; 32];
        assert!(fft.process_forward(&mut frame).is_err());
    }
}
