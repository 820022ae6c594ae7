pub mod analyser;
pub mod fft;
pub mod spectrogram;
