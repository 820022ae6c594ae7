pub mod audio_io;
pub mod cli;
pub mod codec;
pub mod config;
pub mod driver;
pub mod dsp;
pub mod error;
pub mod export;
pub mod session;
pub mod timeline;
pub mod traits;
pub mod types;
