//! Writing extracted clips to disk.

use std::fs::{self, File};
use std::io::{BufWriter, Cursor, Seek, Write};
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::config::OutputFormat;
use crate::error::ExportError;
use crate::types::DecodedAudio;

fn wav_spec(audio: &DecodedAudio, format: OutputFormat) -> WavSpec {
    let (bits_per_sample, sample_format) = match format {
        OutputFormat::Wav => (16, SampleFormat::Int),
        OutputFormat::Passthrough => (32, SampleFormat::Float),
    };
    WavSpec {
        channels: audio.channel_count() as u16,
        sample_rate: audio.sample_rate(),
        bits_per_sample,
        sample_format,
    }
}

fn write_samples<W: Write + Seek>(
    writer: &mut WavWriter<W>,
    audio: &DecodedAudio,
    format: OutputFormat,
) -> Result<(), hound::Error> {
    for s in audio.to_interleaved() {
        match format {
            OutputFormat::Wav => {
                let s_i16 = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                writer.write_sample(s_i16)?;
            }
            OutputFormat::Passthrough => writer.write_sample(s)?,
        }
    }
    Ok(())
}

/// Encode `audio` as an in-memory WAV file.
pub fn encode_clip(audio: &DecodedAudio, format: OutputFormat) -> Result<Vec<u8>, ExportError> {
    let mut bytes = Vec::new();
    let mut writer = WavWriter::new(Cursor::new(&mut bytes), wav_spec(audio, format))?;
    write_samples(&mut writer, audio, format)?;
    writer.finalize()?;
    Ok(bytes)
}

/// Keep names filesystem-safe: path separators and control characters become `_`.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => String::new(),
        _ => cleaned,
    }
}

/// File name for take `take_index`: the configured recording name when there
/// is one, else `take_<n>` counting from 1.
pub fn suggested_file_name(
    recording_names: &[String],
    take_index: usize,
    format: OutputFormat,
) -> String {
    let stem = recording_names
        .get(take_index)
        .map(|name| sanitize(name))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| format!("take_{}", take_index + 1));
    format!("{stem}.{}", format.extension())
}

/// Write `audio` into `dir` under `file_name`, creating `dir` as needed.
pub fn write_clip(
    dir: &Path,
    file_name: &str,
    audio: &DecodedAudio,
    format: OutputFormat,
) -> Result<PathBuf, ExportError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(file_name);
    let file = BufWriter::new(File::create(&path)?);
    let mut writer = WavWriter::new(file, wav_spec(audio, format))?;
    write_samples(&mut writer, audio, format)?;
    writer.finalize()?;
    log::info!(
        "wrote {} ({} frames, {:?})",
        path.display(),
        audio.length_in_frames(),
        format
    );
    Ok(path)
}
