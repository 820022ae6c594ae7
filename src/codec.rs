//! Turning bytes into planar [`DecodedAudio`]: raw capture chunks and
//! backing-track files.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::DecodeError;
use crate::types::{DecodedAudio, RawCapture, Sample};

const SAMPLE_BYTES: usize = std::mem::size_of::<f32>();

/// Decode interleaved little-endian f32 capture bytes.
pub fn decode_capture(capture: &RawCapture) -> Result<DecodedAudio, DecodeError> {
    let frame_bytes = capture.format.bytes_per_frame();
    if frame_bytes == 0 {
        return Err(DecodeError::NoChannels);
    }
    if capture.bytes.len() % frame_bytes != 0 {
        return Err(DecodeError::Misaligned {
            len: capture.bytes.len(),
            frame: frame_bytes,
        });
    }
    let samples: Vec<Sample> = capture
        .bytes
        .chunks_exact(SAMPLE_BYTES)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    DecodedAudio::from_interleaved(
        &samples,
        capture.format.channels as usize,
        capture.format.sample_rate,
    )
}

/// Decode a whole audio file (mp3, aac/m4a, wav, ...) with symphonia.
pub fn decode_file<P: AsRef<Path>>(path: P) -> Result<DecodedAudio, DecodeError> {
    let path = path.as_ref();
    let src = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(src), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;
    let track = format.default_track().ok_or(DecodeError::NoTrack)?;
    let track_id = track.id;
    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut interleaved: Vec<f32> = Vec::new();
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count())
        .unwrap_or(2);

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(Error::IoError(_)) => break,
            Err(Error::ResetRequired) => continue,
            Err(err) => return Err(err.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }
        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = spec.rate;
                channels = spec.channels.count();
                let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buf.copy_interleaved_ref(decoded);
                interleaved.extend_from_slice(buf.samples());
            }
            Err(Error::IoError(_)) => break,
            Err(Error::DecodeError(e)) => {
                log::debug!("skipping undecodable packet: {e}");
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }

    log::debug!(
        "decoded {}: {} samples, {} Hz, {} ch",
        path.display(),
        interleaved.len(),
        sample_rate,
        channels
    );
    DecodedAudio::from_interleaved(&interleaved, channels, sample_rate)
}
