use anyhow::{Context, Result};
use std::io::Cursor;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::RawAudio;
use crate::error::AnalysisError;

/// Containers accepted for upload. Anything else is refused before decoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Mp3,
    Ogg,
    Flac,
    Wma,
    Aac,
}

impl AudioFormat {
    pub const ALL: [AudioFormat; 6] = [
        AudioFormat::Wav,
        AudioFormat::Mp3,
        AudioFormat::Ogg,
        AudioFormat::Flac,
        AudioFormat::Wma,
        AudioFormat::Aac,
    ];

    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Ogg => "ogg",
            AudioFormat::Flac => "flac",
            AudioFormat::Wma => "wma",
            AudioFormat::Aac => "aac",
        }
    }

    /// Resolve the format from the last dot-separated part of a filename.
    pub fn from_filename(filename: &str) -> Result<Self, AnalysisError> {
        if filename.is_empty() {
            return Err(AnalysisError::UnsupportedFormat("no file has been selected".into()));
        }
        let ext = filename.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.extension() == ext)
            .ok_or(AnalysisError::UnsupportedFormat(ext))
    }
}

pub fn decode_file(path: &Path) -> Result<RawAudio> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?;
    let ext = path.extension().and_then(|e| e.to_str());
    decode_source(Box::new(file), ext)
}

pub fn decode_bytes(bytes: Vec<u8>, format: AudioFormat) -> Result<RawAudio> {
    decode_source(Box::new(Cursor::new(bytes)), Some(format.extension()))
}

fn decode_source(source: Box<dyn MediaSource>, extension: Option<&str>) -> Result<RawAudio> {
    let mss = MediaSourceStream::new(source, Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .context("Failed to probe audio format")?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .context("No audio tracks found")?;

    let track_id = track.id;
    let mut channels = track.codec_params.channels.map_or(0, |c| c.count());
    let sample_rate = track.codec_params.sample_rate.context("Unknown sample rate")?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create audio decoder")?;

    let mut all_samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        // Some containers only report the layout once the first packet is decoded.
        if channels == 0 {
            channels = spec.channels.count();
        }
        let num_frames = decoded.frames();

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        all_samples.extend_from_slice(sample_buf.samples());
    }

    let channels = channels.max(1);
    log::info!(
        "Decoded audio: {} frames, {} channel(s), {}Hz, {:.1}s",
        all_samples.len() / channels,
        channels,
        sample_rate,
        (all_samples.len() / channels) as f32 / sample_rate as f32
    );

    Ok(RawAudio {
        samples: all_samples,
        sample_rate,
        channels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_known_extensions_case_insensitively() {
        assert_eq!(AudioFormat::from_filename("song.mp3").unwrap(), AudioFormat::Mp3);
        assert_eq!(AudioFormat::from_filename("My.Song.FLAC").unwrap(), AudioFormat::Flac);
        assert_eq!(AudioFormat::from_filename("a.wma").unwrap(), AudioFormat::Wma);
    }

    #[test]
    fn refuses_unknown_or_missing_extension() {
        assert!(matches!(
            AudioFormat::from_filename("notes.txt"),
            Err(AnalysisError::UnsupportedFormat(ext)) if ext == "txt"
        ));
        assert!(AudioFormat::from_filename("").is_err());
        assert!(AudioFormat::from_filename("noextension").is_err());
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let bytes = vec![0x42u8; 512];
        assert!(decode_bytes(bytes, AudioFormat::Wav).is_err());
    }
}
