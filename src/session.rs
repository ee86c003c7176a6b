use std::path::Path;

use crate::audio::decode::{decode_bytes, decode_file, AudioFormat};
use crate::audio::preview::WaveformPreview;
use crate::audio::resample::resample;
use crate::audio::RawAudio;
use crate::config::Config;
use crate::error::{AnalysisError, Result};
use crate::pipeline::{AnalysisRecord, Analyzer, Upload};

impl Upload {
    /// Resample the decoded source twice, once per pipeline rate.
    pub fn from_raw(filename: Option<String>, raw: &RawAudio, config: &Config) -> Result<Self> {
        Ok(Self {
            filename,
            mood: resample(raw, config.mood.sample_rate, 1)?,
            genre: resample(raw, config.genre.sample_rate, 1)?,
        })
    }
}

/// Per-caller state between an upload and its analysis: the two waveforms,
/// the filename and the last preview. Each caller owns its own session, so
/// concurrent callers never see each other's data.
#[derive(Debug, Default)]
pub struct Session {
    upload: Option<Upload>,
    preview: Option<WaveformPreview>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upload_file(&mut self, path: &Path, config: &Config) -> Result<()> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .unwrap_or_default();
        AudioFormat::from_filename(&filename)?;
        let raw = decode_file(path).map_err(|e| AnalysisError::Decode(format!("{:#}", e)))?;
        self.set_upload(Upload::from_raw(Some(filename), &raw, config)?);
        Ok(())
    }

    pub fn upload_bytes(&mut self, filename: &str, bytes: Vec<u8>, config: &Config) -> Result<()> {
        let format = AudioFormat::from_filename(filename)?;
        let raw = decode_bytes(bytes, format).map_err(|e| AnalysisError::Decode(format!("{:#}", e)))?;
        self.set_upload(Upload::from_raw(Some(filename.to_string()), &raw, config)?);
        Ok(())
    }

    /// Replace the held upload. A failed upload never reaches this point,
    /// so the previous one stays usable.
    pub fn set_upload(&mut self, upload: Upload) {
        log::info!(
            "Session holds {} ({:.1}s)",
            upload.filename.as_deref().unwrap_or("unnamed upload"),
            upload.genre.duration_secs()
        );
        self.upload = Some(upload);
    }

    pub fn upload(&self) -> Option<&Upload> {
        self.upload.as_ref()
    }

    /// Analyse the held upload. The cached preview is only replaced when the
    /// whole run succeeds.
    pub fn analyze(&mut self, analyzer: &Analyzer<'_>) -> Result<AnalysisRecord> {
        let upload = self.upload.as_ref().ok_or(AnalysisError::NoUpload)?;
        let analysis = analyzer.analyze(upload)?;
        self.preview = Some(analysis.preview);
        Ok(analysis.record)
    }

    pub fn preview(&self) -> Option<&WaveformPreview> {
        self.preview.as_ref()
    }
}
