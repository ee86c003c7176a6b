use serde::{Deserialize, Serialize};

use crate::audio::preview::WaveformPreview;
use crate::audio::WaveformSamples;
use crate::config::Config;
use crate::error::{AnalysisError, Result};
use crate::features::descriptor::global_descriptor;
use crate::features::framer::{select_window, Framer};
use crate::features::frame_matrix;
use crate::features::mfcc::{MfccExtractor, SubFrames};
use crate::model::ModelSet;
use crate::scoring::genre::{classify, GenreResult};
use crate::scoring::mood::{MoodScorer, ScoreResult};

pub const UNKNOWN_FILENAME: &str = "Unknown File Name";

/// Flat result record. Scores and ratios are percentages.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub filename: String,
    pub pace_score: f64,
    pub arousal_score: f64,
    pub valence_score: f64,
    pub pace_fast_ratio: f64,
    pub pace_slow_ratio: f64,
    pub pace_mid_ratio: f64,
    pub arousal_intense_ratio: f64,
    pub arousal_relaxing_ratio: f64,
    pub arousal_mid_ratio: f64,
    pub valence_happy_ratio: f64,
    pub valence_sad_ratio: f64,
    pub valence_neutral_ratio: f64,
    pub best_cand: String,
    pub sec_best_cand: String,
}

impl AnalysisRecord {
    pub fn new(filename: &str, scores: &ScoreResult, genre: &GenreResult) -> Self {
        Self {
            filename: filename.to_string(),
            pace_score: scores.pace.percent(),
            arousal_score: scores.arousal.percent(),
            valence_score: scores.valence.percent(),
            pace_fast_ratio: scores.pace.high_ratio * 100.0,
            pace_slow_ratio: scores.pace.low_ratio * 100.0,
            pace_mid_ratio: scores.pace.mid_ratio * 100.0,
            arousal_intense_ratio: scores.arousal.high_ratio * 100.0,
            arousal_relaxing_ratio: scores.arousal.low_ratio * 100.0,
            arousal_mid_ratio: scores.arousal.mid_ratio * 100.0,
            valence_happy_ratio: scores.valence.high_ratio * 100.0,
            valence_sad_ratio: scores.valence.low_ratio * 100.0,
            valence_neutral_ratio: scores.valence.mid_ratio * 100.0,
            best_cand: genre.best().label.to_string(),
            sec_best_cand: genre.second_best().label.to_string(),
        }
    }

    fn numbers(&self) -> [f64; 12] {
        [
            self.pace_score,
            self.arousal_score,
            self.valence_score,
            self.pace_fast_ratio,
            self.pace_slow_ratio,
            self.pace_mid_ratio,
            self.arousal_intense_ratio,
            self.arousal_relaxing_ratio,
            self.arousal_mid_ratio,
            self.valence_happy_ratio,
            self.valence_sad_ratio,
            self.valence_neutral_ratio,
        ]
    }

    /// JSON text of the record. serde_json writes non-finite floats as
    /// `null`, so those are refused here.
    pub fn to_json(&self, pretty: bool) -> Result<String> {
        if self.numbers().iter().any(|v| !v.is_finite()) {
            return Err(AnalysisError::Serialize(format!(
                "non-finite score in record for {}",
                self.filename
            )));
        }
        let json = if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        };
        json.map_err(|e| AnalysisError::Serialize(e.to_string()))
    }
}

/// Everything one analysis run produces.
#[derive(Clone, Debug)]
pub struct Analysis {
    pub record: AnalysisRecord,
    pub scores: ScoreResult,
    pub genre: GenreResult,
    pub preview: WaveformPreview,
}

/// The pair of waveforms an analysis works on, both mono, resampled
/// independently from the same decoded source.
#[derive(Clone, Debug)]
pub struct Upload {
    pub filename: Option<String>,
    pub mood: WaveformSamples,
    pub genre: WaveformSamples,
}

/// Extraction and scoring for one configuration and model set. Holds only
/// read-only tables, so it can serve any number of sessions.
pub struct Analyzer<'a> {
    config: &'a Config,
    models: &'a ModelSet,
    mood_framer: Framer,
    mood_extractor: MfccExtractor,
    genre_extractor: MfccExtractor,
}

impl<'a> Analyzer<'a> {
    pub fn new(config: &'a Config, models: &'a ModelSet) -> Result<Self> {
        config.validate()?;
        let mood = &config.mood;
        Ok(Self {
            config,
            models,
            mood_framer: Framer::from_ms(mood.frame_length_ms, mood.frame_step_ms, mood.sample_rate)?,
            mood_extractor: MfccExtractor::new(&mood.mfcc, mood.sample_rate)?,
            genre_extractor: MfccExtractor::new(&config.genre.mfcc, config.genre.sample_rate)?,
        })
    }

    /// Run both pipelines. Nothing is returned unless every stage succeeds.
    pub fn analyze(&self, upload: &Upload) -> Result<Analysis> {
        let filename = upload.filename.as_deref().unwrap_or(UNKNOWN_FILENAME);
        log::info!("Analyzing {}", filename);

        let scores = self.score_mood(&upload.mood)?;
        let genre = self.classify_genre(&upload.genre)?;
        let preview = WaveformPreview::from_waveform(filename, &upload.genre, self.config.preview.points);

        Ok(Analysis {
            record: AnalysisRecord::new(filename, &scores, &genre),
            scores,
            genre,
            preview,
        })
    }

    pub fn score_mood(&self, waveform: &WaveformSamples) -> Result<ScoreResult> {
        expect_rate(waveform, self.mood_extractor.sample_rate())?;
        let window = select_window(waveform, &self.config.selection)?;
        let features = frame_matrix(
            window.samples,
            &self.mood_framer,
            &self.mood_extractor,
            self.config.mood.sub_frames_per_frame(),
        )?;
        log::info!(
            "Mood segment: {:.1}s from sample {}, {} frames of {} samples",
            window.duration_secs(),
            window.offset,
            features.nrows(),
            self.mood_framer.length
        );
        MoodScorer::new(self.models, &self.config.scoring).score(features.view())
    }

    pub fn classify_genre(&self, waveform: &WaveformSamples) -> Result<GenreResult> {
        expect_rate(waveform, self.genre_extractor.sample_rate())?;
        let window = select_window(waveform, &self.config.selection)?;
        let mfcc = self.genre_extractor.extract(window.samples, SubFrames::Natural);
        log::debug!(
            "Genre segment from sample {}: {} sub-frames x {} coefficients",
            window.offset,
            mfcc.nrows(),
            mfcc.ncols()
        );
        let descriptor = global_descriptor(mfcc.view())?;
        classify(self.models.genre.as_ref(), descriptor.view())
    }
}

fn expect_rate(waveform: &WaveformSamples, rate: u32) -> Result<()> {
    if waveform.sample_rate() != rate {
        return Err(AnalysisError::shape(
            "waveform sample rate",
            rate as usize,
            waveform.sample_rate() as usize,
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> AnalysisRecord {
        AnalysisRecord {
            filename: "track.mp3".into(),
            pace_score: 50.0,
            arousal_score: 40.0,
            valence_score: 60.0,
            pace_fast_ratio: 25.0,
            pace_slow_ratio: 25.0,
            pace_mid_ratio: 50.0,
            arousal_intense_ratio: 10.0,
            arousal_relaxing_ratio: 30.0,
            arousal_mid_ratio: 60.0,
            valence_happy_ratio: 20.0,
            valence_sad_ratio: 20.0,
            valence_neutral_ratio: 60.0,
            best_cand: "Jazz".into(),
            sec_best_cand: "Blues".into(),
        }
    }

    #[test]
    fn record_serialises_with_flat_fields() {
        let json = record().to_json(false).unwrap();
        let back: AnalysisRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record());
        assert!(json.contains("\"sec_best_cand\":\"Blues\""));
        assert!(record().to_json(true).unwrap().contains('\n'));
    }

    #[test]
    fn non_finite_record_is_not_written_as_null() {
        let mut bad = record();
        bad.valence_score = f64::NAN;
        let err = bad.to_json(false).unwrap_err();
        assert!(matches!(err, AnalysisError::Serialize(_)));
        assert!(!err.is_user_error());

        let mut bad = record();
        bad.pace_mid_ratio = f64::INFINITY;
        assert!(bad.to_json(true).is_err());
    }
}
