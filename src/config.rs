use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::AnalysisError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub mood: MoodConfig,
    #[serde(default)]
    pub genre: GenreConfig,
    #[serde(default)]
    pub scoring: ScoringPolicy,
    #[serde(default)]
    pub models: ModelConfig,
    #[serde(default)]
    pub preview: PreviewConfig,
}

/// Fractional bounds of the analysed sub-range, shared by both pipelines.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectionConfig {
    #[serde(default = "default_selection_start")]
    pub start: f64,
    #[serde(default = "default_selection_end")]
    pub end: f64,
    #[serde(default = "default_min_seconds")]
    pub min_seconds: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MoodConfig {
    #[serde(default = "default_mood_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_frame_length_ms")]
    pub frame_length_ms: f64,
    #[serde(default = "default_frame_step_ms")]
    pub frame_step_ms: f64,
    #[serde(default = "default_mood_mfcc")]
    pub mfcc: MfccConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenreConfig {
    #[serde(default = "default_genre_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_genre_mfcc")]
    pub mfcc: MfccConfig,
}

/// One configuration of the cepstral extractor.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MfccConfig {
    pub frame_length_ms: f64,
    pub frame_step_ms: f64,
    pub filters: usize,
    pub coefficients: usize,
    #[serde(default = "default_preemphasis")]
    pub preemphasis: f64,
    #[serde(default = "default_lifter")]
    pub lifter: usize,
}

/// Offset, clamp range and bucket thresholds for one mood dimension.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DimensionPolicy {
    pub offset: f64,
    pub max: f64,
    /// Strictly above this counts as the "high" bucket (fast, intense, happy).
    pub high_above: f64,
    /// Strictly below this counts as the "low" bucket (slow, relaxing, sad).
    pub low_below: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringPolicy {
    #[serde(default = "default_pace_policy")]
    pub pace: DimensionPolicy,
    #[serde(default = "default_arousal_policy")]
    pub arousal: DimensionPolicy,
    #[serde(default = "default_valence_policy")]
    pub valence: DimensionPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_models_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_model_version")]
    pub version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreviewConfig {
    #[serde(default = "default_preview_points")]
    pub points: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            start: default_selection_start(),
            end: default_selection_end(),
            min_seconds: default_min_seconds(),
        }
    }
}

impl Default for MoodConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_mood_rate(),
            frame_length_ms: default_frame_length_ms(),
            frame_step_ms: default_frame_step_ms(),
            mfcc: default_mood_mfcc(),
        }
    }
}

impl Default for GenreConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_genre_rate(),
            mfcc: default_genre_mfcc(),
        }
    }
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            pace: default_pace_policy(),
            arousal: default_arousal_policy(),
            valence: default_valence_policy(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            dir: default_models_dir(),
            version: default_model_version(),
        }
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            points: default_preview_points(),
        }
    }
}

fn default_selection_start() -> f64 { 0.25 }
fn default_selection_end() -> f64 { 0.75 }
fn default_min_seconds() -> f64 { 5.0 }
fn default_mood_rate() -> u32 { 11025 }
fn default_genre_rate() -> u32 { 22050 }
fn default_frame_length_ms() -> f64 { 5000.0 }
fn default_frame_step_ms() -> f64 { 500.0 }
fn default_preemphasis() -> f64 { 0.97 }
fn default_lifter() -> usize { 22 }
fn default_models_dir() -> PathBuf { PathBuf::from("nnet_models") }
fn default_model_version() -> String { "v1".into() }
fn default_preview_points() -> usize { 5000 }

fn default_mood_mfcc() -> MfccConfig {
    MfccConfig {
        frame_length_ms: 25.0,
        frame_step_ms: 25.0,
        filters: 26,
        coefficients: 12,
        preemphasis: default_preemphasis(),
        lifter: default_lifter(),
    }
}

fn default_genre_mfcc() -> MfccConfig {
    MfccConfig {
        frame_length_ms: 20.0,
        frame_step_ms: 20.0,
        filters: 20,
        coefficients: 15,
        preemphasis: default_preemphasis(),
        lifter: default_lifter(),
    }
}

fn default_pace_policy() -> DimensionPolicy {
    DimensionPolicy { offset: 1.0, max: 2.0, high_above: 1.33, low_below: 0.66 }
}

fn default_arousal_policy() -> DimensionPolicy {
    DimensionPolicy { offset: 1.5, max: 3.0, high_above: 2.0, low_below: 1.0 }
}

fn default_valence_policy() -> DimensionPolicy {
    DimensionPolicy { offset: 1.5, max: 3.0, high_above: 2.0, low_below: 1.0 }
}

impl MoodConfig {
    /// Sub-frames per mood frame; fixes the regressor input width.
    pub fn sub_frames_per_frame(&self) -> usize {
        (self.frame_length_ms / self.mfcc.frame_length_ms).floor() as usize
    }

    pub fn feature_width(&self) -> usize {
        self.sub_frames_per_frame() * self.mfcc.coefficients
    }
}

impl GenreConfig {
    /// Mean vector plus the upper triangle of the covariance matrix.
    pub fn feature_width(&self) -> usize {
        let coef = self.mfcc.coefficients;
        coef + coef * (coef + 1) / 2
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        let invalid = |msg: String| Err(AnalysisError::InvalidConfig(msg));

        let sel = &self.selection;
        if !(0.0..=1.0).contains(&sel.start) || !(0.0..=1.0).contains(&sel.end) || sel.start >= sel.end {
            return invalid(format!("selection bounds {}..{} are not an increasing range in [0, 1]", sel.start, sel.end));
        }
        if sel.min_seconds < 0.0 {
            return invalid(format!("min_seconds must not be negative, got {}", sel.min_seconds));
        }

        if self.mood.sample_rate == 0 || self.genre.sample_rate == 0 {
            return invalid("sample rates must be positive".into());
        }
        if self.mood.frame_length_ms <= 0.0 || self.mood.frame_step_ms <= 0.0 {
            return invalid("mood frame length and step must be positive".into());
        }
        if self.mood.sub_frames_per_frame() == 0 {
            return invalid("mood frame is shorter than one mfcc sub-frame".into());
        }

        validate_mfcc("mood", &self.mood.mfcc)?;
        validate_mfcc("genre", &self.genre.mfcc)?;

        for (name, dim) in [
            ("pace", &self.scoring.pace),
            ("arousal", &self.scoring.arousal),
            ("valence", &self.scoring.valence),
        ] {
            if dim.max <= 0.0 {
                return invalid(format!("{} max must be positive", name));
            }
            if dim.low_below > dim.high_above {
                return invalid(format!(
                    "{} thresholds overlap: low_below {} is above high_above {}",
                    name, dim.low_below, dim.high_above
                ));
            }
        }

        if self.preview.points == 0 {
            return invalid("preview points must be positive".into());
        }
        Ok(())
    }
}

fn validate_mfcc(name: &str, mfcc: &MfccConfig) -> Result<(), AnalysisError> {
    if mfcc.frame_length_ms <= 0.0 || mfcc.frame_step_ms <= 0.0 {
        return Err(AnalysisError::InvalidConfig(format!("{} mfcc frame length and step must be positive", name)));
    }
    if mfcc.filters == 0 || mfcc.coefficients == 0 || mfcc.coefficients > mfcc.filters {
        return Err(AnalysisError::InvalidConfig(format!(
            "{} mfcc keeps {} coefficients from {} filters",
            name, mfcc.coefficients, mfcc.filters
        )));
    }
    Ok(())
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Explicit path, then `moodprobe.toml` in the working directory, then the user config dirs.
pub fn discover_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("moodprobe.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("moodprobe").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("moodprobe").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}
