pub mod mlp;

use anyhow::{Context, Result};
use ndarray::{ArrayView1, ArrayView2};
use std::path::Path;

use crate::config::{Config, ModelConfig};
use crate::error::AnalysisError;
use mlp::Mlp;

/// Per-row scalar prediction over a feature matrix.
pub trait Regressor: Send + Sync {
    fn input_dim(&self) -> usize;
    fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Vec<f64>, AnalysisError>;
}

/// Class probabilities for one feature vector.
pub trait Classifier: Send + Sync {
    fn input_dim(&self) -> usize;
    fn predict_proba(&self, features: ArrayView1<'_, f64>) -> Result<Vec<f64>, AnalysisError>;
}

pub const PACE_MODEL: &str = "pace_regressor";
pub const AROUSAL_MODEL: &str = "arousal_regressor";
pub const VALENCE_MODEL: &str = "valence_regressor";
pub const GENRE_MODEL: &str = "genre_classifier";

/// The four pre-trained predictors, loaded once at startup and only read afterwards.
pub struct ModelSet {
    pub version: String,
    pub pace: Box<dyn Regressor>,
    pub arousal: Box<dyn Regressor>,
    pub valence: Box<dyn Regressor>,
    pub genre: Box<dyn Classifier>,
}

impl ModelSet {
    pub fn new(
        version: impl Into<String>,
        pace: Box<dyn Regressor>,
        arousal: Box<dyn Regressor>,
        valence: Box<dyn Regressor>,
        genre: Box<dyn Classifier>,
    ) -> Self {
        Self {
            version: version.into(),
            pace,
            arousal,
            valence,
            genre,
        }
    }

    /// Load `{name}_{version}.json` for each predictor from `config.dir`.
    pub fn load(config: &ModelConfig) -> Result<Self> {
        let load = |name: &str| -> Result<Mlp> {
            let path = artifact_path(&config.dir, name, &config.version);
            let model = Mlp::load(&path)
                .with_context(|| format!("Failed to load model '{}' from {}", name, path.display()))?;
            if model.version() != config.version {
                anyhow::bail!(
                    "Model {} declares version '{}' but '{}' was requested",
                    path.display(),
                    model.version(),
                    config.version
                );
            }
            log::info!(
                "Loaded {} ({} -> {}) from {}",
                name,
                model.input_width(),
                model.output_width(),
                path.display()
            );
            Ok(model)
        };

        Ok(Self::new(
            config.version.clone(),
            Box::new(load(PACE_MODEL)?),
            Box::new(load(AROUSAL_MODEL)?),
            Box::new(load(VALENCE_MODEL)?),
            Box::new(load(GENRE_MODEL)?),
        ))
    }

    /// Fail fast when the models were trained for a different feature layout.
    pub fn check_dims(&self, config: &Config) -> Result<(), AnalysisError> {
        let mood = config.mood.feature_width();
        for (what, model) in [
            ("pace regressor input", &self.pace),
            ("arousal regressor input", &self.arousal),
            ("valence regressor input", &self.valence),
        ] {
            if model.input_dim() != mood {
                return Err(AnalysisError::shape(what, mood, model.input_dim()));
            }
        }
        let genre = config.genre.feature_width();
        if self.genre.input_dim() != genre {
            return Err(AnalysisError::shape("genre classifier input", genre, self.genre.input_dim()));
        }
        Ok(())
    }
}

pub fn artifact_path(dir: &Path, name: &str, version: &str) -> std::path::PathBuf {
    dir.join(format!("{}_{}.json", name, version))
}
