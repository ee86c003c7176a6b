//! Mood and genre analysis of music files.
//!
//! Decoded audio is resampled twice, cut into frames, turned into MFCCs and
//! handed to pre-trained predictors: three mood regressors (pace, arousal,
//! valence) and one genre classifier.

pub mod audio;
pub mod config;
pub mod error;
pub mod features;
pub mod model;
pub mod pipeline;
pub mod scoring;
pub mod session;

pub use error::{AnalysisError, Result};
pub use pipeline::{Analysis, AnalysisRecord, Analyzer, Upload};
pub use session::Session;
