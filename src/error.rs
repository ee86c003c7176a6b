use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Everything that can stop an analysis run. The pipeline is all-or-nothing,
/// so any of these aborts the request before a result record exists.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("selected segment is {seconds:.2}s long, at least {minimum:.1}s is required")]
    InputTooShort { seconds: f64, minimum: f64 },

    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to decode audio: {0}")]
    Decode(String),

    #[error("segment produced {frames} analysis frames, at least {required} required")]
    NotEnoughFrames { frames: usize, required: usize },

    #[error("no audio has been uploaded for this session")]
    NoUpload,

    #[error("shape mismatch in {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("classifier produced genre code {0} which has no label")]
    UnmappedGenreCode(usize),

    #[error("invalid resample target: {0}")]
    InvalidTarget(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{what} produced a non-finite value at row {row}")]
    NonFiniteOutput { what: &'static str, row: usize },

    #[error("failed to serialise result: {0}")]
    Serialize(String),
}

impl AnalysisError {
    /// True when the caller can fix the problem by supplying different audio.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            AnalysisError::InputTooShort { .. }
                | AnalysisError::UnsupportedFormat(_)
                | AnalysisError::Decode(_)
                | AnalysisError::NotEnoughFrames { .. }
                | AnalysisError::NoUpload
        )
    }

    /// Message safe to hand back to a caller. Internal failures never leak detail.
    pub fn public_message(&self) -> String {
        match self {
            AnalysisError::InputTooShort { .. } | AnalysisError::NotEnoughFrames { .. } => {
                "The music you uploaded is too short. A length of at least 10 seconds is required"
                    .to_string()
            }
            AnalysisError::UnsupportedFormat(_) => "This file format is not supported".to_string(),
            AnalysisError::Decode(_) => "The uploaded file could not be decoded".to_string(),
            AnalysisError::NoUpload => "No music file has been uploaded".to_string(),
            _ => "Internal analysis error".to_string(),
        }
    }

    pub(crate) fn shape(what: &'static str, expected: usize, actual: usize) -> Self {
        AnalysisError::ShapeMismatch {
            what,
            expected,
            actual,
        }
    }

    /// Logs at `warn` for user errors and `error` for internal ones.
    pub fn log(&self, context: &str) {
        if self.is_user_error() {
            log::warn!("{}: {}", context, self);
        } else {
            log::error!("{}: {}", context, self);
        }
    }
}
