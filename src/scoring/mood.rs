use ndarray::ArrayView2;

use crate::config::{DimensionPolicy, ScoringPolicy};
use crate::error::{AnalysisError, Result};
use crate::model::{ModelSet, Regressor};

/// Headline score and bucket ratios of one mood dimension. Ratios are fractions.
#[derive(Clone, Debug, PartialEq)]
pub struct DimensionScore {
    pub mean: f64,
    pub max: f64,
    pub high_ratio: f64,
    pub low_ratio: f64,
    pub mid_ratio: f64,
}

impl DimensionScore {
    /// Mean as a percentage of the dimension's range.
    pub fn percent(&self) -> f64 {
        self.mean / self.max * 100.0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScoreResult {
    pub frames: usize,
    pub pace: DimensionScore,
    pub arousal: DimensionScore,
    pub valence: DimensionScore,
}

/// Shift by the dimension offset and clamp into `[0, max]`.
pub fn adjust(raw: &[f64], policy: &DimensionPolicy) -> Vec<f64> {
    raw.iter()
        .map(|v| (v + policy.offset).clamp(0.0, policy.max))
        .collect()
}

/// Aggregate already adjusted per-frame values. Values exactly on a threshold
/// land in the middle bucket, and the middle ratio is whatever the other two
/// leave so the three always sum to one.
pub fn summarize(values: &[f64], policy: &DimensionPolicy) -> Result<DimensionScore> {
    if values.is_empty() {
        return Err(AnalysisError::NotEnoughFrames { frames: 0, required: 1 });
    }
    let total = values.len() as f64;
    let mean = values.iter().sum::<f64>() / total;
    let high = values.iter().filter(|&&v| v > policy.high_above).count() as f64 / total;
    let low = values.iter().filter(|&&v| v < policy.low_below).count() as f64 / total;
    Ok(DimensionScore {
        mean,
        max: policy.max,
        high_ratio: high,
        low_ratio: low,
        mid_ratio: 1.0 - high - low,
    })
}

/// Runs the three mood regressors over a frame matrix.
pub struct MoodScorer<'a> {
    models: &'a ModelSet,
    policy: &'a ScoringPolicy,
}

impl<'a> MoodScorer<'a> {
    pub fn new(models: &'a ModelSet, policy: &'a ScoringPolicy) -> Self {
        Self { models, policy }
    }

    pub fn score(&self, features: ArrayView2<'_, f64>) -> Result<ScoreResult> {
        let frames = features.nrows();
        if frames == 0 {
            return Err(AnalysisError::NotEnoughFrames { frames, required: 1 });
        }

        let (pace, (arousal, valence)) = rayon::join(
            || run(self.models.pace.as_ref(), features, "pace regressor"),
            || {
                rayon::join(
                    || run(self.models.arousal.as_ref(), features, "arousal regressor"),
                    || run(self.models.valence.as_ref(), features, "valence regressor"),
                )
            },
        );

        let result = ScoreResult {
            frames,
            pace: summarize(&adjust(&pace?, &self.policy.pace), &self.policy.pace)?,
            arousal: summarize(&adjust(&arousal?, &self.policy.arousal), &self.policy.arousal)?,
            valence: summarize(&adjust(&valence?, &self.policy.valence), &self.policy.valence)?,
        };

        log::info!(
            "Mood over {} frames: pace={:.1}% arousal={:.1}% valence={:.1}%",
            frames,
            result.pace.percent(),
            result.arousal.percent(),
            result.valence.percent()
        );
        Ok(result)
    }
}

fn run(model: &dyn Regressor, features: ArrayView2<'_, f64>, what: &'static str) -> Result<Vec<f64>> {
    if model.input_dim() != features.ncols() {
        return Err(AnalysisError::shape(what, model.input_dim(), features.ncols()));
    }
    let out = model.predict(features)?;
    if out.len() != features.nrows() {
        return Err(AnalysisError::shape("regressor output", features.nrows(), out.len()));
    }
    if let Some(row) = out.iter().position(|v| !v.is_finite()) {
        return Err(AnalysisError::NonFiniteOutput { what, row });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Classifier;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array2, ArrayView1};

    /// Returns the first column of each row.
    struct FirstColumn(usize);

    impl Regressor for FirstColumn {
        fn input_dim(&self) -> usize {
            self.0
        }
        fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Vec<f64>> {
            Ok(features.column(0).to_vec())
        }
    }

    struct Uniform;

    impl Classifier for Uniform {
        fn input_dim(&self) -> usize {
            135
        }
        fn predict_proba(&self, _: ArrayView1<'_, f64>) -> Result<Vec<f64>> {
            Ok(vec![1.0 / 13.0; 13])
        }
    }

    fn models(width: usize) -> ModelSet {
        ModelSet::new(
            "test",
            Box::new(FirstColumn(width)),
            Box::new(FirstColumn(width)),
            Box::new(FirstColumn(width)),
            Box::new(Uniform),
        )
    }

    #[test]
    fn clamps_after_offset() {
        let policy = ScoringPolicy::default();
        let pace = adjust(&[-5.0, -1.0, 0.0, 0.5, 1.0, 9.0], &policy.pace);
        assert_eq!(pace, vec![0.0, 0.0, 1.0, 1.5, 2.0, 2.0]);
        let valence = adjust(&[-2.0, 0.0, 2.0], &policy.valence);
        assert_eq!(valence, vec![0.0, 1.5, 3.0]);
        assert!(valence.iter().all(|v| (0.0..=3.0).contains(v)));
    }

    #[test]
    fn ratios_sum_to_one() {
        let policy = ScoringPolicy::default();
        for values in [
            vec![0.1, 0.7, 1.2, 1.9, 0.3, 1.33, 0.66],
            vec![2.0; 7],
            vec![0.0, 0.65, 0.0],
            (0..97).map(|i| i as f64 / 48.0).collect::<Vec<_>>(),
        ] {
            let score = summarize(&values, &policy.pace).unwrap();
            let sum = score.high_ratio + score.low_ratio + score.mid_ratio;
            assert!((sum - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn threshold_values_count_as_mid() {
        let policy = ScoringPolicy::default();
        let score = summarize(&[1.33, 0.66, 1.34, 0.65], &policy.pace).unwrap();
        assert_abs_diff_eq!(score.high_ratio, 0.25);
        assert_abs_diff_eq!(score.low_ratio, 0.25);
        assert_abs_diff_eq!(score.mid_ratio, 0.5);
    }

    #[test]
    fn scores_matrix_through_all_regressors() {
        let models = models(3);
        let policy = ScoringPolicy::default();
        let mut features = Array2::<f64>::zeros((4, 3));
        for (i, v) in [-2.0, 0.0, 0.5, 1.0].iter().enumerate() {
            features[[i, 0]] = *v;
        }

        let result = MoodScorer::new(&models, &policy).score(features.view()).unwrap();
        assert_eq!(result.frames, 4);
        // pace: [0, 1, 1.5, 2] -> mean 1.125
        assert_abs_diff_eq!(result.pace.mean, 1.125, epsilon = 1e-12);
        assert_abs_diff_eq!(result.pace.percent(), 56.25, epsilon = 1e-9);
        assert_abs_diff_eq!(result.pace.high_ratio, 0.5);
        assert_abs_diff_eq!(result.pace.low_ratio, 0.25);
        // arousal: [0, 1.5, 2.0, 2.5] -> mean 1.5
        assert_abs_diff_eq!(result.arousal.mean, 1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(result.arousal.high_ratio, 0.25);
        assert_abs_diff_eq!(result.arousal.low_ratio, 0.25);
        assert_abs_diff_eq!(result.arousal.mid_ratio, 0.5);
    }

    #[test]
    fn wrong_width_is_shape_mismatch() {
        let models = models(5);
        let policy = ScoringPolicy::default();
        let features = Array2::<f64>::zeros((2, 3));
        assert!(matches!(
            MoodScorer::new(&models, &policy).score(features.view()),
            Err(AnalysisError::ShapeMismatch { expected: 5, actual: 3, .. })
        ));
    }

    /// Yields NaN on the second row.
    struct Broken;

    impl Regressor for Broken {
        fn input_dim(&self) -> usize {
            3
        }
        fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Vec<f64>> {
            Ok((0..features.nrows()).map(|i| if i == 1 { f64::NAN } else { 0.0 }).collect())
        }
    }

    #[test]
    fn nan_output_never_reaches_averaging() {
        let models = ModelSet::new(
            "test",
            Box::new(FirstColumn(3)),
            Box::new(Broken),
            Box::new(FirstColumn(3)),
            Box::new(Uniform),
        );
        let policy = ScoringPolicy::default();
        let features = Array2::<f64>::zeros((4, 3));
        let err = MoodScorer::new(&models, &policy).score(features.view()).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::NonFiniteOutput { what: "arousal regressor", row: 1 }
        ));
        assert!(!err.is_user_error());
        assert_eq!(err.public_message(), "Internal analysis error");
    }

    #[test]
    fn empty_matrix_is_refused() {
        let models = models(3);
        let policy = ScoringPolicy::default();
        let features = Array2::<f64>::zeros((0, 3));
        assert!(matches!(
            MoodScorer::new(&models, &policy).score(features.view()),
            Err(AnalysisError::NotEnoughFrames { frames: 0, .. })
        ));
    }
}
