use ndarray::ArrayView1;

use crate::error::{AnalysisError, Result};
use crate::model::Classifier;

/// Classifier output code to label. Exhaustive: a code outside this table is
/// a configuration error.
pub const GENRES: [&str; 13] = [
    "Western Classical",
    "East Asia Classical",
    "Blues",
    "Country",
    "Disco",
    "Hiphop",
    "Jazz",
    "Metal",
    "Pop",
    "Rock",
    "Electronic",
    "New Age",
    "Soundtracks",
];

pub fn genre_label(code: usize) -> Result<&'static str> {
    GENRES.get(code).copied().ok_or(AnalysisError::UnmappedGenreCode(code))
}

#[derive(Clone, Debug, PartialEq)]
pub struct GenreCandidate {
    pub code: usize,
    pub label: &'static str,
    pub probability: f64,
}

/// Genres sorted by descending probability.
#[derive(Clone, Debug, PartialEq)]
pub struct GenreResult {
    pub ranking: Vec<GenreCandidate>,
}

impl GenreResult {
    /// Rank raw probabilities. Ties keep the lower code first.
    pub fn from_probabilities(probs: &[f64]) -> Result<Self> {
        if probs.len() > GENRES.len() {
            return Err(AnalysisError::UnmappedGenreCode(GENRES.len()));
        }
        if probs.len() != GENRES.len() {
            return Err(AnalysisError::shape("classifier output", GENRES.len(), probs.len()));
        }

        let mut order: Vec<usize> = (0..probs.len()).collect();
        order.sort_by(|&a, &b| probs[b].total_cmp(&probs[a]));

        let ranking = order
            .into_iter()
            .map(|code| {
                Ok(GenreCandidate {
                    code,
                    label: genre_label(code)?,
                    probability: probs[code],
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { ranking })
    }

    pub fn best(&self) -> &GenreCandidate {
        &self.ranking[0]
    }

    pub fn second_best(&self) -> &GenreCandidate {
        &self.ranking[1]
    }
}

/// Feed the global descriptor to the classifier and rank the result.
pub fn classify(classifier: &dyn Classifier, descriptor: ArrayView1<'_, f64>) -> Result<GenreResult> {
    if classifier.input_dim() != descriptor.len() {
        return Err(AnalysisError::shape(
            "genre classifier input",
            classifier.input_dim(),
            descriptor.len(),
        ));
    }
    let probs = classifier.predict_proba(descriptor)?;
    let result = GenreResult::from_probabilities(&probs)?;
    log::info!(
        "Genre: {} ({:.2}), runner-up {} ({:.2})",
        result.best().label,
        result.best().probability,
        result.second_best().label,
        result.second_best().probability
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;

    fn probs(top: &[(usize, f64)]) -> Vec<f64> {
        let rest = 1.0 - top.iter().map(|(_, p)| p).sum::<f64>();
        let others = GENRES.len() - top.len();
        let mut out = vec![rest / others as f64; GENRES.len()];
        for &(code, p) in top {
            out[code] = p;
        }
        out
    }

    #[test]
    fn picks_argmax_and_runner_up() {
        let p = vec![0.1, 0.05, 0.3, 0.02, 0.03, 0.2, 0.05, 0.05, 0.05, 0.05, 0.04, 0.03, 0.03];
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        let result = GenreResult::from_probabilities(&p).unwrap();
        assert_eq!(result.best().label, "Blues");
        assert_eq!(result.second_best().label, "Hiphop");
        assert_eq!(result.ranking.len(), 13);
    }

    #[test]
    fn ties_prefer_lower_code() {
        let p = probs(&[(9, 0.3), (4, 0.3)]);
        let result = GenreResult::from_probabilities(&p).unwrap();
        assert_eq!(result.best().code, 4);
        assert_eq!(result.second_best().code, 9);

        let uniform = vec![1.0 / 13.0; 13];
        let result = GenreResult::from_probabilities(&uniform).unwrap();
        assert_eq!(result.best().label, "Western Classical");
        assert_eq!(result.second_best().label, "East Asia Classical");
    }

    #[test]
    fn extra_codes_are_unmapped() {
        let p = vec![1.0 / 14.0; 14];
        assert!(matches!(
            GenreResult::from_probabilities(&p),
            Err(AnalysisError::UnmappedGenreCode(13))
        ));
        assert!(matches!(genre_label(42), Err(AnalysisError::UnmappedGenreCode(42))));
    }

    #[test]
    fn short_output_is_shape_mismatch() {
        assert!(matches!(
            GenreResult::from_probabilities(&[0.5, 0.5]),
            Err(AnalysisError::ShapeMismatch { expected: 13, actual: 2, .. })
        ));
    }

    struct Fixed(Vec<f64>);

    impl Classifier for Fixed {
        fn input_dim(&self) -> usize {
            4
        }
        fn predict_proba(&self, _: ArrayView1<'_, f64>) -> Result<Vec<f64>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn classify_checks_descriptor_width() {
        let classifier = Fixed(probs(&[(12, 0.9)]));
        let ok = classify(&classifier, Array1::zeros(4).view()).unwrap();
        assert_eq!(ok.best().label, "Soundtracks");

        assert!(matches!(
            classify(&classifier, Array1::zeros(5).view()),
            Err(AnalysisError::ShapeMismatch { expected: 4, actual: 5, .. })
        ));
    }
}
