pub mod descriptor;
pub mod framer;
pub mod mfcc;

use ndarray::Array2;
use rayon::prelude::*;

use crate::error::{AnalysisError, Result};
use framer::Framer;
use mfcc::{MfccExtractor, SubFrames};

/// One flattened MFCC vector per frame, rows in frame order.
///
/// Every row is `sub_frames * coefficients` wide; frames are extracted in
/// parallel but collected in order so row `i` always belongs to frame `i`.
pub fn frame_matrix(
    samples: &[i16],
    framer: &Framer,
    extractor: &MfccExtractor,
    sub_frames: usize,
) -> Result<Array2<f64>> {
    let frames: Vec<&[i16]> = framer.frames(samples).collect();
    let width = sub_frames * extractor.coefficients();

    let rows: Vec<Vec<f64>> = frames
        .into_par_iter()
        .map(|frame| {
            extractor
                .extract(frame, SubFrames::Exactly(sub_frames))
                .iter()
                .copied()
                .collect()
        })
        .collect();

    let count = rows.len();
    let mut flat = Vec::with_capacity(count * width);
    for row in rows {
        if row.len() != width {
            return Err(AnalysisError::shape("mood feature row", width, row.len()));
        }
        flat.extend(row);
    }

    log::debug!("Frame matrix: {} frames x {} features", count, width);

    Array2::from_shape_vec((count, width), flat)
        .map_err(|_| AnalysisError::shape("mood feature matrix", count * width, count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MfccConfig;

    #[test]
    fn rows_follow_frame_order() {
        let config = MfccConfig {
            frame_length_ms: 10.0,
            frame_step_ms: 10.0,
            filters: 10,
            coefficients: 4,
            preemphasis: 0.97,
            lifter: 0,
        };
        let extractor = MfccExtractor::new(&config, 1000).unwrap();
        let framer = Framer::new(50, 25).unwrap();
        let samples: Vec<i16> = (0..300).map(|i| ((i * 37) % 200) as i16 * 50).collect();

        let matrix = frame_matrix(&samples, &framer, &extractor, 5).unwrap();
        assert_eq!(matrix.dim(), (framer.frame_count(samples.len()), 20));

        for (i, frame) in framer.frames(&samples).enumerate() {
            let single = extractor.extract(frame, SubFrames::Exactly(5));
            let flat: Vec<f64> = single.iter().copied().collect();
            assert_eq!(matrix.row(i).to_vec(), flat);
        }
    }

    #[test]
    fn no_frames_gives_empty_matrix() {
        let config = MfccConfig {
            frame_length_ms: 10.0,
            frame_step_ms: 10.0,
            filters: 10,
            coefficients: 4,
            preemphasis: 0.97,
            lifter: 22,
        };
        let extractor = MfccExtractor::new(&config, 1000).unwrap();
        let framer = Framer::new(500, 25).unwrap();
        let matrix = frame_matrix(&[0i16; 100], &framer, &extractor, 50).unwrap();
        assert_eq!(matrix.dim(), (0, 200));
    }
}
