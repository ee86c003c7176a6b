use ndarray::{Array1, Array2, ArrayView2, Axis};

use crate::error::{AnalysisError, Result};

/// Length of the global descriptor for `coef` kept coefficients.
pub fn descriptor_len(coef: usize) -> usize {
    coef + coef * (coef + 1) / 2
}

/// Sample covariance of the columns of `m` (rows are observations).
pub fn covariance(m: ArrayView2<f64>) -> Result<Array2<f64>> {
    let rows = m.nrows();
    if rows < 2 {
        return Err(AnalysisError::NotEnoughFrames {
            frames: rows,
            required: 2,
        });
    }
    let mean = m
        .mean_axis(Axis(0))
        .ok_or(AnalysisError::NotEnoughFrames { frames: rows, required: 2 })?;
    let centered = &m - &mean;
    Ok(centered.t().dot(&centered) / (rows - 1) as f64)
}

/// Entries on and above the main diagonal, row-major.
pub fn upper_triangle(m: &Array2<f64>) -> Vec<f64> {
    let n = m.nrows();
    let mut out = Vec::with_capacity(n * (n + 1) / 2);
    for i in 0..n {
        for j in i..m.ncols() {
            out.push(m[[i, j]]);
        }
    }
    out
}

/// `[column means, upper-triangular covariance]` of an MFCC matrix: one
/// fixed-length vector summarising a whole segment.
pub fn global_descriptor(mfcc: ArrayView2<f64>) -> Result<Array1<f64>> {
    let cov = covariance(mfcc)?;
    let mean = mfcc
        .mean_axis(Axis(0))
        .ok_or(AnalysisError::NotEnoughFrames { frames: 0, required: 2 })?;

    let mut out = mean.to_vec();
    out.extend(upper_triangle(&cov));

    let expected = descriptor_len(mfcc.ncols());
    if out.len() != expected {
        return Err(AnalysisError::shape("genre descriptor", expected, out.len()));
    }
    Ok(Array1::from_vec(out))
}
