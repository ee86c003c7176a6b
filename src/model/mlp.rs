use anyhow::{bail, Context, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::Deserialize;
use std::path::Path;

use super::{Classifier, Regressor};
use crate::error::AnalysisError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Identity,
    Logistic,
    Tanh,
    #[default]
    Relu,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputActivation {
    #[default]
    Identity,
    Logistic,
    Softmax,
}

#[derive(Debug, Deserialize)]
struct MlpFile {
    version: String,
    #[serde(default)]
    activation: Activation,
    #[serde(default)]
    output_activation: OutputActivation,
    layers: Vec<LayerFile>,
}

/// `weights` is `inputs x outputs`, one inner vector per input unit.
#[derive(Debug, Deserialize)]
struct LayerFile {
    weights: Vec<Vec<f64>>,
    biases: Vec<f64>,
}

struct Dense {
    weights: Array2<f64>,
    biases: Array1<f64>,
}

/// Feed-forward perceptron read from a JSON artifact.
pub struct Mlp {
    version: String,
    hidden: Activation,
    output: OutputActivation,
    layers: Vec<Dense>,
}

impl Mlp {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model file: {}", path.display()))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let file: MlpFile = serde_json::from_str(content).context("Malformed model artifact")?;
        if file.layers.is_empty() {
            bail!("Model has no layers");
        }

        let mut layers = Vec::with_capacity(file.layers.len());
        let mut prev_width: Option<usize> = None;
        for (idx, layer) in file.layers.into_iter().enumerate() {
            let inputs = layer.weights.len();
            let outputs = layer.biases.len();
            if inputs == 0 || outputs == 0 {
                bail!("Layer {} is empty", idx);
            }
            if let Some(prev) = prev_width {
                if prev != inputs {
                    bail!("Layer {} expects {} inputs but previous layer emits {}", idx, inputs, prev);
                }
            }
            if let Some(row) = layer.weights.iter().position(|r| r.len() != outputs) {
                bail!("Layer {} weight row {} does not have {} columns", idx, row, outputs);
            }
            let flat: Vec<f64> = layer.weights.into_iter().flatten().collect();
            let weights = Array2::from_shape_vec((inputs, outputs), flat)
                .with_context(|| format!("Layer {} weights have an invalid shape", idx))?;
            layers.push(Dense {
                weights,
                biases: Array1::from_vec(layer.biases),
            });
            prev_width = Some(outputs);
        }

        Ok(Self {
            version: file.version,
            hidden: file.activation,
            output: file.output_activation,
            layers,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn input_width(&self) -> usize {
        self.layers.first().map_or(0, |l| l.weights.nrows())
    }

    pub fn output_width(&self) -> usize {
        self.layers.last().map_or(0, |l| l.weights.ncols())
    }

    /// Forward pass over a batch, one row per sample.
    pub fn forward(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>, AnalysisError> {
        if x.ncols() != self.input_width() {
            return Err(AnalysisError::shape("model input", self.input_width(), x.ncols()));
        }
        let last = self.layers.len() - 1;
        let mut current = x.to_owned();
        for (idx, layer) in self.layers.iter().enumerate() {
            let mut z = current.dot(&layer.weights) + &layer.biases;
            if idx == last {
                apply_output(&mut z, self.output);
            } else {
                z.mapv_inplace(|v| activate(v, self.hidden));
            }
            current = z;
        }
        Ok(current)
    }
}

fn activate(v: f64, activation: Activation) -> f64 {
    match activation {
        Activation::Identity => v,
        Activation::Logistic => logistic(v),
        Activation::Tanh => v.tanh(),
        Activation::Relu => v.max(0.0),
    }
}

fn logistic(v: f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}

fn apply_output(z: &mut Array2<f64>, output: OutputActivation) {
    match output {
        OutputActivation::Identity => {}
        OutputActivation::Logistic => z.mapv_inplace(logistic),
        OutputActivation::Softmax => {
            for mut row in z.axis_iter_mut(Axis(0)) {
                let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                row.mapv_inplace(|v| (v - max).exp());
                let sum = row.sum();
                row.mapv_inplace(|v| v / sum);
            }
        }
    }
}

impl Regressor for Mlp {
    fn input_dim(&self) -> usize {
        self.input_width()
    }

    fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Vec<f64>, AnalysisError> {
        if self.output_width() != 1 {
            return Err(AnalysisError::shape("regressor output", 1, self.output_width()));
        }
        Ok(self.forward(features)?.column(0).to_vec())
    }
}

impl Classifier for Mlp {
    fn input_dim(&self) -> usize {
        self.input_width()
    }

    fn predict_proba(&self, features: ArrayView1<'_, f64>) -> Result<Vec<f64>, AnalysisError> {
        let batch = features.insert_axis(Axis(0));
        let out = self.forward(batch)?;
        let row = out.row(0);
        // Binary logistic heads report the positive class only.
        if self.output_width() == 1 && self.output == OutputActivation::Logistic {
            return Ok(vec![1.0 - row[0], row[0]]);
        }
        Ok(row.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    const TWO_LAYER: &str = r#"{
        "version": "v1",
        "activation": "relu",
        "layers": [
            { "weights": [[1.0, -1.0], [0.5, 2.0]], "biases": [0.0, 1.0] },
            { "weights": [[1.0], [1.0]], "biases": [-0.5] }
        ]
    }"#;

    #[test]
    fn regressor_forward_pass() {
        let mlp = Mlp::from_json(TWO_LAYER).unwrap();
        assert_eq!(mlp.input_width(), 2);
        assert_eq!(mlp.output_width(), 1);

        let x = array![[1.0, 2.0], [-4.0, 0.0]];
        let y = mlp.predict(x.view()).unwrap();
        // row 0: hidden = relu([2, 4]) -> 5.5 ; row 1: hidden = relu([-4, 5]) -> 4.5
        assert_abs_diff_eq!(y[0], 5.5, epsilon = 1e-12);
        assert_abs_diff_eq!(y[1], 4.5, epsilon = 1e-12);
    }

    #[test]
    fn softmax_probabilities_sum_to_one() {
        let json = r#"{
            "version": "v1",
            "output_activation": "softmax",
            "layers": [{ "weights": [[1.0, 2.0, 3.0]], "biases": [0.0, 0.0, 0.0] }]
        }"#;
        let mlp = Mlp::from_json(json).unwrap();
        let p = mlp.predict_proba(array![2.0].view()).unwrap();
        assert_eq!(p.len(), 3);
        assert_abs_diff_eq!(p.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert!(p[2] > p[1] && p[1] > p[0]);
    }

    #[test]
    fn binary_logistic_head_reports_both_classes() {
        let json = r#"{
            "version": "v1",
            "output_activation": "logistic",
            "layers": [{ "weights": [[1.0]], "biases": [0.0] }]
        }"#;
        let mlp = Mlp::from_json(json).unwrap();
        let p = mlp.predict_proba(array![0.0].view()).unwrap();
        assert_eq!(p, vec![0.5, 0.5]);
    }

    #[test]
    fn wrong_input_width_is_shape_mismatch() {
        let mlp = Mlp::from_json(TWO_LAYER).unwrap();
        let x = array![[1.0, 2.0, 3.0]];
        assert!(matches!(
            mlp.predict(x.view()),
            Err(AnalysisError::ShapeMismatch { expected: 2, actual: 3, .. })
        ));
    }

    #[test]
    fn rejects_unchained_layers() {
        let json = r#"{
            "version": "v1",
            "layers": [
                { "weights": [[1.0, 1.0]], "biases": [0.0, 0.0] },
                { "weights": [[1.0], [1.0], [1.0]], "biases": [0.0] }
            ]
        }"#;
        assert!(Mlp::from_json(json).is_err());
    }

    #[test]
    fn rejects_ragged_weights() {
        let json = r#"{
            "version": "v1",
            "layers": [{ "weights": [[1.0, 1.0], [1.0]], "biases": [0.0, 0.0] }]
        }"#;
        assert!(Mlp::from_json(json).is_err());
    }
}
