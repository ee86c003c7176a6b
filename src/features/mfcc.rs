use ndarray::Array2;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f64::consts::PI;
use std::sync::Arc;

use super::framer::ms_to_samples;
use crate::config::MfccConfig;
use crate::error::{AnalysisError, Result};

const LOG_FLOOR: f64 = f64::EPSILON;

/// How many sub-frames to cut from the input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubFrames {
    /// `1 + ceil((len - sub_len) / sub_step)`, the last one zero padded.
    Natural,
    /// Exactly this many, zero padded past the end. Keeps the output width fixed.
    Exactly(usize),
}

/// One configuration of the MFCC algorithm. The tables are built once and
/// only read afterwards, so a single extractor can be shared across threads.
pub struct MfccExtractor {
    config: MfccConfig,
    sample_rate: u32,
    sub_len: usize,
    sub_step: usize,
    nfft: usize,
    window: Vec<f64>,
    filterbank: Vec<Vec<f64>>,
    dct: Vec<Vec<f64>>,
    lifter: Vec<f64>,
    fft: Arc<dyn Fft<f64>>,
}

impl MfccExtractor {
    pub fn new(config: &MfccConfig, sample_rate: u32) -> Result<Self> {
        let sub_len = ms_to_samples(config.frame_length_ms, sample_rate);
        let sub_step = ms_to_samples(config.frame_step_ms, sample_rate);
        if sub_len == 0 || sub_step == 0 {
            return Err(AnalysisError::InvalidConfig(format!(
                "mfcc sub-frame of {}ms / {}ms is empty at {} Hz",
                config.frame_length_ms, config.frame_step_ms, sample_rate
            )));
        }
        if config.filters == 0 || config.coefficients == 0 || config.coefficients > config.filters {
            return Err(AnalysisError::InvalidConfig(format!(
                "cannot keep {} coefficients from {} mel filters",
                config.coefficients, config.filters
            )));
        }

        let nfft = sub_len.next_power_of_two();
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(nfft);

        Ok(Self {
            sample_rate,
            sub_len,
            sub_step,
            nfft,
            window: hamming_window(sub_len),
            filterbank: mel_filterbank(config.filters, nfft, sample_rate),
            dct: dct_matrix(config.coefficients, config.filters),
            lifter: lifter(config.coefficients, config.lifter),
            fft,
            config: config.clone(),
        })
    }

    pub fn coefficients(&self) -> usize {
        self.config.coefficients
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn sub_frame_count(&self, len: usize, sub_frames: SubFrames) -> usize {
        match sub_frames {
            SubFrames::Exactly(n) => n,
            SubFrames::Natural if len <= self.sub_len => 1,
            SubFrames::Natural => 1 + (len - self.sub_len).div_ceil(self.sub_step),
        }
    }

    /// Cepstral coefficients of `samples`, one row per sub-frame.
    pub fn extract(&self, samples: &[i16], sub_frames: SubFrames) -> Array2<f64> {
        let rows = self.sub_frame_count(samples.len(), sub_frames);
        let coef = self.config.coefficients;
        let signal = preemphasis(samples, self.config.preemphasis);

        let mut out = Array2::<f64>::zeros((rows, coef));
        let mut buffer = vec![Complex::new(0.0, 0.0); self.nfft];
        let mut log_mel = vec![0.0; self.filterbank.len()];

        for (row, mut dst) in out.outer_iter_mut().enumerate() {
            let start = row * self.sub_step;
            buffer.iter_mut().for_each(|c| *c = Complex::new(0.0, 0.0));
            for (i, w) in self.window.iter().enumerate() {
                if let Some(&s) = signal.get(start + i) {
                    buffer[i] = Complex::new(s * w, 0.0);
                }
            }
            self.fft.process(&mut buffer);

            let power: Vec<f64> = buffer[..=self.nfft / 2]
                .iter()
                .map(|c| c.norm_sqr() / self.nfft as f64)
                .collect();

            for (energy, filter) in log_mel.iter_mut().zip(&self.filterbank) {
                let e: f64 = filter.iter().zip(&power).map(|(w, p)| w * p).sum();
                *energy = e.max(LOG_FLOOR).ln();
            }

            for (k, value) in dst.iter_mut().enumerate() {
                let c: f64 = self.dct[k].iter().zip(&log_mel).map(|(d, m)| d * m).sum();
                *value = c * self.lifter[k];
            }
        }

        out
    }
}

fn preemphasis(samples: &[i16], coeff: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(samples.len());
    let mut prev = 0.0;
    for (i, &s) in samples.iter().enumerate() {
        let x = s as f64;
        out.push(if i == 0 { x } else { x - coeff * prev });
        prev = x;
    }
    out
}

fn hamming_window(size: usize) -> Vec<f64> {
    if size == 1 {
        return vec![1.0];
    }
    (0..size)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (size - 1) as f64).cos())
        .collect()
}

fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10.0_f64.powf(mel / 2595.0) - 1.0)
}

/// Triangular filters evenly spaced on the mel scale from 0 Hz to Nyquist,
/// each row covering the `nfft / 2 + 1` power bins.
fn mel_filterbank(filters: usize, nfft: usize, sample_rate: u32) -> Vec<Vec<f64>> {
    let bins = nfft / 2 + 1;
    let high_mel = hz_to_mel(sample_rate as f64 / 2.0);
    let edges: Vec<usize> = (0..filters + 2)
        .map(|i| {
            let hz = mel_to_hz(high_mel * i as f64 / (filters + 1) as f64);
            (((nfft + 1) as f64 * hz / sample_rate as f64).floor() as usize).min(bins - 1)
        })
        .collect();

    (0..filters)
        .map(|j| {
            let (lo, mid, hi) = (edges[j], edges[j + 1], edges[j + 2]);
            let mut row = vec![0.0; bins];
            for k in lo..mid {
                row[k] = (k - lo) as f64 / (mid - lo) as f64;
            }
            for k in mid..hi {
                row[k] = (hi - k) as f64 / (hi - mid) as f64;
            }
            row
        })
        .collect()
}

/// Orthonormal DCT-II rows for the lowest `keep` coefficients.
fn dct_matrix(keep: usize, n: usize) -> Vec<Vec<f64>> {
    (0..keep)
        .map(|k| {
            let scale = if k == 0 { (1.0 / n as f64).sqrt() } else { (2.0 / n as f64).sqrt() };
            (0..n)
                .map(|i| scale * (PI * k as f64 * (2 * i + 1) as f64 / (2 * n) as f64).cos())
                .collect()
        })
        .collect()
}

/// Sinusoidal cepstral lifter; `l == 0` leaves coefficients unchanged.
fn lifter(keep: usize, l: usize) -> Vec<f64> {
    (0..keep)
        .map(|n| {
            if l == 0 {
                1.0
            } else {
                1.0 + (l as f64 / 2.0) * (PI * n as f64 / l as f64).sin()
            }
        })
        .collect()
}
