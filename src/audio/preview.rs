use serde::Serialize;

use super::WaveformSamples;

pub const PREVIEW_POINTS: usize = 5000;

/// Fixed-size subset of a waveform for plotting.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WaveformPreview {
    pub filename: String,
    pub sample_rate: u32,
    pub points: Vec<i16>,
}

impl WaveformPreview {
    pub fn from_waveform(filename: &str, waveform: &WaveformSamples, points: usize) -> Self {
        Self {
            filename: filename.to_string(),
            sample_rate: waveform.sample_rate(),
            points: downsample(waveform.samples(), points),
        }
    }
}

/// `round(linspace(0, len - 1, points))`: evenly spaced, both ends included,
/// non-decreasing, repeating indices when `len < points`.
pub fn preview_indices(len: usize, points: usize) -> Vec<usize> {
    if len == 0 || points == 0 {
        return Vec::new();
    }
    if points == 1 {
        return vec![0];
    }
    let last = (len - 1) as f64;
    let step = last / (points - 1) as f64;
    (0..points)
        .map(|i| {
            if i == points - 1 {
                len - 1
            } else {
                ((i as f64 * step).round() as usize).min(len - 1)
            }
        })
        .collect()
}

pub fn downsample(samples: &[i16], points: usize) -> Vec<i16> {
    preview_indices(samples.len(), points)
        .into_iter()
        .map(|i| samples[i])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_input_spans_first_to_last() {
        let idx = preview_indices(1_000_000, PREVIEW_POINTS);
        assert_eq!(idx.len(), PREVIEW_POINTS);
        assert_eq!(idx[0], 0);
        assert_eq!(*idx.last().unwrap(), 999_999);
        assert!(idx.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn short_input_repeats_indices() {
        let idx = preview_indices(10, PREVIEW_POINTS);
        assert_eq!(idx.len(), PREVIEW_POINTS);
        assert_eq!(idx[0], 0);
        assert_eq!(*idx.last().unwrap(), 9);
        assert!(idx.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn picks_rounded_positions() {
        assert_eq!(preview_indices(5, 3), vec![0, 2, 4]);
        assert_eq!(preview_indices(4, 3), vec![0, 2, 3]);
        assert_eq!(preview_indices(7, 1), vec![0]);
    }

    #[test]
    fn preview_copies_waveform_values() {
        let waveform = WaveformSamples::mono((0..100).collect(), 22050);
        let preview = WaveformPreview::from_waveform("a.wav", &waveform, 5);
        assert_eq!(preview.points, vec![0, 25, 50, 74, 99]);
        assert_eq!(preview.sample_rate, 22050);
    }

    #[test]
    fn single_sample_waveform() {
        assert_eq!(downsample(&[7], 4), vec![7, 7, 7, 7]);
    }
}
