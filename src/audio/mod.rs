pub mod decode;
pub mod preview;
pub mod resample;

/// Decoded PCM straight out of the container, interleaved and normalised to [-1, 1].
#[derive(Clone, Debug)]
pub struct RawAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: usize,
}

impl RawAudio {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }
}

/// Signed 16-bit amplitudes at a fixed rate and channel layout.
/// Immutable once produced by the resampler.
#[derive(Clone, Debug, PartialEq)]
pub struct WaveformSamples {
    samples: Vec<i16>,
    sample_rate: u32,
    channels: usize,
}

impl WaveformSamples {
    pub fn new(samples: Vec<i16>, sample_rate: u32, channels: usize) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Convenience for already mono material.
    pub fn mono(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self::new(samples, sample_rate, 1)
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        (self.samples.len() / self.channels) as f64 / self.sample_rate as f64
    }
}
