use crate::audio::WaveformSamples;
use crate::config::SelectionConfig;
use crate::error::{AnalysisError, Result};

/// Contiguous slice of a mono waveform chosen by fractional bounds.
#[derive(Clone, Copy, Debug)]
pub struct AnalysisWindow<'a> {
    pub samples: &'a [i16],
    pub sample_rate: u32,
    /// Index of the first selected sample in the full waveform.
    pub offset: usize,
}

impl AnalysisWindow<'_> {
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Select `[floor(len * start), floor(len * end))` and refuse it when it is
/// shorter than `min_seconds`.
pub fn select_window<'a>(waveform: &'a WaveformSamples, selection: &SelectionConfig) -> Result<AnalysisWindow<'a>> {
    if waveform.channels() != 1 {
        return Err(AnalysisError::shape("analysis channel count", 1, waveform.channels()));
    }
    if waveform.sample_rate() == 0 {
        return Err(AnalysisError::InvalidConfig("waveform has no sample rate".into()));
    }

    let len = waveform.len();
    let first = (len as f64 * selection.start) as usize;
    let last = ((len as f64 * selection.end) as usize).min(len);
    let samples = &waveform.samples()[first.min(last)..last];
    let window = AnalysisWindow {
        samples,
        sample_rate: waveform.sample_rate(),
        offset: first,
    };

    let seconds = window.duration_secs();
    if seconds < selection.min_seconds {
        return Err(AnalysisError::InputTooShort {
            seconds,
            minimum: selection.min_seconds,
        });
    }
    Ok(window)
}

/// Milliseconds to a sample count, rounding half to even.
pub fn ms_to_samples(ms: f64, sample_rate: u32) -> usize {
    (ms / 1000.0 * sample_rate as f64).round_ties_even().max(0.0) as usize
}

/// Fixed-length, fixed-stride slicing of an analysis window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Framer {
    pub length: usize,
    pub step: usize,
}

impl Framer {
    pub fn new(length: usize, step: usize) -> Result<Self> {
        if length == 0 || step == 0 {
            return Err(AnalysisError::InvalidConfig(format!(
                "frame length {} and step {} must both be at least one sample",
                length, step
            )));
        }
        Ok(Self { length, step })
    }

    pub fn from_ms(length_ms: f64, step_ms: f64, sample_rate: u32) -> Result<Self> {
        Self::new(ms_to_samples(length_ms, sample_rate), ms_to_samples(step_ms, sample_rate))
    }

    /// `floor((len - length) / step)`, zero when the window is shorter than a frame.
    pub fn frame_count(&self, len: usize) -> usize {
        len.checked_sub(self.length).map_or(0, |rest| rest / self.step)
    }

    pub fn frames<'a>(&self, samples: &'a [i16]) -> impl ExactSizeIterator<Item = &'a [i16]> + 'a {
        let Framer { length, step } = *self;
        (0..self.frame_count(samples.len())).map(move |i| &samples[i * step..i * step + length])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn whole() -> SelectionConfig {
        SelectionConfig {
            start: 0.0,
            end: 1.0,
            min_seconds: 5.0,
        }
    }

    #[test]
    fn thirty_second_tone_yields_twenty_mood_frames() {
        let waveform = WaveformSamples::mono(vec![0; 30 * 11025], 11025);
        let window = select_window(&waveform, &SelectionConfig::default()).unwrap();
        assert_eq!(window.samples.len(), 165_375);
        assert_eq!(window.offset, 82_687);

        let framer = Framer::from_ms(5000.0, 500.0, 11025).unwrap();
        assert_eq!(framer.length, 55_125);
        assert_eq!(framer.step, 5_512);
        assert_eq!(framer.frame_count(window.samples.len()), (165_375 - 55_125) / 5_512);
        assert_eq!(framer.frames(window.samples).len(), 20);
    }

    #[test]
    fn short_window_is_refused() {
        let waveform = WaveformSamples::mono(vec![0; 4_900], 1000);
        match select_window(&waveform, &whole()) {
            Err(AnalysisError::InputTooShort { seconds, minimum }) => {
                assert!((seconds - 4.9).abs() < 1e-9);
                assert_eq!(minimum, 5.0);
            }
            other => panic!("expected InputTooShort, got {:?}", other),
        }

        let waveform = WaveformSamples::mono(vec![0; 5_100], 1000);
        assert!(select_window(&waveform, &whole()).is_ok());
    }

    #[test]
    fn frames_start_at_multiples_of_step() {
        let samples: Vec<i16> = (0..100).collect();
        let framer = Framer::new(10, 7).unwrap();
        let frames: Vec<&[i16]> = framer.frames(&samples).collect();
        assert_eq!(frames.len(), (100 - 10) / 7);
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.len(), 10);
            assert_eq!(frame[0], (i * 7) as i16);
        }
    }

    #[test]
    fn window_shorter_than_frame_has_no_frames() {
        let framer = Framer::new(50, 5).unwrap();
        assert_eq!(framer.frame_count(49), 0);
        assert_eq!(framer.frame_count(50), 0);
        assert_eq!(framer.frames(&[0i16; 20]).count(), 0);
    }

    #[test]
    fn zero_sized_frames_are_rejected() {
        assert!(Framer::new(0, 1).is_err());
        assert!(Framer::from_ms(0.01, 500.0, 11025).is_err());
    }

    #[test]
    fn stereo_waveform_is_rejected() {
        let waveform = WaveformSamples::new(vec![0; 20_000], 1000, 2);
        assert!(matches!(
            select_window(&waveform, &whole()),
            Err(AnalysisError::ShapeMismatch { .. })
        ));
    }
}
