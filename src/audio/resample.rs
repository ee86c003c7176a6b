use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use super::{RawAudio, WaveformSamples};
use crate::error::{AnalysisError, Result};

const CHUNK_SIZE: usize = 1024;

/// Normalise decoded audio to `target_rate` Hz with `target_channels` channels.
///
/// Each call works from the decoded source, so the mood and genre waveforms
/// never inherit each other's resampling error. Downmixing averages channels
/// before resampling. Output is quantised to 16-bit amplitudes.
pub fn resample(audio: &RawAudio, target_rate: u32, target_channels: usize) -> Result<WaveformSamples> {
    if target_rate == 0 {
        return Err(AnalysisError::InvalidTarget("sample rate must be positive".into()));
    }
    if audio.sample_rate == 0 || audio.channels == 0 {
        return Err(AnalysisError::InvalidTarget(format!(
            "source reports {} Hz with {} channel(s)",
            audio.sample_rate, audio.channels
        )));
    }
    if target_channels != 1 && target_channels != audio.channels {
        return Err(AnalysisError::InvalidTarget(format!(
            "cannot map {} source channel(s) onto {}",
            audio.channels, target_channels
        )));
    }

    let planar = if target_channels == 1 {
        vec![downmix(audio)]
    } else {
        deinterleave(audio)
    };

    let resampled = if audio.sample_rate == target_rate {
        planar
    } else {
        resample_planar(&planar, audio.sample_rate, target_rate)?
    };

    let frames = resampled.first().map_or(0, |c| c.len());
    let mut samples = Vec::with_capacity(frames * target_channels);
    for i in 0..frames {
        for channel in &resampled {
            samples.push(quantize(channel[i]));
        }
    }

    log::info!(
        "Resampled {} Hz x{} -> {} Hz x{}: {} frames",
        audio.sample_rate,
        audio.channels,
        target_rate,
        target_channels,
        frames
    );

    Ok(WaveformSamples::new(samples, target_rate, target_channels))
}

fn downmix(audio: &RawAudio) -> Vec<f32> {
    if audio.channels == 1 {
        return audio.samples.clone();
    }
    audio
        .samples
        .chunks_exact(audio.channels)
        .map(|frame| frame.iter().sum::<f32>() / audio.channels as f32)
        .collect()
}

fn deinterleave(audio: &RawAudio) -> Vec<Vec<f32>> {
    let mut planar = vec![Vec::with_capacity(audio.frames()); audio.channels];
    for frame in audio.samples.chunks_exact(audio.channels) {
        for (ch, &s) in frame.iter().enumerate() {
            planar[ch].push(s);
        }
    }
    planar
}

fn quantize(sample: f32) -> i16 {
    (sample * i16::MAX as f32).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Band-limited sinc resampling, chunked and compensated for the filter delay
/// so the output holds exactly `ceil(frames * ratio)` frames.
fn resample_planar(planar: &[Vec<f32>], from_rate: u32, to_rate: u32) -> Result<Vec<Vec<f32>>> {
    let frames = planar.first().map_or(0, |c| c.len());
    if frames == 0 {
        return Ok(vec![Vec::new(); planar.len()]);
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = to_rate as f64 / from_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, CHUNK_SIZE, planar.len())
        .map_err(|e| AnalysisError::InvalidTarget(format!("failed to create resampler: {}", e)))?;

    let delay = resampler.output_delay();
    let expected = (frames as f64 * ratio).ceil() as usize;
    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + delay); planar.len()];

    let fail = |e: rubato::ResampleError| AnalysisError::InvalidTarget(format!("resampling failed: {}", e));

    let mut pos = 0;
    while pos + CHUNK_SIZE <= frames {
        let chunk: Vec<&[f32]> = planar.iter().map(|c| &c[pos..pos + CHUNK_SIZE]).collect();
        append(&mut output, resampler.process(&chunk, None).map_err(fail)?);
        pos += CHUNK_SIZE;
    }
    if pos < frames {
        let tail: Vec<&[f32]> = planar.iter().map(|c| &c[pos..]).collect();
        append(&mut output, resampler.process_partial(Some(tail.as_slice()), None).map_err(fail)?);
    }
    // Flush the filter until the delayed tail has come out.
    while output[0].len() < expected + delay {
        let flushed = resampler
            .process_partial(None::<&[&[f32]]>, None)
            .map_err(fail)?;
        if flushed.first().map_or(true, |c| c.is_empty()) {
            break;
        }
        append(&mut output, flushed);
    }

    Ok(output
        .into_iter()
        .map(|channel| {
            let end = (delay + expected).min(channel.len());
            let start = delay.min(end);
            channel[start..end].to_vec()
        })
        .collect())
}

fn append(output: &mut [Vec<f32>], block: Vec<Vec<f32>>) {
    for (dst, src) in output.iter_mut().zip(block) {
        dst.extend_from_slice(&src);
    }
}
