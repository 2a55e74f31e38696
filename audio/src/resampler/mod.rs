//! Whole-buffer sample rate conversion.
//!
//! Uses rubato's FFT resampler, a pure Rust implementation. The output is
//! delay-compensated and trimmed to `ceil(len * to / from)` samples so that
//! a resampled utterance lines up with the original in time.

use rubato::{FftFixedIn, Resampler};

use crate::error::AudioError;

/// Input frames fed to rubato per processing call.
const CHUNK_SIZE: usize = 1024;

/// Sub-chunks per chunk; more sub-chunks lower latency at some cost.
const SUB_CHUNKS: usize = 2;

/// Resamples mono `samples` from `from_rate` to `to_rate` Hz.
///
/// Returns a copy of the input when the rates are equal.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, AudioError> {
    if from_rate == 0 || to_rate == 0 {
        return Err(AudioError::Resample(format!(
            "invalid sample rates: {from_rate} -> {to_rate}"
        )));
    }
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let mut resampler =
        FftFixedIn::<f32>::new(from_rate as usize, to_rate as usize, CHUNK_SIZE, SUB_CHUNKS, 1)?;

    let expected = output_len(samples.len(), from_rate, to_rate);
    let delay = resampler.output_delay();
    let mut out: Vec<f32> = Vec::with_capacity(expected + delay + CHUNK_SIZE);

    let mut pos = 0;
    loop {
        let need = resampler.input_frames_next();
        if pos + need > samples.len() {
            break;
        }
        let chunk = resampler.process(&[&samples[pos..pos + need]], None)?;
        out.extend_from_slice(&chunk[0]);
        pos += need;
    }

    // Feed the remainder zero-padded, then silence until the delayed signal
    // is fully out.
    let target = expected + delay;
    while pos < samples.len() || out.len() < target {
        let need = resampler.input_frames_next();
        let mut input = vec![0.0f32; need];
        let n = (samples.len() - pos).min(need);
        input[..n].copy_from_slice(&samples[pos..pos + n]);
        pos += n;

        let chunk = resampler.process(&[input.as_slice()], None)?;
        if chunk[0].is_empty() {
            return Err(AudioError::Resample(format!(
                "resampler stalled at {} of {target} samples ({from_rate} -> {to_rate})",
                out.len()
            )));
        }
        out.extend_from_slice(&chunk[0]);
    }

    out.drain(..delay.min(out.len()));
    out.truncate(expected);
    Ok(out)
}

/// Number of output samples for `len` input samples.
fn output_len(len: usize, from_rate: u32, to_rate: u32) -> usize {
    let num = len as u64 * to_rate as u64;
    num.div_ceil(from_rate as u64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine(freq: f64, rate: u32, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / rate as f64).sin() as f32 * 0.5)
            .collect()
    }

    #[test]
    fn same_rate_is_copy() {
        let x = sine(440.0, 16000, 1000);
        assert_eq!(resample(&x, 16000, 16000).unwrap(), x);
    }

    #[test]
    fn empty_input() {
        assert!(resample(&[], 44100, 16000).unwrap().is_empty());
    }

    #[test]
    fn zero_rate_rejected() {
        assert!(resample(&[0.0; 10], 0, 16000).is_err());
    }

    #[test]
    fn downsample_length() {
        let x = sine(440.0, 48000, 48000);
        let y = resample(&x, 48000, 16000).unwrap();
        assert_eq!(y.len(), 16000);
    }

    #[test]
    fn upsample_length_odd_input() {
        let x = sine(440.0, 8000, 4001);
        let y = resample(&x, 8000, 16000).unwrap();
        assert_eq!(y.len(), 8002);
    }

    #[test]
    fn downsample_preserves_tone_energy() {
        let x = sine(440.0, 44100, 44100);
        let y = resample(&x, 44100, 16000).unwrap();

        // RMS of a 0.5-amplitude sine is ~0.354; skip edges.
        let mid = &y[1000..y.len() - 1000];
        let rms = (mid.iter().map(|v| v * v).sum::<f32>() / mid.len() as f32).sqrt();
        assert!((rms - 0.354).abs() < 0.02, "rms = {rms}");
    }

    #[test]
    fn coprime_rates_keep_full_length() {
        for (from, n) in [(16001u32, 16001usize), (16001, 1600), (44101, 5000)] {
            let x = vec![0.3f32; n];
            let y = resample(&x, from, 16000).unwrap();
            assert_eq!(y.len(), output_len(n, from, 16000), "{from} Hz, {n} samples");

            // A constant signal stays constant away from the edges.
            let mid = &y[y.len() / 4..y.len() * 3 / 4];
            assert!(mid.iter().all(|v| (v - 0.3).abs() < 0.02), "{from} Hz, {n} samples");
        }
    }

    #[test]
    fn short_input_is_not_dropped() {
        let x = sine(440.0, 44100, 300);
        let y = resample(&x, 44100, 16000).unwrap();
        assert_eq!(y.len(), 109);
    }

    #[test]
    fn output_len_rounds_up() {
        assert_eq!(output_len(3, 3, 2), 2);
        assert_eq!(output_len(48000, 48000, 16000), 16000);
        assert_eq!(output_len(1, 44100, 16000), 1);
    }
}
