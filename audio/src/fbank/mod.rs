//! Kaldi-compatible log mel filterbank extraction.
//!
//! Front end for WeSpeaker models, which are trained on features from
//! `torchaudio.compliance.kaldi.fbank`. Output is a `[T, num_mels]` f32
//! matrix.
//!
//! Per frame, in order: DC offset removal, pre-emphasis, window, zero-pad
//! to the next power of two, power spectrum, mel filterbank, log. Frames are
//! laid out with `snip_edges = true`: `T = (len - window) / shift + 1`.

mod mel;

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

pub use mel::hamming_window;

/// Configuration for filterbank extraction.
#[derive(Debug, Clone)]
pub struct Config {
    /// Input sample rate in Hz.
    pub sample_rate: u32,
    /// Frame length in milliseconds.
    pub frame_length_ms: f64,
    /// Frame shift in milliseconds.
    pub frame_shift_ms: f64,
    /// Number of mel bins.
    pub num_mels: usize,
    /// Low cutoff in Hz.
    pub low_freq: f64,
    /// High cutoff in Hz; `<= 0` is an offset from Nyquist.
    pub high_freq: f64,
    pub pre_emphasis: f64,
    pub remove_dc_offset: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            frame_length_ms: 25.0,
            frame_shift_ms: 10.0,
            num_mels: 80,
            low_freq: 20.0,
            high_freq: 0.0,
            pre_emphasis: 0.97,
            remove_dc_offset: true,
        }
    }
}

impl Config {
    /// Default configuration at the given sample rate.
    pub fn with_sample_rate(sample_rate: u32) -> Self {
        Self { sample_rate, ..Self::default() }
    }

    /// Frame length in samples.
    pub fn window_size(&self) -> usize {
        (self.sample_rate as f64 * self.frame_length_ms * 0.001) as usize
    }

    /// Frame shift in samples.
    pub fn window_shift(&self) -> usize {
        (self.sample_rate as f64 * self.frame_shift_ms * 0.001) as usize
    }
}

/// Mel filterbank feature extractor.
pub struct Extractor {
    cfg: Config,
    window_size: usize,
    window_shift: usize,
    padded_size: usize,
    window: Vec<f64>,
    mel_bank: Vec<Vec<f64>>,
    fft: Arc<dyn Fft<f64>>,
}

impl Extractor {
    /// Creates a new extractor with the given config.
    pub fn new(cfg: Config) -> Self {
        let window_size = cfg.window_size();
        let window_shift = cfg.window_shift();
        let padded_size = window_size.max(1).next_power_of_two();
        let window = mel::hamming_window(window_size);
        let mel_bank = mel::mel_filter_bank(
            cfg.num_mels,
            padded_size,
            cfg.sample_rate as f64,
            cfg.low_freq,
            cfg.high_freq,
        );
        let fft = FftPlanner::new().plan_fft_forward(padded_size);
        Self { cfg, window_size, window_shift, padded_size, window, mel_bank, fft }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Number of frames produced for `n` input samples.
    pub fn num_frames(&self, n: usize) -> usize {
        if self.window_shift == 0 || n < self.window_size {
            return 0;
        }
        (n - self.window_size) / self.window_shift + 1
    }

    /// Extracts log mel filterbank features.
    ///
    /// Samples are used at whatever scale they are given; WeSpeaker models
    /// expect 16-bit integer range, so callers scale `[-1, 1]` input by 2^15.
    /// Returns an empty matrix when the input is shorter than one frame.
    pub fn extract(&self, samples: &[f32]) -> Vec<Vec<f32>> {
        let num_frames = self.num_frames(samples.len());
        let half = self.padded_size / 2 + 1;
        let floor = f32::EPSILON as f64;

        let mut features = Vec::with_capacity(num_frames);
        let mut frame = vec![0.0f64; self.window_size];
        let mut buf = vec![Complex::new(0.0f64, 0.0); self.padded_size];
        let mut power = vec![0.0f64; half];

        for t in 0..num_frames {
            let start = t * self.window_shift;
            for (dst, &s) in frame.iter_mut().zip(&samples[start..start + self.window_size]) {
                *dst = s as f64;
            }

            if self.cfg.remove_dc_offset {
                let mean = frame.iter().sum::<f64>() / self.window_size as f64;
                for v in frame.iter_mut() {
                    *v -= mean;
                }
            }

            // Pre-emphasis; the first sample is its own predecessor.
            if self.cfg.pre_emphasis > 0.0 {
                for i in (1..self.window_size).rev() {
                    frame[i] -= self.cfg.pre_emphasis * frame[i - 1];
                }
                frame[0] -= self.cfg.pre_emphasis * frame[0];
            }

            for (i, c) in buf.iter_mut().enumerate() {
                let re = if i < self.window_size { frame[i] * self.window[i] } else { 0.0 };
                *c = Complex::new(re, 0.0);
            }
            self.fft.process(&mut buf);

            for (p, c) in power.iter_mut().zip(&buf[..half]) {
                *p = c.norm_sqr();
            }

            let mel: Vec<f32> = self
                .mel_bank
                .iter()
                .map(|filter| {
                    let energy: f64 = filter.iter().zip(&power).map(|(w, p)| w * p).sum();
                    energy.max(floor).ln() as f32
                })
                .collect();
            features.push(mel);
        }

        features
    }
}

/// Cepstral mean normalization in-place: subtracts the per-bin mean across
/// all frames.
pub fn cmn(features: &mut [Vec<f32>]) {
    if features.is_empty() {
        return;
    }
    let num_mels = features[0].len();
    let t = features.len() as f64;

    for m in 0..num_mels {
        let mean = features.iter().map(|f| f[m] as f64).sum::<f64>() / t;
        for f in features.iter_mut() {
            f[m] = (f[m] as f64 - mean) as f32;
        }
    }
}

/// Flattens `[T][num_mels]` to row-major `[T * num_mels]`.
pub fn flatten(features: &[Vec<f32>]) -> Vec<f32> {
    features.iter().flatten().copied().collect()
}
