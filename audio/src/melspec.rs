//! librosa-compatible power mel spectrogram.
//!
//! Reproduces `librosa.feature.melspectrogram` with its defaults: centered
//! frames with zero padding, periodic Hann window, power 2, Slaney mel scale
//! with Slaney area normalization. Used by the Resemblyzer voice encoder.

use std::f64::consts::PI;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::error::AudioError;

/// Mel spectrogram parameters.
#[derive(Debug, Clone)]
pub struct Config {
    pub sample_rate: u32,
    pub n_fft: usize,
    pub hop_length: usize,
    pub n_mels: usize,
    pub fmin: f64,
    /// Upper edge in Hz; `None` means Nyquist.
    pub fmax: Option<f64>,
}

impl Default for Config {
    /// Resemblyzer front end: 16 kHz, 25 ms window, 10 ms hop, 40 mels.
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            n_fft: 400,
            hop_length: 160,
            n_mels: 40,
            fmin: 0.0,
            fmax: None,
        }
    }
}

pub struct MelSpectrogram {
    cfg: Config,
    window: Vec<f64>,
    mel_basis: Vec<Vec<f64>>,
    fft: Arc<dyn Fft<f64>>,
}

impl MelSpectrogram {
    pub fn new(cfg: Config) -> Self {
        let window = hann_window(cfg.n_fft);
        let fmax = cfg.fmax.unwrap_or(cfg.sample_rate as f64 / 2.0);
        let mel_basis = slaney_mel_basis(cfg.sample_rate as f64, cfg.n_fft, cfg.n_mels, cfg.fmin, fmax);
        let fft = FftPlanner::new().plan_fft_forward(cfg.n_fft);
        Self { cfg, window, mel_basis, fft }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Number of frames for `n` samples: `1 + n / hop`.
    pub fn num_frames(&self, n: usize) -> usize {
        1 + n / self.cfg.hop_length
    }

    /// Computes the mel spectrogram, time-major: `[T][n_mels]`.
    pub fn compute(&self, samples: &[f32]) -> Result<Vec<Vec<f32>>, AudioError> {
        if samples.is_empty() {
            return Err(AudioError::TooShort { need: 1, got: 0 });
        }
        let n_fft = self.cfg.n_fft;
        let pad = n_fft / 2;
        let num_frames = self.num_frames(samples.len());
        let half = n_fft / 2 + 1;

        let mut buf = vec![Complex::new(0.0f64, 0.0); n_fft];
        let mut power = vec![0.0f64; half];
        let mut out = Vec::with_capacity(num_frames);

        for t in 0..num_frames {
            // Frame t covers padded[t*hop .. t*hop + n_fft], padded = [0; pad] ++ samples ++ [0; pad].
            let start = (t * self.cfg.hop_length) as isize - pad as isize;
            for (i, c) in buf.iter_mut().enumerate() {
                let idx = start + i as isize;
                let s = if idx >= 0 && (idx as usize) < samples.len() {
                    samples[idx as usize] as f64
                } else {
                    0.0
                };
                *c = Complex::new(s * self.window[i], 0.0);
            }
            self.fft.process(&mut buf);

            for (p, c) in power.iter_mut().zip(&buf[..half]) {
                *p = c.norm_sqr();
            }

            let frame: Vec<f32> = self
                .mel_basis
                .iter()
                .map(|filter| filter.iter().zip(&power).map(|(w, p)| w * p).sum::<f64>() as f32)
                .collect();
            out.push(frame);
        }

        Ok(out)
    }
}

/// Periodic Hann window (`scipy.signal.get_window("hann", n, fftbins=True)`).
fn hann_window(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / n as f64).cos())
        .collect()
}

const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

fn log_step() -> f64 {
    6.4f64.ln() / 27.0
}

/// Slaney mel scale: linear below 1 kHz, logarithmic above.
fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

/// `librosa.filters.mel(sr, n_fft, n_mels, fmin, fmax, htk=False, norm="slaney")`.
///
/// Returns `[n_mels][n_fft / 2 + 1]`.
fn slaney_mel_basis(sample_rate: f64, n_fft: usize, n_mels: usize, fmin: f64, fmax: f64) -> Vec<Vec<f64>> {
    let half = n_fft / 2 + 1;
    let fft_freqs: Vec<f64> = (0..half).map(|k| k as f64 * sample_rate / n_fft as f64).collect();

    let mel_min = hz_to_mel(fmin);
    let mel_max = hz_to_mel(fmax);
    let mel_f: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f64 / (n_mels + 1) as f64))
        .collect();

    (0..n_mels)
        .map(|m| {
            let lower_w = mel_f[m + 1] - mel_f[m];
            let upper_w = mel_f[m + 2] - mel_f[m + 1];
            let enorm = 2.0 / (mel_f[m + 2] - mel_f[m]);
            fft_freqs
                .iter()
                .map(|&f| {
                    let lower = (f - mel_f[m]) / lower_w;
                    let upper = (mel_f[m + 2] - f) / upper_w;
                    lower.min(upper).max(0.0) * enorm
                })
                .collect()
        })
        .collect()
}
