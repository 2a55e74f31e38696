//! Kaldi mel scale, window and triangular filterbank.

use std::f64::consts::PI;

/// Generates a symmetric Hamming window of the given length.
pub fn hamming_window(n: usize) -> Vec<f64> {
    if n <= 1 {
        return vec![1.0; n];
    }
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}

/// Kaldi mel scale: `1127 * ln(1 + hz / 700)`.
pub(crate) fn mel_scale(hz: f64) -> f64 {
    1127.0 * (1.0 + hz / 700.0).ln()
}

#[cfg(test)]
fn inverse_mel_scale(mel: f64) -> f64 {
    700.0 * ((mel / 1127.0).exp() - 1.0)
}

/// Creates the Kaldi mel filterbank matrix.
///
/// Triangles are laid out evenly on the mel axis and evaluated at each FFT
/// bin's mel frequency, matching `kaldi::MelBanks`. `high_freq <= 0` is an
/// offset from Nyquist. Returns `[num_mels][padded_size / 2 + 1]`; the
/// Nyquist column is always zero.
pub fn mel_filter_bank(
    num_mels: usize,
    padded_size: usize,
    sample_rate: f64,
    low_freq: f64,
    high_freq: f64,
) -> Vec<Vec<f64>> {
    let num_fft_bins = padded_size / 2;
    let nyquist = sample_rate / 2.0;
    let high_freq = if high_freq <= 0.0 { high_freq + nyquist } else { high_freq };
    let bin_width = sample_rate / padded_size as f64;

    let mel_low = mel_scale(low_freq);
    let mel_high = mel_scale(high_freq);
    let delta = (mel_high - mel_low) / (num_mels + 1) as f64;

    let bin_mels: Vec<f64> = (0..num_fft_bins).map(|k| mel_scale(bin_width * k as f64)).collect();

    (0..num_mels)
        .map(|m| {
            let left = mel_low + m as f64 * delta;
            let center = left + delta;
            let right = center + delta;

            let mut filter = vec![0.0f64; num_fft_bins + 1];
            for (k, &mel) in bin_mels.iter().enumerate() {
                let up = (mel - left) / (center - left);
                let down = (right - mel) / (right - center);
                filter[k] = up.min(down).max(0.0);
            }
            filter
        })
        .collect()
}
