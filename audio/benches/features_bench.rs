use criterion::{black_box, criterion_group, criterion_main, Criterion};
use spksim_audio::{fbank, melspec, resampler};

fn make_sine(freq_hz: f64, n_samples: usize, sample_rate: usize, amp: f64) -> Vec<f32> {
    (0..n_samples)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            (amp * (freq_hz * 2.0 * std::f64::consts::PI * t).sin()) as f32
        })
        .collect()
}

fn bench_fbank_3s(c: &mut Criterion) {
    let extractor = fbank::Extractor::new(fbank::Config::default());
    let audio = make_sine(440.0, 48000, 16000, 16000.0);

    c.bench_function("kaldi_fbank_3s", |b| {
        b.iter(|| {
            let mut feats = extractor.extract(black_box(&audio));
            fbank::cmn(&mut feats);
            black_box(feats);
        });
    });
}

fn bench_melspec_3s(c: &mut Criterion) {
    let spec = melspec::MelSpectrogram::new(melspec::Config::default());
    let audio = make_sine(440.0, 48000, 16000, 0.5);

    c.bench_function("librosa_melspec_3s", |b| {
        b.iter(|| {
            let _ = black_box(spec.compute(black_box(&audio)));
        });
    });
}

fn bench_resample_44k_to_16k(c: &mut Criterion) {
    let audio = make_sine(440.0, 44100, 44100, 0.5);

    c.bench_function("resample_1s_44k_16k", |b| {
        b.iter(|| {
            let _ = black_box(resampler::resample(black_box(&audio), 44100, 16000));
        });
    });
}

criterion_group!(benches, bench_fbank_3s, bench_melspec_3s, bench_resample_44k_to_16k);
criterion_main!(benches);
