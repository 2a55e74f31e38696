//! Audio file decoding via symphonia.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use crate::error::AudioError;
use crate::resampler;

/// Decoded audio: one f32 buffer per channel at the file's native rate.
#[derive(Debug, Clone)]
pub struct Waveform {
    /// Native sample rate in Hz.
    pub sample_rate: u32,
    /// Per-channel samples in `[-1, 1]`. All channels have the same length.
    pub channels: Vec<Vec<f32>>,
}

impl Waveform {
    /// Number of sample frames.
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Averages all channels into a single mono buffer.
    pub fn to_mono(&self) -> Vec<f32> {
        match self.channels.len() {
            0 => Vec::new(),
            1 => self.channels[0].clone(),
            n => {
                let scale = 1.0 / n as f32;
                (0..self.len())
                    .map(|i| self.channels.iter().map(|c| c[i]).sum::<f32>() * scale)
                    .collect()
            }
        }
    }

    /// Downmixes to mono and resamples to `rate` Hz.
    pub fn to_mono_at(&self, rate: u32) -> Result<Vec<f32>, AudioError> {
        let mono = self.to_mono();
        if self.sample_rate == rate {
            return Ok(mono);
        }
        resampler::resample(&mono, self.sample_rate, rate)
    }

    /// Returns the first channel, the way Kaldi-style front ends read audio.
    pub fn first_channel(&self) -> &[f32] {
        self.channels.first().map_or(&[], Vec::as_slice)
    }
}

/// Decodes the first audio track of the file at `path`.
///
/// Integer PCM is scaled to `[-1, 1]` (i16 samples are divided by 32768).
/// Corrupt packets are skipped; a file with no decodable track fails.
pub fn load(path: impl AsRef<Path>) -> Result<Waveform, AudioError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(AudioError::NoTrack)?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let mut sample_rate = codec_params.sample_rate;

    let mut decoder =
        symphonia::default::get_codecs().make(&codec_params, &DecoderOptions::default())?;

    let mut channels: Vec<Vec<f32>> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(msg)) => {
                warn!(path = %path.display(), "skipping corrupt packet: {msg}");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let num_channels = spec.channels.count();
        if num_channels == 0 {
            continue;
        }
        if sample_rate.is_none() {
            sample_rate = Some(spec.rate);
        }
        if channels.is_empty() {
            channels = vec![Vec::new(); num_channels];
        }

        let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buf.copy_interleaved_ref(decoded);

        for frame in buf.samples().chunks_exact(num_channels) {
            for (ch, &s) in channels.iter_mut().zip(frame) {
                ch.push(s);
            }
        }
    }

    let sample_rate = sample_rate.ok_or(AudioError::UnknownSampleRate)?;
    if channels.is_empty() {
        return Err(AudioError::Decode(format!("{}: no audio frames", path.display())));
    }

    let wav = Waveform { sample_rate, channels };
    debug!(
        path = %path.display(),
        sample_rate,
        channels = wav.channels.len(),
        frames = wav.len(),
        "decoded audio"
    );
    Ok(wav)
}
