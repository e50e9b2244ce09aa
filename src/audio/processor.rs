//! WAV decoding and preprocessing for the transcription pipeline.
//!
//! The staged file is parsed as RIFF/WAV, converted to float samples,
//! downmixed to a single channel and resampled to the model's 16 kHz input
//! rate.

use anyhow::{anyhow, bail, Context, Result};
use std::fs::File;
use std::path::Path;

/// Sample rate the Whisper models consume.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Decode a staged audio file into 16 kHz mono f32 samples.
pub fn load_audio(path: &Path) -> Result<Vec<f32>> {
    let mut file = File::open(path)
        .with_context(|| format!("failed to open staged file {}", path.display()))?;
    let (header, data) =
        wav::read(&mut file).map_err(|e| anyhow!("unsupported or corrupt audio file: {e}"))?;

    let samples = to_float(data)?;
    if samples.is_empty() {
        bail!("audio file contains no samples");
    }

    let mono = downmix(&samples, header.channel_count as usize);
    Ok(resample(&mono, header.sampling_rate, TARGET_SAMPLE_RATE))
}

/// Convert whatever bit depth the file carries into floats in `[-1.0, 1.0]`.
fn to_float(data: wav::BitDepth) -> Result<Vec<f32>> {
    match data {
        wav::BitDepth::Eight(samples) => Ok(samples
            .into_iter()
            .map(|s| (s as f32 - 128.0) / 128.0)
            .collect()),
        wav::BitDepth::Sixteen(samples) => {
            Ok(samples.into_iter().map(|s| s as f32 / 32768.0).collect())
        }
        wav::BitDepth::TwentyFour(samples) => Ok(samples
            .into_iter()
            .map(|s| s as f32 / 8_388_608.0)
            .collect()),
        wav::BitDepth::ThirtyTwoFloat(samples) => Ok(samples),
        wav::BitDepth::Empty => bail!("audio file contains no samples"),
    }
}

/// Average interleaved frames down to one channel.
fn downmix(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Linear-interpolation resampler. Speech content sits far below the Nyquist
/// limit at these rates, so interpolation between neighbouring samples is
/// sufficient for transcription input.
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((samples.len() as f64) / ratio).round().max(1.0) as usize;
    let mut out = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let pos = i as f64 * ratio;
        let idx = pos.floor() as usize;
        let frac = (pos - idx as f64) as f32;
        let a = samples[idx.min(samples.len() - 1)];
        let b = samples[(idx + 1).min(samples.len() - 1)];
        out.push(a + (b - a) * frac);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn write_wav(channels: u16, sample_rate: u32, samples: Vec<i16>) -> Vec<u8> {
        let header = wav::Header::new(wav::header::WAV_FORMAT_PCM, channels, sample_rate, 16);
        let mut cursor = Cursor::new(Vec::new());
        wav::write(header, &wav::BitDepth::Sixteen(samples), &mut cursor).unwrap();
        cursor.into_inner()
    }

    fn stage(bytes: &[u8]) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("clip.wav");
        std::fs::write(&path, bytes).unwrap();
        (dir, path)
    }

    #[test]
    fn test_load_audio_mono_16k_passthrough() {
        let samples: Vec<i16> = (0..1600).map(|i| ((i % 100) * 300) as i16).collect();
        let (_dir, path) = stage(&write_wav(1, 16000, samples));

        let pcm = load_audio(&path).unwrap();
        assert_eq!(pcm.len(), 1600);
        assert!(pcm.iter().all(|s| (-1.0..=1.0).contains(s)));
    }

    #[test]
    fn test_load_audio_downmixes_and_resamples() {
        // 0.1 s of stereo audio at 44.1 kHz.
        let frames = 4410;
        let mut samples = Vec::with_capacity(frames * 2);
        for i in 0..frames {
            let v = ((i % 50) as i16) * 100;
            samples.push(v);
            samples.push(-v);
        }
        let (_dir, path) = stage(&write_wav(2, 44100, samples));

        let pcm = load_audio(&path).unwrap();
        let expected = (frames as f64 * 16000.0 / 44100.0).round() as usize;
        assert_eq!(pcm.len(), expected);
    }

    #[test]
    fn test_load_audio_rejects_non_audio() {
        let (_dir, path) = stage(b"definitely not a riff file");
        let err = load_audio(&path).unwrap_err().to_string();
        assert!(err.contains("unsupported or corrupt"));
    }

    #[test]
    fn test_downmix_averages_channels() {
        let stereo = vec![1.0, 0.0, 0.5, 0.5, -1.0, 1.0];
        assert_eq!(downmix(&stereo, 2), vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_resample_halves_length() {
        let samples: Vec<f32> = (0..1000).map(|i| i as f32 / 1000.0).collect();
        let out = resample(&samples, 32000, 16000);
        assert_eq!(out.len(), 500);
        // Values stay monotonically increasing for a ramp input.
        assert!(out.windows(2).all(|w| w[0] <= w[1]));
    }
}
