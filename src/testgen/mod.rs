// src/testgen/mod.rs
//
// Synthetic signals and WAV fixture generation for tests, demos and the
// `tone` subcommand.

use anyhow::{bail, Context, Result};
use std::f32::consts::PI;
use std::fs::OpenOptions;
use std::path::Path;

/// Sample encoding of generated WAV files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WavEncoding {
    /// 16-bit signed PCM
    Pcm16,
    /// 24-bit signed PCM
    Pcm24,
    /// 32-bit IEEE float
    Float32,
}

impl WavEncoding {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "16" | "pcm16" | "s16" => Some(Self::Pcm16),
            "24" | "pcm24" | "s24" => Some(Self::Pcm24),
            "32f" | "f32" | "float" | "float32" => Some(Self::Float32),
            _ => None,
        }
    }
}

/// Pure sine wave
pub fn sine(freq_hz: f32, sample_rate: u32, frames: usize, amplitude: f32) -> Vec<f32> {
    (0..frames)
        .map(|i| amplitude * (2.0 * PI * freq_hz * i as f32 / sample_rate as f32).sin())
        .collect()
}

/// Linear frequency sweep from `start_hz` to `end_hz`
pub fn chirp(start_hz: f32, end_hz: f32, sample_rate: u32, frames: usize, amplitude: f32) -> Vec<f32> {
    let duration = frames as f32 / sample_rate as f32;
    let rate = (end_hz - start_hz) / duration.max(f32::EPSILON);
    (0..frames)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            amplitude * (2.0 * PI * (start_hz * t + 0.5 * rate * t * t)).sin()
        })
        .collect()
}

/// Deterministic white noise in [-amplitude, amplitude]
pub fn white_noise(seed: u64, frames: usize, amplitude: f32) -> Vec<f32> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (0..frames)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let unit = (state >> 40) as f32 / (1u64 << 24) as f32;
            amplitude * (unit * 2.0 - 1.0)
        })
        .collect()
}

/// Interleave equally long planar channels
pub fn interleave(channels: &[Vec<f32>]) -> Vec<f32> {
    let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
    let mut out = Vec::with_capacity(frames * channels.len());
    for i in 0..frames {
        for ch in channels {
            out.push(ch[i]);
        }
    }
    out
}

/// Write interleaved samples in [-1, 1] to a WAV file
pub fn write_wav(
    path: &Path,
    samples: &[f32],
    sample_rate: u32,
    channels: u16,
    encoding: WavEncoding,
) -> Result<()> {
    if channels == 0 {
        bail!("WAV output needs at least one channel");
    }

    let (bits_per_sample, sample_format) = match encoding {
        WavEncoding::Pcm16 => (16, hound::SampleFormat::Int),
        WavEncoding::Pcm24 => (24, hound::SampleFormat::Int),
        WavEncoding::Float32 => (32, hound::SampleFormat::Float),
    };
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample,
        sample_format,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create WAV file: {}", path.display()))?;

    match encoding {
        WavEncoding::Pcm16 => {
            for &s in samples {
                writer.write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
            }
        }
        WavEncoding::Pcm24 => {
            let max = ((1 << 23) - 1) as f32;
            for &s in samples {
                writer.write_sample((s.clamp(-1.0, 1.0) * max) as i32)?;
            }
        }
        WavEncoding::Float32 => {
            for &s in samples {
                writer.write_sample(s)?;
            }
        }
    }

    writer
        .finalize()
        .with_context(|| format!("Failed to finalize WAV file: {}", path.display()))?;
    Ok(())
}

/// Cut a file down to `keep_bytes`, leaving its header claiming the full
/// length. Produces the truncated-download case.
pub fn truncate_file(path: &Path, keep_bytes: u64) -> Result<()> {
    let file = OpenOptions::new()
        .write(true)
        .open(path)
        .with_context(|| format!("Failed to open {} for truncation", path.display()))?;
    file.set_len(keep_bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sine_amplitude() {
        let s = sine(1000.0, 8000, 8, 0.5);
        assert_eq!(s.len(), 8);
        assert!(s[0].abs() < 1e-6);
        assert!((s[2] - 0.5).abs() < 1e-5); // quarter period
    }

    #[test]
    fn test_noise_is_deterministic_and_bounded() {
        let a = white_noise(42, 1000, 0.8);
        let b = white_noise(42, 1000, 0.8);
        assert_eq!(a, b);
        assert_ne!(a, white_noise(43, 1000, 0.8));
        assert!(a.iter().all(|&s| s.abs() <= 0.8));
    }

    #[test]
    fn test_interleave() {
        let out = interleave(&[vec![1.0, 2.0], vec![-1.0, -2.0, -3.0]]);
        assert_eq!(out, vec![1.0, -1.0, 2.0, -2.0]);
    }

    #[test]
    fn test_chirp_length() {
        let c = chirp(100.0, 1000.0, 8000, 800, 1.0);
        assert_eq!(c.len(), 800);
        assert!(c.iter().all(|s| s.abs() <= 1.0));
    }
}
