// src/core/source.rs
//
// Pull-based sample sources feeding the analysis pipeline.

use serde::Serialize;

use super::decoder::FormatKind;
use crate::config::ChannelMix;
use crate::error::Result;

/// Immutable description of an opened stream
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioMetadata {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels in the source
    pub channels: usize,
    /// Total sample frames (per channel), when the container declares it
    pub total_frames: Option<u64>,
    /// Duration in seconds, when the total is known
    pub duration_secs: Option<f64>,
    /// Container detected by sniffing, `None` for in-memory sources
    pub format: Option<FormatKind>,
    pub codec_name: String,
    /// Container tags as `(key, value)` pairs
    pub tags: Vec<(String, String)>,
}

impl AudioMetadata {
    pub fn new(sample_rate: u32, channels: usize, total_frames: Option<u64>) -> Self {
        let duration_secs = total_frames.map(|n| n as f64 / sample_rate.max(1) as f64);
        Self {
            sample_rate,
            channels,
            total_frames,
            duration_secs,
            format: None,
            codec_name: "pcm_f32".to_string(),
            tags: Vec::new(),
        }
    }
}

/// Stream metadata plus the decode cursor
#[derive(Debug, Clone)]
pub struct AudioStream {
    pub metadata: AudioMetadata,
    position: u64,
}

impl AudioStream {
    pub fn new(metadata: AudioMetadata) -> Self {
        Self {
            metadata,
            position: 0,
        }
    }

    /// Sample frames decoded so far
    pub fn position(&self) -> u64 {
        self.position
    }

    pub(crate) fn advance(&mut self, frames: u64) {
        self.position += frames;
    }

    /// Fraction of the stream decoded, when the total is known
    pub fn fraction_decoded(&self) -> Option<f64> {
        match self.metadata.total_frames {
            Some(0) => Some(1.0),
            Some(total) => Some((self.position as f64 / total as f64).min(1.0)),
            None => None,
        }
    }
}

/// A run of decoded samples starting at `start`, one lane per output channel
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Index of the first sample frame in the stream
    pub start: u64,
    /// Planar samples. Every lane has the same length.
    pub lanes: Vec<Vec<f32>>,
}

impl Frame {
    /// Number of sample frames in this chunk
    pub fn len(&self) -> usize {
        self.lanes.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Split interleaved samples into lanes according to `mix`
    pub fn from_interleaved(start: u64, interleaved: &[f32], channels: usize, mix: ChannelMix) -> Self {
        let channels = channels.max(1);
        let frames = interleaved.len() / channels;

        let lanes = match mix {
            ChannelMix::MonoDownmix => {
                if channels == 1 {
                    vec![interleaved[..frames].to_vec()]
                } else {
                    let scale = 1.0 / channels as f32;
                    let mono = interleaved
                        .chunks_exact(channels)
                        .map(|f| f.iter().sum::<f32>() * scale)
                        .collect();
                    vec![mono]
                }
            }
            ChannelMix::PerChannel => {
                let mut lanes = vec![Vec::with_capacity(frames); channels];
                for f in interleaved.chunks_exact(channels) {
                    for (lane, &s) in lanes.iter_mut().zip(f) {
                        lane.push(s);
                    }
                }
                lanes
            }
        };

        Self { start, lanes }
    }
}

/// Sequential, chunked access to decoded audio.
///
/// `decode_next` returns `Ok(None)` once the stream is exhausted. Calls after
/// that keep returning `Ok(None)`.
pub trait SampleSource {
    fn stream(&self) -> &AudioStream;

    /// How channels are laid out in the frames that follow. A session sets
    /// this from its configuration before the first `decode_next`.
    fn set_channel_mix(&mut self, mix: ChannelMix);

    fn decode_next(&mut self, chunk_size: usize) -> Result<Option<Frame>>;
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn stream(&self) -> &AudioStream {
        (**self).stream()
    }

    fn set_channel_mix(&mut self, mix: ChannelMix) {
        (**self).set_channel_mix(mix)
    }

    fn decode_next(&mut self, chunk_size: usize) -> Result<Option<Frame>> {
        (**self).decode_next(chunk_size)
    }
}

/// Source over samples already in memory (synthetic signals, pre-decoded PCM)
pub struct MemorySource {
    stream: AudioStream,
    samples: Vec<f32>,
    channel_mix: ChannelMix,
    cursor: usize,
}

impl MemorySource {
    /// Mono source
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self::interleaved(samples, sample_rate, 1, ChannelMix::MonoDownmix)
    }

    /// Interleaved multi-channel source
    pub fn interleaved(samples: Vec<f32>, sample_rate: u32, channels: usize, mix: ChannelMix) -> Self {
        let channels = channels.max(1);
        let frames = (samples.len() / channels) as u64;
        Self {
            stream: AudioStream::new(AudioMetadata::new(sample_rate, channels, Some(frames))),
            samples,
            channel_mix: mix,
            cursor: 0,
        }
    }

    /// Drop the declared length so progress cannot be computed
    pub fn with_unknown_length(mut self) -> Self {
        self.stream.metadata.total_frames = None;
        self.stream.metadata.duration_secs = None;
        self
    }

    pub fn with_channel_mix(mut self, mix: ChannelMix) -> Self {
        self.channel_mix = mix;
        self
    }
}

impl SampleSource for MemorySource {
    fn stream(&self) -> &AudioStream {
        &self.stream
    }

    fn set_channel_mix(&mut self, mix: ChannelMix) {
        self.channel_mix = mix;
    }

    fn decode_next(&mut self, chunk_size: usize) -> Result<Option<Frame>> {
        let channels = self.stream.metadata.channels;
        let remaining = (self.samples.len() - self.cursor) / channels;
        if remaining == 0 || chunk_size == 0 {
            return Ok(None);
        }

        let frames = remaining.min(chunk_size);
        let end = self.cursor + frames * channels;
        let frame = Frame::from_interleaved(
            self.stream.position(),
            &self.samples[self.cursor..end],
            channels,
            self.channel_mix,
        );

        self.cursor = end;
        self.stream.advance(frames as u64);
        Ok(Some(frame))
    }
}
