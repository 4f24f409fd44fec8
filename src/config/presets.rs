// src/config/presets.rs
//
// Session configuration, named presets and a fluent builder.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::dsp::WindowFunction;
use crate::error::{Result, SpectroError};

/// Largest transform length accepted by `validate`
pub const MAX_WINDOW_SIZE: usize = 1 << 18;
/// Smallest transform length accepted by `validate`
pub const MIN_WINDOW_SIZE: usize = 16;

/// Magnitude scaling applied to each column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scaling {
    /// Raw magnitudes
    Linear,
    /// `20 * log10(magnitude)`, floored at -100 dB
    LogDb,
}

impl Default for Scaling {
    fn default() -> Self {
        Self::LogDb
    }
}

impl Scaling {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::LogDb => "log_db",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "linear" | "lin" => Some(Self::Linear),
            "log_db" | "db" | "log" => Some(Self::LogDb),
            _ => None,
        }
    }
}

/// How multi-channel audio is reduced before windowing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelMix {
    /// Average all channels into one lane
    MonoDownmix,
    /// One lane (and one column stream) per channel
    PerChannel,
}

impl Default for ChannelMix {
    fn default() -> Self {
        Self::MonoDownmix
    }
}

impl ChannelMix {
    pub fn name(&self) -> &'static str {
        match self {
            Self::MonoDownmix => "mono_downmix",
            Self::PerChannel => "per_channel",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().replace('-', "_").as_str() {
            "mono_downmix" | "mono" | "downmix" => Some(Self::MonoDownmix),
            "per_channel" | "channels" | "split" => Some(Self::PerChannel),
            _ => None,
        }
    }

    /// Number of lanes produced for a stream with `channels` channels
    pub fn lanes(&self, channels: usize) -> usize {
        match self {
            Self::MonoDownmix => 1,
            Self::PerChannel => channels.max(1),
        }
    }
}

/// Producer behaviour when the result channel is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backpressure {
    /// Wait for the consumer to make room. No column is ever lost.
    Block,
    /// Evict the oldest buffered column to make room for the newest
    DropOldest,
}

impl Default for Backpressure {
    fn default() -> Self {
        Self::Block
    }
}

impl Backpressure {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::DropOldest => "drop_oldest",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().replace('-', "_").as_str() {
            "block" | "blocking" => Some(Self::Block),
            "drop_oldest" | "drop" => Some(Self::DropOldest),
            _ => None,
        }
    }
}

/// Preset configurations for common use cases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisPreset {
    /// 2048-point Hann window, 75% overlap
    Standard,
    /// Fine frequency resolution for tonal material
    Detailed,
    /// Coarse and cheap, for very long files
    Fast,
    /// Short windows for speech and transients
    Speech,
}

impl AnalysisPreset {
    pub fn all() -> [Self; 4] {
        [Self::Standard, Self::Detailed, Self::Fast, Self::Speech]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Detailed => "detailed",
            Self::Fast => "fast",
            Self::Speech => "speech",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Standard => "Balanced defaults for music",
            Self::Detailed => "High frequency resolution, Blackman-Harris window",
            Self::Fast => "Coarse resolution with little overlap",
            Self::Speech => "Short windows for speech and transients",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "standard" | "default" => Some(Self::Standard),
            "detailed" | "hires" | "high" => Some(Self::Detailed),
            "fast" => Some(Self::Fast),
            "speech" | "voice" => Some(Self::Speech),
            _ => None,
        }
    }
}

/// Full configuration of one analysis session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Decode granularity in sample frames
    pub chunk_size: usize,
    /// Transform window length in samples
    pub window_size: usize,
    /// Stride between successive windows in samples
    pub hop_size: usize,
    pub window_function: WindowFunction,
    pub scaling: Scaling,
    pub channel_mix: ChannelMix,
    /// Maximum number of columns buffered between producer and consumer
    pub channel_capacity: usize,
    pub backpressure: Backpressure,
    /// Most columns in one batch from `AnalysisSession::poll_batch`
    pub column_batch: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self::from_preset(AnalysisPreset::Standard)
    }
}

impl AnalysisConfig {
    pub fn from_preset(preset: AnalysisPreset) -> Self {
        match preset {
            AnalysisPreset::Standard => Self {
                chunk_size: 4096,
                window_size: 2048,
                hop_size: 512,
                window_function: WindowFunction::Hann,
                scaling: Scaling::LogDb,
                channel_mix: ChannelMix::MonoDownmix,
                channel_capacity: 64,
                backpressure: Backpressure::Block,
                column_batch: 16,
            },
            AnalysisPreset::Detailed => Self {
                chunk_size: 16384,
                window_size: 8192,
                hop_size: 1024,
                window_function: WindowFunction::BlackmanHarris,
                channel_capacity: 32,
                ..Self::from_preset(AnalysisPreset::Standard)
            },
            AnalysisPreset::Fast => Self {
                chunk_size: 8192,
                window_size: 1024,
                hop_size: 1024,
                channel_capacity: 128,
                column_batch: 32,
                ..Self::from_preset(AnalysisPreset::Standard)
            },
            AnalysisPreset::Speech => Self {
                chunk_size: 2048,
                window_size: 512,
                hop_size: 128,
                window_function: WindowFunction::Hamming,
                channel_capacity: 256,
                column_batch: 32,
                ..Self::from_preset(AnalysisPreset::Standard)
            },
        }
    }

    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            SpectroError::Configuration(format!("{}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject parameter combinations the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(SpectroError::Configuration(msg));

        if self.window_size == 0 || self.hop_size == 0 || self.chunk_size == 0 {
            return fail(format!(
                "sizes must be positive (chunk_size={}, window_size={}, hop_size={})",
                self.chunk_size, self.window_size, self.hop_size
            ));
        }
        if self.window_size < MIN_WINDOW_SIZE || self.window_size > MAX_WINDOW_SIZE {
            return fail(format!(
                "window_size {} outside [{}, {}]",
                self.window_size, MIN_WINDOW_SIZE, MAX_WINDOW_SIZE
            ));
        }
        if self.window_size % 2 != 0 {
            return fail(format!("window_size {} must be even", self.window_size));
        }
        if self.hop_size > self.window_size {
            return fail(format!(
                "hop_size {} exceeds window_size {}",
                self.hop_size, self.window_size
            ));
        }
        if self.channel_capacity == 0 {
            return fail("channel_capacity must be at least 1".to_string());
        }
        if self.column_batch == 0 {
            return fail("column_batch must be at least 1".to_string());
        }
        Ok(())
    }

    /// Number of frequency bins per column
    pub fn bin_count(&self) -> usize {
        self.window_size / 2 + 1
    }

    pub fn overlap(&self) -> usize {
        self.window_size.saturating_sub(self.hop_size)
    }

    /// Centre frequency in Hz of every bin
    pub fn bin_frequencies(&self, sample_rate: u32) -> Vec<f32> {
        let resolution = sample_rate as f32 / self.window_size as f32;
        (0..self.bin_count()).map(|k| k as f32 * resolution).collect()
    }

    /// Number of columns a single lane of `total_frames` samples produces,
    /// including the zero-padded tail window.
    pub fn expected_columns(&self, total_frames: u64) -> u64 {
        let window = self.window_size as u64;
        let hop = self.hop_size as u64;

        if total_frames == 0 {
            return 0;
        }
        if total_frames <= window {
            return 1;
        }

        let full = (total_frames - window) / hop + 1;
        let covered = (full - 1) * hop + window;
        if total_frames > covered {
            full + 1
        } else {
            full
        }
    }
}

/// Fluent builder over `AnalysisConfig`
pub struct ConfigBuilder {
    config: AnalysisConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AnalysisConfig::default(),
        }
    }

    pub fn from_preset(preset: AnalysisPreset) -> Self {
        Self {
            config: AnalysisConfig::from_preset(preset),
        }
    }

    /// Start from an existing configuration, e.g. one loaded from JSON
    pub fn from_config(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn chunk_size(mut self, samples: usize) -> Self {
        self.config.chunk_size = samples;
        self
    }

    /// Set the window length. The hop is left as is; `build` rejects a hop
    /// longer than the window.
    pub fn window_size(mut self, samples: usize) -> Self {
        self.config.window_size = samples;
        self
    }

    pub fn hop_size(mut self, samples: usize) -> Self {
        self.config.hop_size = samples;
        self
    }

    pub fn window_function(mut self, window_function: WindowFunction) -> Self {
        self.config.window_function = window_function;
        self
    }

    pub fn scaling(mut self, scaling: Scaling) -> Self {
        self.config.scaling = scaling;
        self
    }

    pub fn channel_mix(mut self, mix: ChannelMix) -> Self {
        self.config.channel_mix = mix;
        self
    }

    pub fn channel_capacity(mut self, columns: usize) -> Self {
        self.config.channel_capacity = columns;
        self
    }

    pub fn backpressure(mut self, policy: Backpressure) -> Self {
        self.config.backpressure = policy;
        self
    }

    pub fn column_batch(mut self, columns: usize) -> Self {
        self.config.column_batch = columns;
        self
    }

    /// Validate and return the configuration
    pub fn build(self) -> Result<AnalysisConfig> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Return the configuration without validating it
    pub fn build_unchecked(self) -> AnalysisConfig {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
