//! CLI argument parsing with preset support

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{AnalysisConfig, AnalysisPreset, Backpressure, ChannelMix, ConfigBuilder, Scaling};
use crate::core::WindowFunction;
use crate::error::Result;
use crate::testgen::WavEncoding;

#[derive(Parser, Debug)]
#[command(name = "spectrum-weaver")]
#[command(version, about = "Stream an audio file into spectrogram columns")]
pub struct Cli {
    /// Verbose logging (repeat for trace output)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Analyze an audio file and report its spectrogram columns
    Analyze(AnalyzeArgs),
    /// Write a synthetic test tone to a WAV file
    Tone(ToneArgs),
    /// List available analysis presets
    Presets,
}

#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Audio file to analyze
    pub file: PathBuf,

    /// Analysis preset (standard, detailed, fast, speech)
    #[arg(short, long, default_value = "standard", value_parser = parse_preset)]
    pub preset: AnalysisPreset,

    /// JSON configuration file; replaces the preset
    #[arg(short, long, env = "SPECTRUM_WEAVER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Transform window length in samples
    #[arg(long)]
    pub window_size: Option<usize>,

    /// Stride between windows in samples
    #[arg(long)]
    pub hop_size: Option<usize>,

    /// Decode chunk length in sample frames
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Window function (rect, hann, hamming, blackman, blackman_harris)
    #[arg(long, value_parser = parse_window)]
    pub window: Option<WindowFunction>,

    /// Magnitude scaling (linear, db)
    #[arg(long, value_parser = parse_scaling)]
    pub scaling: Option<Scaling>,

    /// One column stream per channel instead of a mono downmix
    #[arg(long)]
    pub per_channel: bool,

    /// Result channel capacity in columns
    #[arg(long)]
    pub capacity: Option<usize>,

    /// Evict the oldest buffered column instead of stalling the decoder
    #[arg(long)]
    pub drop_oldest: bool,

    /// Columns handed to the renderer per batch
    #[arg(long)]
    pub batch: Option<usize>,

    /// Print every event as a JSON line
    #[arg(long)]
    pub json: bool,

    /// Render the spectrogram to a PNG file
    #[arg(long)]
    pub png: Option<PathBuf>,

    /// Mel-spaced frequency axis in the PNG
    #[arg(long, requires = "png")]
    pub mel: bool,

    /// PNG height in pixels
    #[arg(long, default_value = "400", requires = "png")]
    pub height: u32,
}

#[derive(Args, Debug, Clone)]
pub struct ToneArgs {
    /// Output WAV file
    pub output: PathBuf,

    /// Tone frequency in Hz
    #[arg(short, long, default_value = "440")]
    pub freq: f32,

    /// Duration in seconds
    #[arg(short, long, default_value = "5.0")]
    pub duration: f32,

    #[arg(long, default_value = "44100")]
    pub sample_rate: u32,

    #[arg(long, default_value = "1")]
    pub channels: u16,

    /// Sample encoding (pcm16, pcm24, float32)
    #[arg(long, default_value = "pcm16", value_parser = parse_encoding)]
    pub encoding: WavEncoding,

    /// Sweep up to this frequency instead of a steady tone
    #[arg(long)]
    pub sweep_to: Option<f32>,
}

impl AnalyzeArgs {
    /// Resolve the preset or config file, then apply command-line overrides
    pub fn to_config(&self) -> Result<AnalysisConfig> {
        let base = match &self.config {
            Some(path) => AnalysisConfig::from_json_file(path)?,
            None => AnalysisConfig::from_preset(self.preset),
        };

        let mut builder = ConfigBuilder::from_config(base);
        if let Some(n) = self.window_size {
            builder = builder.window_size(n);
        }
        if let Some(n) = self.hop_size {
            builder = builder.hop_size(n);
        }
        if let Some(n) = self.chunk_size {
            builder = builder.chunk_size(n);
        }
        if let Some(w) = self.window {
            builder = builder.window_function(w);
        }
        if let Some(s) = self.scaling {
            builder = builder.scaling(s);
        }
        if self.per_channel {
            builder = builder.channel_mix(ChannelMix::PerChannel);
        }
        if let Some(n) = self.capacity {
            builder = builder.channel_capacity(n);
        }
        if self.drop_oldest {
            builder = builder.backpressure(Backpressure::DropOldest);
        }
        if let Some(n) = self.batch {
            builder = builder.column_batch(n);
        }
        builder.build()
    }
}

fn parse_preset(s: &str) -> std::result::Result<AnalysisPreset, String> {
    AnalysisPreset::from_name(s).ok_or_else(|| format!("Unknown preset: {}", s))
}

fn parse_window(s: &str) -> std::result::Result<WindowFunction, String> {
    WindowFunction::from_name(s).ok_or_else(|| format!("Unknown window function: {}", s))
}

fn parse_scaling(s: &str) -> std::result::Result<Scaling, String> {
    Scaling::from_name(s).ok_or_else(|| format!("Unknown scaling: {}", s))
}

fn parse_encoding(s: &str) -> std::result::Result<WavEncoding, String> {
    WavEncoding::from_name(s).ok_or_else(|| format!("Unknown encoding: {}", s))
}

/// Print available presets
pub fn print_presets() {
    println!("Available analysis presets:\n");

    for preset in AnalysisPreset::all() {
        let config = AnalysisConfig::from_preset(preset);
        println!("  {} - {}", preset.name(), preset.description());
        println!(
            "    Window: {} samples ({}), hop {}",
            config.window_size, config.window_function, config.hop_size
        );
        println!(
            "    Buffer: {} columns, {}, batches of {}",
            config.channel_capacity,
            config.backpressure.name(),
            config.column_batch
        );
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("spectrum-weaver").chain(args.iter().copied())).unwrap()
    }

    fn analyze(args: &[&str]) -> AnalyzeArgs {
        let mut full = vec!["analyze"];
        full.extend_from_slice(args);
        match parse(&full).command {
            Command::Analyze(a) => a,
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_preset() {
        let args = analyze(&["--preset", "speech", "test.flac"]);
        let config = args.to_config().unwrap();
        assert_eq!(config, AnalysisConfig::from_preset(AnalysisPreset::Speech));
        assert_eq!(args.file, PathBuf::from("test.flac"));
    }

    #[test]
    fn test_overrides_apply_on_top_of_preset() {
        let args = analyze(&[
            "--window-size",
            "1024",
            "--hop-size",
            "256",
            "--window",
            "hamming",
            "--scaling",
            "linear",
            "--per-channel",
            "--drop-oldest",
            "x.wav",
        ]);
        let config = args.to_config().unwrap();
        assert_eq!(config.window_size, 1024);
        assert_eq!(config.hop_size, 256);
        assert_eq!(config.window_function, WindowFunction::Hamming);
        assert_eq!(config.scaling, Scaling::Linear);
        assert_eq!(config.channel_mix, ChannelMix::PerChannel);
        assert_eq!(config.backpressure, Backpressure::DropOldest);
    }

    #[test]
    fn test_invalid_override_rejected() {
        let args = analyze(&["--hop-size", "4096", "--window-size", "1024", "x.wav"]);
        assert!(args.to_config().is_err());
    }

    #[test]
    fn test_batch_override() {
        let config = analyze(&["--batch", "4", "x.wav"]).to_config().unwrap();
        assert_eq!(config.column_batch, 4);
        assert!(analyze(&["--batch", "0", "x.wav"]).to_config().is_err());
    }

    #[test]
    fn test_unknown_preset() {
        let result = Cli::try_parse_from(["spectrum-weaver", "analyze", "--preset", "invalid", "x.wav"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_tone_defaults() {
        match parse(&["tone", "out.wav"]).command {
            Command::Tone(t) => {
                assert_eq!(t.freq, 440.0);
                assert_eq!(t.sample_rate, 44100);
                assert_eq!(t.encoding, WavEncoding::Pcm16);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
