//! Configuration module for SpectrumWeaver

mod presets;

pub use presets::{
    AnalysisConfig, AnalysisPreset, Backpressure, ChannelMix, ConfigBuilder, Scaling,
};
