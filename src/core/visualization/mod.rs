//! Visualization tools for analysis results
//!
//! Renders a stream of spectrogram columns to an image file.

mod spectrogram;

pub use spectrogram::{Colormap, ExportConfig, SpectrogramImage};
