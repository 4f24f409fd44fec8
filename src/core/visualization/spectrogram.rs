// src/core/visualization/spectrogram.rs
//
// Spectrogram image export. Consumes published columns one at a time, so it
// can sit behind a live session just like a renderer.

use anyhow::{bail, Result};
use image::{ImageBuffer, Rgb};
use std::path::Path;

use crate::config::Scaling;
use crate::core::dsp::{scale_magnitude, SpectrogramColumn};

/// Image export configuration
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Output width; `None` gives one pixel per column, capped at `max_width`
    pub width: Option<u32>,
    pub max_width: u32,
    pub height: u32,
    pub min_db: f32,
    pub max_db: f32,
    /// Mel-spaced frequency axis instead of linear
    pub mel_scale: bool,
    pub colormap: Colormap,
    /// Lane to render when columns are per channel
    pub channel: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            width: None,
            max_width: 4000,
            height: 400,
            min_db: -90.0,
            max_db: 40.0,
            mel_scale: false,
            colormap: Colormap::Viridis,
            channel: 0,
        }
    }
}

/// Color map for spectrogram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colormap {
    Viridis,
    Grayscale,
}

impl Default for Colormap {
    fn default() -> Self {
        Self::Viridis
    }
}

/// Accumulates columns reduced to `height` rows, then renders a PNG.
///
/// Only the reduced rows are kept, so memory grows with the column count
/// times the image height rather than the bin count.
pub struct SpectrogramImage {
    config: ExportConfig,
    sample_rate: u32,
    rows: Vec<Vec<f32>>,
}

impl SpectrogramImage {
    pub fn new(config: ExportConfig, sample_rate: u32) -> Self {
        Self {
            config,
            sample_rate,
            rows: Vec::new(),
        }
    }

    pub fn column_count(&self) -> usize {
        self.rows.len()
    }

    /// Add one column; columns of other lanes are ignored
    pub fn push(&mut self, column: &SpectrogramColumn) {
        if column.channel != self.config.channel || column.frequency_bins.is_empty() {
            return;
        }

        let bins = column.frequency_bins.len();
        let height = self.config.height as usize;
        let nyquist = self.sample_rate as f32 / 2.0;

        let row: Vec<f32> = (0..height)
            .map(|y| {
                // y = 0 is the lowest frequency
                let frac = y as f32 / height as f32;
                let bin = if self.config.mel_scale {
                    let freq = mel_to_freq(frac * freq_to_mel(nyquist));
                    (freq / nyquist * (bins - 1) as f32) as usize
                } else {
                    (frac * bins as f32) as usize
                };
                let value = column.frequency_bins[bin.min(bins - 1)];
                match column.scaling_used {
                    Scaling::LogDb => value,
                    Scaling::Linear => scale_magnitude(value, Scaling::LogDb),
                }
            })
            .collect();

        self.rows.push(row);
    }

    /// Render the accumulated columns to an image file
    pub fn save(&self, output_path: &Path) -> Result<()> {
        if self.rows.is_empty() {
            bail!("No spectrogram columns to render");
        }

        let columns = self.rows.len();
        let width = self
            .config
            .width
            .unwrap_or_else(|| (columns as u32).min(self.config.max_width))
            .max(1);
        let height = self.config.height;

        let mut img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::new(width, height);
        let x_scale = columns as f32 / width as f32;
        let range = (self.config.max_db - self.config.min_db).max(f32::EPSILON);

        for x in 0..width {
            // Several columns per pixel: keep the loudest
            let first = ((x as f32 * x_scale) as usize).min(columns - 1);
            let last = (((x + 1) as f32 * x_scale) as usize).clamp(first + 1, columns);

            for y in 0..height {
                let row = (height - 1 - y) as usize;
                let db = self.rows[first..last]
                    .iter()
                    .map(|r| r[row])
                    .fold(f32::NEG_INFINITY, f32::max);
                let normalized = (db.clamp(self.config.min_db, self.config.max_db) - self.config.min_db) / range;
                img.put_pixel(x, y, self.config.colormap.color(normalized));
            }
        }

        img.save(output_path)?;
        Ok(())
    }
}

impl Colormap {
    fn color(&self, value: f32) -> Rgb<u8> {
        let v = value.clamp(0.0, 1.0);
        match self {
            Colormap::Viridis => {
                let r = (68.0 + v * (235.0 - 68.0)) as u8;
                let g = (1.0 + v * (237.0 - 1.0)) as u8;
                let b = (84.0 + v * (32.0 - 84.0 + (1.0 - v) * 150.0)) as u8;
                Rgb([r, g, b])
            }
            Colormap::Grayscale => {
                let l = (v * 255.0) as u8;
                Rgb([l, l, l])
            }
        }
    }
}

fn freq_to_mel(freq: f32) -> f32 {
    2595.0 * (1.0 + freq / 700.0).log10()
}

fn mel_to_freq(mel: f32) -> f32 {
    700.0 * (10.0_f32.powf(mel / 2595.0) - 1.0)
}
