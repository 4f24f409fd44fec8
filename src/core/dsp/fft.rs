//! Windowed real FFT producing spectrogram columns

use num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use serde::Serialize;
use std::sync::Arc;

use super::windows::WindowFunction;
use crate::config::{AnalysisConfig, Scaling};
use crate::core::batcher::AnalysisWindow;

/// Smallest magnitude considered by dB scaling (-100 dB)
pub const AMPLITUDE_FLOOR: f32 = 1e-5;

/// One time slice of the spectrogram
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpectrogramColumn {
    /// Stream index of the first sample of the source window
    pub time_offset: u64,
    /// `time_offset` in seconds
    pub time_secs: f64,
    pub channel: usize,
    /// `window_size / 2 + 1` values, lowest frequency first
    pub frequency_bins: Vec<f32>,
    pub scaling_used: Scaling,
    /// Built from the zero-padded tail window
    pub partial: bool,
}

impl SpectrogramColumn {
    /// Index and value of the strongest bin
    pub fn peak_bin(&self) -> Option<(usize, f32)> {
        self.frequency_bins
            .iter()
            .copied()
            .enumerate()
            .fold(None, |best, (i, v)| match best {
                Some((_, b)) if b >= v => best,
                _ => Some((i, v)),
            })
    }
}

/// Transforms analysis windows into spectrogram columns.
///
/// Holds only the FFT plan, the window coefficients and scratch buffers,
/// so the output depends on nothing but the input window and the
/// configuration.
pub struct SpectrogramComputer {
    fft: Arc<dyn RealToComplex<f32>>,
    window_function: WindowFunction,
    window: Vec<f32>,
    scaling: Scaling,
    sample_rate: u32,
    input: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl SpectrogramComputer {
    pub fn new(config: &AnalysisConfig, sample_rate: u32) -> Self {
        let size = config.window_size;
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(size);
        let input = fft.make_input_vec();
        let spectrum = fft.make_output_vec();
        let scratch = fft.make_scratch_vec();

        Self {
            fft,
            window_function: config.window_function,
            window: config.window_function.generate(size),
            scaling: config.scaling,
            sample_rate,
            input,
            spectrum,
            scratch,
        }
    }

    pub fn window_size(&self) -> usize {
        self.window.len()
    }

    pub fn bin_count(&self) -> usize {
        self.window.len() / 2 + 1
    }

    /// Window, transform, take magnitudes and scale
    pub fn transform(&mut self, window: &AnalysisWindow) -> SpectrogramColumn {
        debug_assert_eq!(window.window_function, self.window_function);

        for (dst, (&s, &w)) in self
            .input
            .iter_mut()
            .zip(window.samples.iter().zip(self.window.iter()))
        {
            *dst = s * w;
        }
        // Short input is zero-padded
        let filled = window.samples.len().min(self.input.len());
        self.input[filled..].fill(0.0);

        // Lengths always match the plan, so this cannot fail
        if let Err(e) = self
            .fft
            .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch)
        {
            log::error!("FFT failed: {}", e);
            self.spectrum.fill(Complex::new(0.0, 0.0));
        }

        let scaling = self.scaling;
        let frequency_bins = self
            .spectrum
            .iter()
            .map(|c| scale_magnitude(c.norm(), scaling))
            .collect();

        SpectrogramColumn {
            time_offset: window.offset,
            time_secs: window.offset as f64 / self.sample_rate.max(1) as f64,
            channel: window.channel,
            frequency_bins,
            scaling_used: scaling,
            partial: window.partial,
        }
    }
}

/// Apply the configured scaling to one magnitude
pub fn scale_magnitude(magnitude: f32, scaling: Scaling) -> f32 {
    match scaling {
        Scaling::Linear => magnitude,
        Scaling::LogDb => 20.0 * magnitude.max(AMPLITUDE_FLOOR).log10(),
    }
}
