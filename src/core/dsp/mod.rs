//! Digital Signal Processing utilities

mod fft;
mod windows;

pub use fft::{scale_magnitude, SpectrogramColumn, SpectrogramComputer, AMPLITUDE_FLOOR};
pub use windows::WindowFunction;
