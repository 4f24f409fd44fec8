//! Window function implementations

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Tapering function applied to each analysis window before the transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowFunction {
    /// No tapering
    Rect,
    Hann,
    Hamming,
    Blackman,
    BlackmanHarris,
}

impl Default for WindowFunction {
    fn default() -> Self {
        Self::Hann
    }
}

impl WindowFunction {
    pub fn all() -> [Self; 5] {
        [
            Self::Rect,
            Self::Hann,
            Self::Hamming,
            Self::Blackman,
            Self::BlackmanHarris,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Rect => "rect",
            Self::Hann => "hann",
            Self::Hamming => "hamming",
            Self::Blackman => "blackman",
            Self::BlackmanHarris => "blackman_harris",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().replace('-', "_").as_str() {
            "rect" | "rectangular" | "boxcar" => Some(Self::Rect),
            "hann" | "hanning" => Some(Self::Hann),
            "hamming" => Some(Self::Hamming),
            "blackman" => Some(Self::Blackman),
            "blackman_harris" | "blackmanharris" => Some(Self::BlackmanHarris),
            _ => None,
        }
    }

    /// Generate periodic window coefficients of the given length.
    ///
    /// The periodic form (denominator `size`, not `size - 1`) is the one
    /// suited to overlapping STFT frames.
    pub fn generate(&self, size: usize) -> Vec<f32> {
        let n = size as f32;
        (0..size)
            .map(|i| {
                let x = 2.0 * PI * i as f32 / n;
                match self {
                    Self::Rect => 1.0,
                    Self::Hann => 0.5 * (1.0 - x.cos()),
                    Self::Hamming => 0.54 - 0.46 * x.cos(),
                    Self::Blackman => 0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos(),
                    Self::BlackmanHarris => {
                        0.35875 - 0.48829 * x.cos() + 0.14128 * (2.0 * x).cos()
                            - 0.01168 * (3.0 * x).cos()
                    }
                }
            })
            .collect()
    }
}

impl std::fmt::Display for WindowFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
