//! Hann analysis window
//!
//! Coefficients are computed once when the pipeline is built and shared
//! read-only by every cycle.

use std::f32::consts::PI;

use crate::FRAME_SIZE;

/// Precomputed `sin²(i·π/N)` multipliers for an `N = FRAME_SIZE` frame.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowCoefficients {
    coeffs: [f32; FRAME_SIZE],
}

impl WindowCoefficients {
    /// Build the Hann window used by the sampler.
    pub fn hann() -> Self {
        let mut coeffs = [0.0; FRAME_SIZE];
        for (i, c) in coeffs.iter_mut().enumerate() {
            let s = (i as f32 * PI / FRAME_SIZE as f32).sin();
            *c = s * s;
        }
        WindowCoefficients { coeffs }
    }

    /// Multiplier for sample `i`.
    #[inline]
    pub fn coefficient(&self, i: usize) -> f32 {
        self.coeffs[i]
    }

    /// All multipliers in sample order.
    pub fn as_slice(&self) -> &[f32] {
        &self.coeffs
    }

    /// Window a centred frame in place: `frame[i] *= window[i]`.
    pub fn apply(&self, frame: &mut [f32; FRAME_SIZE]) {
        for (s, &w) in frame.iter_mut().zip(self.coeffs.iter()) {
            *s *= w;
        }
    }
}

impl Default for WindowCoefficients {
    fn default() -> Self {
        Self::hann()
    }
}
