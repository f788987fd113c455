//! Peak extraction
//!
//! Finds strict local maxima in the magnitude spectrum, keeps the strongest
//! [`MAX_PEAKS`] and refines each to a sub-bin frequency with a parabola
//! through the peak and its two neighbours.

use crate::spectrum::{Spectrum, SPECTRUM_BINS};

/// Maximum number of peaks retained per cycle.
pub const MAX_PEAKS: usize = 8;

/// Lowest bin searched; bins below are DC and sub-audio leakage.
pub const FIRST_PEAK_BIN: usize = 3;

/// Highest bin searched; its right neighbour is the last bin.
pub const LAST_PEAK_BIN: usize = SPECTRUM_BINS - 2;

/// A ranked spectral peak.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Peak {
    /// Bin index of the local maximum.
    pub bin: usize,
    /// Raw magnitude at `bin`, used for ranking.
    pub magnitude: f32,
    /// Refined frequency in Hz.
    pub frequency: f32,
}

const EMPTY_PEAK: Peak = Peak {
    bin: 0,
    magnitude: 0.0,
    frequency: 0.0,
};

/// Up to [`MAX_PEAKS`] peaks, strongest first.
#[derive(Debug, Clone, PartialEq)]
pub struct PeakList {
    peaks: [Peak; MAX_PEAKS],
    len: usize,
}

impl PeakList {
    /// An empty list.
    pub fn new() -> Self {
        PeakList {
            peaks: [EMPTY_PEAK; MAX_PEAKS],
            len: 0,
        }
    }

    /// Number of peaks held.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no peak was found.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Peaks in rank order; index 0 is the strongest.
    pub fn as_slice(&self) -> &[Peak] {
        &self.peaks[..self.len]
    }

    /// Drop all peaks.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Insert `peak` by descending magnitude. Equal magnitudes keep arrival
    /// order; once full, a peak weaker than or equal to the last is dropped.
    pub fn insert_ranked(&mut self, peak: Peak) {
        let pos = self
            .as_slice()
            .iter()
            .position(|p| peak.magnitude > p.magnitude)
            .unwrap_or(self.len);
        if pos >= MAX_PEAKS {
            return;
        }

        let end = (self.len + 1).min(MAX_PEAKS);
        self.peaks.copy_within(pos..end - 1, pos + 1);
        self.peaks[pos] = peak;
        self.len = end;
    }
}

impl Default for PeakList {
    fn default() -> Self {
        Self::new()
    }
}

/// Vertex offset, in bins, of the parabola through three equally spaced
/// magnitudes. `None` when the points are collinear.
pub fn parabolic_offset(left: f32, centre: f32, right: f32) -> Option<f32> {
    let denom = left - 2.0 * centre + right;
    if denom == 0.0 || !denom.is_finite() {
        return None;
    }
    Some(0.5 * (left - right) / denom)
}

/// Stateless local-maximum search over a [`Spectrum`].
#[derive(Debug, Default, Copy, Clone)]
pub struct PeakExtractor;

impl PeakExtractor {
    /// Fill `peaks` with the strongest local maxima of `spectrum`.
    pub fn extract(&self, spectrum: &Spectrum, peaks: &mut PeakList) {
        peaks.clear();
        let m = spectrum.magnitudes();

        for i in FIRST_PEAK_BIN..=LAST_PEAK_BIN {
            if !(m[i] > m[i - 1] && m[i] > m[i + 1]) {
                continue;
            }

            // flat top: keep the unrefined bin
            let offset = parabolic_offset(m[i - 1], m[i], m[i + 1]).unwrap_or(0.0);
            peaks.insert_ranked(Peak {
                bin: i,
                magnitude: m[i],
                frequency: spectrum.frequency_at(i as f32 + offset),
            });
        }
    }
}
