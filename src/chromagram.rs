//! Chromagram
//!
//! Folds ranked spectral peaks into a 12-bin pitch-class histogram.
//!
//! Each peak frequency is placed in the octave band that contains it,
//! normalised to `0..=255` within that band and quantised against a fixed
//! table of 13 thresholds approximating equal temperament. The last bucket
//! wraps to C, so a note slightly flat of the next octave's C still votes
//! for C. Stronger peaks vote with more weight.

use crate::chord_detector::NoteName;
use crate::peaks::{PeakList, MAX_PEAKS};

/// Number of pitch classes.
pub const SEMITONES: usize = 12;

/// Upper bucket bounds (inclusive) over the normalised band position.
/// Bucket 12 is the wraparound into the next octave's C.
pub const QUANTIZATION_TABLE: [u8; SEMITONES + 1] =
    [8, 23, 40, 57, 76, 96, 116, 138, 162, 187, 213, 241, 255];

/// Lower edges of the octave bands, in Hz. Each band spans `[base, 2·base]`.
pub const BASE_FREQUENCIES: [f32; 5] = [65.4, 130.8, 261.6, 523.25, 1046.0];

/// Peaks above this frequency are ignored.
pub const MAX_FREQUENCY: f32 = 1040.0;

const NORM_SCALE: f32 = 255.0;

/// Accumulated vote weight per pitch class, index 0 is C.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct PitchHistogram {
    weights: [u32; SEMITONES],
}

impl PitchHistogram {
    /// An all-zero histogram.
    pub fn new() -> Self {
        Self::default()
    }

    /// A histogram with the given weights.
    pub fn from_weights(weights: [u32; SEMITONES]) -> Self {
        PitchHistogram { weights }
    }

    /// Weight of pitch class `class` (taken modulo 12).
    #[inline]
    pub fn get(&self, class: usize) -> u32 {
        self.weights[class % SEMITONES]
    }

    /// All weights, index 0 is C.
    pub fn weights(&self) -> &[u32; SEMITONES] {
        &self.weights
    }

    /// Add `weight` to pitch class `class` (taken modulo 12).
    pub fn add(&mut self, class: usize, weight: u32) {
        let slot = &mut self.weights[class % SEMITONES];
        *slot = slot.saturating_add(weight);
    }

    /// Reset every bucket to zero.
    pub fn clear(&mut self) {
        self.weights = [0; SEMITONES];
    }

    /// Whether no peak voted this cycle.
    pub fn is_empty(&self) -> bool {
        self.weights.iter().all(|&w| w == 0)
    }

    /// The heaviest pitch class; the lowest index wins ties.
    pub fn dominant(&self) -> Option<NoteName> {
        let mut best = 0;
        let mut best_idx = None;
        for (i, &w) in self.weights.iter().enumerate() {
            if w > best {
                best = w;
                best_idx = Some(i);
            }
        }
        best_idx.map(NoteName::from_idx)
    }
}

/// Position of `freq` inside its octave band on a `0..=255` scale.
///
/// Returns `None` for non-positive frequencies, frequencies above
/// [`MAX_FREQUENCY`], and frequencies no band contains.
pub fn normalize_frequency(freq: f32) -> Option<f32> {
    if !(freq > 0.0 && freq <= MAX_FREQUENCY) {
        return None;
    }
    let base = BASE_FREQUENCIES
        .iter()
        .copied()
        .find(|&base| base <= freq && freq <= base * 2.0)?;

    let norm = (freq / base - 1.0) * NORM_SCALE;
    (norm <= NORM_SCALE).then_some(norm)
}

/// Bucket `0..=12` of a normalised band position: the first threshold that is
/// `>= norm`. `None` above the last threshold.
pub fn quantize(norm: f32) -> Option<usize> {
    QUANTIZATION_TABLE
        .iter()
        .position(|&threshold| norm <= f32::from(threshold))
}

/// Pitch class `0..12` of a frequency, with bucket 12 folded onto C.
pub fn pitch_class(freq: f32) -> Option<usize> {
    let bucket = quantize(normalize_frequency(freq)?)?;
    Some(bucket % SEMITONES)
}

/// Vote weight of the peak at `rank`: 8 for the strongest down to 1.
#[inline]
pub fn rank_weight(rank: usize) -> u32 {
    MAX_PEAKS.saturating_sub(rank) as u32
}

/// Maps ranked peaks onto a [`PitchHistogram`].
#[derive(Debug, Default, Copy, Clone)]
pub struct PitchMapper;

impl PitchMapper {
    /// Add one vote per in-range peak to `histogram`, weighted by rank.
    /// Peaks outside every octave band keep their rank but cast no vote.
    pub fn accumulate(&self, peaks: &PeakList, histogram: &mut PitchHistogram) {
        for (rank, peak) in peaks.as_slice().iter().enumerate() {
            if let Some(class) = pitch_class(peak.frequency) {
                histogram.add(class, rank_weight(rank));
            }
        }
    }
}
