//! Chord Detector
//!
//! Scores the 12 major and 12 minor triads against a pitch-class histogram.
//!
//! A template's score is the product of the histogram weights at its three
//! pitch classes, so a triad only scores when all three notes voted. Roots
//! are scanned from C upwards, major before minor, and only a strictly
//! greater score replaces the running best.

use std::fmt::Display;

use crate::chromagram::{PitchHistogram, SEMITONES};

/// Number of chord qualities
const NUM_CHORD_KINDS: usize = 2;

/// Supported chord qualities in scan order, matching `CHORD_INTERVALS`
const CHORD_KINDS: [ChordKind; NUM_CHORD_KINDS] = [ChordKind::Major, ChordKind::Minor];

/// Intervals (in semitones) matching `CHORD_KINDS` order
const CHORD_INTERVALS: [[usize; 3]; NUM_CHORD_KINDS] = [[0, 4, 7], [0, 3, 7]];

const NOTE_NAMES: [&str; SEMITONES] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Serial lines per quality and root, in `CHORD_KINDS` order.
const REPORT_LINES: [[&str; SEMITONES]; NUM_CHORD_KINDS] = [
    [
        "C\n", "C#\n", "D\n", "D#\n", "E\n", "F\n", "F#\n", "G\n", "G#\n", "A\n", "A#\n", "B\n",
    ],
    [
        "Cm\n", "C#m\n", "Dm\n", "D#m\n", "Em\n", "Fm\n", "F#m\n", "Gm\n", "G#m\n", "Am\n",
        "A#m\n", "Bm\n",
    ],
];

/// Represents a musical chord detected from a pitch-class histogram.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Chord {
    /// The root note of the detected chord.
    pub root: NoteName,
    /// Major or minor.
    pub quality: ChordKind,
    /// Product of the template's three histogram weights; 0 means nothing matched.
    pub score: u32,
}

impl Chord {
    /// The fallback reported when no template scores: C major, score 0.
    pub const NONE: Chord = Chord {
        root: NoteName::C,
        quality: ChordKind::Major,
        score: 0,
    };

    /// Whether any template actually matched.
    pub fn is_detected(&self) -> bool {
        self.score > 0
    }

    /// Text label: note name, plus `m` for minor (`"C#"`, `"Am"`).
    pub fn label(&self) -> &'static str {
        let line = self.report_line();
        &line[..line.len() - 1]
    }

    /// The label terminated by a newline, as written to the serial link.
    pub fn report_line(&self) -> &'static str {
        REPORT_LINES[self.quality as usize][self.root.index()]
    }
}

impl Display for Chord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Supported chord qualities
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChordKind {
    /// Major triad (e.g., C-E-G)
    Major,
    /// Minor triad (e.g., C-Eb-G)
    Minor,
}

impl ChordKind {
    /// Semitone offsets of root, third and fifth.
    pub fn intervals(self) -> [usize; 3] {
        CHORD_INTERVALS[self as usize]
    }
}

impl Display for ChordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Twelve chromatic pitch classes
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum NoteName {
    /// C
    C,
    /// C sharp / D flat
    Cs,
    /// D
    D,
    /// D sharp / E flat
    Ds,
    /// E
    E,
    /// F
    F,
    /// F sharp / G flat
    Fs,
    /// G
    G,
    /// G sharp / A flat
    Gs,
    /// A
    A,
    /// A sharp / B flat
    As,
    /// B
    B,
}

impl NoteName {
    /// All pitch classes in index order.
    pub const ALL: [NoteName; SEMITONES] = [
        NoteName::C,
        NoteName::Cs,
        NoteName::D,
        NoteName::Ds,
        NoteName::E,
        NoteName::F,
        NoteName::Fs,
        NoteName::G,
        NoteName::Gs,
        NoteName::A,
        NoteName::As,
        NoteName::B,
    ];

    /// Pitch class for `idx`, taken modulo 12.
    pub const fn from_idx(idx: usize) -> NoteName {
        Self::ALL[idx % SEMITONES]
    }

    /// Pitch-class index, C = 0.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Sharp spelling, e.g. `"F#"`.
    pub const fn as_str(self) -> &'static str {
        NOTE_NAMES[self as usize]
    }
}

impl Display for NoteName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main chord detector
#[derive(Debug, Clone)]
pub struct ChordDetector {
    scores: [[u32; SEMITONES]; NUM_CHORD_KINDS],
}

impl ChordDetector {
    /// Create a detector.
    pub fn new() -> Self {
        ChordDetector {
            scores: [[0; SEMITONES]; NUM_CHORD_KINDS],
        }
    }

    /// Detect the best triad for `histogram`.
    ///
    /// Falls back to [`Chord::NONE`] when every template scores zero.
    pub fn detect_chord(&mut self, histogram: &PitchHistogram) -> Chord {
        self.score_templates(histogram);

        let mut best = Chord::NONE;
        for root in 0..SEMITONES {
            for (kind_idx, &quality) in CHORD_KINDS.iter().enumerate() {
                let score = self.scores[kind_idx][root];
                if score > best.score {
                    best = Chord {
                        root: NoteName::from_idx(root),
                        quality,
                        score,
                    };
                }
            }
        }
        best
    }

    /// Per-root scores of `kind` from the last detection.
    pub fn scores(&self, kind: ChordKind) -> &[u32; SEMITONES] {
        &self.scores[kind as usize]
    }

    fn score_templates(&mut self, histogram: &PitchHistogram) {
        for (kind_idx, intervals) in CHORD_INTERVALS.iter().enumerate() {
            for root in 0..SEMITONES {
                self.scores[kind_idx][root] = score_chord(histogram, root, intervals);
            }
        }
    }
}

/// Score a single chord template against the histogram
#[inline(always)]
fn score_chord(histogram: &PitchHistogram, root: usize, intervals: &[usize; 3]) -> u32 {
    intervals
        .iter()
        .fold(1u32, |acc, &off| acc.saturating_mul(histogram.get(root + off)))
}

impl Default for ChordDetector {
    fn default() -> Self {
        ChordDetector::new()
    }
}
