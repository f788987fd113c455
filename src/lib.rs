//! # pico_chord
//!
//! A fixed-buffer audio-to-chord pipeline for small microcontrollers: sample a
//! 128-point frame with a self-timed rate, window it, take a radix-2 FFT, pick
//! the strongest spectral peaks, fold them onto 12 pitch classes and report
//! the best matching major or minor triad over a serial link.
//!
//! ## Example
//! ```rust
//! use pico_chord::sim::{SerialBuffer, SimClock, Tone, ToneInput};
//! use pico_chord::{ChordPipeline, CycleOutcome};
//!
//! fn run() -> Result<(), Box<dyn std::error::Error>> {
//!     // C major triad sampled at 1 kHz
//!     let input = ToneInput::new(
//!         1_000.0,
//!         [
//!             Tone::new(261.63, 500.0),
//!             Tone::new(329.63, 500.0),
//!             Tone::new(392.00, 500.0),
//!         ],
//!     );
//!
//!     let mut pipeline = ChordPipeline::builder()
//!         .sample_delay_us(1_000)
//!         .build(input, SerialBuffer::new(), SimClock::new())?;
//!
//!     if let CycleOutcome::Reported(chord) = pipeline.run_cycle()? {
//!         println!("Detected {chord} (score {})", chord.score);
//!     }
//!     assert_eq!(pipeline.serial().contents(), "C\n");
//!
//!     Ok(())
//! }
//! # run().unwrap();
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rust_2018_idioms)]
#![deny(clippy::all)]

/// Number of samples per analysis frame.
pub const FRAME_SIZE: usize = 128;

/// One frame of centred, windowed samples.
pub type Frame = [f32; FRAME_SIZE];

/// Triad matching.
pub use chord_detector::{Chord, ChordDetector, ChordKind, NoteName};

/// Pitch-class histogram.
pub use chromagram::{PitchHistogram, PitchMapper};

/// Hardware collaborators.
pub use hal::{AnalogInput, Clock, SerialOutput};

/// Peak picking.
pub use peaks::{Peak, PeakExtractor, PeakList};

/// The sample-to-chord loop.
pub use pipeline::{
    ChordPipeline, ChordPipelineBuilder, CycleOutcome, PipelineError, PipelineState,
    TransformKind,
};

/// Frame capture.
pub use sampler::{SampleStats, Sampler, SamplerError};

/// Spectral transforms.
pub use spectrum::{Radix2Fft, RustFft, SpectralTransform, Spectrum, SpectrumError};

/// Analysis window.
pub use window::WindowCoefficients;

/// Chord detection module.
pub mod chord_detector;

/// Pitch-class histogram module.
pub mod chromagram;

/// Hardware abstraction module.
pub mod hal;

/// Peak extraction module.
pub mod peaks;

/// Pipeline module.
pub mod pipeline;

/// Frame acquisition module.
pub mod sampler;

/// Host-side simulated hardware.
pub mod sim;

/// Spectral transform module.
pub mod spectrum;

/// Hann window module.
pub mod window;
