//! Analysis pipeline
//!
//! Owns the collaborators and every per-cycle buffer, and runs
//! `Idle → Sampling → (GateFail → Idle) | (Analyzing → Reporting → Idle)`.
//! Buffers are allocated once in [`ChordPipelineBuilder::build`] and reused in
//! place; a cycle always finishes before the next begins.

use std::convert::Infallible;

use log::{debug, info, trace};
use thiserror::Error;

use crate::chord_detector::{Chord, ChordDetector};
use crate::chromagram::{PitchHistogram, PitchMapper};
use crate::hal::{AnalogInput, Clock, SerialOutput};
use crate::peaks::{PeakExtractor, PeakList};
use crate::sampler::{SampleStats, Sampler, SamplerError};
use crate::spectrum::{Radix2Fft, RustFft, SpectralTransform, Spectrum, SpectrumError};
use crate::window::WindowCoefficients;
use crate::{Frame, FRAME_SIZE};

/// Errors that end a cycle early.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Frame capture failed.
    #[error(transparent)]
    Sampler(#[from] SamplerError),

    /// The transform rejected the frame.
    #[error(transparent)]
    Spectrum(#[from] SpectrumError),

    /// Writing the chord label failed.
    #[error("serial write failed: {0}")]
    Serial(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Which spectral transform the pipeline runs.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum TransformKind {
    /// In-place radix-2 FFT over fixed buffers.
    #[default]
    Radix2,
    /// `rustfft` plan.
    RustFft,
}

enum Transform {
    Radix2(Radix2Fft),
    RustFft(RustFft),
}

impl Transform {
    fn new(kind: TransformKind) -> Self {
        match kind {
            TransformKind::Radix2 => Transform::Radix2(Radix2Fft::new()),
            TransformKind::RustFft => Transform::RustFft(RustFft::new()),
        }
    }
}

impl SpectralTransform for Transform {
    fn transform(
        &mut self,
        frame: &[f32],
        sample_rate: f32,
        spectrum: &mut Spectrum,
    ) -> Result<(), SpectrumError> {
        match self {
            Transform::Radix2(t) => t.transform(frame, sample_rate, spectrum),
            Transform::RustFft(t) => t.transform(frame, sample_rate, spectrum),
        }
    }
}

/// Where the pipeline is within a cycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PipelineState {
    /// Between cycles.
    Idle,
    /// Capturing a frame.
    Sampling,
    /// The frame was too quiet to analyse.
    GateFail,
    /// Transform, peak picking, pitch mapping and chord matching.
    Analyzing,
    /// Writing the chord label.
    Reporting,
}

/// Result of one completed cycle.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum CycleOutcome {
    /// The noise gate rejected the frame; nothing was written.
    Gated(SampleStats),
    /// A chord label was written.
    Reported(Chord),
}

/// Builder for a [`ChordPipeline`].
#[derive(Debug, Clone)]
pub struct ChordPipelineBuilder {
    sample_delay_us: u32,
    idle_delay_ms: u32,
    adc_shift: u32,
    mid_scale: u16,
    transform: TransformKind,
}

impl ChordPipelineBuilder {
    /// Start with default parameters:
    /// sample_delay_us = 195, idle_delay_ms = 10,
    /// adc_shift = 4, mid_scale = 2048, transform = Radix2.
    pub fn new() -> Self {
        ChordPipelineBuilder {
            sample_delay_us: 195,
            idle_delay_ms: 10,
            adc_shift: 4,
            mid_scale: 2048,
            transform: TransformKind::Radix2,
        }
    }

    /// Set the nominal wait after each analog read.
    pub fn sample_delay_us(mut self, us: u32) -> Self {
        self.sample_delay_us = us;
        self
    }

    /// Set the pause between cycles in [`ChordPipeline::run`].
    pub fn idle_delay_ms(mut self, ms: u32) -> Self {
        self.idle_delay_ms = ms;
        self
    }

    /// Set the right shift from the 16-bit reading to the working depth.
    pub fn adc_shift(mut self, shift: u32) -> Self {
        self.adc_shift = shift;
        self
    }

    /// Set the mid-scale offset subtracted after shifting.
    pub fn mid_scale(mut self, offset: u16) -> Self {
        self.mid_scale = offset;
        self
    }

    /// Select the spectral transform.
    pub fn transform(mut self, kind: TransformKind) -> Self {
        self.transform = kind;
        self
    }

    /// Finalize and create the pipeline around its collaborators.
    ///
    /// Fails with [`SamplerError::Configuration`] when the ADC settings
    /// cannot describe a 16-bit reading.
    pub fn build<A, S, C>(
        self,
        input: A,
        serial: S,
        clock: C,
    ) -> Result<ChordPipeline<A, S, C>, PipelineError>
    where
        A: AnalogInput,
        S: SerialOutput,
        C: Clock,
    {
        let sampler = Sampler::new(self.adc_shift, self.mid_scale, self.sample_delay_us)?;

        Ok(ChordPipeline {
            input,
            serial,
            clock,
            sampler,
            window: WindowCoefficients::hann(),
            transform: Transform::new(self.transform),
            extractor: PeakExtractor,
            mapper: PitchMapper,
            detector: ChordDetector::new(),
            frame: [0.0; FRAME_SIZE],
            spectrum: Spectrum::new(),
            peaks: PeakList::new(),
            histogram: PitchHistogram::new(),
            state: PipelineState::Idle,
            idle_delay_ms: self.idle_delay_ms,
        })
    }
}

impl Default for ChordPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Sample-to-chord loop over an analog input, a serial sink and a clock.
pub struct ChordPipeline<A, S, C> {
    input: A,
    serial: S,
    clock: C,
    sampler: Sampler,
    window: WindowCoefficients,
    transform: Transform,
    extractor: PeakExtractor,
    mapper: PitchMapper,
    detector: ChordDetector,
    frame: Frame,
    spectrum: Spectrum,
    peaks: PeakList,
    histogram: PitchHistogram,
    state: PipelineState,
    idle_delay_ms: u32,
}

impl ChordPipeline<(), (), ()> {
    /// Start customizing with a builder.
    pub fn builder() -> ChordPipelineBuilder {
        ChordPipelineBuilder::new()
    }
}

impl<A, S, C> ChordPipeline<A, S, C>
where
    A: AnalogInput,
    S: SerialOutput,
    C: Clock,
{
    /// Run cycles forever with the idle delay between them. Returns only
    /// when a cycle fails.
    pub fn run(&mut self) -> Result<Infallible, PipelineError> {
        info!("Chord detection ready");
        loop {
            self.run_cycle()?;
            self.clock.delay_ms(self.idle_delay_ms);
        }
    }

    /// Run exactly one cycle. The state is back to [`PipelineState::Idle`]
    /// afterwards, whether the cycle succeeded or not.
    pub fn run_cycle(&mut self) -> Result<CycleOutcome, PipelineError> {
        let outcome = self.cycle();
        self.enter(PipelineState::Idle);
        outcome
    }

    fn cycle(&mut self) -> Result<CycleOutcome, PipelineError> {
        self.enter(PipelineState::Sampling);
        self.histogram.clear();
        self.peaks.clear();

        let stats = self.sampler.capture(
            &mut self.input,
            &mut self.clock,
            &self.window,
            &mut self.frame,
        )?;
        debug!(
            "mean={:.2} rms={:.2} rate={:.1} Hz ({} us)",
            stats.mean, stats.rms, stats.effective_rate, stats.elapsed_us
        );

        if !stats.passes_gate() {
            self.enter(PipelineState::GateFail);
            return Ok(CycleOutcome::Gated(stats));
        }

        self.enter(PipelineState::Analyzing);
        self.transform
            .transform(&self.frame, stats.effective_rate, &mut self.spectrum)?;
        self.extractor.extract(&self.spectrum, &mut self.peaks);
        trace!("peaks: {:?}", self.peaks.as_slice());
        self.mapper.accumulate(&self.peaks, &mut self.histogram);
        trace!("histogram: {:?}", self.histogram.weights());
        let chord = self.detector.detect_chord(&self.histogram);

        self.enter(PipelineState::Reporting);
        debug!("chord {} (score {})", chord, chord.score);
        self.serial
            .write(chord.report_line())
            .map_err(|e| PipelineError::Serial(Box::new(e)))?;

        Ok(CycleOutcome::Reported(chord))
    }

    fn enter(&mut self, state: PipelineState) {
        trace!("{:?} -> {:?}", self.state, state);
        self.state = state;
    }

    /// Current state.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Spectrum of the last analysed frame.
    pub fn spectrum(&self) -> &Spectrum {
        &self.spectrum
    }

    /// Peaks of the last analysed frame.
    pub fn peaks(&self) -> &PeakList {
        &self.peaks
    }

    /// Pitch-class votes of the last cycle; all zero after a gated cycle.
    pub fn histogram(&self) -> &PitchHistogram {
        &self.histogram
    }

    /// The analog input.
    pub fn input(&self) -> &A {
        &self.input
    }

    /// The serial sink.
    pub fn serial(&self) -> &S {
        &self.serial
    }

    /// The clock.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Tear down, returning the collaborators.
    pub fn into_parts(self) -> (A, S, C) {
        (self.input, self.serial, self.clock)
    }
}
