//! Sampler
//!
//! Captures one frame from the analog input, centres and windows it in the
//! same pass, and measures the sampling rate actually achieved. The per-sample
//! delay is only nominal, so the frequency axis of every cycle is derived from
//! the elapsed time of that cycle's sample loop.

use thiserror::Error;

use crate::hal::{AnalogInput, Clock};
use crate::window::WindowCoefficients;
use crate::{Frame, FRAME_SIZE};

/// `RMS − mean` at or below this (in centred sample units) is treated as silence.
pub const GATE_THRESHOLD: f32 = 3.0;

const MICROS_PER_SECOND: f32 = 1_000_000.0;

/// Width of a raw analog reading.
pub const ADC_BITS: u32 = u16::BITS;

/// Errors raised while capturing a frame.
#[derive(Debug, Error)]
pub enum SamplerError {
    /// The analog input failed; the frame and its statistics are unusable.
    #[error("analog read failed at sample {index}: {source}")]
    Analog {
        /// Index of the sample being read.
        index: usize,
        /// The collaborator's error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The shift or mid-scale offset does not fit a 16-bit reading.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The clock did not advance across the sample loop.
    #[error("clock reported no elapsed time over {samples} samples")]
    StalledClock {
        /// Number of samples taken.
        samples: usize,
    },
}

/// Amplitude statistics and timing of one captured frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SampleStats {
    /// Mean of the centred samples.
    pub mean: f32,
    /// Root mean square of the centred samples.
    pub rms: f32,
    /// Microseconds spent in the sample loop.
    pub elapsed_us: u64,
    /// Samples per second measured for this frame.
    pub effective_rate: f32,
}

impl SampleStats {
    /// Whether the frame carries enough signal to analyse.
    pub fn passes_gate(&self) -> bool {
        self.rms - self.mean > GATE_THRESHOLD
    }
}

/// Frame acquisition with a fixed bit shift and mid-scale offset.
#[derive(Debug, Clone)]
pub struct Sampler {
    adc_shift: u32,
    mid_scale: i32,
    sample_delay_us: u32,
}

impl Sampler {
    /// Create a sampler. Raw readings are shifted right by `adc_shift` and
    /// then offset by `mid_scale`; `sample_delay_us` is waited after each read.
    ///
    /// `adc_shift` must be below [`ADC_BITS`] and `mid_scale` must not exceed
    /// the largest shifted reading.
    pub fn new(
        adc_shift: u32,
        mid_scale: u16,
        sample_delay_us: u32,
    ) -> Result<Self, SamplerError> {
        if adc_shift >= ADC_BITS {
            return Err(SamplerError::Configuration(format!(
                "adc_shift must be below {ADC_BITS}, got {adc_shift}"
            )));
        }
        let full_scale = u16::MAX >> adc_shift;
        if mid_scale > full_scale {
            return Err(SamplerError::Configuration(format!(
                "mid_scale {mid_scale} exceeds the {}-bit range",
                ADC_BITS - adc_shift
            )));
        }

        Ok(Sampler {
            adc_shift,
            mid_scale: i32::from(mid_scale),
            sample_delay_us,
        })
    }

    /// Convert one raw reading into a zero-centred sample.
    #[inline]
    pub fn centre(&self, raw: u16) -> i32 {
        i32::from(raw >> self.adc_shift) - self.mid_scale
    }

    /// Fill `frame` with `FRAME_SIZE` centred, windowed samples.
    pub fn capture<A, C>(
        &self,
        input: &mut A,
        clock: &mut C,
        window: &WindowCoefficients,
        frame: &mut Frame,
    ) -> Result<SampleStats, SamplerError>
    where
        A: AnalogInput,
        C: Clock,
    {
        let mut sum: i64 = 0;
        let mut sum_sq: i64 = 0;

        let start = clock.now_us();
        for (i, slot) in frame.iter_mut().enumerate() {
            let raw = input.read().map_err(|e| SamplerError::Analog {
                index: i,
                source: Box::new(e),
            })?;
            let a = self.centre(raw);

            sum += i64::from(a);
            sum_sq += i64::from(a) * i64::from(a);
            *slot = a as f32 * window.coefficient(i);

            clock.delay_us(self.sample_delay_us);
        }
        let end = clock.now_us();

        let elapsed_us = end.saturating_sub(start);
        if elapsed_us == 0 {
            return Err(SamplerError::StalledClock { samples: FRAME_SIZE });
        }

        let n = FRAME_SIZE as f32;
        Ok(SampleStats {
            mean: sum as f32 / n,
            rms: (sum_sq as f32 / n).sqrt(),
            elapsed_us,
            effective_rate: n * MICROS_PER_SECOND / elapsed_us as f32,
        })
    }
}
