//! Spectral transform
//!
//! Turns a windowed frame into `FRAME_SIZE / 2` bin magnitudes. Two
//! interchangeable strategies implement [`SpectralTransform`]:
//! - [`Radix2Fft`]: iterative in-place decimation-in-time with precomputed
//!   bit-reversal and twiddle tables, no allocation per cycle.
//! - [`RustFft`]: delegates to `rustfft`, planned once.

use std::{f32::consts::PI, sync::Arc};

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use thiserror::Error;

use crate::FRAME_SIZE;

/// Number of magnitude bins up to (excluding) Nyquist.
pub const SPECTRUM_BINS: usize = FRAME_SIZE / 2;

const STAGES: u32 = FRAME_SIZE.trailing_zeros();

/// Errors returned by a spectral transform.
#[derive(Debug, Error)]
pub enum SpectrumError {
    /// Input frame was not of the expected size.
    #[error("expected frame of length {expected}, got {got}")]
    InvalidLength {
        /// The transform size.
        expected: usize,
        /// The length supplied.
        got: usize,
    },
}

/// Magnitudes of the positive-frequency half plus the rate they were sampled at.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    magnitudes: [f32; SPECTRUM_BINS],
    sample_rate: f32,
}

impl Spectrum {
    /// An all-zero spectrum at rate 0.
    pub fn new() -> Self {
        Spectrum {
            magnitudes: [0.0; SPECTRUM_BINS],
            sample_rate: 0.0,
        }
    }

    /// A spectrum from precomputed magnitudes.
    pub fn from_magnitudes(magnitudes: [f32; SPECTRUM_BINS], sample_rate: f32) -> Self {
        Spectrum {
            magnitudes,
            sample_rate,
        }
    }

    /// Bin magnitudes, index 0 is DC.
    pub fn magnitudes(&self) -> &[f32; SPECTRUM_BINS] {
        &self.magnitudes
    }

    /// Effective sampling rate of the frame this spectrum came from.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Width of one bin in Hz.
    pub fn bin_width(&self) -> f32 {
        self.sample_rate / FRAME_SIZE as f32
    }

    /// Frequency in Hz of a (possibly fractional) bin position.
    pub fn frequency_at(&self, bin: f32) -> f32 {
        bin * self.bin_width()
    }

    fn set(&mut self, sample_rate: f32, bins: impl Iterator<Item = f32>) {
        self.sample_rate = sample_rate;
        for (m, v) in self.magnitudes.iter_mut().zip(bins) {
            *m = v;
        }
    }
}

impl Default for Spectrum {
    fn default() -> Self {
        Self::new()
    }
}

/// A fixed-size power-of-two DFT producing a magnitude [`Spectrum`].
pub trait SpectralTransform {
    /// Transform `frame` (length `FRAME_SIZE`) into `spectrum`, tagging it
    /// with `sample_rate`.
    fn transform(
        &mut self,
        frame: &[f32],
        sample_rate: f32,
        spectrum: &mut Spectrum,
    ) -> Result<(), SpectrumError>;
}

fn check_len(frame: &[f32]) -> Result<(), SpectrumError> {
    if frame.len() != FRAME_SIZE {
        return Err(SpectrumError::InvalidLength {
            expected: FRAME_SIZE,
            got: frame.len(),
        });
    }
    Ok(())
}

/// Hand-rolled iterative radix-2 FFT over fixed buffers.
#[derive(Debug, Clone)]
pub struct Radix2Fft {
    bit_reverse: [usize; FRAME_SIZE],
    cos: [f32; FRAME_SIZE / 2],
    sin: [f32; FRAME_SIZE / 2],
    re: [f32; FRAME_SIZE],
    im: [f32; FRAME_SIZE],
}

impl Radix2Fft {
    /// Precompute the permutation and twiddle tables.
    pub fn new() -> Self {
        let mut bit_reverse = [0; FRAME_SIZE];
        for (i, r) in bit_reverse.iter_mut().enumerate() {
            *r = i.reverse_bits() >> (usize::BITS - STAGES);
        }

        let mut cos = [0.0; FRAME_SIZE / 2];
        let mut sin = [0.0; FRAME_SIZE / 2];
        for (k, (c, s)) in cos.iter_mut().zip(sin.iter_mut()).enumerate() {
            let theta = 2.0 * PI * k as f32 / FRAME_SIZE as f32;
            (*s, *c) = theta.sin_cos();
        }

        Radix2Fft {
            bit_reverse,
            cos,
            sin,
            re: [0.0; FRAME_SIZE],
            im: [0.0; FRAME_SIZE],
        }
    }

    fn butterflies(&mut self) {
        for stage in 0..STAGES {
            let half = 1usize << stage;
            let span = half << 1;
            // index into the N-point twiddle table for this stage
            let stride = FRAME_SIZE / span;

            for group in (0..FRAME_SIZE).step_by(span) {
                for k in 0..half {
                    let (c, s) = (self.cos[k * stride], self.sin[k * stride]);
                    let a = group + k;
                    let b = a + half;

                    // t = b · e^(−iθ)
                    let tr = c * self.re[b] + s * self.im[b];
                    let ti = c * self.im[b] - s * self.re[b];

                    self.re[b] = self.re[a] - tr;
                    self.im[b] = self.im[a] - ti;
                    self.re[a] += tr;
                    self.im[a] += ti;
                }
            }
        }
    }
}

impl Default for Radix2Fft {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectralTransform for Radix2Fft {
    fn transform(
        &mut self,
        frame: &[f32],
        sample_rate: f32,
        spectrum: &mut Spectrum,
    ) -> Result<(), SpectrumError> {
        check_len(frame)?;

        for (re, &j) in self.re.iter_mut().zip(self.bit_reverse.iter()) {
            *re = frame[j];
        }
        self.im = [0.0; FRAME_SIZE];

        self.butterflies();

        let (re, im) = (&self.re, &self.im);
        spectrum.set(
            sample_rate,
            (0..SPECTRUM_BINS).map(|i| (re[i] * re[i] + im[i] * im[i]).sqrt()),
        );
        Ok(())
    }
}

/// Library transform backed by a `rustfft` plan.
pub struct RustFft {
    fft: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl RustFft {
    /// Plan a forward transform of `FRAME_SIZE` points.
    pub fn new() -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(FRAME_SIZE);
        let scratch = vec![Complex { re: 0.0, im: 0.0 }; fft.get_inplace_scratch_len()];

        RustFft {
            fft,
            buffer: vec![Complex { re: 0.0, im: 0.0 }; FRAME_SIZE],
            scratch,
        }
    }
}

impl Default for RustFft {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RustFft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RustFft")
            .field("len", &self.buffer.len())
            .finish_non_exhaustive()
    }
}

impl SpectralTransform for RustFft {
    fn transform(
        &mut self,
        frame: &[f32],
        sample_rate: f32,
        spectrum: &mut Spectrum,
    ) -> Result<(), SpectrumError> {
        check_len(frame)?;

        for (c, &s) in self.buffer.iter_mut().zip(frame) {
            c.re = s;
            c.im = 0.0;
        }
        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        spectrum.set(sample_rate, self.buffer.iter().map(|c| c.norm()));
        Ok(())
    }
}
