//! Host-side collaborators
//!
//! Stand-ins for the ADC, UART and timer so the pipeline can run off-board:
//! a synthetic tone source, a simulated microsecond clock and text sinks.

use std::f64::consts::PI;
use std::io;

use thiserror::Error;

use crate::hal::{AnalogInput, Clock, SerialOutput};

const WORKING_BITS: u32 = 12;
const WORKING_MID: f32 = 2048.0;
const WORKING_MAX: f32 = 4095.0;

/// Faults injected by the simulated devices.
#[derive(Debug, Error)]
pub enum SimError {
    /// The simulated ADC stopped converting.
    #[error("ADC conversion failed after {0} readings")]
    AdcFault(u64),

    /// The simulated UART was closed.
    #[error("serial link closed")]
    SerialClosed,
}

/// One sinusoidal component of a [`ToneInput`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Tone {
    /// Frequency in Hz.
    pub frequency: f32,
    /// Peak amplitude in 12-bit counts.
    pub amplitude: f32,
}

impl Tone {
    /// A tone of `frequency` Hz and `amplitude` counts.
    pub fn new(frequency: f32, amplitude: f32) -> Self {
        Tone {
            frequency,
            amplitude,
        }
    }
}

/// Analog input synthesising a sum of sinusoids at a fixed sample rate.
///
/// Values are 12-bit, centred at 2048 plus an optional DC offset, clipped to
/// the converter range and left-aligned in 16 bits like the RP2040 ADC reports.
#[derive(Debug, Clone)]
pub struct ToneInput {
    sample_rate: f32,
    tones: Vec<Tone>,
    dc_offset: f32,
    index: u64,
    fail_after: Option<u64>,
}

impl ToneInput {
    /// Input sampled at `sample_rate` Hz carrying `tones`.
    pub fn new(sample_rate: f32, tones: impl IntoIterator<Item = Tone>) -> Self {
        ToneInput {
            sample_rate,
            tones: tones.into_iter().collect(),
            dc_offset: 0.0,
            index: 0,
            fail_after: None,
        }
    }

    /// A flat input stuck at mid-scale plus `dc_offset` counts.
    pub fn silence(dc_offset: f32) -> Self {
        Self::new(1_000.0, std::iter::empty()).with_dc_offset(dc_offset)
    }

    /// Shift every reading by `offset` counts.
    pub fn with_dc_offset(mut self, offset: f32) -> Self {
        self.dc_offset = offset;
        self
    }

    /// Fail every read after the first `readings`.
    pub fn fail_after(mut self, readings: u64) -> Self {
        self.fail_after = Some(readings);
        self
    }

    /// Number of readings taken so far.
    pub fn readings(&self) -> u64 {
        self.index
    }

    fn level(&self, t: f64) -> f32 {
        let signal: f32 = self
            .tones
            .iter()
            .map(|tone| {
                let phase = 2.0 * PI * f64::from(tone.frequency) * t;
                tone.amplitude * phase.sin() as f32
            })
            .sum();
        (WORKING_MID + self.dc_offset + signal)
            .round()
            .clamp(0.0, WORKING_MAX)
    }
}

impl AnalogInput for ToneInput {
    type Error = SimError;

    fn read(&mut self) -> Result<u16, SimError> {
        if self.fail_after.is_some_and(|n| self.index >= n) {
            return Err(SimError::AdcFault(self.index));
        }
        let t = self.index as f64 / f64::from(self.sample_rate);
        self.index += 1;
        Ok((self.level(t) as u16) << (16 - WORKING_BITS))
    }
}

/// Simulated monotonic clock; time moves only when something waits.
///
/// `overhead_us` is added to every `delay_us` to model the conversion time
/// and loop overhead a real sample loop spends on top of its nominal wait.
#[derive(Debug, Default, Clone)]
pub struct SimClock {
    now: u64,
    overhead_us: u32,
}

impl SimClock {
    /// A clock at time zero with no overhead.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `us` microseconds to every wait.
    pub fn with_overhead_us(mut self, us: u32) -> Self {
        self.overhead_us = us;
        self
    }
}

impl Clock for SimClock {
    fn now_us(&mut self) -> u64 {
        self.now
    }

    fn delay_us(&mut self, us: u32) {
        self.now += u64::from(us) + u64::from(self.overhead_us);
    }
}

/// A clock whose counter is stuck, as a hung timer peripheral would be.
#[derive(Debug, Default, Copy, Clone)]
pub struct FrozenClock;

impl Clock for FrozenClock {
    fn now_us(&mut self) -> u64 {
        0
    }

    fn delay_us(&mut self, _us: u32) {}
}

/// Serial sink collecting everything written to it.
///
/// The link can be closed after a number of accepted writes; later writes
/// fail and leave the collected text untouched.
#[derive(Debug, Default, Clone)]
pub struct SerialBuffer {
    text: String,
    writes: usize,
    close_after: Option<usize>,
}

impl SerialBuffer {
    /// An open, empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every write fails.
    pub fn closed() -> Self {
        Self::new().close_after(0)
    }

    /// Accept the first `writes` writes, then fail.
    pub fn close_after(mut self, writes: usize) -> Self {
        self.close_after = Some(writes);
        self
    }

    /// Everything written so far.
    pub fn contents(&self) -> &str {
        &self.text
    }

    /// Number of accepted writes.
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Written text split into lines.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.lines()
    }
}

impl SerialOutput for SerialBuffer {
    type Error = SimError;

    fn write(&mut self, text: &str) -> Result<(), SimError> {
        if self.close_after.is_some_and(|n| self.writes >= n) {
            return Err(SimError::SerialClosed);
        }
        self.text.push_str(text);
        self.writes += 1;
        Ok(())
    }
}

/// Serial output over any [`io::Write`], e.g. stdout or a host-side UART.
#[derive(Debug)]
pub struct IoSerial<W>(pub W);

impl<W: io::Write> SerialOutput for IoSerial<W> {
    type Error = io::Error;

    fn write(&mut self, text: &str) -> io::Result<()> {
        self.0.write_all(text.as_bytes())?;
        self.0.flush()
    }
}
