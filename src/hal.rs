//! Hardware collaborators
//!
//! The pipeline talks to the board through three small traits so the same
//! analysis code runs against a real ADC/UART or against the host-side
//! simulators in [`crate::sim`].

use std::error::Error;

/// An analog input channel returning raw unsigned readings.
pub trait AnalogInput {
    /// Error raised by a failed conversion.
    type Error: Error + Send + Sync + 'static;

    /// Take one reading. Readings are left-aligned in a 16-bit word; the
    /// pipeline shifts them down to its working bit depth.
    fn read(&mut self) -> Result<u16, Self::Error>;
}

/// A text sink, normally a UART.
pub trait SerialOutput {
    /// Error raised by a failed write.
    type Error: Error + Send + Sync + 'static;

    /// Write `text` verbatim.
    fn write(&mut self, text: &str) -> Result<(), Self::Error>;
}

/// Monotonic microsecond time source with blocking delays.
pub trait Clock {
    /// Current value of the monotonic microsecond counter.
    fn now_us(&mut self) -> u64;

    /// Block for roughly `us` microseconds.
    fn delay_us(&mut self, us: u32);

    /// Block for roughly `ms` milliseconds.
    fn delay_ms(&mut self, ms: u32) {
        self.delay_us(ms.saturating_mul(1_000));
    }
}
