//! Drives a 74HC595 style serial-in/parallel-out shift register.
//!
//! Bits are presented on the data line, then clocked in on the rising edge
//! of the clock line.  Once all 8 bits are in, the latch line is pulsed,
//! which copies the shift stage to the register's outputs in one go.  The
//! peripheral only ever sees latched bytes, never a partially shifted one.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use embassy_time::Duration;
use embedded_hal::digital::OutputPin;

use crate::constants::BITS_PER_BYTE;
use crate::error::LinkError;
use crate::line::{Level, OutputLine};
use crate::quantize::BitPattern;
use crate::util::time::block_for;

/// Owns the data, clock and latch lines.
pub struct ShiftRegisterLink<D, C, L> {
    data: OutputLine<D>,
    clock: OutputLine<C>,
    latch: OutputLine<L>,

    // How long clock and latch are held at each level.
    settle: Duration,

    // Clock pulses since the last latch.
    pulses: usize,
}

impl<D, C, L> ShiftRegisterLink<D, C, L>
where
    D: OutputPin,
    C: OutputPin,
    L: OutputPin,
{
    /// Takes ownership of the lines and drives clock and latch low, ready
    /// for the first rising edge.
    pub fn new(
        data: OutputLine<D>,
        clock: OutputLine<C>,
        latch: OutputLine<L>,
        settle: Duration,
    ) -> Result<Self, LinkError> {
        let mut link = Self {
            data,
            clock,
            latch,
            settle,
            pulses: 0,
        };
        link.clock.set_low()?;
        link.latch.set_low()?;
        Ok(link)
    }

    /// Present `bit` on the data line and pulse the clock.  The bit is
    /// captured by the register on the rising edge.
    fn shift_bit(&mut self, bit: bool) -> Result<(), LinkError> {
        self.data.set_level(Level::from(bit))?;
        self.clock.set_high()?;
        block_for(self.settle);
        self.clock.set_low()?;
        block_for(self.settle);
        self.pulses += 1;
        Ok(())
    }

    /// Shift all 8 bits of `pattern`, in wire order.  Does not latch.
    fn shift(&mut self, pattern: BitPattern) -> Result<(), LinkError> {
        for bit in pattern.iter() {
            self.shift_bit(bit)?;
        }
        Ok(())
    }

    /// Pulse the latch, committing the shift stage to the outputs.
    pub(crate) fn latch(&mut self) -> Result<(), LinkError> {
        self.latch.set_high()?;
        block_for(self.settle);
        self.latch.set_low()?;
        self.pulses = 0;
        Ok(())
    }

    /// Shift `pattern` in and latch it.  On a line fault part way through,
    /// the latch is not pulsed, so the outputs still hold the previous byte.
    pub fn write(&mut self, pattern: BitPattern) -> Result<(), LinkError> {
        if let Err(e) = self.shift(pattern) {
            // The partial byte is never latched.  The next write clocks a
            // full 8 bits over it.
            self.pulses = 0;
            return Err(e);
        }
        debug_assert_eq!(self.pulses, BITS_PER_BYTE);
        self.latch()
    }

    /// Clock pulses issued since the last latch.
    pub fn pulses(&self) -> usize {
        self.pulses
    }

    pub fn settle(&self) -> Duration {
        self.settle
    }

    /// Give up the lines.
    pub fn release(self) -> (OutputLine<D>, OutputLine<C>, OutputLine<L>) {
        (self.data, self.clock, self.latch)
    }
}
