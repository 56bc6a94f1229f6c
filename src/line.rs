//! Typed wrappers over the individual digital lines used by the link.
//!
//! Each line has a fixed direction for its lifetime - an [`OutputLine`] can
//! only be driven, an [`InputLine`] can only be waited on.  Lines are claimed
//! through [`LineClaims`], which refuses to hand out the same GPIO twice.
//!
//! The wrappers are generic over the `embedded-hal` traits, so on the device
//! they hold embassy-rp `Output`/`Input` pins, and in tests they hold mocks.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use core::fmt;
use embassy_time::{Duration, with_timeout};
use embedded_hal::digital::OutputPin;
use embedded_hal_async::digital::Wait;

use crate::constants::{MAX_LINES, TOTAL_GPIOS};
use crate::error::LinkError;

/// Logic level of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    Low,
    High,
}

impl From<bool> for Level {
    fn from(value: bool) -> Self {
        if value { Level::High } else { Level::Low }
    }
}

/// An edge on an input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    Falling,
    Rising,
}

/// The role each line plays in the link.  Used to identify lines in errors
/// and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineRole {
    /// Serial data into the shift register.
    Data,

    /// Shift register clock - data is captured on the rising edge.
    Clock,

    /// Shift register latch (storage register clock).
    Latch,

    /// Active low "byte ready" signal to the peripheral.
    Interrupt,

    /// Falling edge from the peripheral once it has consumed the byte.
    Ack,
}

impl fmt::Display for LineRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LineRole::Data => "data",
            LineRole::Clock => "clock",
            LineRole::Latch => "latch",
            LineRole::Interrupt => "interrupt",
            LineRole::Ack => "ack",
        };
        f.write_str(name)
    }
}

/// Tracks which GPIO numbers have been claimed, so no two lines can drive the
/// same pin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineClaims {
    claimed: u32,
}

impl LineClaims {
    pub const fn new() -> Self {
        Self { claimed: 0 }
    }

    /// Claim GPIO `num` for `role`.  Fails if it is already claimed, or isn't
    /// a valid line number.
    pub fn claim(&mut self, num: u8, role: LineRole) -> Result<(), LinkError> {
        if num >= MAX_LINES || self.is_claimed(num) {
            return Err(LinkError::LineUnavailable(role));
        }
        self.claimed |= 1 << num;
        Ok(())
    }

    /// Release a previously claimed line.  Releasing an unclaimed line is a
    /// no-op.
    pub fn release(&mut self, num: u8) {
        if num < MAX_LINES {
            self.claimed &= !(1 << num);
        }
    }

    pub fn is_claimed(&self, num: u8) -> bool {
        num < MAX_LINES && (self.claimed & (1 << num)) != 0
    }

    /// Claim GPIO `num` as an output, driving it to `initial` straight away.
    pub fn output<P: OutputPin>(
        &mut self,
        num: u8,
        role: LineRole,
        pin: P,
        initial: Level,
    ) -> Result<OutputLine<P>, LinkError> {
        self.claim(num, role)?;
        OutputLine::new(role, pin, initial).inspect_err(|_| self.release(num))
    }

    /// Claim GPIO `num` as an input.  No pull is assumed - that is down to
    /// the board's wiring.
    pub fn input<P: Wait>(
        &mut self,
        num: u8,
        role: LineRole,
        pin: P,
    ) -> Result<InputLine<P>, LinkError> {
        self.claim(num, role)?;
        Ok(InputLine::new(role, pin))
    }
}

/// GPIO numbers for each of the link's lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkPinConfig {
    pub data: u8,
    pub clock: u8,
    pub latch: u8,
    pub interrupt: u8,
    pub ack: u8,
}

/// The pico-vectron board's pinout.
impl Default for LinkPinConfig {
    fn default() -> Self {
        Self {
            data: 2,
            latch: 3,
            clock: 4,
            interrupt: 5,
            ack: 6,
        }
    }
}

impl LinkPinConfig {
    /// Check every line has its own GPIO, and that GPIO exists.
    pub fn validate(&self) -> Result<(), LinkError> {
        let mut claims = LineClaims::new();
        for (num, role) in *self {
            if num as usize >= TOTAL_GPIOS {
                return Err(LinkError::LineUnavailable(role));
            }
            claims.claim(num, role)?;
        }
        Ok(())
    }
}

impl IntoIterator for LinkPinConfig {
    type Item = (u8, LineRole);
    type IntoIter = core::array::IntoIter<(u8, LineRole), 5>;

    fn into_iter(self) -> Self::IntoIter {
        [
            (self.data, LineRole::Data),
            (self.clock, LineRole::Clock),
            (self.latch, LineRole::Latch),
            (self.interrupt, LineRole::Interrupt),
            (self.ack, LineRole::Ack),
        ]
        .into_iter()
    }
}

/// A line we drive.
pub struct OutputLine<P> {
    role: LineRole,
    pin: P,
    level: Level,
}

impl<P: OutputPin> OutputLine<P> {
    /// Wrap `pin`, driving it to `initial`.
    pub fn new(role: LineRole, pin: P, initial: Level) -> Result<Self, LinkError> {
        let mut line = Self {
            role,
            pin,
            level: initial,
        };
        line.set_level(initial)?;
        Ok(line)
    }

    /// Drive the line to `level`.  There is no buffering - the pin changes
    /// before this returns.
    #[allow(clippy::inline_always)]
    #[inline(always)]
    pub fn set_level(&mut self, level: Level) -> Result<(), LinkError> {
        let result = match level {
            Level::High => self.pin.set_high(),
            Level::Low => self.pin.set_low(),
        };
        result.map_err(|_| LinkError::LineFault(self.role))?;
        self.level = level;
        Ok(())
    }

    #[allow(clippy::inline_always)]
    #[inline(always)]
    pub fn set_high(&mut self) -> Result<(), LinkError> {
        self.set_level(Level::High)
    }

    #[allow(clippy::inline_always)]
    #[inline(always)]
    pub fn set_low(&mut self) -> Result<(), LinkError> {
        self.set_level(Level::Low)
    }

    /// The level the line was last driven to.
    pub fn level(&self) -> Level {
        self.level
    }

    pub fn role(&self) -> LineRole {
        self.role
    }

    /// Give up the line, returning the pin.
    pub fn into_inner(self) -> P {
        self.pin
    }
}

/// A line we watch for edges on.
pub struct InputLine<P> {
    role: LineRole,
    pin: P,
    armed: Option<Edge>,
}

impl<P: Wait> InputLine<P> {
    pub fn new(role: LineRole, pin: P) -> Self {
        Self {
            role,
            pin,
            armed: None,
        }
    }

    /// Set the edge the next [`InputLine::wait_for_edge`] waits for.  Must be
    /// called before each wait.
    ///
    /// This only records the edge.  The pin isn't watched until the wait is
    /// first polled, so an edge before then is missed.
    pub fn arm(&mut self, edge: Edge) {
        self.armed = Some(edge);
    }

    pub fn disarm(&mut self) {
        self.armed = None;
    }

    pub fn armed(&self) -> Option<Edge> {
        self.armed
    }

    pub fn role(&self) -> LineRole {
        self.role
    }

    /// Wait for the armed edge, or until `timeout` expires.  With no timeout
    /// this waits forever.
    ///
    /// The wait consumes the arming, whatever the outcome, so the line must be
    /// re-armed before waiting again.  Dropping the returned future cancels
    /// the wait.
    pub async fn wait_for_edge(&mut self, timeout: Option<Duration>) -> Result<Edge, LinkError> {
        let edge = self.armed.take().ok_or(LinkError::EdgeNotArmed(self.role))?;

        let result = match timeout {
            Some(timeout) => with_timeout(timeout, Self::edge(&mut self.pin, edge))
                .await
                .map_err(|_| LinkError::Timeout(self.role))?,
            None => Self::edge(&mut self.pin, edge).await,
        };

        result.map_err(|_| LinkError::LineFault(self.role))?;
        Ok(edge)
    }

    async fn edge(pin: &mut P, edge: Edge) -> Result<(), P::Error> {
        match edge {
            Edge::Falling => pin.wait_for_falling_edge().await,
            Edge::Rising => pin.wait_for_rising_edge().await,
        }
    }

    /// Give up the line, returning the pin.
    pub fn into_inner(self) -> P {
        self.pin
    }
}
