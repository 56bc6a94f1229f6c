//! The sample link - quantized samples out through the shift register, with
//! the peripheral acknowledging each byte before the next is sent.
//!
//! [`SampleLink`] combines a [`ShiftRegisterLink`] and a [`HandshakeChannel`]
//! and runs the full per-byte cycle:
//!
//! ```text
//! shift 8 bits -> latch -> interrupt pulse -> wait for ack edge
//! ```
//!
//! The next byte's bits are not clocked in until the ack for the previous one
//! has been seen (or the recovery policy has given up on it).  That ordering
//! is enforced purely by program order - there is one owner of the link, and
//! nothing else touches its lines.
//!
//! An unresponsive peripheral is handed to a [`RecoveryPolicy`], which
//! chooses to abort, resend the same byte, or skip it.  Line faults are never
//! handed to the policy - they are returned straight away.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

pub mod handshake;
pub mod shift;

pub use handshake::{HandshakeChannel, HandshakeState};
pub use shift::ShiftRegisterLink;

use embassy_time::Duration;
use embedded_hal::digital::OutputPin;
use embedded_hal_async::digital::Wait;

use crate::constants::{ACK_TIMEOUT, DEFAULT_ACK_RETRIES, INTERRUPT_PULSE, SETTLE_TIME};
use crate::error::LinkError;
use crate::frame::Frame;
use crate::line::{InputLine, OutputLine};
use crate::quantize::{QuantizedLevel, quantize_raw};

/// Link timings.  The defaults are the protocol's documented timings, plus an
/// ack timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkConfig {
    /// Clock and latch hold time, at each level.
    pub settle: Duration,

    /// Width of the interrupt pulse.
    pub interrupt_pulse: Duration,

    /// How long to wait for each ack.  `None` waits forever.
    pub ack_timeout: Option<Duration>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            settle: SETTLE_TIME,
            interrupt_pulse: INTERRUPT_PULSE,
            ack_timeout: Some(ACK_TIMEOUT),
        }
    }
}

impl LinkConfig {
    /// Default timings, but waits forever for each ack.  A peripheral which
    /// never acks will stall the link.
    pub fn unbounded() -> Self {
        Self {
            ack_timeout: None,
            ..Self::default()
        }
    }
}

/// The five lines the link needs, already claimed.
pub struct LinkLines<D, C, L, I, A> {
    pub data: OutputLine<D>,
    pub clock: OutputLine<C>,
    pub latch: OutputLine<L>,
    pub interrupt: OutputLine<I>,
    pub ack: InputLine<A>,
}

/// What to do when the peripheral doesn't ack a byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Recovery {
    /// Return `PeripheralUnresponsive` to the caller.
    Abort,

    /// Shift, latch and notify the same byte again.
    Retry,

    /// Drop the byte and carry on with the next one.
    Skip,
}

/// Decides how to recover from an unresponsive peripheral.
pub trait RecoveryPolicy {
    /// Called each time an ack times out.  `attempt` is the number of times
    /// this byte has been sent so far, starting at 1.
    fn on_unresponsive(&mut self, level: QuantizedLevel, attempt: u32) -> Recovery;
}

/// Always abort.
#[derive(Debug, Clone, Copy, Default)]
pub struct AbortPolicy;

impl RecoveryPolicy for AbortPolicy {
    fn on_unresponsive(&mut self, _level: QuantizedLevel, _attempt: u32) -> Recovery {
        Recovery::Abort
    }
}

/// Always skip the byte.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipPolicy;

impl RecoveryPolicy for SkipPolicy {
    fn on_unresponsive(&mut self, _level: QuantizedLevel, _attempt: u32) -> Recovery {
        Recovery::Skip
    }
}

/// Resend a byte up to `max_retries` times, then fall back to `exhausted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub exhausted: Recovery,
}

impl RetryPolicy {
    pub const fn new(max_retries: u32, exhausted: Recovery) -> Self {
        Self {
            max_retries,
            exhausted,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_ACK_RETRIES, Recovery::Skip)
    }
}

impl RecoveryPolicy for RetryPolicy {
    fn on_unresponsive(&mut self, _level: QuantizedLevel, attempt: u32) -> Recovery {
        if attempt <= self.max_retries {
            Recovery::Retry
        } else {
            self.exhausted
        }
    }
}

impl<F> RecoveryPolicy for F
where
    F: FnMut(QuantizedLevel, u32) -> Recovery,
{
    fn on_unresponsive(&mut self, level: QuantizedLevel, attempt: u32) -> Recovery {
        self(level, attempt)
    }
}

/// Somewhere raw samples come from.  Returns `None` once exhausted.
#[allow(async_fn_in_trait)]
pub trait SampleSource {
    async fn next_sample(&mut self) -> Option<i32>;
}

/// A [`SampleSource`] over any iterator of raw values.
pub struct IterSource<I>(I);

impl<I> IterSource<I> {
    pub fn new(iter: I) -> Self {
        Self(iter)
    }
}

impl<I: Iterator<Item = i32>> SampleSource for IterSource<I> {
    async fn next_sample(&mut self) -> Option<i32> {
        self.0.next()
    }
}

/// Counters kept by a [`SampleLink`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkStats {
    /// Bytes acknowledged by the peripheral.
    pub sent: u32,

    /// Resends after an ack timeout.
    pub retries: u32,

    /// Bytes dropped by the recovery policy.
    pub skipped: u32,

    /// Raw samples rejected as out of range.
    pub rejected: u32,
}

// The counters wrap rather than overflow on a long running link.
impl LinkStats {
    fn record_sent(&mut self) {
        self.sent = self.sent.wrapping_add(1);
    }

    fn record_retry(&mut self) {
        self.retries = self.retries.wrapping_add(1);
    }

    fn record_skipped(&mut self) {
        self.skipped = self.skipped.wrapping_add(1);
    }

    fn record_rejected(&mut self) {
        self.rejected = self.rejected.wrapping_add(1);
    }
}

/// Outcome of sending one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Delivery {
    /// Acknowledged, after this many attempts.
    Delivered { attempts: u32 },

    /// The recovery policy dropped it.
    Skipped,
}

/// The complete link.  There should only be one of these per set of lines,
/// and it must not be shared - each `send_*` call completes a full cycle
/// before returning.
pub struct SampleLink<D, C, L, I, A, R = AbortPolicy> {
    shift: ShiftRegisterLink<D, C, L>,
    handshake: HandshakeChannel<I, A>,
    policy: R,
    stats: LinkStats,
}

impl<D, C, L, I, A, R> SampleLink<D, C, L, I, A, R>
where
    D: OutputPin,
    C: OutputPin,
    L: OutputPin,
    I: OutputPin,
    A: Wait,
    R: RecoveryPolicy,
{
    pub fn new(
        shift: ShiftRegisterLink<D, C, L>,
        handshake: HandshakeChannel<I, A>,
        policy: R,
    ) -> Self {
        Self {
            shift,
            handshake,
            policy,
            stats: LinkStats::default(),
        }
    }

    /// Build the link from its lines and timings.
    pub fn from_config(
        lines: LinkLines<D, C, L, I, A>,
        config: LinkConfig,
        policy: R,
    ) -> Result<Self, LinkError> {
        let shift = ShiftRegisterLink::new(lines.data, lines.clock, lines.latch, config.settle)?;
        let handshake = HandshakeChannel::new(
            lines.interrupt,
            lines.ack,
            config.interrupt_pulse,
            config.ack_timeout,
        )?;
        Ok(Self::new(shift, handshake, policy))
    }

    /// Send one level through a full cycle, consulting the recovery policy
    /// if the peripheral doesn't ack.
    pub async fn send_level(&mut self, level: QuantizedLevel) -> Result<Delivery, LinkError> {
        let pattern = level.to_pattern();
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.shift.write(pattern)?;

            match self.handshake.notify().await {
                Ok(()) => {
                    self.stats.record_sent();
                    return Ok(Delivery::Delivered { attempts: attempt });
                }
                Err(LinkError::PeripheralUnresponsive) => {
                    match self.policy.on_unresponsive(level, attempt) {
                        Recovery::Retry => {
                            #[cfg(feature = "defmt")]
                            defmt::debug!("Resending level {} attempt {}", level, attempt + 1);
                            self.stats.record_retry();
                        }
                        Recovery::Skip => {
                            #[cfg(feature = "defmt")]
                            defmt::warn!("Skipping level {} after {} attempts", level, attempt);
                            self.stats.record_skipped();
                            return Ok(Delivery::Skipped);
                        }
                        Recovery::Abort => return Err(LinkError::PeripheralUnresponsive),
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Quantize a raw sample and send it.  An out of range sample is counted
    /// and returned as `OutOfRange`, without touching the lines.
    pub async fn send_sample(&mut self, raw: i32) -> Result<Delivery, LinkError> {
        let level = quantize_raw(raw).inspect_err(|_| self.stats.record_rejected())?;
        self.send_level(level).await
    }

    /// Send every sample of a frame, in order.  Returns how many were
    /// delivered.
    pub async fn send_frame(&mut self, frame: &Frame) -> Result<usize, LinkError> {
        let mut delivered = 0;
        for level in frame.levels() {
            if let Delivery::Delivered { .. } = self.send_level(level).await? {
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    /// Drain `source` into the link until it is exhausted.  Out of range
    /// samples are skipped.  Anything else which isn't recovered by the
    /// policy stops the run.
    pub async fn run<S: SampleSource>(&mut self, source: &mut S) -> Result<LinkStats, LinkError> {
        while let Some(raw) = source.next_sample().await {
            match self.send_sample(raw).await {
                Ok(_) => (),
                Err(LinkError::OutOfRange(_v)) => {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("Dropping out of range sample {}", _v);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(self.stats)
    }

    /// Put the handshake back to idle, with the interrupt line inactive.
    /// Needed if a send was cancelled part way through.
    pub fn reset(&mut self) -> Result<(), LinkError> {
        self.handshake.reset()
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    pub fn policy_mut(&mut self) -> &mut R {
        &mut self.policy
    }

    pub fn shift_register(&self) -> &ShiftRegisterLink<D, C, L> {
        &self.shift
    }

    pub fn handshake(&self) -> &HandshakeChannel<I, A> {
        &self.handshake
    }
}
