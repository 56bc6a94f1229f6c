//! The interrupt/acknowledge handshake with the peripheral.
//!
//! After each byte is latched we pulse the (active low) interrupt line, then
//! wait for the peripheral to pull the acknowledge line low.  Nothing else is
//! sent until the acknowledge arrives, which is what stops us overwriting a
//! byte the peripheral hasn't read yet.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use embassy_time::Duration;
use embedded_hal::digital::OutputPin;
use embedded_hal_async::digital::Wait;

use crate::error::LinkError;
use crate::line::{Edge, InputLine, OutputLine};
use crate::util::time::block_for;

/// Where the channel is in the handshake cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HandshakeState {
    /// Interrupt high, nothing outstanding.
    Idle,

    /// Interrupt is being held low.
    Asserted,

    /// Interrupt released, waiting for the acknowledge edge.
    AwaitingAck,
}

/// Owns the interrupt (output) and acknowledge (input) lines.
pub struct HandshakeChannel<I, A> {
    interrupt: OutputLine<I>,
    ack: InputLine<A>,
    pulse: Duration,
    ack_timeout: Option<Duration>,
    state: HandshakeState,
}

impl<I, A> HandshakeChannel<I, A>
where
    I: OutputPin,
    A: Wait,
{
    /// Takes ownership of the lines, and drives interrupt high (inactive).
    ///
    /// `ack_timeout` of `None` waits forever for each acknowledge.
    pub fn new(
        interrupt: OutputLine<I>,
        ack: InputLine<A>,
        pulse: Duration,
        ack_timeout: Option<Duration>,
    ) -> Result<Self, LinkError> {
        let mut channel = Self {
            interrupt,
            ack,
            pulse,
            ack_timeout,
            state: HandshakeState::Idle,
        };
        channel.interrupt.set_high()?;
        Ok(channel)
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn ack_timeout(&self) -> Option<Duration> {
        self.ack_timeout
    }

    pub fn set_ack_timeout(&mut self, ack_timeout: Option<Duration>) {
        self.ack_timeout = ack_timeout;
    }

    /// Pulse the interrupt line low.  Blocks for the pulse width, and
    /// returns with the line high again.
    pub fn assert_interrupt(&mut self) -> Result<(), LinkError> {
        self.state = HandshakeState::Asserted;
        self.interrupt.set_low()?;
        block_for(self.pulse);
        self.interrupt.set_high()?;
        self.state = HandshakeState::Idle;
        Ok(())
    }

    /// Wait for the peripheral to acknowledge, by pulling the ack line low.
    ///
    /// Returns `PeripheralUnresponsive` if the ack timeout expires first.
    /// Either way the channel is back in `Idle` on return.  If the future is
    /// dropped before completing the channel is left in `AwaitingAck`, and
    /// must be [`reset`](Self::reset) - [`notify`](Self::notify) does this
    /// itself.
    pub async fn await_ack(&mut self) -> Result<(), LinkError> {
        self.state = HandshakeState::AwaitingAck;
        self.ack.arm(Edge::Falling);

        let result = self.ack.wait_for_edge(self.ack_timeout).await;
        self.state = HandshakeState::Idle;

        match result {
            Ok(_) => Ok(()),
            Err(LinkError::Timeout(_)) => {
                #[cfg(feature = "defmt")]
                defmt::debug!("No ack within {} us", self.ack_timeout.map(|t| t.as_micros()));
                Err(LinkError::PeripheralUnresponsive)
            }
            Err(e) => Err(e),
        }
    }

    /// Signal a byte is ready and wait for it to be consumed.  This is one
    /// full handshake cycle.
    pub async fn notify(&mut self) -> Result<(), LinkError> {
        if self.state != HandshakeState::Idle {
            #[cfg(feature = "defmt")]
            defmt::warn!("Handshake left in state {}, resetting", self.state);
            self.reset()?;
        }
        self.assert_interrupt()?;
        self.await_ack().await
    }

    /// Return to `Idle`, driving the interrupt line high and dropping any
    /// armed edge detection.
    pub fn reset(&mut self) -> Result<(), LinkError> {
        self.ack.disarm();
        self.interrupt.set_high()?;
        self.state = HandshakeState::Idle;
        Ok(())
    }

    /// Give up the lines.
    pub fn release(self) -> (OutputLine<I>, InputLine<A>) {
        (self.interrupt, self.ack)
    }
}
