//! This file handles GPIO pin allocation.
//!
//! [`Gpio`] owns every GPIO on the Pico, and hands them out by number as
//! embassy-rp `Output`s or `Input`s.  A pin can only be taken once.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use defmt::{debug, error, info, trace, warn};
use embassy_rp::gpio::{AnyPin, Input, Level as PinLevel, Output, Pull};

use crate::constants::TOTAL_GPIOS;
use crate::error::LinkError;
use crate::line::{Level, LineClaims, LineRole, LinkPinConfig, OutputLine};
use crate::link::LinkLines;

/// The lines the firmware drives the link with.
pub type FirmwareLines =
    LinkLines<Output<'static>, Output<'static>, Output<'static>, Output<'static>, Input<'static>>;

/// Object which provides methods to create objects that require GPIO pins.
pub struct Gpio {
    pins: [Option<AnyPin>; TOTAL_GPIOS],
}

impl Gpio {
    /// Takes ownership of all of the Pico's GPIOs, in GPIO number order.
    pub fn new(pins: [AnyPin; TOTAL_GPIOS]) -> Self {
        Self {
            pins: pins.map(Some),
        }
    }

    /// Take GPIO `index` as an output, driven to `level`.  Returns `None` if
    /// the pin has already been taken.
    pub fn take_output(&mut self, index: u8, level: PinLevel) -> Option<Output<'static>> {
        self.take_pin_as_any(index)
            .map(|pin| Output::new(pin, level))
    }

    /// Take GPIO `index` as an input.  No pull is applied - the board
    /// provides any pull-ups needed.
    pub fn take_input(&mut self, index: u8) -> Option<Input<'static>> {
        self.take_pin_as_any(index)
            .map(|pin| Input::new(pin, Pull::None))
    }

    /// Take the five link lines, as numbered by `config`.  Outputs start
    /// inactive: data, clock and latch low, interrupt high.
    pub fn take_link_lines(&mut self, config: &LinkPinConfig) -> Result<FirmwareLines, LinkError> {
        config.validate()?;

        let mut claims = LineClaims::new();
        let mut output = |num: u8,
                          role: LineRole,
                          level: Level|
         -> Result<OutputLine<Output<'static>>, LinkError> {
            let initial = match level {
                Level::Low => PinLevel::Low,
                Level::High => PinLevel::High,
            };
            let pin = self
                .take_output(num, initial)
                .ok_or(LinkError::LineUnavailable(role))?;
            claims.output(num, role, pin, level)
        };

        let data = output(config.data, LineRole::Data, Level::Low)?;
        let clock = output(config.clock, LineRole::Clock, Level::Low)?;
        let latch = output(config.latch, LineRole::Latch, Level::Low)?;
        let interrupt = output(config.interrupt, LineRole::Interrupt, Level::High)?;

        let ack = self
            .take_input(config.ack)
            .ok_or(LinkError::LineUnavailable(LineRole::Ack))?;
        let ack = claims.input(config.ack, LineRole::Ack, ack)?;

        debug!(
            "Link lines: data {} clock {} latch {} interrupt {} ack {}",
            config.data, config.clock, config.latch, config.interrupt, config.ack
        );

        Ok(LinkLines {
            data,
            clock,
            latch,
            interrupt,
            ack,
        })
    }

    // Helper to take a pin by index
    fn take_pin_as_any(&mut self, index: u8) -> Option<AnyPin> {
        match self.pins.get_mut(index as usize) {
            Some(pin) => pin.take(),
            None => {
                warn!("Attempt to take non-existant pin {}", index);
                None
            }
        }
    }
}
