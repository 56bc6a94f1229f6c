//! test_shift
//!
//! Tests the pico-vectron hardware, by shifting a fixed pattern into the
//! shift register and latching it, then toggling the interrupt line every 2
//! seconds.  Check the register's outputs with LEDs or a scope - QH and QA
//! should be lit, the rest dark - and watch the peripheral's interrupt input.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#![no_std]
#![no_main]

use {defmt_rtt as _, panic_probe as _};
use defmt::{info, unwrap};
use embassy_executor::Spawner;
use embassy_rp::gpio::{Level as PinLevel, Output};
use embassy_time::Timer;
use pico_vectron::constants::SETTLE_TIME;
use pico_vectron::{BitPattern, Level, LineClaims, LineRole, LinkPinConfig, ShiftRegisterLink};

pub const DELAY_MS: u64 = 2000;

// First bit shifted ends up on QH, last on QA.
pub const PATTERN: u8 = 0b0100_0001;

#[embassy_executor::main]
async fn main(_spawner: Spawner) -> ! {
    info!("pico-vectron shift register test");

    let p = embassy_rp::init(Default::default());
    let pins = LinkPinConfig::default();
    unwrap!(pins.validate());
    let mut claims = LineClaims::new();

    // The board's default pinout.
    let data = Output::new(p.PIN_2, PinLevel::Low);
    let latch = Output::new(p.PIN_3, PinLevel::Low);
    let clock = Output::new(p.PIN_4, PinLevel::Low);
    let interrupt = Output::new(p.PIN_5, PinLevel::High);

    let data = unwrap!(claims.output(pins.data, LineRole::Data, data, Level::Low));
    let clock = unwrap!(claims.output(pins.clock, LineRole::Clock, clock, Level::Low));
    let latch = unwrap!(claims.output(pins.latch, LineRole::Latch, latch, Level::Low));
    let mut interrupt = unwrap!(claims.output(
        pins.interrupt,
        LineRole::Interrupt,
        interrupt,
        Level::High
    ));

    let mut link = unwrap!(ShiftRegisterLink::new(data, clock, latch, SETTLE_TIME));
    let pattern = BitPattern::from_byte(PATTERN);
    unwrap!(link.write(pattern));
    info!("Shifted and latched {}", pattern.value());

    loop {
        Timer::after_millis(DELAY_MS).await;
        let level = match interrupt.level() {
            Level::High => Level::Low,
            Level::Low => Level::High,
        };
        info!("Set interrupt {}", level);
        unwrap!(interrupt.set_level(level));
    }
}
