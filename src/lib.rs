//! pico-vectron
//!
//! Streams quantized sensor samples from a Pico to a retro computer, one byte
//! at a time, through a 74HC595 serial-in/parallel-out shift register.
//!
//! Each byte goes through a strict cycle:
//! - the 8 bits are clocked into the shift register, MSB first
//! - the latch is pulsed, presenting the byte on the register's outputs
//! - the (active low) interrupt line is pulsed, telling the peripheral a byte
//!   is ready
//! - we wait for a falling edge on the acknowledge line, which the peripheral
//!   drives once it has consumed the byte.
//!
//! The next byte is not clocked in until the acknowledge arrives, so a slow
//! peripheral controls our pace, and is never overrun.
//!
//! The protocol core ([`line`], [`quantize`], [`link`], [`frame`]) is written
//! against the `embedded-hal` traits and has no dependency on the RP2040, so
//! it is tested on the host.  The firmware itself is only built with the
//! `firmware` feature (pulled in by `pico` or `pico2`).

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#![cfg_attr(not(test), no_std)]

// Provide some feature guidance when compiling the firmware.
#[cfg(all(feature = "firmware", not(any(feature = "pico", feature = "pico2"))))]
compile_error!("Either 'pico' or 'pico2' feature must be enabled to build the firmware");
#[cfg(all(feature = "pico", feature = "pico2"))]
compile_error!("Features 'pico' and 'pico2' cannot be enabled simultaneously");

// Protocol core - builds everywhere.
pub mod constants;
pub mod error;
pub mod frame;
pub mod line;
pub mod link;
pub mod quantize;
pub(crate) mod util;

// Firmware - only built for the Pico.
#[cfg(feature = "firmware")]
pub mod entry;
#[cfg(feature = "firmware")]
pub(crate) mod infra;
#[cfg(feature = "firmware")]
mod task;
#[cfg(feature = "firmware")]
mod usb;

pub use error::LinkError;
pub use frame::{Frame, write_rom_listing};
pub use line::{Edge, InputLine, Level, LineClaims, LineRole, LinkPinConfig, OutputLine};
pub use link::{
    AbortPolicy, Delivery, HandshakeChannel, HandshakeState, IterSource, LinkConfig, LinkLines,
    LinkStats, Recovery, RecoveryPolicy, RetryPolicy, SampleLink, SampleSource, ShiftRegisterLink,
    SkipPolicy,
};
pub use quantize::{BitPattern, QuantizedLevel, Sample, quantize, quantize_raw};

#[cfg(feature = "firmware")]
pub use entry::{common_main, defmt_panic_handler, panic_handler};

// Extra binary information that picotool can read.
#[cfg(feature = "firmware")]
#[unsafe(link_section = ".bi_entries")]
#[used]
pub static PICOTOOL_ENTRIES: [embassy_rp::binary_info::EntryAddr; 4] = [
    embassy_rp::binary_info::rp_program_name!(c"pico-vectron by piers.rocks"),
    embassy_rp::binary_info::rp_program_description!(
        c"Streams quantized sensor samples to a retro computer via a shift register, with an interrupt/acknowledge handshake."
    ),
    embassy_rp::binary_info::rp_cargo_version!(),
    embassy_rp::binary_info::rp_program_build_attribute!(),
];

// A note about Statics
//
// The protocol core has no statics at all - pins and timings are passed into
// the link constructors via LinkPinConfig and LinkConfig, and each link owns
// its lines outright.
//
// The firmware does need a few, in order to hand objects to spawned tasks:
//
// - Use StaticCell for statics that cannot be initialized at compile time
//   (the USB device, the watchdog).
//
// - Use ConstStaticCell for statics that can be initialized at compile time
//   (the USB descriptor buffers).
//
// - SAMPLE_CHANNEL is an embassy_sync Channel, which provides its own
//   locking.  We use CriticalSectionRawMutex, as that is safe whichever core
//   the tasks end up on.
