//! This module contains constants for pico-vectron.
//!
//! The protocol timings are the defaults used by [`crate::link::LinkConfig`].
//! They must be preserved, or made longer, to stay within the shift
//! register's and peripheral's minimum pulse widths.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use embassy_time::Duration;
use static_assertions::const_assert;

//
// Protocol timings
//

/// How long the clock and latch lines are held at each level.  Must be at
/// least the shift register's minimum clock pulse width.
pub const SETTLE_TIME_US: u64 = 1;
pub const SETTLE_TIME: Duration = Duration::from_micros(SETTLE_TIME_US);

/// How long the interrupt line is held low to signal a byte is ready.
pub const INTERRUPT_PULSE_US: u64 = 20;
pub const INTERRUPT_PULSE: Duration = Duration::from_micros(INTERRUPT_PULSE_US);

/// Default time to wait for the peripheral to acknowledge a byte.  Kept below
/// the watchdog timeout so an unresponsive peripheral is reported, rather
/// than resetting the device.
pub const ACK_TIMEOUT_MS: u64 = 500;
pub const ACK_TIMEOUT: Duration = Duration::from_millis(ACK_TIMEOUT_MS);

/// How many times a byte is resent to an unresponsive peripheral before it is
/// skipped, by default.
pub const DEFAULT_ACK_RETRIES: u32 = 3;

//
// Wire format
//

/// Number of bits shifted per byte.  The byte is always shifted as a full 8
/// bit pattern, including the leading zeros.
pub const BITS_PER_BYTE: usize = 8;

/// Bits are shifted most significant first.  This must match the wiring of
/// the shift register's outputs to the peripheral's data bus - after 8 clock
/// pulses the first bit shifted sits in QH and the last in QA.
pub const BIT_ORDER_MSB_FIRST: bool = true;

/// The thresholds which divide raw samples into quantized levels.  A sample
/// below the first threshold is level 0, one at or above the last is level 5.
pub const QUANTIZE_THRESHOLDS: [u8; 5] = [10, 20, 30, 40, 50];

/// The highest quantized level.
pub const MAX_LEVEL: u8 = QUANTIZE_THRESHOLDS.len() as u8;

// Quantized levels fit in 3 bits, so always fit in a byte with room to spare.
const_assert!(MAX_LEVEL < 8);

//
// Frames
//

/// The capture pipeline downsamples each image to 10x10 pixels.
pub const FRAME_WIDTH: usize = 10;
pub const FRAME_HEIGHT: usize = 10;

/// Number of samples in a frame - one per downsampled pixel.
pub const FRAME_SAMPLES: usize = FRAME_WIDTH * FRAME_HEIGHT;

/// Pixels arrive as interleaved RGB.  We keep the first channel of each.
pub const CHANNEL_STRIDE: usize = 3;

//
// Line numbering
//

/// Number of GPIO numbers [`crate::line::LineClaims`] can track.
pub const MAX_LINES: u8 = 32;

/// Total number of GPIOs on the Pico, including those used internally.
pub const TOTAL_GPIOS: usize = 30;
const_assert!(TOTAL_GPIOS <= MAX_LINES as usize);

//
// Firmware timers
//

/// Watchdog hardware timeout - the watchdog resets the system if it isn't fed
/// at least this frequently.
#[cfg(feature = "firmware")]
pub const WATCHDOG_HW_TIMEOUT: Duration = Duration::from_millis(1500);

/// How often the task watchdog checks that its tasks have been fed.
#[cfg(feature = "firmware")]
pub const WATCHDOG_CHECK_INTERVAL: Duration = Duration::from_millis(500);

/// How often the link task must feed the watchdog to prevent a reset.  The
/// ack waits can't feed the watchdog, so this must exceed the longest a
/// single sample can take - every attempt timing out.
#[cfg(feature = "firmware")]
pub const LINK_WATCHDOG_TIMER_MS: u64 = 3000;
#[cfg(feature = "firmware")]
pub const LINK_WATCHDOG_TIMER: Duration = Duration::from_millis(LINK_WATCHDOG_TIMER_MS);
#[cfg(feature = "firmware")]
const_assert!(ACK_TIMEOUT_MS * (DEFAULT_ACK_RETRIES as u64 + 1) < LINK_WATCHDOG_TIMER_MS);

/// How long the link task waits for a sample before feeding the watchdog and
/// waiting again.
#[cfg(feature = "firmware")]
pub const LINK_IDLE_TIMER: Duration = Duration::from_millis(100);

// How often we aim to log from our primary loops to prove they are still
// alive.
#[cfg(feature = "firmware")]
pub const LOOP_LOG_INTERVAL: Duration = Duration::from_secs(5);

//
// USB device configuration constants.
//

/// USB Descriptor information - what current in mA this device draws.  The
/// shift register and level shifters are low power, so 100mA is plenty.
#[cfg(feature = "firmware")]
pub const USB_POWER_MA: u16 = 100;

/// USB Descriptor information - maximum endpoint 0 (control endpoint)
/// packet size.
#[cfg(feature = "firmware")]
pub const MAX_PACKET_SIZE_0: u8 = 64;

/// USB Descriptor information - maximum bulk endpoint packet size.
#[cfg(feature = "firmware")]
pub const MAX_EP_PACKET_SIZE: u16 = 64;
#[cfg(feature = "firmware")]
pub const MAX_EP_PACKET_SIZE_USIZE: usize = MAX_EP_PACKET_SIZE as usize;

/// USB Descriptor information - Vendor ID and Product ID.  This is the
/// pid.codes test VID/PID.
#[cfg(feature = "firmware")]
pub const VENDOR_ID: u16 = 0x1209;
#[cfg(feature = "firmware")]
pub const PRODUCT_ID: u16 = 0x0001;

/// USB Descriptor information - manufacturer string
#[cfg(feature = "firmware")]
pub const MANUFACTURER: &str = "piers.rocks";

/// USB Descriptor info - product string
#[cfg(feature = "firmware")]
pub const PRODUCT: &str = "pico-vectron sample link";

/// USB Descriptor info - serial number string
#[cfg(feature = "firmware")]
pub const SERIAL: &str = "000";

/// USB Descriptor info - device class, subclass, and protocol
#[cfg(feature = "firmware")]
pub const USB_CLASS: u8 = 0xff;
#[cfg(feature = "firmware")]
pub const USB_SUB_CLASS: u8 = 0;
#[cfg(feature = "firmware")]
pub const USB_PROTOCOL: u8 = 0;

//
// Other constants
//

/// Depth of the queue between the USB bulk task and the link task.  Two
/// packets' worth, so USB can receive the next packet while the link drains
/// the current one.
#[cfg(feature = "firmware")]
pub const SAMPLE_CHANNEL_SIZE: usize = MAX_EP_PACKET_SIZE_USIZE * 2;
#[cfg(feature = "firmware")]
const_assert!(MAX_EP_PACKET_SIZE_USIZE < SAMPLE_CHANNEL_SIZE);
