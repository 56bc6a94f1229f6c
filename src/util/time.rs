//! Blocking delays used for the link's timing critical pulses.
//!
//! We have two choices for a delay:
//! * block_for() - spins the current core for the duration indicated.  This
//!   is what we want for the clock, latch and interrupt pulses, which are a
//!   few microseconds long, and must not be stretched by the executor
//!   scheduling something else.
//! * Timer::after() - yields to the executor for the duration indicated.
//!   Because the executor will schedule something else during the yield, it
//!   is possible that the pause will be much longer than required.  That is
//!   fine for idle waits, but not for pulses.
//!
//! The acknowledge wait is neither - it is an edge wait, which yields until
//! the peripheral's edge arrives.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use embassy_time::{Duration, Instant};

/// Function to block until a specific instant.  This is similar to the
/// embassy-time::Delay::block_for function.
///
/// We always inline it to reduce function call/return overhead, as this is
/// typically used in timing critical functions
#[allow(clippy::inline_always)]
#[inline(always)]
pub fn block_until(expires: Instant) {
    while Instant::now() < expires {}
}

/// Function to block for a specific Duration.  This is similar to the
/// embassy-time::Delay::block_for function.
///
/// We always inline it to reduce function call/return overhead, as this is
/// typically used in timing critical functions
#[allow(clippy::inline_always)]
#[inline(always)]
pub fn block_for(duration: Duration) {
    block_until(Instant::now() + duration);
}
