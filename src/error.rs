//! Errors returned by the sample link.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use core::fmt;

use crate::line::LineRole;

/// Everything that can go wrong driving the link.
///
/// Line-level errors are fatal and abort the current byte.  An unresponsive
/// peripheral and an out of range sample are recoverable - see
/// [`LinkError::is_fatal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError {
    /// A line was claimed twice, or its GPIO number is invalid.
    LineUnavailable(LineRole),

    /// A write to (or read from) a line failed.
    LineFault(LineRole),

    /// An edge wait was attempted without arming edge detection first.
    EdgeNotArmed(LineRole),

    /// An armed edge did not occur within the timeout.
    Timeout(LineRole),

    /// The peripheral did not acknowledge a byte within the ack timeout.
    PeripheralUnresponsive,

    /// A raw sample was outside 0..=255.
    OutOfRange(i32),
}

impl LinkError {
    /// Whether this error must abort the link.  Non-fatal errors are handled
    /// by the caller's recovery policy (timeouts), or by skipping the sample
    /// (out of range).
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            LinkError::Timeout(_) | LinkError::PeripheralUnresponsive | LinkError::OutOfRange(_)
        )
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::LineUnavailable(role) => write!(f, "{role} line unavailable"),
            LinkError::LineFault(role) => write!(f, "{role} line fault"),
            LinkError::EdgeNotArmed(role) => write!(f, "{role} line edge detection not armed"),
            LinkError::Timeout(role) => write!(f, "timed out waiting for {role} line edge"),
            LinkError::PeripheralUnresponsive => write!(f, "peripheral did not acknowledge"),
            LinkError::OutOfRange(v) => write!(f, "sample {v} out of range 0-255"),
        }
    }
}
