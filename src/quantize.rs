//! Quantizes raw samples into the link's payload alphabet, and renders
//! quantized levels as the 8 bit patterns shifted onto the wire.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use core::fmt;

use crate::constants::{BITS_PER_BYTE, MAX_LEVEL, QUANTIZE_THRESHOLDS};
use crate::error::LinkError;

/// A raw measurement - one colour channel of one downsampled pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Sample(u8);

impl Sample {
    /// Validate a raw value from the capture pipeline.
    pub fn new(raw: i32) -> Result<Self, LinkError> {
        u8::try_from(raw)
            .map(Sample)
            .map_err(|_| LinkError::OutOfRange(raw))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl From<u8> for Sample {
    fn from(value: u8) -> Self {
        Sample(value)
    }
}

impl TryFrom<i32> for Sample {
    type Error = LinkError;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        Sample::new(raw)
    }
}

/// One of the 6 levels a sample is quantized to.  Always 0..=5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct QuantizedLevel(u8);

impl QuantizedLevel {
    pub const MIN: QuantizedLevel = QuantizedLevel(0);
    pub const MAX: QuantizedLevel = QuantizedLevel(MAX_LEVEL);

    /// Returns `None` if `value` is above [`QuantizedLevel::MAX`].
    pub fn new(value: u8) -> Option<Self> {
        (value <= MAX_LEVEL).then_some(QuantizedLevel(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// The pattern shifted onto the wire for this level.
    pub fn to_pattern(self) -> BitPattern {
        BitPattern::from_level(self)
    }

    /// Iterate over all levels, lowest first.
    pub fn all() -> impl Iterator<Item = QuantizedLevel> {
        (0..=MAX_LEVEL).map(QuantizedLevel)
    }
}

impl fmt::Display for QuantizedLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Quantize a sample.  The level is the number of thresholds the sample is at
/// or above, so v < 10 is 0, v < 20 is 1, and so on up to v >= 50 being 5.
pub fn quantize(sample: Sample) -> QuantizedLevel {
    let v = sample.value();
    let level = QUANTIZE_THRESHOLDS.iter().take_while(|&&t| v >= t).count();

    // There are MAX_LEVEL thresholds, so this can't exceed MAX_LEVEL.
    #[allow(clippy::cast_possible_truncation)]
    QuantizedLevel(level as u8)
}

/// Validate then quantize a raw value.
pub fn quantize_raw(raw: i32) -> Result<QuantizedLevel, LinkError> {
    Sample::new(raw).map(quantize)
}

/// The 8 bits shifted for one byte, in the order they go onto the wire -
/// most significant bit first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BitPattern([bool; BITS_PER_BYTE]);

impl BitPattern {
    pub const LEN: usize = BITS_PER_BYTE;

    pub fn from_level(level: QuantizedLevel) -> Self {
        Self::from_byte(level.value())
    }

    /// Any byte can be shifted - used by the hardware tests to send arbitrary
    /// patterns.
    pub fn from_byte(byte: u8) -> Self {
        let mut bits = [false; BITS_PER_BYTE];
        for (ii, bit) in bits.iter_mut().enumerate() {
            *bit = byte & (0x80 >> ii) != 0;
        }
        Self(bits)
    }

    /// The bits, MSB first.
    pub fn bits(&self) -> &[bool; BITS_PER_BYTE] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Reassemble the byte, treating the first bit as the MSB.
    pub fn value(&self) -> u8 {
        self.0
            .iter()
            .fold(0, |acc, &bit| (acc << 1) | u8::from(bit))
    }

    /// Decode back to a quantized level.  Returns `None` for patterns which
    /// weren't produced from a level.
    pub fn to_level(&self) -> Option<QuantizedLevel> {
        QuantizedLevel::new(self.value())
    }
}

impl From<QuantizedLevel> for BitPattern {
    fn from(level: QuantizedLevel) -> Self {
        BitPattern::from_level(level)
    }
}

impl fmt::Display for BitPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bit in self.iter() {
            f.write_str(if bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(raw: i32) -> u8 {
        quantize_raw(raw).unwrap().value()
    }

    #[test]
    fn quantize_boundaries() {
        assert_eq!(level(0), 0);
        assert_eq!(level(9), 0);
        assert_eq!(level(10), 1);
        assert_eq!(level(19), 1);
        assert_eq!(level(20), 2);
        assert_eq!(level(29), 2);
        assert_eq!(level(30), 3);
        assert_eq!(level(39), 3);
        assert_eq!(level(40), 4);
        assert_eq!(level(49), 4);
        assert_eq!(level(50), 5);
        assert_eq!(level(255), 5);
    }

    #[test]
    fn quantize_matches_tens_below_fifty() {
        for v in 0..=255u8 {
            let expected = if v < 50 { v / 10 } else { 5 };
            assert_eq!(quantize(Sample::from(v)).value(), expected, "sample {v}");
        }
    }

    #[test]
    fn quantize_is_monotonic() {
        let mut last = QuantizedLevel::MIN;
        for v in 0..=255u8 {
            let l = quantize(Sample::from(v));
            assert!(l >= last);
            last = l;
        }
        assert_eq!(last, QuantizedLevel::MAX);
    }

    #[test]
    fn out_of_range_samples_rejected() {
        assert_eq!(quantize_raw(-1), Err(LinkError::OutOfRange(-1)));
        assert_eq!(quantize_raw(256), Err(LinkError::OutOfRange(256)));
        assert_eq!(Sample::try_from(1000_i32), Err(LinkError::OutOfRange(1000)));
    }

    #[test]
    fn levels_above_five_are_not_levels() {
        assert!(QuantizedLevel::new(5).is_some());
        assert!(QuantizedLevel::new(6).is_none());
    }

    #[test]
    fn pattern_round_trips_every_level() {
        for level in QuantizedLevel::all() {
            let pattern = level.to_pattern();
            assert_eq!(pattern.len(), 8);
            assert_eq!(pattern.to_level(), Some(level));
        }
        assert_eq!(QuantizedLevel::all().count(), 6);
    }

    #[test]
    fn pattern_is_msb_first() {
        let pattern = BitPattern::from_byte(0b1000_0001);
        assert_eq!(
            pattern.bits(),
            &[true, false, false, false, false, false, false, true]
        );
        let five = QuantizedLevel::new(5).unwrap().to_pattern();
        assert_eq!(five.to_string(), "00000101");
        assert_eq!(five.value(), 5);
    }
}
