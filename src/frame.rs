//! Frames - one downsampled image's worth of samples.
//!
//! The capture pipeline downsamples each image to 10x10 pixels, and hands
//! them over as interleaved RGB.  The images are greyscale, so only the first
//! channel of each pixel is kept, giving 100 samples per frame.
//!
//! Frames can also be rendered as an assembler data listing, for building
//! reference images into the peripheral's ROM.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use core::fmt;
use heapless::Vec;

use crate::constants::{CHANNEL_STRIDE, FRAME_SAMPLES};
use crate::quantize::{QuantizedLevel, Sample, quantize};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    samples: Vec<u8, FRAME_SAMPLES>,
}

impl Frame {
    pub const fn new() -> Self {
        Self {
            samples: Vec::new(),
        }
    }

    /// Build a frame from interleaved pixel data, keeping the first channel
    /// of each pixel.  Anything beyond a full frame is ignored, and a short
    /// buffer gives a short frame.
    pub fn from_interleaved(pixels: &[u8]) -> Self {
        let mut frame = Self::new();
        for &sample in pixels.iter().step_by(CHANNEL_STRIDE).take(FRAME_SAMPLES) {
            // Can't fail - take() stops at the frame's capacity.
            let _ = frame.samples.push(sample);
        }
        frame
    }

    /// Add a sample.  Hands the sample back if the frame is already full.
    pub fn push(&mut self, sample: Sample) -> Result<(), Sample> {
        self.samples
            .push(sample.value())
            .map_err(Sample::from)
    }

    pub fn is_complete(&self) -> bool {
        self.samples.is_full()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// The raw samples, in capture order.
    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    /// The samples quantized, in capture order.
    pub fn levels(&self) -> impl Iterator<Item = QuantizedLevel> + '_ {
        self.samples.iter().map(|&v| quantize(Sample::from(v)))
    }
}

/// Write `frame` as a labelled block of `.byte` directives, one per sample,
/// followed by a blank line:
///
/// ```text
/// Image0_up
///     .byte #$00
///     .byte #$05
/// ```
pub fn write_rom_listing<W: fmt::Write>(out: &mut W, label: &str, frame: &Frame) -> fmt::Result {
    writeln!(out, "{label}")?;
    for level in frame.levels() {
        writeln!(out, "    .byte #${:02x}", level.value())?;
    }
    writeln!(out)
}
