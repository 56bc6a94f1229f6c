//! Various utils for pico-vectron.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[cfg(feature = "firmware")]
pub(crate) mod built;
pub(crate) mod time;
