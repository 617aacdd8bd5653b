//! RP2040-specific HAL for the lighting controller firmware
//!
//! RP2040 implementations of the shared `lumen-hal` traits:
//!
//! - Flash settings store (implements `lumen_hal::SettingsStore`)
//! - UART configuration for the DMX and modem serial lines

#![no_std]

pub mod flash;
pub mod uart;

pub use lumen_hal::{SettingsStore, StorageKey};
