//! Board-agnostic core logic for the lighting controller
//!
//! This crate contains everything between the radio and the DMX line that
//! does not depend on a particular board:
//!
//! - Frame buffer shared between writers and the output task
//! - Fixture table and pattern engine
//! - Class C receive coordinator (join, continuous receive, uplinks)
//! - DMX output transmitter
//! - Command dispatcher and persisted settings
//!
//! Time is passed in as milliseconds since boot (`now_ms`) so the whole
//! crate can be driven by a simulated clock in tests.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod config;
pub mod deadline;
pub mod dispatch;
pub mod fixture;
pub mod frame;
pub mod output;
pub mod pattern;
pub mod radio;
pub mod settings;

#[cfg(test)]
mod test_support;

#[cfg(feature = "defmt")]
#[allow(unused_imports)]
use defmt::{debug, error, info, trace, warn};

#[cfg(all(feature = "log", not(feature = "defmt")))]
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

#[cfg(not(any(feature = "log", feature = "defmt")))]
compile_error!("enable either the `log` or the `defmt` feature");
