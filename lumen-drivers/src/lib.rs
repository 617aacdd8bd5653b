//! Driver implementations
//!
//! Concrete implementations of the `lumen-hal` traits, generic over the
//! embedded-hal / embedded-io traits so they build and test on the host:
//!
//! - [`modem::AtModem`]: LoRaWAN link over a RUI3 AT-command modem
//! - [`dmx::UartDmxBus`]: DMX512 output on a UART plus a break line

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod dmx;
pub mod modem;

#[cfg(feature = "defmt")]
#[allow(unused_imports)]
use defmt::{debug, error, info, trace, warn};

#[cfg(all(feature = "log", not(feature = "defmt")))]
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

#[cfg(not(any(feature = "log", feature = "defmt")))]
compile_error!("enable either the `log` or the `defmt` feature");
