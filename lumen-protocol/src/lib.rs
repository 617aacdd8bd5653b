//! Lumen downlink/uplink protocol
//!
//! Lighting commands arrive as LoRaWAN downlinks in one of several formats
//! that accumulated over the life of the device. This crate turns any of
//! them into a single canonical [`Command`] and encodes the few status
//! messages the controller sends back.
//!
//! # Downlink formats
//!
//! ```text
//! Simple color   [0x00..0x04] or ASCII '0'..'4'
//! Ping           [0xAA|0xFF] ...
//! Lights         [N] N x ([addr][r][g][b][w])
//! Legacy light   [addr][r][g][b] | [addr][r][g][b][w]
//! Pattern        [0xF1][type][speed lo][speed hi][cycles lo][cycles hi]
//! Stop           [0xF0]
//! Fixture count  [0xC0][N]
//! JSON           {"lights":..} {"pattern":..} {"test":..} {"cmd":..}
//! ```
//!
//! Decoding is a single ordered-precedence function, see [`decode`].

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod binary;
pub mod command;
pub mod decode;
pub mod text;
pub mod uplink;

pub use command::{
    Command, LightWrite, PatternKind, PatternSpec, SimpleColor, MAX_FIXTURES, MAX_LIGHTS,
    MAX_LIGHT_CHANNELS, MAX_PAYLOAD,
};
pub use decode::{decode, DecodeError, Decoded};
pub use uplink::{EncodeError, Uplink};
