//! Ordered-precedence downlink decoder
//!
//! The legacy wire formats overlap, so the order below is part of the
//! contract: the first format that matches wins.
//!
//! 1. Single byte simple color (`0..=4`, `'0'..='4'`)
//! 2. Ping sentinel (`0xAA` / `0xFF` first byte)
//! 3. Binary lights (counted, or headerless unless it reads as plain text)
//! 4. Binary pattern / stop
//! 5. Fixture count configuration
//! 6. JSON document, otherwise [`Command::Raw`]
//!
//! Validation is applied the same way whatever the source format. A light
//! that fails validation is skipped and the rest of the command still
//! applies.

use heapless::Vec;

use crate::binary::{self, PatternCommand};
use crate::command::{
    Command, LightWrite, MAX_CHANNEL, MAX_FIXTURES, MAX_LIGHTS, MAX_LIGHT_CHANNELS,
};
use crate::text::{self, TextCommand};

/// Highest LoRaWAN application port
pub const MAX_APP_PORT: u8 = 223;

/// Errors that make a downlink unusable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Port 0 (MAC commands) or a reserved port
    InvalidPort(u8),
    /// Zero-length payload
    Empty,
    /// Pattern type byte or name not recognised
    UnknownPattern,
    /// Every light in a SetLights failed validation
    NoValidLights,
    /// Recognised document shape with missing or mistyped fields
    Malformed,
    /// Payload longer than any downlink can be
    TooLarge,
}

/// A decoded command plus what validation dropped
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Decoded {
    pub command: Command,
    /// Lights skipped by validation
    pub skipped: usize,
}

impl Decoded {
    fn clean(command: Command) -> Self {
        Self { command, skipped: 0 }
    }
}

/// A light write before validation
///
/// Values are kept wide so out-of-range JSON numbers can be clamped rather
/// than rejected by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLight {
    pub address: i32,
    pub channels: Vec<i32, MAX_LIGHT_CHANNELS>,
}

impl RawLight {
    pub(crate) fn from_bytes(address: u8, channels: &[u8]) -> Self {
        Self {
            address: address as i32,
            channels: channels.iter().map(|&c| c as i32).collect(),
        }
    }

    /// Validate address range and clamp channel values
    pub fn validate(&self) -> Option<LightWrite> {
        if self.channels.is_empty() || !(1..=MAX_CHANNEL as i32).contains(&self.address) {
            return None;
        }
        let last = self.address + self.channels.len() as i32 - 1;
        if last > MAX_CHANNEL as i32 {
            return None;
        }
        Some(LightWrite {
            address: self.address as u16,
            channels: self
                .channels
                .iter()
                .map(|&c| c.clamp(0, u8::MAX as i32) as u8)
                .collect(),
        })
    }
}

/// Decode one downlink payload received on `port`
pub fn decode(port: u8, payload: &[u8]) -> Result<Decoded, DecodeError> {
    if port == 0 || port > MAX_APP_PORT {
        return Err(DecodeError::InvalidPort(port));
    }
    if payload.is_empty() {
        return Err(DecodeError::Empty);
    }

    if let Some(color) = binary::simple_color(payload) {
        return Ok(Decoded::clean(Command::SimpleColor(color)));
    }
    if binary::is_ping(payload) {
        return Ok(Decoded::clean(Command::Ping));
    }
    if let Some(lights) = binary::lights(payload) {
        return set_lights(&lights, 0);
    }
    if let Some(pattern) = binary::pattern(payload) {
        return pattern.map(|p| {
            Decoded::clean(match p {
                PatternCommand::Run(spec) => Command::RunPattern(spec),
                PatternCommand::Stop => Command::StopPattern,
            })
        });
    }
    if let Some(count) = binary::fixture_count(payload) {
        return Ok(Decoded::clean(Command::ConfigureFixtureCount(
            clamp_fixture_count(count),
        )));
    }

    match text::parse(payload) {
        Some(Ok(TextCommand::Lights { lights, dropped })) => set_lights(&lights, dropped),
        Some(Ok(TextCommand::Pattern(spec))) => Ok(Decoded::clean(Command::RunPattern(spec))),
        Some(Ok(TextCommand::Stop)) => Ok(Decoded::clean(Command::StopPattern)),
        Some(Ok(TextCommand::Color(color))) => Ok(Decoded::clean(Command::SimpleColor(color))),
        Some(Ok(TextCommand::Ping)) => Ok(Decoded::clean(Command::Ping)),
        Some(Err(e)) => Err(e),
        None => Vec::from_slice(payload)
            .map(|raw| Decoded::clean(Command::Raw(raw)))
            .map_err(|_| DecodeError::TooLarge),
    }
}

/// Clamp a requested fixture count to 1..=25
pub fn clamp_fixture_count(count: u8) -> u8 {
    count.clamp(1, MAX_FIXTURES)
}

fn set_lights(raw: &[RawLight], dropped: usize) -> Result<Decoded, DecodeError> {
    let mut lights: Vec<LightWrite, MAX_LIGHTS> = Vec::new();
    let mut skipped = dropped;
    for light in raw {
        match light.validate() {
            // raw.len() never exceeds MAX_LIGHTS, so the push cannot fail
            Some(valid) => {
                if lights.push(valid).is_err() {
                    skipped += 1;
                }
            }
            None => skipped += 1,
        }
    }
    if lights.is_empty() {
        return Err(DecodeError::NoValidLights);
    }
    Ok(Decoded {
        command: Command::SetLights(lights),
        skipped,
    })
}
