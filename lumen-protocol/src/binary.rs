//! Compact binary downlink formats
//!
//! Binary payloads are recognised purely by marker byte and length. Each
//! matcher returns `None` when the payload does not have its shape, so the
//! decoder can move on to the next format.

use heapless::Vec;

use crate::command::{
    LightWrite, PatternKind, PatternSpec, SimpleColor, BINARY_LIGHT_CHANNELS, MAX_LIGHTS,
    MAX_PAYLOAD,
};
use crate::decode::{DecodeError, RawLight};

/// Start of a binary pattern command
pub const PATTERN_MARKER: u8 = 0xF1;
/// Stop the running pattern
pub const STOP_MARKER: u8 = 0xF0;
/// Fixture count configuration
pub const CONFIG_MARKER: u8 = 0xC0;
/// Sentinels that request the built-in test (a ping)
pub const PING_SENTINELS: [u8; 2] = [0xAA, 0xFF];

/// Length of the binary pattern command
pub const PATTERN_LEN: usize = 6;

// Bytes per light in the counted lights format
const LIGHT_GROUP_LEN: usize = 1 + BINARY_LIGHT_CHANNELS;

/// Errors from the binary encoders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BinaryEncodeError {
    /// Output buffer too small
    BufferTooSmall,
    /// Zero lights, or more than fit one payload
    LightCount,
    /// Address does not fit the one-byte address field
    AddressOutOfRange,
    /// Light does not carry exactly four channels
    ChannelCount,
}

/// `[0..=4]` or `'0'..='4'` as the whole payload
pub fn simple_color(payload: &[u8]) -> Option<SimpleColor> {
    match payload {
        [byte] => SimpleColor::from_byte(*byte),
        _ => None,
    }
}

/// A payload led by a ping sentinel, whatever follows
pub fn is_ping(payload: &[u8]) -> bool {
    payload
        .first()
        .is_some_and(|first| PING_SENTINELS.contains(first))
}

/// `[N][addr r g b w]...` or the headerless single-light forms
pub fn lights(payload: &[u8]) -> Option<Vec<RawLight, MAX_LIGHTS>> {
    counted_lights(payload).or_else(|| legacy_light(payload))
}

fn counted_lights(payload: &[u8]) -> Option<Vec<RawLight, MAX_LIGHTS>> {
    let (&count, groups) = payload.split_first()?;
    let count = count as usize;
    if count == 0 || groups.len() != count * LIGHT_GROUP_LEN {
        return None;
    }

    let mut lights = Vec::new();
    for group in groups.chunks_exact(LIGHT_GROUP_LEN) {
        lights.push(RawLight::from_bytes(group[0], &group[1..])).ok()?;
    }
    Some(lights)
}

// [addr][r][g][b] (white = 0) and [addr][r][g][b][w]
//
// Short text such as "ping" or "hello" has the same length, so payloads made
// only of printable characters are left for the text decoders.
fn legacy_light(payload: &[u8]) -> Option<Vec<RawLight, MAX_LIGHTS>> {
    if !matches!(payload.len(), 4 | 5) || is_text(payload) {
        return None;
    }
    let mut channels = [0u8; BINARY_LIGHT_CHANNELS];
    channels[..payload.len() - 1].copy_from_slice(&payload[1..]);

    let mut lights = Vec::new();
    lights.push(RawLight::from_bytes(payload[0], &channels)).ok()?;
    Some(lights)
}

fn is_text(payload: &[u8]) -> bool {
    payload
        .iter()
        .all(|&b| b.is_ascii_graphic() || b.is_ascii_whitespace())
}

/// `[0xF1][type][speed le16][cycles le16]` or `[0xF0]`
pub fn pattern(payload: &[u8]) -> Option<Result<PatternCommand, DecodeError>> {
    match payload {
        [STOP_MARKER] => Some(Ok(PatternCommand::Stop)),
        [PATTERN_MARKER, kind, speed_lo, speed_hi, cycles_lo, cycles_hi] => {
            let Some(kind) = PatternKind::from_byte(*kind) else {
                return Some(Err(DecodeError::UnknownPattern));
            };
            let speed = u16::from_le_bytes([*speed_lo, *speed_hi]);
            let cycles = u16::from_le_bytes([*cycles_lo, *cycles_hi]);
            Some(Ok(PatternCommand::Run(PatternSpec::clamped(
                kind,
                speed as i64,
                cycles as i64,
                false,
            ))))
        }
        _ => None,
    }
}

/// Result of the binary pattern matcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternCommand {
    Run(PatternSpec),
    Stop,
}

/// `[0xC0][N]`, returning the unclamped count
pub fn fixture_count(payload: &[u8]) -> Option<u8> {
    match payload {
        [CONFIG_MARKER, count] => Some(*count),
        _ => None,
    }
}

/// Encode lights in the counted compact format
///
/// Every light must have an address in 1..=255 and exactly four channels.
pub fn encode_lights(lights: &[LightWrite], out: &mut [u8]) -> Result<usize, BinaryEncodeError> {
    if lights.is_empty() || 1 + lights.len() * LIGHT_GROUP_LEN > MAX_PAYLOAD {
        return Err(BinaryEncodeError::LightCount);
    }
    let len = 1 + lights.len() * LIGHT_GROUP_LEN;
    if out.len() < len {
        return Err(BinaryEncodeError::BufferTooSmall);
    }

    out[0] = lights.len() as u8;
    for (light, group) in lights.iter().zip(out[1..len].chunks_exact_mut(LIGHT_GROUP_LEN)) {
        let address =
            u8::try_from(light.address).map_err(|_| BinaryEncodeError::AddressOutOfRange)?;
        if address == 0 {
            return Err(BinaryEncodeError::AddressOutOfRange);
        }
        if light.channels.len() != BINARY_LIGHT_CHANNELS {
            return Err(BinaryEncodeError::ChannelCount);
        }
        group[0] = address;
        group[1..].copy_from_slice(&light.channels);
    }
    Ok(len)
}

/// Encode a pattern command (the staggered flag has no binary field)
pub fn encode_pattern(spec: &PatternSpec) -> [u8; PATTERN_LEN] {
    let speed = spec.speed_ms.to_le_bytes();
    let cycles = spec.cycles.to_le_bytes();
    [
        PATTERN_MARKER,
        spec.kind.to_byte(),
        speed[0],
        speed[1],
        cycles[0],
        cycles[1],
    ]
}

/// Encode a fixture count configuration
pub fn encode_fixture_count(count: u8) -> [u8; 2] {
    [CONFIG_MARKER, count]
}
