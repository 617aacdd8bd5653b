//! Canonical command set
//!
//! Every downlink format decodes to one of these. The dispatcher never sees
//! wire bytes.

use heapless::Vec;
use serde::{Deserialize, Serialize};

/// Largest application payload accepted (US915 DR4 limit)
pub const MAX_PAYLOAD: usize = 242;

/// Most lights a single SetLights command can carry
pub const MAX_LIGHTS: usize = (MAX_PAYLOAD - 1) / 5;

/// Most channels a single light write can carry
pub const MAX_LIGHT_CHANNELS: usize = 16;

/// Channel width of the compact binary lights format
pub const BINARY_LIGHT_CHANNELS: usize = 4;

/// Upper bound for the configured fixture count
pub const MAX_FIXTURES: u8 = 25;

/// Highest addressable DMX channel
pub const MAX_CHANNEL: u16 = 512;

/// Pattern timing limits (milliseconds between steps)
pub const MIN_SPEED_MS: u16 = 5;
pub const MAX_SPEED_MS: u16 = 10_000;
pub const DEFAULT_SPEED_MS: u16 = 50;

/// Pattern cycle limits (0 = run until stopped)
pub const MAX_CYCLES: u16 = 10_000;
pub const DEFAULT_CYCLES: u16 = 5;

// Wire values of the pattern type byte
const PATTERN_FADE: u8 = 0;
const PATTERN_RAINBOW: u8 = 1;
const PATTERN_STROBE: u8 = 2;
const PATTERN_CHASE: u8 = 3;
const PATTERN_ALTERNATE: u8 = 4;

/// Animation types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PatternKind {
    /// Slow walk around the full hue wheel
    ColorFade,
    /// Fast walk around the hue wheel
    Rainbow,
    /// All fixtures flash white on/off
    Strobe,
    /// One fixture at a time lit white
    Chase,
    /// Even and odd fixtures take turns
    Alternate,
}

impl PatternKind {
    /// Parse the pattern type byte of the binary format
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            PATTERN_FADE => Some(PatternKind::ColorFade),
            PATTERN_RAINBOW => Some(PatternKind::Rainbow),
            PATTERN_STROBE => Some(PatternKind::Strobe),
            PATTERN_CHASE => Some(PatternKind::Chase),
            PATTERN_ALTERNATE => Some(PatternKind::Alternate),
            _ => None,
        }
    }

    /// Convert to the binary pattern type byte
    pub fn to_byte(self) -> u8 {
        match self {
            PatternKind::ColorFade => PATTERN_FADE,
            PatternKind::Rainbow => PATTERN_RAINBOW,
            PatternKind::Strobe => PATTERN_STROBE,
            PatternKind::Chase => PATTERN_CHASE,
            PatternKind::Alternate => PATTERN_ALTERNATE,
        }
    }

    /// Parse a pattern name as used in the JSON formats
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "fade" | "colorfade" | "color_fade" => Some(PatternKind::ColorFade),
            "rainbow" => Some(PatternKind::Rainbow),
            "strobe" => Some(PatternKind::Strobe),
            "chase" => Some(PatternKind::Chase),
            "alternate" => Some(PatternKind::Alternate),
            _ => None,
        }
    }
}

/// Pattern parameters, always within the safe ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PatternSpec {
    pub kind: PatternKind,
    /// Milliseconds between steps
    pub speed_ms: u16,
    /// Full cycles to run, 0 = until stopped
    pub cycles: u16,
    /// Offset each fixture along the pattern
    pub staggered: bool,
}

impl PatternSpec {
    /// Build a spec, clamping speed and cycles into their safe ranges
    pub fn clamped(kind: PatternKind, speed_ms: i64, cycles: i64, staggered: bool) -> Self {
        Self {
            kind,
            speed_ms: speed_ms.clamp(MIN_SPEED_MS as i64, MAX_SPEED_MS as i64) as u16,
            cycles: cycles.clamp(0, MAX_CYCLES as i64) as u16,
            staggered,
        }
    }

    /// Parameters used when only a pattern name was given
    pub fn shorthand(kind: PatternKind) -> Self {
        Self {
            kind,
            speed_ms: DEFAULT_SPEED_MS,
            cycles: DEFAULT_CYCLES,
            staggered: false,
        }
    }

    /// The built-in "continuous" test: an endless, staggered rainbow
    pub fn continuous(speed_ms: i64) -> Self {
        Self::clamped(PatternKind::Rainbow, speed_ms, 0, true)
    }
}

/// Fixed whole-rig colors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SimpleColor {
    Off,
    Red,
    Green,
    Blue,
    White,
}

impl SimpleColor {
    /// Parse the single-byte format (raw value or ASCII digit)
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 | b'0' => Some(SimpleColor::Off),
            1 | b'1' => Some(SimpleColor::Red),
            2 | b'2' => Some(SimpleColor::Green),
            3 | b'3' => Some(SimpleColor::Blue),
            4 | b'4' => Some(SimpleColor::White),
            _ => None,
        }
    }

    /// Parse a color name as used in the JSON formats
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "off" | "black" => Some(SimpleColor::Off),
            "red" => Some(SimpleColor::Red),
            "green" => Some(SimpleColor::Green),
            "blue" => Some(SimpleColor::Blue),
            "white" => Some(SimpleColor::White),
            _ => None,
        }
    }

    /// RGBW channel values for this color
    pub fn rgbw(self) -> [u8; 4] {
        match self {
            SimpleColor::Off => [0, 0, 0, 0],
            SimpleColor::Red => [255, 0, 0, 0],
            SimpleColor::Green => [0, 255, 0, 0],
            SimpleColor::Blue => [0, 0, 255, 0],
            SimpleColor::White => [0, 0, 0, 255],
        }
    }
}

/// A validated write of consecutive channels starting at `address`
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LightWrite {
    /// First DMX channel (1..=512)
    pub address: u16,
    /// Channel values, `address + len - 1 <= 512`
    pub channels: Vec<u8, MAX_LIGHT_CHANNELS>,
}

/// Canonical decoded command
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Write channel values directly
    SetLights(Vec<LightWrite, MAX_LIGHTS>),
    /// Start (or replace) the running pattern
    RunPattern(PatternSpec),
    /// Stop the running pattern, leaving the frame as is
    StopPattern,
    /// Set every fixture to a fixed color
    SimpleColor(SimpleColor),
    /// Resize the fixture table (already clamped to 1..=25)
    ConfigureFixtureCount(u8),
    /// Ask for a ping acknowledgement uplink
    Ping,
    /// Unrecognised payload, kept for logging
    Raw(Vec<u8, MAX_PAYLOAD>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_byte_mapping() {
        for byte in 0..=4u8 {
            let kind = PatternKind::from_byte(byte).unwrap();
            assert_eq!(kind.to_byte(), byte);
        }
        assert_eq!(PatternKind::from_byte(5), None);
    }

    #[test]
    fn test_pattern_names() {
        assert_eq!(PatternKind::from_name("fade"), Some(PatternKind::ColorFade));
        assert_eq!(PatternKind::from_name("rainbow"), Some(PatternKind::Rainbow));
        assert_eq!(PatternKind::from_name("disco"), None);
    }

    #[test]
    fn test_clamped_speed_floor() {
        let spec = PatternSpec::clamped(PatternKind::Strobe, 1, 3, false);
        assert_eq!(spec.speed_ms, MIN_SPEED_MS);

        let spec = PatternSpec::clamped(PatternKind::Strobe, -40, -1, false);
        assert_eq!(spec.speed_ms, MIN_SPEED_MS);
        assert_eq!(spec.cycles, 0);

        let spec = PatternSpec::clamped(PatternKind::Strobe, 1_000_000, 1_000_000, false);
        assert_eq!(spec.speed_ms, MAX_SPEED_MS);
        assert_eq!(spec.cycles, MAX_CYCLES);
    }

    #[test]
    fn test_continuous_is_endless_staggered_rainbow() {
        let spec = PatternSpec::continuous(30);
        assert_eq!(spec.kind, PatternKind::Rainbow);
        assert_eq!(spec.cycles, 0);
        assert!(spec.staggered);
        assert_eq!(spec.speed_ms, 30);
    }

    #[test]
    fn test_simple_color_bytes() {
        assert_eq!(SimpleColor::from_byte(0), Some(SimpleColor::Off));
        assert_eq!(SimpleColor::from_byte(b'4'), Some(SimpleColor::White));
        assert_eq!(SimpleColor::from_byte(5), None);
        assert_eq!(SimpleColor::Red.rgbw(), [255, 0, 0, 0]);
    }
}
