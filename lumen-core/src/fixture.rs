//! Fixture table
//!
//! A fixture is a light occupying a few consecutive DMX channels. The
//! table decides how many fixtures the pattern engine and the simple
//! colors fan out to; raw channel writes ignore it.

use core::fmt::Write;

use heapless::{String, Vec};

use crate::frame::{FrameBuffer, MAX_CHANNEL};
use crate::pattern::Rgbw;

/// Upper bound on configured fixtures
pub const MAX_FIXTURES: usize = lumen_protocol::MAX_FIXTURES as usize;

/// Fixture count used until configured otherwise
pub const DEFAULT_FIXTURE_COUNT: u8 = 4;

/// Channels between the start addresses of default fixtures
pub const DEFAULT_CHANNEL_STRIDE: u16 = 4;

/// Maximum fixture name length
pub const MAX_NAME_LEN: usize = 16;

/// Channel offsets of each emitter relative to the start address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelMap {
    pub red: Option<u8>,
    pub green: Option<u8>,
    pub blue: Option<u8>,
    pub white: Option<u8>,
}

impl ChannelMap {
    /// Four-channel RGBW fixture in R, G, B, W order
    pub const RGBW: Self = Self {
        red: Some(0),
        green: Some(1),
        blue: Some(2),
        white: Some(3),
    };
}

/// One fixture
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FixtureConfig {
    pub name: String<MAX_NAME_LEN>,
    /// First channel (1..=512)
    pub start_address: u16,
    pub channels: ChannelMap,
}

impl FixtureConfig {
    /// Fixture `index` of the default layout: RGBW, packed back to back
    pub fn default_for(index: usize) -> Self {
        let mut name = String::new();
        let _ = write!(name, "fixture{}", index + 1);
        Self {
            name,
            start_address: 1 + index as u16 * DEFAULT_CHANNEL_STRIDE,
            channels: ChannelMap::RGBW,
        }
    }

    /// Write a color to this fixture's channels
    ///
    /// Emitters mapped past channel 512 are skipped.
    pub fn write(&self, frame: &mut FrameBuffer, color: Rgbw) {
        let map = self.channels;
        for (offset, value) in [
            (map.red, color.r),
            (map.green, color.g),
            (map.blue, color.b),
            (map.white, color.w),
        ] {
            let Some(offset) = offset else { continue };
            let channel = self.start_address + offset as u16;
            if channel <= MAX_CHANNEL {
                let _ = frame.set_channel(channel, value);
            }
        }
    }
}

/// Ordered list of configured fixtures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureTable {
    fixtures: Vec<FixtureConfig, MAX_FIXTURES>,
}

impl Default for FixtureTable {
    fn default() -> Self {
        Self::with_count(DEFAULT_FIXTURE_COUNT)
    }
}

impl FixtureTable {
    /// Table of `count` default fixtures (clamped to 1..=25)
    pub fn with_count(count: u8) -> Self {
        let mut table = Self {
            fixtures: Vec::new(),
        };
        table.resize(count);
        table
    }

    /// Number of fixtures
    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    /// True if no fixtures are configured
    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&FixtureConfig> {
        self.fixtures.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FixtureConfig> {
        self.fixtures.iter()
    }

    /// Replace the table with one of `count` fixtures
    ///
    /// Fixtures that survive the resize keep their configuration, new ones
    /// get the default layout. The new table is built aside and swapped in
    /// whole. Returns the count actually applied.
    pub fn resize(&mut self, count: u8) -> u8 {
        let count = (count as usize).clamp(1, MAX_FIXTURES);
        let mut fixtures = Vec::new();
        for index in 0..count {
            let fixture = self
                .fixtures
                .get(index)
                .cloned()
                .unwrap_or_else(|| FixtureConfig::default_for(index));
            // count <= MAX_FIXTURES
            let _ = fixtures.push(fixture);
        }
        self.fixtures = fixtures;
        count as u8
    }

    /// Write a color to fixture `index`
    pub fn write_color(&self, frame: &mut FrameBuffer, index: usize, color: Rgbw) {
        if let Some(fixture) = self.fixtures.get(index) {
            fixture.write(frame, color);
        }
    }

    /// Write the same color to every fixture
    pub fn fill(&self, frame: &mut FrameBuffer, color: Rgbw) {
        for fixture in &self.fixtures {
            fixture.write(frame, color);
        }
    }
}
