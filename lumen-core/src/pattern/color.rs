//! Colors and the hue wheel

use lumen_protocol::SimpleColor;

/// Six segments of 255 steps each
pub const WHEEL_SIZE: u16 = 6 * 255;

/// Red/green/blue/white channel values of one fixture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rgbw {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub w: u8,
}

impl Rgbw {
    pub const OFF: Self = Self::new(0, 0, 0, 0);
    /// Every emitter at full
    pub const FULL: Self = Self::new(255, 255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, w: u8) -> Self {
        Self { r, g, b, w }
    }
}

impl From<SimpleColor> for Rgbw {
    fn from(color: SimpleColor) -> Self {
        let [r, g, b, w] = color.rgbw();
        Self { r, g, b, w }
    }
}

/// Map a hue to a fully saturated color
///
/// Piecewise linear over six 255-wide segments:
/// red → yellow → green → cyan → blue → magenta → red.
pub fn hue_to_rgb(hue: u16) -> Rgbw {
    let hue = hue % WHEEL_SIZE;
    let x = (hue % 255) as u8;
    let (r, g, b) = match hue / 255 {
        0 => (255, x, 0),
        1 => (255 - x, 255, 0),
        2 => (0, 255, x),
        3 => (0, 255 - x, 255),
        4 => (x, 0, 255),
        _ => (255, 0, 255 - x),
    };
    Rgbw::new(r, g, b, 0)
}
