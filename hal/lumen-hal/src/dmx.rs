//! DMX512 bus abstractions
//!
//! DMX512 is an asynchronous serial stream at 250 kbaud, 8N2, preceded by a
//! break and a mark-after-break. The break is driven separately from the
//! data path since most UARTs cannot hold the line low on demand.

use core::future::Future;

/// DMX512 line driver
pub trait DmxBus {
    /// Error type for bus operations
    type Error;

    /// Drive (`true`) or release (`false`) the break condition
    fn set_break(&mut self, active: bool) -> Result<(), Self::Error>;

    /// Serialize slots onto the line, start code first
    fn write_slots(&mut self, slots: &[u8]) -> impl Future<Output = Result<(), Self::Error>>;

    /// Wait until every queued byte has left the shift register
    fn flush(&mut self) -> impl Future<Output = Result<(), Self::Error>>;
}

/// Serial line configuration for the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    /// Baud rate in bits per second
    pub baudrate: u32,
    /// Number of data bits (typically 8)
    pub data_bits: DataBits,
    /// Parity mode
    pub parity: Parity,
    /// Number of stop bits
    pub stop_bits: StopBits,
}

impl BusConfig {
    /// DMX512-A line settings: 250 kbaud, 8 data bits, no parity, 2 stop bits
    pub const fn dmx() -> Self {
        Self {
            baudrate: 250_000,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::Two,
        }
    }

    /// Bits on the wire per slot (start bit included)
    pub const fn bits_per_slot(&self) -> u32 {
        let data = match self.data_bits {
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        };
        let parity = match self.parity {
            Parity::None => 0,
            Parity::Even | Parity::Odd => 1,
        };
        let stop = match self.stop_bits {
            StopBits::One => 1,
            StopBits::Two => 2,
        };
        1 + data + parity + stop
    }

    /// Time to shift `slots` bytes out, in microseconds
    pub const fn frame_time_us(&self, slots: usize) -> u32 {
        let bits = self.bits_per_slot() * slots as u32;
        // Round up so callers never under-estimate the wire time
        (bits as u64 * 1_000_000).div_ceil(self.baudrate as u64) as u32
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self::dmx()
    }
}

/// Number of data bits per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBits {
    Seven,
    Eight,
}

/// Parity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
}
