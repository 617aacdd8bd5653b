//! UART DMX512 bus
//!
//! The data path is an ordinary UART at 250 kbaud 8N2. The break comes from
//! a GPIO that forces the transceiver input low while it is asserted, since
//! the UART cannot hold its own line low on demand.

use embedded_hal::digital::OutputPin;
use embedded_io_async::{Error as _, ErrorKind, Write};
use lumen_hal::DmxBus;

/// Errors from [`UartDmxBus`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UartDmxError {
    Uart(ErrorKind),
    BreakPin,
}

/// DMX bus on a UART transmitter plus a break line
pub struct UartDmxBus<W: Write, P: OutputPin> {
    uart: W,
    break_pin: P,
    /// Break asserted by driving the pin high
    active_high: bool,
}

impl<W: Write, P: OutputPin> UartDmxBus<W, P> {
    /// `break_pin` must already be in its released state
    pub fn new(uart: W, break_pin: P, active_high: bool) -> Self {
        Self {
            uart,
            break_pin,
            active_high,
        }
    }

    pub fn release(self) -> (W, P) {
        (self.uart, self.break_pin)
    }
}

impl<W: Write, P: OutputPin> DmxBus for UartDmxBus<W, P> {
    type Error = UartDmxError;

    fn set_break(&mut self, active: bool) -> Result<(), UartDmxError> {
        let high = active == self.active_high;
        let result = if high {
            self.break_pin.set_high()
        } else {
            self.break_pin.set_low()
        };
        result.map_err(|_| UartDmxError::BreakPin)
    }

    async fn write_slots(&mut self, slots: &[u8]) -> Result<(), UartDmxError> {
        self.uart
            .write_all(slots)
            .await
            .map_err(|e| UartDmxError::Uart(e.kind()))
    }

    async fn flush(&mut self) -> Result<(), UartDmxError> {
        self.uart
            .flush()
            .await
            .map_err(|e| UartDmxError::Uart(e.kind()))
    }
}
