//! UART configuration
//!
//! RP2040 has two UART peripherals. The board uses UART0 for the DMX
//! transceiver and UART1 for the LoRaWAN modem.

use embassy_rp::uart::{Config, DataBits as RpDataBits, Parity as RpParity, StopBits as RpStopBits};
use lumen_hal::dmx::{BusConfig, DataBits, Parity, StopBits};

/// Modem serial line speed
pub const MODEM_BAUDRATE: u32 = 115_200;

/// Translate a bus line configuration into an embassy-rp UART config
pub fn uart_config(bus: &BusConfig) -> Config {
    let mut config = Config::default();
    config.baudrate = bus.baudrate;
    config.data_bits = match bus.data_bits {
        DataBits::Seven => RpDataBits::DataBits7,
        DataBits::Eight => RpDataBits::DataBits8,
    };
    config.parity = match bus.parity {
        Parity::None => RpParity::ParityNone,
        Parity::Even => RpParity::ParityEven,
        Parity::Odd => RpParity::ParityOdd,
    };
    config.stop_bits = match bus.stop_bits {
        StopBits::One => RpStopBits::STOP1,
        StopBits::Two => RpStopBits::STOP2,
    };
    config
}

/// 8N1 at [`MODEM_BAUDRATE`]
pub fn modem_config() -> Config {
    uart_config(&BusConfig {
        baudrate: MODEM_BAUDRATE,
        data_bits: DataBits::Eight,
        parity: Parity::None,
        stop_bits: StopBits::One,
    })
}
