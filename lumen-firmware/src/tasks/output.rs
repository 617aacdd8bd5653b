//! DMX output task
//!
//! Runs on the high-priority interrupt executor so a slow modem exchange
//! in the dispatch task never delays a frame.

use defmt::*;
use embassy_rp::gpio::Output;
use embassy_rp::uart::BufferedUartTx;
use embassy_time::{Delay, Duration, Ticker};

use lumen_core::output::OutputTransmitter;
use lumen_drivers::dmx::UartDmxBus;

use crate::channels::{FRAME, OUTPUT_STATUS};

/// The board's DMX bus: UART0 TX plus the break line
pub type BoardBus = UartDmxBus<BufferedUartTx, Output<'static>>;

/// Output task - one DMX frame per tick
#[embassy_executor::task]
pub async fn output_task(mut transmitter: OutputTransmitter<BoardBus>) {
    info!("DMX output task started");

    let period = transmitter.config().frame_period_ms;
    let mut ticker = Ticker::every(Duration::from_millis(period as u64));
    let mut delay = Delay;

    loop {
        // Errors are counted in OUTPUT_STATUS; the next tick tries again
        let _ = transmitter
            .run_cycle(&FRAME, &mut delay, &OUTPUT_STATUS)
            .await;

        ticker.next().await;
    }
}
