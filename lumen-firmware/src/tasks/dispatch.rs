//! Main dispatch task
//!
//! Owns the command dispatcher (and through it the modem). Every pass
//! applies queued local commands, then runs one dispatcher poll. A pass
//! waits for AT command replies only; joins and uplinks finish on later
//! passes.

use defmt::*;
use embassy_time::{Duration, Instant, Ticker};

use lumen_core::config::DISPATCH_INTERVAL_MS;
use lumen_core::dispatch::CommandDispatcher;
use lumen_drivers::modem::AtModem;
use lumen_hal_rp2040::flash::Rp2040FlashStore;

use super::modem::ChannelTransport;
use crate::channels::{LOCAL_COMMANDS, MODEM_EVENTS, PACKET_FLAG};

/// The board's dispatcher
pub type Dispatcher =
    CommandDispatcher<'static, AtModem<ChannelTransport>, Rp2040FlashStore<'static>>;

/// Dispatch task - the controller main loop
#[embassy_executor::task]
pub async fn dispatch_task(mut dispatcher: Dispatcher) {
    info!("Dispatch task started");

    let start = Instant::now();
    let now_ms = || start.elapsed().as_millis() as u32;

    dispatcher.restore(now_ms()).await;

    let mut ticker = Ticker::every(Duration::from_millis(DISPATCH_INTERVAL_MS as u64));

    loop {
        while let Ok(command) = LOCAL_COMMANDS.try_receive() {
            let outcome = dispatcher.submit_local(command, now_ms());
            info!("Local command: {:?}", outcome);
        }

        let report = dispatcher.poll(now_ms()).await;
        if let Some(result) = report.downlink {
            match result {
                Ok(outcome) => info!("Downlink applied: {:?}", outcome),
                Err(e) => warn!("Downlink dropped: {:?}", e),
            }
        }
        if let Some(Ok(uplink)) = report.uplink {
            debug!("Uplink delivered: {:?}", uplink);
        }

        // One frame is drained per flag; re-raise it while more are waiting
        let link = dispatcher.coordinator().link();
        if link.stashed_frames() > 0 || !MODEM_EVENTS.is_empty() {
            PACKET_FLAG.signal();
        }

        ticker.next().await;
    }
}
