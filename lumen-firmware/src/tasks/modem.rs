//! Modem UART tasks
//!
//! The reader task is the interrupt top half of the radio: it frames lines
//! from the modem, routes them to the response or event channel and raises
//! the packet flag when a downlink event arrives. It never touches the
//! modem driver itself.

use defmt::*;
use embassy_rp::uart::{BufferedUartRx, BufferedUartTx};
use embassy_time::{with_timeout, Duration};
use embedded_io_async::{Read, Write};

use lumen_drivers::modem::at::is_rx_event;
use lumen_drivers::modem::{Line, LineFramer, LineKind, ModemTransport};
use lumen_hal::LinkError;

use crate::channels::{MODEM_EVENTS, MODEM_RESPONSES, PACKET_FLAG};

/// Buffer size for UART receive
const RX_BUF_SIZE: usize = 64;

/// Modem reader task - frames lines and flags downlinks
#[embassy_executor::task]
pub async fn radio_irq_task(mut rx: BufferedUartRx) {
    info!("Modem reader task started");

    let mut framer = LineFramer::new();
    let mut buf = [0u8; RX_BUF_SIZE];

    loop {
        match rx.read(&mut buf).await {
            Ok(n) => {
                for &byte in &buf[..n] {
                    if let Some((kind, line)) = framer.push(byte) {
                        route_line(kind, line);
                    }
                }
            }
            Err(e) => {
                warn!("Modem UART read error: {:?}", e);
            }
        }
    }
}

fn route_line(kind: LineKind, line: Line) {
    match kind {
        LineKind::Response => {
            trace!("modem -> {}", line.as_str());
            if MODEM_RESPONSES.try_send(line).is_err() {
                warn!("Modem response channel full, dropping line");
            }
        }
        LineKind::Event => {
            let downlink = is_rx_event(&line);
            if MODEM_EVENTS.try_send(line).is_err() {
                warn!("Modem event channel full, dropping event");
                return;
            }
            // Queued first so the drain always finds it
            if downlink {
                PACKET_FLAG.signal();
            }
        }
    }
}

/// [`ModemTransport`] over the reader task's channels
pub struct ChannelTransport {
    tx: BufferedUartTx,
}

impl ChannelTransport {
    pub fn new(tx: BufferedUartTx) -> Self {
        Self { tx }
    }
}

impl ModemTransport for ChannelTransport {
    async fn send_line(&mut self, line: &str) -> Result<(), LinkError> {
        // Anything still queued belongs to an earlier command
        MODEM_RESPONSES.clear();
        self.tx
            .write_all(line.as_bytes())
            .await
            .map_err(|_| LinkError::Transport)?;
        self.tx
            .write_all(b"\r\n")
            .await
            .map_err(|_| LinkError::Transport)
    }

    async fn next_response(&mut self, timeout_ms: u32) -> Option<Line> {
        with_timeout(
            Duration::from_millis(timeout_ms as u64),
            MODEM_RESPONSES.receive(),
        )
        .await
        .ok()
    }

    async fn next_event(&mut self, timeout_ms: u32) -> Option<Line> {
        if timeout_ms == 0 {
            return MODEM_EVENTS.try_receive().ok();
        }
        with_timeout(
            Duration::from_millis(timeout_ms as u64),
            MODEM_EVENTS.receive(),
        )
        .await
        .ok()
    }
}
