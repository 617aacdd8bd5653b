//! AT-command LoRaWAN modem
//!
//! [`AtModem`] implements [`LoraLink`] for modules running the RAK RUI3
//! firmware (RAK3172 and friends). The module runs the LoRaWAN stack; this
//! driver only issues commands and interprets events.

pub mod at;
pub mod transport;

pub use at::{Line, RxMeta, MAX_LINE};
pub use transport::{LineFramer, LineKind, ModemTransport};

use heapless::Deque;
use lumen_hal::{CodingRate, FrameInfo, LinkError, LinkEvent, LoraLink, RxParams};

use crate::{debug, info, warn};

/// Receive events kept while waiting for another event
const STASH_DEPTH: usize = 4;

/// Modem timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModemConfig {
    /// Time allowed for a command's final status
    pub command_timeout_ms: u32,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            command_timeout_ms: 1_000,
        }
    }
}

/// RUI3 modem driver
///
/// Join and send only wait for the command's `OK`. The `+EVT` line that
/// ends them is picked up by [`LoraLink::poll_event`] on a later pass, so
/// the caller never waits for the network.
pub struct AtModem<T: ModemTransport> {
    transport: T,
    config: ModemConfig,
    /// Receive parameters last programmed
    armed: Option<RxParams>,
    /// Last `AT+CFM` setting sent
    confirmed: Option<bool>,
    /// Receive events seen while waiting for something else
    stash: Deque<Line, STASH_DEPTH>,
    /// Join or uplink outcome seen while doing something else
    completion: Option<LinkEvent>,
}

impl<T: ModemTransport> AtModem<T> {
    pub fn new(transport: T, config: ModemConfig) -> Self {
        Self {
            transport,
            config,
            armed: None,
            confirmed: None,
            stash: Deque::new(),
            completion: None,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Receive events set aside while a command was running
    pub fn stashed_frames(&self) -> usize {
        self.stash.len()
    }

    /// Send a command and wait for its status
    ///
    /// Returns the last value line, if the command produced one.
    pub async fn command(&mut self, line: &str) -> Result<Option<Line>, LinkError> {
        debug!("modem <- {}", line);
        self.transport.send_line(line).await?;

        let mut value = None;
        loop {
            let Some(response) = self
                .transport
                .next_response(self.config.command_timeout_ms)
                .await
            else {
                warn!("modem did not answer {}", line);
                return Err(LinkError::Timeout);
            };
            match at::classify(&response) {
                at::Response::Ok => return Ok(value),
                at::Response::Error(e) => {
                    debug!("modem -> {}", response.as_str());
                    return Err(e);
                }
                at::Response::Value(v) => {
                    value = Line::try_from(v).ok();
                }
                at::Response::Event => self.keep_event(response),
            }
        }
    }

    fn keep_event(&mut self, event: Line) {
        if at::is_rx_event(&event) {
            if self.stash.push_back(event).is_err() {
                warn!("receive events piling up, dropping one");
            }
        } else if let Some(done) = at::completion(&event) {
            if let Some(lost) = self.completion.replace(done) {
                warn!("unclaimed modem outcome {:?} replaced", lost);
            }
        } else {
            debug!("modem event ignored: {}", event.as_str());
        }
    }

    async fn set_confirmed(&mut self, confirmed: bool) -> Result<(), LinkError> {
        if self.confirmed != Some(confirmed) {
            self.command(&at::confirm_command(confirmed)).await?;
            self.confirmed = Some(confirmed);
        }
        Ok(())
    }

    async fn class_c_active(&mut self) -> bool {
        matches!(
            self.command(at::cmd::CLASS_QUERY).await,
            Ok(Some(class)) if class.as_str() == "C"
        )
    }
}

impl<T: ModemTransport> LoraLink for AtModem<T> {
    async fn join(&mut self) -> Result<(), LinkError> {
        self.armed = None;
        self.completion = None;
        self.command(at::cmd::JOIN).await?;
        Ok(())
    }

    async fn is_joined(&mut self) -> bool {
        matches!(
            self.command(at::cmd::JOIN_STATUS).await,
            Ok(Some(status)) if status.as_str() == "1"
        )
    }

    async fn assigned_address(&mut self) -> Result<u32, LinkError> {
        let value = self
            .command(at::cmd::DEVADDR)
            .await?
            .ok_or(LinkError::Transport)?;
        u32::from_str_radix(value.trim(), 16).map_err(|_| LinkError::Transport)
    }

    async fn send_uplink(
        &mut self,
        payload: &[u8],
        port: u8,
        confirmed: bool,
    ) -> Result<(), LinkError> {
        if port == 0 || port > 223 {
            return Err(LinkError::UnsupportedParameter);
        }
        let line = at::send_command(port, payload)?;
        self.set_confirmed(confirmed).await?;
        self.completion = None;
        self.command(&line).await?;
        Ok(())
    }

    async fn poll_event(&mut self) -> Option<LinkEvent> {
        if let Some(done) = self.completion.take() {
            return Some(done);
        }
        while let Some(line) = self.transport.next_event(0).await {
            if let Some(done) = at::completion(&line) {
                return Some(done);
            }
            self.keep_event(line);
        }
        None
    }

    async fn arm_continuous_receive(&mut self, params: &RxParams) -> Result<(), LinkError> {
        if params.coding_rate != CodingRate::Cr4_5 {
            return Err(LinkError::UnsupportedParameter);
        }
        let data_rate = at::us915_data_rate(params.spreading_factor, params.bandwidth)
            .ok_or(LinkError::UnsupportedParameter)?;

        // The module returns to continuous receive by itself after an
        // uplink, so unchanged parameters only need a class check
        if self.armed == Some(*params) && self.class_c_active().await {
            return Ok(());
        }

        self.armed = None;
        self.command(at::cmd::CLASS_C).await?;
        self.command(&at::rx2_frequency_command(params.frequency_hz))
            .await?;
        self.command(&at::rx2_data_rate_command(data_rate)).await?;
        self.armed = Some(*params);
        info!(
            "class C receive at {} Hz, DR{}",
            params.frequency_hz, data_rate
        );
        Ok(())
    }

    async fn read_pending_frame(&mut self, buf: &mut [u8]) -> Result<FrameInfo, LinkError> {
        let line = match self.stash.pop_front() {
            Some(line) => line,
            None => loop {
                match self.transport.next_event(0).await {
                    Some(line) if at::is_rx_event(&line) => break line,
                    Some(other) => self.keep_event(other),
                    None => return Err(LinkError::NoFrame),
                }
            },
        };

        let (info, meta) = at::parse_rx_event(&line, buf).unwrap_or(Err(LinkError::Integrity))?;
        debug!(
            "downlink port {} len {} rssi {} snr {}",
            info.port, info.len, meta.rssi, meta.snr
        );
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;
    use lumen_hal::Bandwidth;
    use std::collections::VecDeque;
    use std::string::String;
    use std::vec::Vec;

    #[derive(Default)]
    struct ScriptedTransport {
        responses: VecDeque<&'static str>,
        events: VecDeque<&'static str>,
        sent: Vec<String>,
    }

    impl ScriptedTransport {
        fn respond(mut self, lines: &[&'static str]) -> Self {
            self.responses.extend(lines);
            self
        }

        fn emit(mut self, lines: &[&'static str]) -> Self {
            self.events.extend(lines);
            self
        }
    }

    impl ModemTransport for ScriptedTransport {
        async fn send_line(&mut self, line: &str) -> Result<(), LinkError> {
            self.sent.push(line.into());
            Ok(())
        }

        async fn next_response(&mut self, _timeout_ms: u32) -> Option<Line> {
            self.responses.pop_front().and_then(|l| Line::try_from(l).ok())
        }

        async fn next_event(&mut self, _timeout_ms: u32) -> Option<Line> {
            self.events.pop_front().and_then(|l| Line::try_from(l).ok())
        }
    }

    fn modem(transport: ScriptedTransport) -> AtModem<ScriptedTransport> {
        AtModem::new(transport, ModemConfig::default())
    }

    fn rx(bandwidth: Bandwidth) -> RxParams {
        RxParams {
            frequency_hz: 923_300_000,
            spreading_factor: 12,
            bandwidth,
            coding_rate: CodingRate::Cr4_5,
        }
    }

    #[test]
    fn test_join_success() {
        let mut modem = modem(
            ScriptedTransport::default()
                .respond(&["OK", "AT+NJS=1", "OK", "AT+DEVADDR=26011A2B", "OK"])
                .emit(&["+EVT:JOINED"]),
        );
        assert_eq!(block_on(modem.join()), Ok(()));
        assert_eq!(block_on(modem.poll_event()), Some(LinkEvent::JoinDone(Ok(()))));
        assert!(block_on(modem.is_joined()));
        assert_eq!(block_on(modem.assigned_address()), Ok(0x2601_1A2B));
        assert_eq!(
            modem.transport().sent,
            ["AT+JOIN=1:0:10:1", "AT+NJS=?", "AT+DEVADDR=?"]
        );
    }

    #[test]
    fn test_join_failure_event() {
        let mut modem = modem(
            ScriptedTransport::default()
                .respond(&["OK"])
                .emit(&["+EVT:JOIN_FAILED_RX_TIMEOUT"]),
        );
        assert_eq!(block_on(modem.join()), Ok(()));
        assert_eq!(
            block_on(modem.poll_event()),
            Some(LinkEvent::JoinDone(Err(LinkError::Rejected)))
        );
    }

    #[test]
    fn test_join_returns_before_network_answers() {
        let mut modem = modem(ScriptedTransport::default().respond(&["OK"]));
        assert_eq!(block_on(modem.join()), Ok(()));
        assert_eq!(block_on(modem.poll_event()), None);

        modem.transport_mut().events.push_back("+EVT:JOINED");
        assert_eq!(block_on(modem.poll_event()), Some(LinkEvent::JoinDone(Ok(()))));
        assert_eq!(block_on(modem.poll_event()), None);
    }

    #[test]
    fn test_unanswered_join_command_times_out() {
        let mut modem = modem(ScriptedTransport::default());
        assert_eq!(block_on(modem.join()), Err(LinkError::Timeout));
    }

    #[test]
    fn test_zero_address_is_reported_as_is() {
        let mut modem = modem(ScriptedTransport::default().respond(&["AT+DEVADDR=00000000", "OK"]));
        assert_eq!(block_on(modem.assigned_address()), Ok(0));
    }

    #[test]
    fn test_busy_error() {
        let mut modem = modem(ScriptedTransport::default().respond(&["AT_BUSY_ERROR"]));
        assert!(!block_on(modem.is_joined()));
        let mut modem = self::modem(ScriptedTransport::default().respond(&["AT_BUSY_ERROR"]));
        assert_eq!(
            block_on(modem.command("AT+JOIN=1:0:10:1")),
            Err(LinkError::Busy)
        );
    }

    #[test]
    fn test_uplink() {
        let mut modem = modem(
            ScriptedTransport::default()
                .respond(&["OK", "OK", "OK"])
                .emit(&["+EVT:TX_DONE"]),
        );
        assert_eq!(block_on(modem.send_uplink(b"{\"hb\":1}", 1, false)), Ok(()));
        assert_eq!(
            modem.transport().sent,
            ["AT+CFM=0", "AT+SEND=1:7B226862223A317D"]
        );
        assert_eq!(block_on(modem.poll_event()), Some(LinkEvent::UplinkDone(Ok(()))));
    }

    #[test]
    fn test_confirmed_uplink_failure() {
        let mut modem = modem(
            ScriptedTransport::default()
                .respond(&["OK", "OK"])
                .emit(&["+EVT:SEND_CONFIRMED_FAILED"]),
        );
        assert_eq!(block_on(modem.send_uplink(&[1], 2, true)), Ok(()));
        assert_eq!(
            block_on(modem.poll_event()),
            Some(LinkEvent::UplinkDone(Err(LinkError::Rejected)))
        );
    }

    #[test]
    fn test_uplink_port_checked() {
        let mut modem = modem(ScriptedTransport::default());
        assert_eq!(
            block_on(modem.send_uplink(&[1], 0, false)),
            Err(LinkError::UnsupportedParameter)
        );
        assert!(modem.transport().sent.is_empty());
    }

    #[test]
    fn test_downlink_during_uplink_is_kept() {
        let mut modem = modem(
            ScriptedTransport::default()
                .respond(&["OK", "OK"])
                .emit(&["+EVT:RX_C:-50:9:UNICAST:4:F0", "+EVT:TX_DONE"]),
        );
        block_on(modem.send_uplink(&[1], 1, false)).unwrap();
        assert_eq!(block_on(modem.poll_event()), Some(LinkEvent::UplinkDone(Ok(()))));
        assert_eq!(modem.stashed_frames(), 1);

        let mut buf = [0u8; 8];
        let info = block_on(modem.read_pending_frame(&mut buf)).unwrap();
        assert_eq!(info, FrameInfo { port: 4, len: 1 });
        assert_eq!(modem.stashed_frames(), 0);
        assert_eq!(buf[0], 0xF0);
        assert_eq!(
            block_on(modem.read_pending_frame(&mut buf)),
            Err(LinkError::NoFrame)
        );
    }

    #[test]
    fn test_outcome_seen_during_command_is_kept() {
        // TX_DONE lands in the middle of the next command's responses
        let mut modem = modem(
            ScriptedTransport::default().respond(&["OK", "OK", "+EVT:TX_DONE", "AT+NJS=1", "OK"]),
        );
        block_on(modem.send_uplink(&[1], 1, false)).unwrap();
        assert!(block_on(modem.is_joined()));
        assert_eq!(block_on(modem.poll_event()), Some(LinkEvent::UplinkDone(Ok(()))));
        assert_eq!(block_on(modem.poll_event()), None);
    }

    #[test]
    fn test_outcome_found_while_draining_is_kept() {
        let mut modem = modem(ScriptedTransport::default().emit(&["+EVT:TX_DONE"]));
        let mut buf = [0u8; 8];
        assert_eq!(
            block_on(modem.read_pending_frame(&mut buf)),
            Err(LinkError::NoFrame)
        );
        assert_eq!(block_on(modem.poll_event()), Some(LinkEvent::UplinkDone(Ok(()))));
    }

    #[test]
    fn test_corrupt_downlink_is_integrity_error() {
        let mut modem = modem(ScriptedTransport::default().emit(&["+EVT:RX_C:-50:9:UNICAST:4:F"]));
        let mut buf = [0u8; 8];
        assert_eq!(
            block_on(modem.read_pending_frame(&mut buf)),
            Err(LinkError::Integrity)
        );
    }

    #[test]
    fn test_arm_programs_class_c() {
        let mut modem = modem(ScriptedTransport::default().respond(&["OK", "OK", "OK"]));
        assert_eq!(
            block_on(modem.arm_continuous_receive(&rx(Bandwidth::Khz500))),
            Ok(())
        );
        assert_eq!(
            modem.transport().sent,
            ["AT+CLASS=C", "AT+RX2FQ=923300000", "AT+RX2DR=8"]
        );
    }

    #[test]
    fn test_rearm_only_checks_class() {
        let mut modem = modem(
            ScriptedTransport::default().respond(&["OK", "OK", "OK", "AT+CLASS=C", "OK"]),
        );
        block_on(modem.arm_continuous_receive(&rx(Bandwidth::Khz500))).unwrap();
        block_on(modem.arm_continuous_receive(&rx(Bandwidth::Khz500))).unwrap();
        assert_eq!(modem.transport().sent.last().map(String::as_str), Some("AT+CLASS=?"));
        assert_eq!(modem.transport().sent.len(), 4);
    }

    #[test]
    fn test_unsupported_bandwidth() {
        let mut modem = modem(ScriptedTransport::default());
        assert_eq!(
            block_on(modem.arm_continuous_receive(&rx(Bandwidth::Khz250))),
            Err(LinkError::UnsupportedParameter)
        );
        // SF12 has no 125 kHz rate either
        assert_eq!(
            block_on(modem.arm_continuous_receive(&rx(Bandwidth::Khz125))),
            Err(LinkError::UnsupportedParameter)
        );
        assert!(modem.transport().sent.is_empty());
    }

    #[test]
    fn test_modem_rejects_parameters() {
        let mut modem = modem(ScriptedTransport::default().respond(&["OK", "OK", "AT_PARAM_ERROR"]));
        assert_eq!(
            block_on(modem.arm_continuous_receive(&rx(Bandwidth::Khz500))),
            Err(LinkError::UnsupportedParameter)
        );
    }
}
