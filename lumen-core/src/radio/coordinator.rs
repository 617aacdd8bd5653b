//! Receive coordinator
//!
//! Owns the LoRaWAN link. Every operation that takes the radio out of
//! continuous receive (draining a frame, finishing an uplink) re-arms it in
//! the same pass, so the only windows without a listening receiver are the
//! transmit itself and the arming round trip.
//!
//! Joins and uplinks are started on one pass and finished on a later one,
//! when the link reports their outcome or their deadline passes. A pass
//! never waits for the network.

use heapless::Vec;
use lumen_hal::{LinkError, LinkEvent, LoraLink, RxParams};
use lumen_protocol::MAX_PAYLOAD;

use super::flag::PacketFlag;
use super::state::{LinkFault, RadioLinkState, RxEvent, RxState};
use crate::config::{RadioConfig, MAX_RX_CANDIDATES};
use crate::deadline::{due, Deadline};
use crate::{debug, error, info, warn};

/// A received application downlink
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Downlink {
    pub port: u8,
    pub payload: Vec<u8, MAX_PAYLOAD>,
}

/// Why a join attempt did not produce a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum JoinError {
    /// Stack reported an error
    Link(LinkError),
    /// Join returned but the stack reports no session
    NotJoined,
    /// Join "succeeded" with device address 0
    ZeroAddress,
}

/// Errors from [`ReceiveCoordinator::transmit`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UplinkError {
    /// No network session
    NotJoined,
    /// The previous uplink has not finished yet
    InFlight,
    /// Message did not fit the uplink buffer
    Encode,
    /// Stack rejected or failed the uplink
    Link(LinkError),
}

/// Counters for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CoordinatorStats {
    pub downlinks: u32,
    pub integrity_drops: u32,
    pub join_failures: u32,
    pub arm_failures: u32,
    pub uplinks: u32,
    pub uplink_failures: u32,
}

/// Class C receive coordinator
pub struct ReceiveCoordinator<'a, L: LoraLink> {
    link: L,
    flag: &'a PacketFlag,
    config: RadioConfig,
    candidates: Vec<RxParams, MAX_RX_CANDIDATES>,
    /// Index of the candidate that last armed successfully
    preferred: usize,
    rx: RxState,
    link_state: RadioLinkState,
    address: u32,
    join_wait: Option<Deadline>,
    arm_wait: Option<Deadline>,
    /// Started join, given up on once this passes
    join_pending: Option<Deadline>,
    /// Started uplink, given up on once this passes
    uplink_pending: Option<Deadline>,
    /// Outcome of the last uplink, until the dispatcher collects it
    uplink_outcome: Option<Result<(), UplinkError>>,
    stats: CoordinatorStats,
}

impl<'a, L: LoraLink> ReceiveCoordinator<'a, L> {
    pub fn new(link: L, flag: &'a PacketFlag, config: RadioConfig) -> Self {
        Self {
            link,
            flag,
            candidates: config.rx_candidates(),
            config,
            preferred: 0,
            rx: RxState::Idle,
            link_state: RadioLinkState::Unjoined,
            address: 0,
            join_wait: None,
            arm_wait: None,
            join_pending: None,
            uplink_pending: None,
            uplink_outcome: None,
            stats: CoordinatorStats::default(),
        }
    }

    pub fn rx_state(&self) -> RxState {
        self.rx
    }

    pub fn link_state(&self) -> RadioLinkState {
        self.link_state
    }

    pub fn stats(&self) -> &CoordinatorStats {
        &self.stats
    }

    /// Uplinks can be attempted
    pub fn has_session(&self) -> bool {
        self.link_state.has_session()
    }

    /// An uplink was started and has not finished
    pub fn uplink_in_flight(&self) -> bool {
        self.uplink_pending.is_some()
    }

    /// Result of the last finished uplink, once
    pub fn take_uplink_outcome(&mut self) -> Option<Result<(), UplinkError>> {
        self.uplink_outcome.take()
    }

    /// Receive parameters currently programmed, if listening
    pub fn armed_params(&self) -> Option<RxParams> {
        if self.rx.is_listening() {
            self.candidates.get(self.preferred).copied()
        } else {
            None
        }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// One main-loop pass
    ///
    /// Finishes a join or uplink whose outcome has arrived, advances
    /// joining and re-arming when their retry delays have passed, then
    /// consumes the packet flag. A pending frame is read, the receiver
    /// re-armed, and the downlink returned. Frames stay queued while an
    /// uplink is in flight.
    pub async fn service(&mut self, now_ms: u32) -> Option<Downlink> {
        self.check_link(now_ms).await;

        match self.link_state {
            RadioLinkState::Unjoined
            | RadioLinkState::Joining { .. }
            | RadioLinkState::Degraded(LinkFault::JoinExhausted) => {
                if self.join_pending.is_none() && due(self.join_wait, now_ms) {
                    self.start_join(now_ms).await;
                }
            }
            RadioLinkState::Degraded(LinkFault::ReceiveUnavailable) => {
                if self.uplink_pending.is_none() && due(self.arm_wait, now_ms) {
                    self.arm(now_ms).await;
                }
            }
            RadioLinkState::Joined { .. } => {}
        }

        if self.uplink_pending.is_some() || !self.flag.take() {
            return None;
        }
        if !self.link_state.has_session() {
            debug!("packet flag set without a session, ignored");
            return None;
        }
        self.rx = self.rx.transition(RxEvent::PacketSignalled);
        self.drain(now_ms).await
    }

    /// Start an uplink
    ///
    /// Returns once the link has accepted it. The receiver is re-armed and
    /// the outcome recorded for [`Self::take_uplink_outcome`] when the
    /// link reports completion, which may already be the case on return.
    pub async fn transmit(
        &mut self,
        now_ms: u32,
        payload: &[u8],
        port: u8,
        confirmed: bool,
    ) -> Result<(), UplinkError> {
        if !self.link_state.has_session() {
            return Err(UplinkError::NotJoined);
        }
        if self.uplink_pending.is_some() {
            return Err(UplinkError::InFlight);
        }

        self.rx = self
            .rx
            .transition(RxEvent::TransmitRequested)
            .transition(RxEvent::TransmitStarted);
        if let RadioLinkState::Joined { address, .. } = self.link_state {
            self.link_state = RadioLinkState::Joined {
                address,
                rx_armed: false,
            };
        }

        match self.link.send_uplink(payload, port, confirmed).await {
            Ok(()) => {
                debug!("uplink on port {} queued", port);
                self.uplink_pending = Some(Deadline::after(now_ms, self.config.uplink_timeout_ms));
                self.check_link(now_ms).await;
                Ok(())
            }
            Err(e) => self.finish_uplink(Err(e), now_ms).await,
        }
    }

    /// Collect the outcome of a started join or uplink
    ///
    /// Outcomes that arrive after their deadline are dropped here.
    async fn check_link(&mut self, now_ms: u32) {
        match self.link.poll_event().await {
            Some(LinkEvent::JoinDone(result)) if self.join_pending.is_some() => {
                self.finish_join(result, now_ms).await;
            }
            Some(LinkEvent::UplinkDone(result)) if self.uplink_pending.is_some() => {
                let outcome = self.finish_uplink(result, now_ms).await;
                self.uplink_outcome = Some(outcome);
            }
            Some(other) => debug!("stale link event {:?} ignored", other),
            None if self.join_pending.is_none() && self.uplink_pending.is_none() => {}
            None => {
                if self.join_pending.is_some_and(|d| d.expired(now_ms)) {
                    self.finish_join(Err(LinkError::Timeout), now_ms).await;
                }
                if self.uplink_pending.is_some_and(|d| d.expired(now_ms)) {
                    let outcome = self.finish_uplink(Err(LinkError::Timeout), now_ms).await;
                    self.uplink_outcome = Some(outcome);
                }
            }
        }
    }

    /// End an uplink and put the radio straight back into receive
    async fn finish_uplink(
        &mut self,
        result: Result<(), LinkError>,
        now_ms: u32,
    ) -> Result<(), UplinkError> {
        self.uplink_pending = None;
        self.rx = self.rx.transition(RxEvent::TransmitFinished);
        self.arm(now_ms).await;

        match result {
            Ok(()) => {
                self.stats.uplinks += 1;
                Ok(())
            }
            Err(e) => {
                self.stats.uplink_failures += 1;
                warn!("uplink failed: {:?}", e);
                Err(UplinkError::Link(e))
            }
        }
    }

    async fn drain(&mut self, now_ms: u32) -> Option<Downlink> {
        self.rx = self.rx.transition(RxEvent::DrainStarted);
        let mut buf = [0u8; MAX_PAYLOAD];
        let result = self.link.read_pending_frame(&mut buf).await;
        self.rx = self.rx.transition(RxEvent::DrainFinished);

        let downlink = match result {
            Ok(frame) => {
                self.stats.downlinks += 1;
                let len = frame.len.min(buf.len());
                debug!("downlink: {} bytes on port {}", len, frame.port);
                Some(Downlink {
                    port: frame.port,
                    payload: Vec::from_slice(&buf[..len]).unwrap_or_default(),
                })
            }
            Err(LinkError::Integrity) => {
                self.stats.integrity_drops += 1;
                warn!("downlink failed integrity check, discarded");
                None
            }
            Err(LinkError::NoFrame) => {
                debug!("packet flag set but no frame waiting");
                None
            }
            Err(e) => {
                warn!("reading downlink failed: {:?}", e);
                None
            }
        };

        self.arm(now_ms).await;
        downlink
    }

    async fn start_join(&mut self, now_ms: u32) {
        let attempt = match self.link_state {
            RadioLinkState::Joining { attempt } => attempt.saturating_add(1),
            _ => 1,
        };
        self.link_state = RadioLinkState::Joining { attempt };
        info!("join attempt {}/{}", attempt, self.config.max_join_attempts);

        match self.link.join().await {
            Ok(()) => {
                self.join_pending = Some(Deadline::after(now_ms, self.config.join_timeout_ms));
                self.check_link(now_ms).await;
            }
            Err(e) => self.join_failed(attempt, JoinError::Link(e), now_ms),
        }
    }

    async fn finish_join(&mut self, result: Result<(), LinkError>, now_ms: u32) {
        self.join_pending = None;
        let attempt = match self.link_state {
            RadioLinkState::Joining { attempt } => attempt,
            _ => 1,
        };

        let session = match result {
            Ok(()) => self.confirm_session().await,
            Err(e) => Err(JoinError::Link(e)),
        };
        match session {
            Ok(address) => {
                info!("joined, device address {:x}", address);
                self.address = address;
                self.link_state = RadioLinkState::Joined {
                    address,
                    rx_armed: false,
                };
                self.join_wait = None;
                self.rx = self.rx.transition(RxEvent::Reset);
                self.arm(now_ms).await;
            }
            Err(e) => self.join_failed(attempt, e, now_ms),
        }
    }

    fn join_failed(&mut self, attempt: u8, e: JoinError, now_ms: u32) {
        self.stats.join_failures += 1;
        if attempt >= self.config.max_join_attempts {
            warn!(
                "join attempt {} failed: {:?}, giving up for {} ms",
                attempt, e, self.config.rejoin_backoff_ms
            );
            self.link_state = RadioLinkState::Degraded(LinkFault::JoinExhausted);
            self.join_wait = Some(Deadline::after(now_ms, self.config.rejoin_backoff_ms));
        } else {
            warn!("join attempt {} failed: {:?}", attempt, e);
            self.join_wait = Some(Deadline::after(now_ms, self.config.join_retry_ms));
        }
    }

    async fn confirm_session(&mut self) -> Result<u32, JoinError> {
        if !self.link.is_joined().await {
            return Err(JoinError::NotJoined);
        }
        let address = self
            .link
            .assigned_address()
            .await
            .map_err(JoinError::Link)?;
        // A session without a device address cannot receive anything
        if address == 0 {
            return Err(JoinError::ZeroAddress);
        }
        Ok(address)
    }

    /// Program continuous receive, walking the fallback list
    ///
    /// Starts from the parameter set that worked last time.
    async fn arm(&mut self, now_ms: u32) -> bool {
        self.rx = self.rx.transition(RxEvent::ArmRequested);

        let count = self.candidates.len();
        for k in 0..count {
            let index = (self.preferred + k) % count;
            let params = self.candidates[index];
            match self.link.arm_continuous_receive(&params).await {
                Ok(()) => {
                    if index != self.preferred {
                        info!(
                            "continuous receive moved to {} kHz",
                            params.bandwidth.khz()
                        );
                    }
                    self.preferred = index;
                    self.rx = self.rx.transition(RxEvent::Armed);
                    self.arm_wait = None;
                    if self.link_state.has_session() {
                        self.link_state = RadioLinkState::Joined {
                            address: self.address,
                            rx_armed: true,
                        };
                    }
                    return true;
                }
                Err(LinkError::UnsupportedParameter) => {
                    debug!("radio rejected {} kHz receive", params.bandwidth.khz());
                }
                Err(e) => {
                    warn!(
                        "arming receive at {} kHz failed: {:?}",
                        params.bandwidth.khz(),
                        e
                    );
                }
            }
            self.stats.arm_failures += 1;
        }

        error!(
            "continuous receive unavailable, retrying in {} ms",
            self.config.rearm_retry_ms
        );
        self.rx = self.rx.transition(RxEvent::ArmExhausted);
        if self.link_state.has_session() {
            self.link_state = RadioLinkState::Degraded(LinkFault::ReceiveUnavailable);
        }
        self.arm_wait = Some(Deadline::after(now_ms, self.config.rearm_retry_ms));
        false
    }
}
