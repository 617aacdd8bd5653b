//! Command dispatcher
//!
//! The main loop of the controller. Each [`CommandDispatcher::poll`] pass
//! services the radio, applies a decoded downlink, advances the pattern
//! engine and starts at most one uplink. Uplinks finish on a later pass, so
//! patterns and local commands keep running while one is in the air.
//!
//! Settings are written once they have stayed unchanged for
//! [`SETTINGS_SETTLE_MS`]. Flash writes stall the whole chip, so a burst of
//! changes costs one write.

use lumen_hal::{LoraLink, SettingsStore};
use lumen_protocol::uplink::MAX_UPLINK_SIZE;
use lumen_protocol::{decode, Command, DecodeError, PatternKind, SimpleColor, Uplink};

use crate::config::{UplinkConfig, SETTINGS_SETTLE_MS};
use crate::deadline::{due, Deadline};
use crate::fixture::FixtureTable;
use crate::frame::SharedFrame;
use crate::output::OutputStatus;
use crate::pattern::{PatternEngine, TickOutcome};
use crate::radio::{Downlink, ReceiveCoordinator, UplinkError};
use crate::settings::Settings;
use crate::{debug, info, warn};

/// What applying a command did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ApplyOutcome {
    LightsWritten { lights: usize },
    ColorSet(SimpleColor),
    PatternStarted(PatternKind),
    PatternStopped { was_active: bool },
    /// Fixture count actually applied
    FixturesResized(u8),
    PingQueued,
    Ignored,
}

/// Summary of one poll pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollReport {
    pub downlink: Option<Result<ApplyOutcome, DecodeError>>,
    pub pattern: TickOutcome,
    pub uplink: Option<Result<Uplink, UplinkError>>,
}

pub struct CommandDispatcher<'a, L: LoraLink, S: SettingsStore> {
    coordinator: ReceiveCoordinator<'a, L>,
    frame: &'a SharedFrame,
    output: &'a OutputStatus,
    fixtures: FixtureTable,
    patterns: PatternEngine,
    store: S,
    config: UplinkConfig,
    ping_pending: bool,
    status_sent: bool,
    heartbeat: Option<Deadline>,
    /// Hold-off after a failed uplink
    uplink_wait: Option<Deadline>,
    /// Uplink started and not yet finished
    in_flight: Option<Uplink>,
    /// When pending settings become due for writing
    save_due: Option<Deadline>,
    /// Settings last read from or written to the store
    saved: Option<Settings>,
}

impl<'a, L: LoraLink, S: SettingsStore> CommandDispatcher<'a, L, S> {
    pub fn new(
        coordinator: ReceiveCoordinator<'a, L>,
        frame: &'a SharedFrame,
        output: &'a OutputStatus,
        store: S,
        config: UplinkConfig,
    ) -> Self {
        Self {
            coordinator,
            frame,
            output,
            fixtures: FixtureTable::default(),
            patterns: PatternEngine::new(),
            store,
            config,
            ping_pending: false,
            status_sent: false,
            heartbeat: None,
            uplink_wait: None,
            in_flight: None,
            save_due: None,
            saved: None,
        }
    }

    pub fn coordinator(&self) -> &ReceiveCoordinator<'a, L> {
        &self.coordinator
    }

    pub fn fixtures(&self) -> &FixtureTable {
        &self.fixtures
    }

    pub fn patterns(&self) -> &PatternEngine {
        &self.patterns
    }

    /// Settings as they would be persisted now
    pub fn settings(&self) -> Settings {
        Settings::new(self.fixtures.len() as u8, self.patterns.active_spec())
    }

    /// Apply persisted settings at boot
    pub async fn restore(&mut self, now_ms: u32) -> Option<Settings> {
        match Settings::load(&mut self.store).await {
            Ok(Some(settings)) => {
                self.saved = Some(settings);
                let count = self.fixtures.resize(settings.fixture_count);
                info!("restored {} fixtures", count);
                if let Some(spec) = settings.pattern {
                    info!("resuming pattern {:?}", spec.kind);
                    self.patterns.start(spec, now_ms);
                }
                Some(settings)
            }
            Ok(None) => {
                info!("no saved settings, using defaults");
                None
            }
            Err(e) => {
                warn!("saved settings unusable: {:?}", e);
                None
            }
        }
    }

    /// One main-loop pass
    pub async fn poll(&mut self, now_ms: u32) -> PollReport {
        let downlink = match self.coordinator.service(now_ms).await {
            Some(downlink) => Some(self.handle_downlink(&downlink, now_ms)),
            None => None,
        };
        let mut uplink = self.settle_uplink(now_ms);

        let pattern = self.patterns.tick(now_ms, self.frame, &self.fixtures);
        if pattern == TickOutcome::Finished {
            info!("pattern finished");
            self.schedule_save(now_ms);
        }

        if uplink.is_none() {
            uplink = self.schedule_uplink(now_ms).await;
        }
        self.flush_settings(now_ms).await;

        PollReport {
            downlink,
            pattern,
            uplink,
        }
    }

    /// Command from the local test interface
    pub fn submit_local(&mut self, command: Command, now_ms: u32) -> ApplyOutcome {
        debug!("local command");
        self.apply(command, now_ms)
    }

    /// Carry out a decoded command
    pub fn apply(&mut self, command: Command, now_ms: u32) -> ApplyOutcome {
        match command {
            Command::SetLights(lights) => {
                if self.patterns.is_active() {
                    debug!("channel write while a pattern is running");
                }
                let written = self.frame.with(|frame| {
                    lights
                        .iter()
                        .filter(|light| frame.write_channels(light.address, &light.channels).is_ok())
                        .count()
                });
                ApplyOutcome::LightsWritten { lights: written }
            }
            Command::SimpleColor(color) => {
                let fixtures = &self.fixtures;
                self.frame.with(|frame| match color {
                    SimpleColor::Off => frame.clear(),
                    _ => fixtures.fill(frame, color.into()),
                });
                ApplyOutcome::ColorSet(color)
            }
            Command::RunPattern(spec) => {
                info!(
                    "pattern {:?}: {} ms/step, {} cycles",
                    spec.kind, spec.speed_ms, spec.cycles
                );
                self.patterns.start(spec, now_ms);
                self.schedule_save(now_ms);
                ApplyOutcome::PatternStarted(spec.kind)
            }
            Command::StopPattern => {
                let was_active = self.patterns.stop();
                if was_active {
                    info!("pattern stopped");
                    self.schedule_save(now_ms);
                }
                ApplyOutcome::PatternStopped { was_active }
            }
            Command::ConfigureFixtureCount(count) => {
                let applied = self.fixtures.resize(count);
                info!("fixture count set to {}", applied);
                self.schedule_save(now_ms);
                ApplyOutcome::FixturesResized(applied)
            }
            Command::Ping => {
                self.ping_pending = true;
                ApplyOutcome::PingQueued
            }
            Command::Raw(bytes) => {
                info!("unrecognised payload of {} bytes ignored", bytes.len());
                ApplyOutcome::Ignored
            }
        }
    }

    fn handle_downlink(
        &mut self,
        downlink: &Downlink,
        now_ms: u32,
    ) -> Result<ApplyOutcome, DecodeError> {
        match decode(downlink.port, &downlink.payload) {
            Ok(decoded) => {
                if decoded.skipped > 0 {
                    warn!("{} lights failed validation and were skipped", decoded.skipped);
                }
                Ok(self.apply(decoded.command, now_ms))
            }
            Err(e) => {
                warn!("dropping downlink on port {}: {:?}", downlink.port, e);
                Err(e)
            }
        }
    }

    /// Pick and start at most one uplink
    ///
    /// Priority: ping acknowledgement, the status message once per session,
    /// then the heartbeat. Nothing new starts while one is in flight.
    async fn schedule_uplink(&mut self, now_ms: u32) -> Option<Result<Uplink, UplinkError>> {
        if self.in_flight.is_some()
            || !self.coordinator.has_session()
            || !due(self.uplink_wait, now_ms)
        {
            return None;
        }

        let uplink = if self.ping_pending {
            Uplink::PingAck
        } else if !self.status_sent {
            Uplink::Status {
                dmx_ok: self.output.healthy(),
            }
        } else if self.heartbeat.is_some_and(|d| d.expired(now_ms)) {
            Uplink::Heartbeat
        } else {
            return None;
        };

        match self.send(uplink, now_ms).await {
            Ok(()) => {
                self.in_flight = Some(uplink);
                // The link may have finished it already
                self.settle_uplink(now_ms)
            }
            Err(e) => Some(self.uplink_finished(uplink, Err(e), now_ms)),
        }
    }

    /// Account for an uplink the coordinator has finished
    fn settle_uplink(&mut self, now_ms: u32) -> Option<Result<Uplink, UplinkError>> {
        let outcome = self.coordinator.take_uplink_outcome()?;
        let uplink = self.in_flight.take()?;
        Some(self.uplink_finished(uplink, outcome, now_ms))
    }

    fn uplink_finished(
        &mut self,
        uplink: Uplink,
        result: Result<(), UplinkError>,
        now_ms: u32,
    ) -> Result<Uplink, UplinkError> {
        match result {
            Ok(()) => {
                self.uplink_wait = None;
                match uplink {
                    Uplink::PingAck => self.ping_pending = false,
                    Uplink::Status { .. } | Uplink::Heartbeat => {
                        self.status_sent = true;
                        self.heartbeat =
                            Some(Deadline::after(now_ms, self.config.heartbeat_interval_ms));
                    }
                }
            }
            Err(_) => {
                self.uplink_wait = Some(Deadline::after(now_ms, self.config.retry_ms));
            }
        }
        result.map(|()| uplink)
    }

    async fn send(&mut self, uplink: Uplink, now_ms: u32) -> Result<(), UplinkError> {
        let mut buf = [0u8; MAX_UPLINK_SIZE];
        let len = uplink.encode(&mut buf).map_err(|_| UplinkError::Encode)?;
        debug!("uplink {:?} on port {}", uplink, uplink.port());
        self.coordinator
            .transmit(now_ms, &buf[..len], uplink.port(), uplink.confirmed())
            .await
    }

    /// Restart the settle delay after a persisted setting changed
    fn schedule_save(&mut self, now_ms: u32) {
        self.save_due = Some(Deadline::after(now_ms, SETTINGS_SETTLE_MS));
    }

    /// Write settings that have stopped changing
    async fn flush_settings(&mut self, now_ms: u32) {
        if !self.save_due.is_some_and(|d| d.expired(now_ms)) {
            return;
        }
        self.save_due = None;

        let settings = self.settings();
        if self.saved == Some(settings) {
            debug!("settings unchanged, nothing to write");
            return;
        }
        match settings.save(&mut self.store).await {
            Ok(()) => {
                debug!("settings saved");
                self.saved = Some(settings);
            }
            Err(e) => warn!("saving settings failed: {:?}", e),
        }
    }
}
