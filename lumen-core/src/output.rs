//! DMX output transmitter
//!
//! One call to [`OutputTransmitter::run_cycle`] emits one complete DMX512
//! frame: break, mark-after-break, then the start code and 512 channel
//! slots. The frame is copied out of the shared buffer first, so the lock is
//! never held while the bus is busy.

use embedded_hal::delay::DelayNs;
use lumen_hal::{BusConfig, DmxBus};
use portable_atomic::{AtomicBool, AtomicU32, Ordering};

use crate::config::OutputConfig;
use crate::frame::{SharedFrame, FRAME_SLOTS};
use crate::{info, warn};

/// Bus phase within one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusPhase {
    Idle,
    /// Line held low
    Break,
    /// Line released before the start code
    MarkAfterBreak,
    /// Slots being shifted out
    DataOut,
}

/// A bus operation failed during `phase`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusWriteError {
    pub phase: BusPhase,
}

/// Output health, shared with the dispatcher for status uplinks
pub struct OutputStatus {
    cycles: AtomicU32,
    errors: AtomicU32,
    healthy: AtomicBool,
}

impl Default for OutputStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputStatus {
    /// Starts healthy; the first failed frame says otherwise
    pub const fn new() -> Self {
        Self {
            cycles: AtomicU32::new(0),
            errors: AtomicU32::new(0),
            healthy: AtomicBool::new(true),
        }
    }

    /// Record a completed frame, returns the previous health
    pub fn record_ok(&self) -> bool {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        self.healthy.swap(true, Ordering::AcqRel)
    }

    /// Record a failed frame, returns the previous health
    pub fn record_error(&self) -> bool {
        self.errors.fetch_add(1, Ordering::Relaxed);
        self.healthy.swap(false, Ordering::AcqRel)
    }

    /// Last frame went out cleanly
    pub fn healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    pub fn cycles(&self) -> u32 {
        self.cycles.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u32 {
        self.errors.load(Ordering::Relaxed)
    }
}

/// Emits frames on a [`DmxBus`]
pub struct OutputTransmitter<B: DmxBus> {
    bus: B,
    snapshot: [u8; FRAME_SLOTS],
    phase: BusPhase,
    config: OutputConfig,
}

impl<B: DmxBus> OutputTransmitter<B> {
    pub fn new(bus: B, config: OutputConfig) -> Self {
        match config.idle_us(&BusConfig::dmx()) {
            Some(idle) => info!(
                "DMX frame every {} ms, line idle {} us",
                config.frame_period_ms, idle
            ),
            None => warn!(
                "DMX frame does not fit {} ms, output will run late",
                config.frame_period_ms
            ),
        }
        Self {
            bus,
            snapshot: [0; FRAME_SLOTS],
            phase: BusPhase::Idle,
            config,
        }
    }

    pub fn phase(&self) -> BusPhase {
        self.phase
    }

    pub fn config(&self) -> &OutputConfig {
        &self.config
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Emit one frame
    ///
    /// Errors are counted in `status` and returned; the caller carries on
    /// with the next cycle.
    pub async fn run_cycle(
        &mut self,
        frame: &SharedFrame,
        delay: &mut impl DelayNs,
        status: &OutputStatus,
    ) -> Result<(), BusWriteError> {
        frame.snapshot_into(&mut self.snapshot);

        let result = self.emit(delay).await;
        self.phase = BusPhase::Idle;

        match result {
            Ok(()) => {
                if !status.record_ok() {
                    info!("DMX output recovered");
                }
                Ok(())
            }
            Err(e) => {
                // Never leave the line stuck in break
                let _ = self.bus.set_break(false);
                if status.record_error() {
                    warn!("DMX output failed during {:?}", e.phase);
                }
                Err(e)
            }
        }
    }

    async fn emit(&mut self, delay: &mut impl DelayNs) -> Result<(), BusWriteError> {
        self.phase = BusPhase::Break;
        self.bus.set_break(true).map_err(|_| self.fault())?;
        delay.delay_us(self.config.break_us);

        self.phase = BusPhase::MarkAfterBreak;
        self.bus.set_break(false).map_err(|_| self.fault())?;
        delay.delay_us(self.config.mab_us);

        self.phase = BusPhase::DataOut;
        self.bus
            .write_slots(&self.snapshot)
            .await
            .map_err(|_| BusWriteError {
                phase: BusPhase::DataOut,
            })?;
        self.bus.flush().await.map_err(|_| BusWriteError {
            phase: BusPhase::DataOut,
        })
    }

    fn fault(&self) -> BusWriteError {
        BusWriteError { phase: self.phase }
    }
}
