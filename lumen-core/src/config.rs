//! Controller configuration
//!
//! Compile-time defaults for the radio, output and uplink timing. Runtime
//! settings that survive a reboot live in [`crate::settings`].

use heapless::Vec;
use lumen_hal::{Bandwidth, BusConfig, CodingRate, RxParams};

use crate::frame::FRAME_SLOTS;

/// US915 RX2 downlink frequency
pub const US915_RX2_FREQUENCY_HZ: u32 = 923_300_000;

/// DMX break duration (DMX512-A minimum is 88 µs)
pub const BREAK_US: u32 = 176;
/// DMX mark-after-break duration (minimum 8 µs)
pub const MAB_US: u32 = 12;
/// Output refresh period (40 Hz)
pub const FRAME_PERIOD_MS: u32 = 25;

// Break, mark-after-break and a full universe must fit one refresh period
const _: () = assert!(
    BREAK_US + MAB_US + BusConfig::dmx().frame_time_us(FRAME_SLOTS) < FRAME_PERIOD_MS * 1_000
);

/// Main loop pass interval
pub const DISPATCH_INTERVAL_MS: u32 = 5;
/// Heartbeat uplink interval
pub const HEARTBEAT_INTERVAL_MS: u32 = 5 * 60 * 1000;
/// Wait after a failed uplink before trying again
pub const UPLINK_RETRY_MS: u32 = 30_000;
/// Settings must stay unchanged this long before they are written to flash
pub const SETTINGS_SETTLE_MS: u32 = 5_000;

/// Most receive parameter sets tried when arming
pub const MAX_RX_CANDIDATES: usize = 4;

/// LoRaWAN link settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RadioConfig {
    /// Preferred continuous receive parameters
    pub rx: RxParams,
    /// Bandwidths to fall back to if the radio rejects one
    pub fallback_bandwidths: [Bandwidth; 3],
    /// Join attempts per join cycle
    pub max_join_attempts: u8,
    /// Delay between join attempts
    pub join_retry_ms: u32,
    /// Delay before a new join cycle once all attempts failed
    pub rejoin_backoff_ms: u32,
    /// Delay between arming retries once every parameter set failed
    pub rearm_retry_ms: u32,
    /// Time allowed for the network to answer a join
    pub join_timeout_ms: u32,
    /// Time allowed for an uplink to leave the radio
    pub uplink_timeout_ms: u32,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            rx: RxParams {
                frequency_hz: US915_RX2_FREQUENCY_HZ,
                spreading_factor: 12,
                bandwidth: Bandwidth::Khz500,
                coding_rate: CodingRate::Cr4_5,
            },
            fallback_bandwidths: [Bandwidth::Khz500, Bandwidth::Khz250, Bandwidth::Khz125],
            max_join_attempts: 5,
            join_retry_ms: 10_000,
            rejoin_backoff_ms: 5 * 60 * 1000,
            rearm_retry_ms: 5_000,
            join_timeout_ms: 20_000,
            uplink_timeout_ms: 10_000,
        }
    }
}

impl RadioConfig {
    /// Receive parameter sets in the order they are tried
    ///
    /// The preferred set comes first, followed by the fallback bandwidths
    /// that differ from it.
    pub fn rx_candidates(&self) -> Vec<RxParams, MAX_RX_CANDIDATES> {
        let mut candidates = Vec::new();
        let _ = candidates.push(self.rx);
        for bandwidth in self.fallback_bandwidths {
            let params = self.rx.with_bandwidth(bandwidth);
            if !candidates.contains(&params) {
                let _ = candidates.push(params);
            }
        }
        candidates
    }
}

/// DMX output timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutputConfig {
    pub break_us: u32,
    pub mab_us: u32,
    pub frame_period_ms: u32,
}

impl OutputConfig {
    /// Line idle time left in each period after a full frame on `bus`
    ///
    /// `None` if the frame does not fit the period.
    pub fn idle_us(&self, bus: &BusConfig) -> Option<u32> {
        let busy = self.break_us + self.mab_us + bus.frame_time_us(FRAME_SLOTS);
        (self.frame_period_ms * 1_000).checked_sub(busy)
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            break_us: BREAK_US,
            mab_us: MAB_US,
            frame_period_ms: FRAME_PERIOD_MS,
        }
    }
}

/// Uplink scheduling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UplinkConfig {
    pub heartbeat_interval_ms: u32,
    pub retry_ms: u32,
}

impl Default for UplinkConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: HEARTBEAT_INTERVAL_MS,
            retry_ms: UPLINK_RETRY_MS,
        }
    }
}

/// Complete controller configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControllerConfig {
    pub radio: RadioConfig,
    pub output: OutputConfig,
    pub uplink: UplinkConfig,
}
