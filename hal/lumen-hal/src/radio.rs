//! LoRaWAN link abstractions
//!
//! The LoRaWAN MAC (join handshake, session keys, frame counters) lives in
//! an external stack. This module only describes what the controller needs
//! from it: joining, sending uplinks, and keeping the receiver open.

use core::future::Future;

/// Radio bandwidth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Bandwidth {
    Khz125,
    Khz250,
    Khz500,
}

impl Bandwidth {
    /// Bandwidth in kHz
    pub fn khz(self) -> u16 {
        match self {
            Bandwidth::Khz125 => 125,
            Bandwidth::Khz250 => 250,
            Bandwidth::Khz500 => 500,
        }
    }
}

/// LoRa forward error correction rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CodingRate {
    Cr4_5,
    Cr4_6,
    Cr4_7,
    Cr4_8,
}

/// Continuous receive parameters
///
/// Class C devices listen on the RX2 window parameters whenever they are
/// not transmitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxParams {
    /// Centre frequency in Hz
    pub frequency_hz: u32,
    /// Spreading factor (7-12)
    pub spreading_factor: u8,
    /// Channel bandwidth
    pub bandwidth: Bandwidth,
    /// Coding rate
    pub coding_rate: CodingRate,
}

impl RxParams {
    /// Same parameters on a different bandwidth
    pub const fn with_bandwidth(self, bandwidth: Bandwidth) -> Self {
        Self { bandwidth, ..self }
    }
}

/// Metadata of a received downlink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameInfo {
    /// Application port (FPort)
    pub port: u8,
    /// Number of payload bytes written to the caller's buffer
    pub len: usize,
}

/// Errors reported by the LoRaWAN link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError {
    /// Radio rejected a parameter (bandwidth, data rate, frequency)
    UnsupportedParameter,
    /// Received frame failed integrity checks
    Integrity,
    /// No frame is waiting
    NoFrame,
    /// Stack did not answer in time
    Timeout,
    /// Stack is busy with another operation
    Busy,
    /// Stack refused the request
    Rejected,
    /// Payload does not fit the buffer or the current data rate
    PayloadTooLarge,
    /// Transport to the stack failed
    Transport,
}

/// Completion of a join or uplink started earlier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkEvent {
    /// Join accepted (`Ok`) or refused by the network
    JoinDone(Result<(), LinkError>),
    /// Uplink left the radio (`Ok`) or was not delivered
    UplinkDone(Result<(), LinkError>),
}

/// LoRaWAN stack interface
///
/// Implementations own the radio. Only the receive coordinator holds one,
/// so no other component can touch the radio directly.
///
/// Joins and uplinks take seconds of air time. [`LoraLink::join`] and
/// [`LoraLink::send_uplink`] return once the stack has accepted the
/// request; the outcome is reported later by [`LoraLink::poll_event`].
pub trait LoraLink {
    /// Start an OTAA join
    fn join(&mut self) -> impl Future<Output = Result<(), LinkError>>;

    /// Check whether the stack reports an active session
    fn is_joined(&mut self) -> impl Future<Output = bool>;

    /// Device address assigned by the network (0 if none)
    fn assigned_address(&mut self) -> impl Future<Output = Result<u32, LinkError>>;

    /// Queue an uplink on the given application port
    fn send_uplink(
        &mut self,
        payload: &[u8],
        port: u8,
        confirmed: bool,
    ) -> impl Future<Output = Result<(), LinkError>>;

    /// Put the radio into continuous receive with the given parameters
    fn arm_continuous_receive(
        &mut self,
        params: &RxParams,
    ) -> impl Future<Output = Result<(), LinkError>>;

    /// Completion of a started join or uplink, without waiting
    fn poll_event(&mut self) -> impl Future<Output = Option<LinkEvent>>;

    /// Pull the pending downlink into `buf`
    fn read_pending_frame(
        &mut self,
        buf: &mut [u8],
    ) -> impl Future<Output = Result<FrameInfo, LinkError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_bandwidth_keeps_other_fields() {
        let params = RxParams {
            frequency_hz: 923_300_000,
            spreading_factor: 12,
            bandwidth: Bandwidth::Khz500,
            coding_rate: CodingRate::Cr4_5,
        };
        let narrow = params.with_bandwidth(Bandwidth::Khz125);
        assert_eq!(narrow.bandwidth, Bandwidth::Khz125);
        assert_eq!(narrow.frequency_hz, params.frequency_hz);
        assert_eq!(narrow.spreading_factor, 12);
        assert_eq!(Bandwidth::Khz250.khz(), 250);
    }
}
