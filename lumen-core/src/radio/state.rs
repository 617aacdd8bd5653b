//! Receive and link state machines
//!
//! The receiver state is a function of the current state and an event, in
//! the same style as any other explicit state table: unknown combinations
//! leave the state unchanged.

/// Class C receiver state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxState {
    /// Radio not yet programmed (before the first join)
    Idle,
    /// Programming continuous receive
    Arming,
    /// Continuous receive active, waiting for the packet interrupt
    Listening,
    /// Interrupt seen, frame not yet read
    PacketPending,
    /// Reading the frame out of the radio
    Draining,
    /// An uplink is about to take the radio out of receive
    TransmitRequested,
    /// Uplink in progress
    Transmitting,
    /// Every receive parameter set was rejected
    Degraded,
}

/// Events driving [`RxState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxEvent {
    /// Start programming continuous receive
    ArmRequested,
    /// Radio accepted a parameter set
    Armed,
    /// Radio rejected every parameter set
    ArmExhausted,
    /// Packet interrupt observed
    PacketSignalled,
    /// Frame read started
    DrainStarted,
    /// Frame read finished (delivered or discarded)
    DrainFinished,
    /// Uplink queued
    TransmitRequested,
    /// Radio left receive to transmit
    TransmitStarted,
    /// Transmit attempt ended, successfully or not
    TransmitFinished,
    /// Session lost, radio back to its unprogrammed state
    Reset,
}

impl RxState {
    /// Radio is in continuous receive
    pub fn is_listening(&self) -> bool {
        matches!(self, RxState::Listening | RxState::PacketPending)
    }

    /// Process an event and return the next state
    pub fn transition(self, event: RxEvent) -> Self {
        use RxEvent as E;
        use RxState as S;

        match (self, event) {
            (_, E::Reset) => S::Idle,

            // Arming
            (S::Idle | S::Degraded, E::ArmRequested) => S::Arming,
            (S::Arming, E::Armed) => S::Listening,
            (S::Arming, E::ArmExhausted) => S::Degraded,

            // Receive path
            (S::Listening, E::PacketSignalled) => S::PacketPending,
            (S::PacketPending, E::DrainStarted) => S::Draining,
            (S::Draining, E::DrainFinished) => S::Arming,

            // Transmit path; never from the middle of a drain or another uplink
            (
                S::Idle | S::Arming | S::Listening | S::PacketPending | S::Degraded,
                E::TransmitRequested,
            ) => S::TransmitRequested,
            (S::TransmitRequested, E::TransmitStarted) => S::Transmitting,
            (S::Transmitting, E::TransmitFinished) => S::Arming,

            // Default: stay in current state
            _ => self,
        }
    }
}

/// Why the link is degraded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkFault {
    /// Every join attempt of a cycle failed
    JoinExhausted,
    /// Joined, but the radio would not enter continuous receive
    ReceiveUnavailable,
}

/// LoRaWAN session state as seen by the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioLinkState {
    Unjoined,
    /// Join in progress, `attempt` is 1-based
    Joining { attempt: u8 },
    Joined { address: u32, rx_armed: bool },
    Degraded(LinkFault),
}

impl RadioLinkState {
    /// A network session exists, so uplinks can be attempted
    pub fn has_session(&self) -> bool {
        matches!(
            self,
            RadioLinkState::Joined { .. } | RadioLinkState::Degraded(LinkFault::ReceiveUnavailable)
        )
    }

    pub fn is_joined(&self) -> bool {
        matches!(self, RadioLinkState::Joined { .. })
    }
}
