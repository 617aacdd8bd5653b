//! Uplink messages
//!
//! All uplinks are small JSON documents sent unconfirmed.

use serde::Serialize;

/// Port for status and heartbeat uplinks
pub const STATUS_PORT: u8 = 1;
/// Port for ping acknowledgements
pub const PING_ACK_PORT: u8 = 2;

/// Largest encoded uplink
pub const MAX_UPLINK_SIZE: usize = 48;

/// Errors while encoding an uplink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EncodeError {
    /// Output buffer too small
    BufferTooSmall,
}

/// Messages the controller sends to the network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Uplink {
    /// Sent once after joining: `{"status":"online","dmx":true}`
    Status { dmx_ok: bool },
    /// Periodic keep-alive: `{"hb":1}`
    Heartbeat,
    /// Answer to a ping: `{"ping_response":"ok"}`
    PingAck,
}

#[derive(Serialize)]
struct StatusDoc {
    status: &'static str,
    dmx: bool,
}

#[derive(Serialize)]
struct HeartbeatDoc {
    hb: u8,
}

#[derive(Serialize)]
struct PingAckDoc {
    ping_response: &'static str,
}

impl Uplink {
    /// Application port for this message
    pub fn port(&self) -> u8 {
        match self {
            Uplink::Status { .. } | Uplink::Heartbeat => STATUS_PORT,
            Uplink::PingAck => PING_ACK_PORT,
        }
    }

    /// Whether the network should acknowledge the uplink
    pub fn confirmed(&self) -> bool {
        false
    }

    /// Encode into `buf`, returning the number of bytes written
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, EncodeError> {
        let result = match self {
            Uplink::Status { dmx_ok } => serde_json_core::to_slice(
                &StatusDoc {
                    status: "online",
                    dmx: *dmx_ok,
                },
                buf,
            ),
            Uplink::Heartbeat => serde_json_core::to_slice(&HeartbeatDoc { hb: 1 }, buf),
            Uplink::PingAck => {
                serde_json_core::to_slice(&PingAckDoc { ping_response: "ok" }, buf)
            }
        };
        result.map_err(|_| EncodeError::BufferTooSmall)
    }
}
