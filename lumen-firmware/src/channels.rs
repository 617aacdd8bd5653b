//! Shared state and inter-task channels
//!
//! Statics shared between the modem reader, the dispatch task, the output
//! task and the test button.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use lumen_core::frame::SharedFrame;
use lumen_core::output::OutputStatus;
use lumen_core::radio::PacketFlag;
use lumen_drivers::modem::Line;
use lumen_protocol::Command;

/// Command responses queued by the modem reader
const RESPONSE_CHANNEL_SIZE: usize = 4;

/// Unsolicited modem events queued by the modem reader
const EVENT_CHANNEL_SIZE: usize = 8;

/// Local commands from the test button
const LOCAL_CHANNEL_SIZE: usize = 4;

/// Set by the modem reader when a downlink event arrives
pub static PACKET_FLAG: PacketFlag = PacketFlag::new();

/// DMX universe written by the dispatcher, read by the output task
pub static FRAME: SharedFrame = SharedFrame::new();

/// Output health, updated by the output task
pub static OUTPUT_STATUS: OutputStatus = OutputStatus::new();

/// Modem command responses (`OK`, errors, values)
pub static MODEM_RESPONSES: Channel<CriticalSectionRawMutex, Line, RESPONSE_CHANNEL_SIZE> =
    Channel::new();

/// Modem `+EVT:` lines
pub static MODEM_EVENTS: Channel<CriticalSectionRawMutex, Line, EVENT_CHANNEL_SIZE> =
    Channel::new();

/// Commands from the local test interface
pub static LOCAL_COMMANDS: Channel<CriticalSectionRawMutex, Command, LOCAL_CHANNEL_SIZE> =
    Channel::new();
