//! Class C radio coordination
//!
//! Keeps the radio in continuous receive whenever it is not transmitting,
//! drives the join procedure and hands received downlinks to the
//! dispatcher.

pub mod coordinator;
pub mod flag;
pub mod state;

pub use coordinator::{CoordinatorStats, Downlink, JoinError, ReceiveCoordinator, UplinkError};
pub use flag::PacketFlag;
pub use state::{LinkFault, RadioLinkState, RxEvent, RxState};
