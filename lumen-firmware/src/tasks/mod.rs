//! Embassy async tasks
//!
//! Each task runs independently and communicates via channels/signals.

pub mod button;
pub mod dispatch;
pub mod modem;
pub mod output;

pub use button::button_task;
pub use dispatch::{dispatch_task, Dispatcher};
pub use modem::{radio_irq_task, ChannelTransport};
pub use output::{output_task, BoardBus};
