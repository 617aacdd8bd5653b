//! Test button task
//!
//! Each press of the board's test button sends the next entry of a fixed
//! list of local commands to the dispatch task.

use defmt::*;
use embassy_rp::gpio::Input;
use embassy_time::{Duration, Timer};

use lumen_protocol::{Command, PatternSpec, SimpleColor};

use crate::channels::LOCAL_COMMANDS;

/// Debounce time after an edge
const DEBOUNCE_MS: u64 = 20;

/// Step delay of the continuous rainbow
const RAINBOW_SPEED_MS: i64 = 50;

/// Entries in the local command list
const LOCAL_COMMAND_COUNT: usize = 7;

/// The `index`th local test command
fn local_command(index: usize) -> Command {
    match index % LOCAL_COMMAND_COUNT {
        0 => Command::SimpleColor(SimpleColor::Red),
        1 => Command::SimpleColor(SimpleColor::Green),
        2 => Command::SimpleColor(SimpleColor::Blue),
        3 => Command::SimpleColor(SimpleColor::White),
        4 => Command::RunPattern(PatternSpec::continuous(RAINBOW_SPEED_MS)),
        5 => Command::StopPattern,
        _ => Command::SimpleColor(SimpleColor::Off),
    }
}

/// Button task - active low with the internal pull-up
#[embassy_executor::task]
pub async fn button_task(mut button: Input<'static>) {
    info!("Button task started");

    let mut next = 0;

    loop {
        button.wait_for_falling_edge().await;

        // Debounce
        Timer::after(Duration::from_millis(DEBOUNCE_MS)).await;
        if button.is_high() {
            continue;
        }

        let command = local_command(next);
        next = (next + 1) % LOCAL_COMMAND_COUNT;
        debug!("Button: {:?}", command);
        if LOCAL_COMMANDS.try_send(command).is_err() {
            warn!("Local command channel full, dropping press");
        }

        button.wait_for_rising_edge().await;
        Timer::after(Duration::from_millis(DEBOUNCE_MS)).await;
    }
}
