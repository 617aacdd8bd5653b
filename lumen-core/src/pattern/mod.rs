//! Pattern engine
//!
//! Exactly one pattern runs at a time. Each step is a pure function of the
//! pattern kind, the step counter and the fixture index, so the animation is
//! deterministic and testable with a simulated clock.

pub mod color;

pub use color::{hue_to_rgb, Rgbw, WHEEL_SIZE};

use lumen_protocol::{PatternKind, PatternSpec};

use crate::fixture::FixtureTable;
use crate::frame::SharedFrame;

/// Hue advance per Rainbow step
pub const RAINBOW_HUE_STEP: u16 = 6;

/// Steps in one Rainbow cycle
pub const RAINBOW_PERIOD: u16 = WHEEL_SIZE / RAINBOW_HUE_STEP;

/// A running pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ActivePattern {
    pub kind: PatternKind,
    /// Next step to render, wraps at the pattern period
    pub step: u16,
    pub speed_ms: u16,
    /// Cycles to run, 0 = until stopped
    pub target_cycles: u16,
    pub completed_cycles: u16,
    pub staggered: bool,
    last_step_ms: u32,
}

impl ActivePattern {
    /// Parameters this pattern was started with
    pub fn spec(&self) -> PatternSpec {
        PatternSpec {
            kind: self.kind,
            speed_ms: self.speed_ms,
            cycles: self.target_cycles,
            staggered: self.staggered,
        }
    }
}

/// Pattern engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PatternState {
    Inactive,
    Active(ActivePattern),
}

/// What a tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TickOutcome {
    /// Nothing running or not yet time for the next step
    Idle,
    /// A step was rendered
    Stepped,
    /// A step was rendered and the pattern reached its cycle target
    Finished,
}

/// Steps in one full cycle of `kind`
pub fn period(kind: PatternKind, fixture_count: usize) -> u16 {
    match kind {
        PatternKind::ColorFade => WHEEL_SIZE,
        PatternKind::Rainbow => RAINBOW_PERIOD,
        PatternKind::Strobe | PatternKind::Alternate => 2,
        PatternKind::Chase => fixture_count.max(1) as u16,
    }
}

/// Color of fixture `index` (of `count`) at `step`
pub fn render(kind: PatternKind, step: u16, staggered: bool, index: usize, count: usize) -> Rgbw {
    let count = count.max(1);
    let offset = if staggered {
        (index * WHEEL_SIZE as usize / count) as u16
    } else {
        0
    };
    let lit = |on: bool| if on { Rgbw::FULL } else { Rgbw::OFF };

    match kind {
        PatternKind::ColorFade => hue_to_rgb(((step as u32 + offset as u32) % WHEEL_SIZE as u32) as u16),
        PatternKind::Rainbow => {
            let hue = (step as u32 * RAINBOW_HUE_STEP as u32 + offset as u32) % WHEEL_SIZE as u32;
            hue_to_rgb(hue as u16)
        }
        PatternKind::Strobe => {
            let phase_on = step % 2 == 0;
            // Staggered strobe flashes odd fixtures in the opposite phase
            lit(phase_on != (staggered && index % 2 == 1))
        }
        PatternKind::Chase => lit(step as usize % count == index),
        PatternKind::Alternate => lit(index % 2 == (step % 2) as usize),
    }
}

/// Drives the active pattern
#[derive(Debug, Clone)]
pub struct PatternEngine {
    state: PatternState,
}

impl Default for PatternEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternEngine {
    pub const fn new() -> Self {
        Self {
            state: PatternState::Inactive,
        }
    }

    pub fn state(&self) -> &PatternState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, PatternState::Active(_))
    }

    /// Parameters of the running pattern, if any
    pub fn active_spec(&self) -> Option<PatternSpec> {
        match &self.state {
            PatternState::Active(p) => Some(p.spec()),
            PatternState::Inactive => None,
        }
    }

    /// Start a pattern, replacing whatever was running
    ///
    /// The first step renders on the next tick.
    pub fn start(&mut self, spec: PatternSpec, now_ms: u32) {
        self.state = PatternState::Active(ActivePattern {
            kind: spec.kind,
            step: 0,
            speed_ms: spec.speed_ms,
            target_cycles: spec.cycles,
            completed_cycles: 0,
            staggered: spec.staggered,
            last_step_ms: now_ms.wrapping_sub(spec.speed_ms as u32),
        });
    }

    /// Stop the running pattern, leaving the frame untouched
    ///
    /// Returns whether a pattern was running.
    pub fn stop(&mut self) -> bool {
        let was_active = self.is_active();
        self.state = PatternState::Inactive;
        was_active
    }

    /// Render the next step if `speed_ms` has elapsed since the last one
    pub fn tick(&mut self, now_ms: u32, frame: &SharedFrame, fixtures: &FixtureTable) -> TickOutcome {
        let PatternState::Active(pattern) = &mut self.state else {
            return TickOutcome::Idle;
        };
        if now_ms.wrapping_sub(pattern.last_step_ms) < pattern.speed_ms as u32 {
            return TickOutcome::Idle;
        }
        pattern.last_step_ms = now_ms;

        let count = fixtures.len();
        let period = period(pattern.kind, count);
        // Chase period follows the fixture count, which may have shrunk
        let step = pattern.step % period;

        frame.with(|f| {
            for index in 0..count {
                let color = render(pattern.kind, step, pattern.staggered, index, count);
                fixtures.write_color(f, index, color);
            }
        });

        pattern.step = step + 1;
        if pattern.step < period {
            return TickOutcome::Stepped;
        }

        pattern.step = 0;
        pattern.completed_cycles = pattern.completed_cycles.saturating_add(1);
        if pattern.target_cycles != 0 && pattern.completed_cycles >= pattern.target_cycles {
            self.state = PatternState::Inactive;
            return TickOutcome::Finished;
        }
        TickOutcome::Stepped
    }
}
