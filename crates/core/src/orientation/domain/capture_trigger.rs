//! Sustained-turn capture decision.
//!
//! Fires once a non-forward direction has been held for the persistence
//! window, then suppresses the same direction for the cooldown window.
//! The decision is pure: capturing and storing the frame is the caller's job.

use std::time::{Duration, Instant};

use crate::orientation::domain::direction::Direction;
use crate::shared::monitor_config::TriggerConfig;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TriggerState {
    pub current_direction: Direction,
    /// Start of the current streak; always `None` while facing forward.
    pub direction_start_time: Option<Instant>,
    pub last_fired_direction: Option<Direction>,
    pub last_fired_time: Option<Instant>,
}

/// Advances `state` by one observed frame and reports whether to capture.
pub fn evaluate(
    direction: Direction,
    now: Instant,
    state: &mut TriggerState,
    persistence: Duration,
    cooldown: Duration,
) -> bool {
    if !direction.is_deviating() {
        state.current_direction = Direction::Forward;
        state.direction_start_time = None;
        return false;
    }

    if direction != state.current_direction {
        state.current_direction = direction;
        state.direction_start_time = Some(now);
        return false;
    }

    let Some(start) = state.direction_start_time else {
        // Streak restarts after a capture.
        state.direction_start_time = Some(now);
        return false;
    };

    if now.saturating_duration_since(start) < persistence {
        return false;
    }

    if let (Some(last_direction), Some(last_time)) =
        (state.last_fired_direction, state.last_fired_time)
    {
        if last_direction == direction && now.saturating_duration_since(last_time) < cooldown {
            return false;
        }
    }

    state.last_fired_direction = Some(direction);
    state.last_fired_time = Some(now);
    state.direction_start_time = None;
    true
}

/// Trigger state bundled with its timing parameters, one per session.
#[derive(Clone, Debug)]
pub struct CaptureTrigger {
    state: TriggerState,
    persistence: Duration,
    cooldown: Duration,
}

impl CaptureTrigger {
    pub fn new(persistence: Duration, cooldown: Duration) -> Self {
        Self {
            state: TriggerState::default(),
            persistence,
            cooldown,
        }
    }

    pub fn from_config(config: &TriggerConfig) -> Self {
        Self::new(config.persistence(), config.cooldown())
    }

    pub fn evaluate(&mut self, direction: Direction, now: Instant) -> bool {
        evaluate(
            direction,
            now,
            &mut self.state,
            self.persistence,
            self.cooldown,
        )
    }

    pub fn reset(&mut self) {
        self.state = TriggerState::default();
    }

    pub fn state(&self) -> &TriggerState {
        &self.state
    }
}
