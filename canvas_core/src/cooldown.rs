use std::{
    fmt,
    time::{Duration, Instant},
};

use crate::timer::TimerSlot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownState {
    Ready,
    Cooldown { remaining: Duration },
}

impl CooldownState {
    pub fn is_ready(&self) -> bool {
        matches!(self, CooldownState::Ready)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownActive {
    pub remaining: Duration,
}

impl CooldownActive {
    /// Whole seconds left, rounded up, as shown in the cooldown banner.
    pub fn remaining_secs(&self) -> u64 {
        let secs = self.remaining.as_secs();
        if self.remaining.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        }
    }
}

impl fmt::Display for CooldownActive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wait {}s before placing next pixel", self.remaining_secs())
    }
}

impl std::error::Error for CooldownActive {}

/// Client-side rate limit for local placements.
///
/// Acceptance is decided from the last placement timestamp alone; the tick
/// timer only refreshes the published [`CooldownState`].
#[derive(Debug, Clone)]
pub struct PlacementLimiter {
    duration: Duration,
    tick: Duration,
    last_placement: Option<Instant>,
    state: CooldownState,
    ticker: TimerSlot,
}

impl PlacementLimiter {
    pub fn new(duration: Duration, tick: Duration) -> Self {
        Self {
            duration,
            tick: tick.max(Duration::from_millis(1)),
            last_placement: None,
            state: CooldownState::Ready,
            ticker: TimerSlot::default(),
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn state(&self) -> CooldownState {
        self.state
    }

    pub fn last_placement(&self) -> Option<Instant> {
        self.last_placement
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.last_placement
            .map(|at| self.duration.saturating_sub(now.saturating_duration_since(at)))
            .unwrap_or(Duration::ZERO)
    }

    /// Starts a cooldown, or reports how long is left on the current one.
    pub fn try_place(&mut self, now: Instant) -> Result<(), CooldownActive> {
        let remaining = self.remaining(now);
        if !remaining.is_zero() {
            return Err(CooldownActive { remaining });
        }
        self.last_placement = Some(now);
        if self.duration.is_zero() {
            self.state = CooldownState::Ready;
            self.ticker.cancel();
        } else {
            self.state = CooldownState::Cooldown {
                remaining: self.duration,
            };
            self.ticker.arm(now + self.tick.min(self.duration));
        }
        Ok(())
    }

    /// Advances the countdown when the tick is due. Returns the new state
    /// whenever it was recomputed.
    pub fn tick(&mut self, now: Instant) -> Option<CooldownState> {
        if !self.ticker.fire_if_due(now) {
            return None;
        }
        let remaining = self.remaining(now);
        if remaining.is_zero() {
            self.state = CooldownState::Ready;
        } else {
            self.state = CooldownState::Cooldown { remaining };
            self.ticker.arm(now + self.tick.min(remaining));
        }
        Some(self.state)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.ticker.deadline()
    }

    pub fn cancel(&mut self) {
        self.ticker.cancel();
    }

    pub fn reset(&mut self) {
        self.ticker.cancel();
        self.last_placement = None;
        self.state = CooldownState::Ready;
    }
}
