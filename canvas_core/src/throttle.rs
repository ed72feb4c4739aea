use std::time::{Duration, Instant};

use crate::timer::TimerSlot;

/// Leading + trailing edge throttle.
///
/// A signal fires immediately when at least one budget has elapsed since the
/// previous fire. Otherwise it leaves a single trailing deadline one budget
/// out; that deadline fires exactly once however many signals arrive before
/// it. At most one fire per budget, and the last signal is never lost.
#[derive(Debug, Clone)]
pub struct Throttle {
    budget: Duration,
    last_fire: Option<Instant>,
    trailing: TimerSlot,
}

impl Throttle {
    pub fn new(budget: Duration) -> Self {
        Self {
            budget,
            last_fire: None,
            trailing: TimerSlot::default(),
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Records a change. Returns `true` when the caller should act now.
    pub fn signal(&mut self, now: Instant) -> bool {
        match self.last_fire {
            Some(last) if now.saturating_duration_since(last) < self.budget => {
                self.trailing.arm_if_idle(now + self.budget);
                false
            }
            _ => {
                self.mark_fired(now);
                true
            }
        }
    }

    /// Returns `true` when the trailing deadline has come due.
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.trailing.fire_if_due(now) {
            self.last_fire = Some(now);
            true
        } else {
            false
        }
    }

    /// Records an out-of-band fire (e.g. a forced redraw); a pending trailing
    /// edge is covered by it.
    pub fn mark_fired(&mut self, now: Instant) {
        self.last_fire = Some(now);
        self.trailing.cancel();
    }

    pub fn is_pending(&self) -> bool {
        self.trailing.is_armed()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.trailing.deadline()
    }

    pub fn cancel(&mut self) {
        self.trailing.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUDGET: Duration = Duration::from_millis(16);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn first_signal_fires_on_leading_edge() {
        let t0 = Instant::now();
        let mut throttle = Throttle::new(BUDGET);
        assert!(throttle.signal(t0));
        assert!(!throttle.is_pending());
    }

    #[test]
    fn burst_collapses_into_one_trailing_fire() {
        let t0 = Instant::now();
        let mut throttle = Throttle::new(BUDGET);
        assert!(throttle.signal(t0));
        for step in 1..10 {
            assert!(!throttle.signal(t0 + ms(step)));
        }
        assert_eq!(throttle.next_deadline(), Some(t0 + ms(1) + BUDGET));
        assert!(!throttle.poll(t0 + ms(16)));
        assert!(throttle.poll(t0 + ms(17)));
        assert!(!throttle.poll(t0 + ms(40)));
    }

    #[test]
    fn fires_never_closer_than_budget() {
        let t0 = Instant::now();
        let mut throttle = Throttle::new(BUDGET);
        let mut fires = Vec::new();
        for step in 0..200u64 {
            let now = t0 + ms(step);
            if throttle.poll(now) || throttle.signal(now) {
                fires.push(now);
            }
        }
        assert!(fires.windows(2).all(|w| w[1] - w[0] >= BUDGET));
        assert!(fires.len() >= 200 / 32);
    }

    #[test]
    fn leading_fire_covers_pending_trailing_edge() {
        let t0 = Instant::now();
        let mut throttle = Throttle::new(BUDGET);
        throttle.signal(t0);
        throttle.signal(t0 + ms(5));
        assert!(throttle.is_pending());
        assert!(throttle.signal(t0 + ms(17)));
        assert!(!throttle.is_pending());
    }

    #[test]
    fn cancel_drops_trailing_edge() {
        let t0 = Instant::now();
        let mut throttle = Throttle::new(BUDGET);
        throttle.signal(t0);
        throttle.signal(t0 + ms(1));
        throttle.cancel();
        assert!(!throttle.poll(t0 + ms(100)));
    }
}
