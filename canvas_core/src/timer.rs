use std::time::Instant;

/// A cancellable one-shot deadline owned by the component that armed it.
///
/// Nothing fires on its own: the owner checks [`TimerSlot::fire_if_due`]
/// whenever the host polls with the current time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerSlot {
    deadline: Option<Instant>,
}

impl TimerSlot {
    pub fn arm(&mut self, at: Instant) {
        self.deadline = Some(at);
    }

    /// Arms only when no deadline is pending. Returns whether it armed.
    pub fn arm_if_idle(&mut self, at: Instant) -> bool {
        if self.deadline.is_some() {
            return false;
        }
        self.deadline = Some(at);
        true
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Disarms and returns `true` once `now` has reached the deadline.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(at) if now >= at => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Earliest of several optional deadlines.
pub fn earliest(deadlines: impl IntoIterator<Item = Option<Instant>>) -> Option<Instant> {
    deadlines.into_iter().flatten().min()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fires_once_when_due() {
        let t0 = Instant::now();
        let mut slot = TimerSlot::default();
        slot.arm(t0 + Duration::from_millis(10));
        assert!(!slot.fire_if_due(t0));
        assert!(slot.fire_if_due(t0 + Duration::from_millis(10)));
        assert!(!slot.fire_if_due(t0 + Duration::from_millis(20)));
        assert!(!slot.is_armed());
    }

    #[test]
    fn arm_if_idle_keeps_first_deadline() {
        let t0 = Instant::now();
        let mut slot = TimerSlot::default();
        assert!(slot.arm_if_idle(t0 + Duration::from_millis(5)));
        assert!(!slot.arm_if_idle(t0 + Duration::from_millis(50)));
        assert_eq!(slot.deadline(), Some(t0 + Duration::from_millis(5)));
        slot.cancel();
        assert!(!slot.fire_if_due(t0 + Duration::from_secs(1)));
    }

    #[test]
    fn earliest_ignores_idle_slots() {
        let t0 = Instant::now();
        let later = t0 + Duration::from_millis(3);
        assert_eq!(earliest([None, Some(later), Some(t0)]), Some(t0));
        assert_eq!(earliest([None, None]), None);
    }
}
