//! Non-blocking periodic timers for the cooperative control loop.

/// Timer period for a rate in Hz; rates below 1 count as 1 and the period
/// never drops below 1 ms.
#[inline]
pub fn hz_to_period_ms(hz: u32) -> u64 {
    (1_000 / u64::from(hz.max(1))).max(1)
}

/// Handle returned by [`Scheduler::every`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub(crate) usize);

#[derive(Debug, Clone)]
struct Timer {
    owner: usize,
    period_ms: u64,
    next_due_ms: u64,
    enabled: bool,
}

/// Timers are polled, never preempt: `due()` returns what has expired and
/// re-arms it. A timer that fell behind by more than one period is re-armed
/// relative to now instead of firing a burst.
#[derive(Debug, Default, Clone)]
pub struct Scheduler {
    timers: Vec<Timer>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a periodic timer for unit slot `owner`, first due one period from `now_ms`.
    pub fn every(&mut self, owner: usize, period_ms: u64, now_ms: u64) -> TimerId {
        let period_ms = period_ms.max(1);
        self.timers.push(Timer {
            owner,
            period_ms,
            next_due_ms: now_ms.saturating_add(period_ms),
            enabled: true,
        });
        TimerId(self.timers.len() - 1)
    }

    /// Change a timer's period. The next deadline moves earlier if the new
    /// period would already have expired it; it never moves later.
    pub fn set_period(&mut self, id: TimerId, period_ms: u64, now_ms: u64) {
        if let Some(t) = self.timers.get_mut(id.0) {
            if t.period_ms == period_ms.max(1) {
                return;
            }
            t.period_ms = period_ms.max(1);
            t.next_due_ms = t.next_due_ms.min(now_ms.saturating_add(t.period_ms));
        }
    }

    pub fn period_ms(&self, id: TimerId) -> Option<u64> {
        self.timers.get(id.0).map(|t| t.period_ms)
    }

    /// Make the timer due on the next poll.
    pub fn fire_now(&mut self, id: TimerId, now_ms: u64) {
        if let Some(t) = self.timers.get_mut(id.0) {
            t.next_due_ms = now_ms;
        }
    }

    pub fn set_enabled(&mut self, id: TimerId, enabled: bool) {
        if let Some(t) = self.timers.get_mut(id.0) {
            t.enabled = enabled;
        }
    }

    /// Expired timers in registration order, each re-armed.
    pub fn due(&mut self, now_ms: u64) -> Vec<(TimerId, usize)> {
        let mut out = Vec::new();
        for (i, t) in self.timers.iter_mut().enumerate() {
            if !t.enabled || t.next_due_ms > now_ms {
                continue;
            }
            out.push((TimerId(i), t.owner));
            let next = t.next_due_ms.saturating_add(t.period_ms);
            t.next_due_ms = if next <= now_ms {
                now_ms.saturating_add(t.period_ms)
            } else {
                next
            };
        }
        out
    }

    /// Earliest deadline among enabled timers.
    pub fn next_deadline_ms(&self) -> Option<u64> {
        self.timers
            .iter()
            .filter(|t| t.enabled)
            .map(|t| t.next_due_ms)
            .min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_on_period_boundaries() {
        let mut s = Scheduler::new();
        let id = s.every(0, 500, 0);
        assert!(s.due(499).is_empty());
        assert_eq!(s.due(500), vec![(id, 0)]);
        assert!(s.due(999).is_empty());
        assert_eq!(s.due(1000).len(), 1);
    }

    #[test]
    fn late_poll_does_not_burst() {
        let mut s = Scheduler::new();
        s.every(0, 100, 0);
        assert_eq!(s.due(1_000).len(), 1);
        assert!(s.due(1_050).is_empty());
        assert_eq!(s.next_deadline_ms(), Some(1_100));
    }

    #[test]
    fn shortening_period_pulls_deadline_in() {
        let mut s = Scheduler::new();
        let id = s.every(1, 1_000, 0);
        s.set_period(id, 125, 10);
        assert_eq!(s.next_deadline_ms(), Some(135));
        s.set_period(id, 1_000, 20);
        assert_eq!(s.next_deadline_ms(), Some(135));
    }

    #[test]
    fn fire_now_and_disable() {
        let mut s = Scheduler::new();
        let id = s.every(2, 1_000, 0);
        s.fire_now(id, 5);
        assert_eq!(s.due(5), vec![(id, 2)]);
        s.set_enabled(id, false);
        assert!(s.due(10_000).is_empty());
        assert_eq!(s.next_deadline_ms(), None);
    }
}
