use std::time::{Duration, Instant};

/// A one-shot or repeating deadline owned by the controller it drives.
///
/// There are no callbacks: the owner polls [`Timer::fire`] from its `tick`,
/// so a cancelled or dropped timer can never act on stale state.
#[derive(Debug, Clone)]
pub struct Timer {
    period: Duration,
    repeating: bool,
    due: Option<Instant>,
}

impl Timer {
    pub fn once(period: Duration) -> Self {
        Self {
            period,
            repeating: false,
            due: None,
        }
    }

    pub fn repeating(period: Duration) -> Self {
        Self {
            period,
            repeating: true,
            due: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Schedules the next expiry one period from `now`, replacing any
    /// pending one.
    pub fn arm(&mut self, now: Instant) {
        self.due = Some(now + self.period);
    }

    pub fn cancel(&mut self) {
        self.due = None;
    }

    pub fn is_armed(&self) -> bool {
        self.due.is_some()
    }

    pub fn due(&self) -> Option<Instant> {
        self.due
    }

    /// Returns true once per expiry. Repeating timers re-arm from `now`.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.due {
            Some(due) if now >= due => {
                self.due = if self.repeating {
                    Some(now + self.period)
                } else {
                    None
                };
                true
            }
            _ => false,
        }
    }

    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.due.map(|due| due.saturating_duration_since(now))
    }
}
