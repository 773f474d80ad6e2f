//! Next-due timers on the monotonic millisecond clock.

/// Fires once per `period_ms`. The first poll always fires and starts the
/// cadence from that moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Periodic {
    period_ms: u64,
    next_due: Option<u64>,
}

impl Periodic {
    pub const fn new(period_ms: u64) -> Self {
        Self {
            period_ms,
            next_due: None,
        }
    }

    pub fn poll(&mut self, now_ms: u64) -> bool {
        match self.next_due {
            Some(due) if now_ms < due => false,
            _ => {
                self.next_due = Some(now_ms.saturating_add(self.period_ms));
                true
            }
        }
    }

}

/// Widens a wrapping 32-bit tick counter into a millisecond clock that does
/// not wrap. Needs one `update` per counter period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Uptime {
    ms_per_tick: u64,
    last_ticks: Option<u32>,
    ticks: u64,
}

impl Uptime {
    pub const fn new(ms_per_tick: u64) -> Self {
        Self {
            ms_per_tick,
            last_ticks: None,
            ticks: 0,
        }
    }

    /// Folds in the current raw counter value and returns milliseconds.
    pub fn update(&mut self, raw_ticks: u32) -> u64 {
        self.ticks = match self.last_ticks {
            Some(last) => self.ticks + u64::from(raw_ticks.wrapping_sub(last)),
            None => u64::from(raw_ticks),
        };
        self.last_ticks = Some(raw_ticks);
        self.ticks * self.ms_per_tick
    }
}
