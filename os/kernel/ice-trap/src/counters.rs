use core::sync::atomic::{AtomicU32, Ordering};

const BUCKETS: usize = 64;

/// Per-vector occurrence counts, for diagnostics only.
pub struct InterruptCounters {
    in_session: [AtomicU32; BUCKETS],
    passed: [AtomicU32; BUCKETS],
}

/// Plain copy of the counters.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub in_session: [u32; BUCKETS],
    pub passed: [u32; BUCKETS],
}

impl Default for InterruptCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptCounters {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            in_session: [const { AtomicU32::new(0) }; BUCKETS],
            passed: [const { AtomicU32::new(0) }; BUCKETS],
        }
    }

    #[inline]
    fn bucket(vector: u8) -> usize {
        usize::from(vector) & (BUCKETS - 1)
    }

    pub fn count_in_session(&self, vector: u8) {
        self.in_session[Self::bucket(vector)].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count_passed(&self, vector: u8) {
        self.passed[Self::bucket(vector)].fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            in_session: core::array::from_fn(|i| self.in_session[i].load(Ordering::Relaxed)),
            passed: core::array::from_fn(|i| self.passed[i].load(Ordering::Relaxed)),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Timer {
    SerialPoll,
    CursorBlink,
}

/// Countdown timers driven by the timer interrupt while a session runs.
pub struct LocalTimers {
    serial_poll: AtomicU32,
    cursor_blink: AtomicU32,
    serial_reload: u32,
    blink_reload: u32,
}

impl LocalTimers {
    #[must_use]
    pub const fn new(serial_reload: u32, blink_reload: u32) -> Self {
        Self {
            serial_poll: AtomicU32::new(serial_reload),
            cursor_blink: AtomicU32::new(blink_reload),
            serial_reload,
            blink_reload,
        }
    }

    const fn slot(&self, timer: Timer) -> (&AtomicU32, u32) {
        match timer {
            Timer::SerialPoll => (&self.serial_poll, self.serial_reload),
            Timer::CursorBlink => (&self.cursor_blink, self.blink_reload),
        }
    }

    /// One timer tick: every running countdown moves toward zero.
    pub fn tick(&self) {
        for t in [&self.serial_poll, &self.cursor_blink] {
            let _ = t.fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| v.checked_sub(1));
        }
    }

    #[must_use]
    pub fn remaining(&self, timer: Timer) -> u32 {
        self.slot(timer).0.load(Ordering::Acquire)
    }

    /// `true` once per expiry; the countdown restarts from its reload value.
    pub fn take_expired(&self, timer: Timer) -> bool {
        let (slot, reload) = self.slot(timer);
        slot.compare_exchange(0, reload, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
