use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

/// Fixed-interval gate shared by every fetch worker.
///
/// Request starts are spaced at least `interval` apart, and a new request
/// may not start until `interval` has passed since the previous attempt
/// finished. The number of workers does not change the request rate.
#[derive(Debug)]
pub struct RateGate {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

/// Held for the duration of one request; dropping it records completion.
#[must_use]
pub struct RatePermit<'a> {
    gate: &'a RateGate,
}

impl Drop for RatePermit<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}

impl RateGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    pub fn acquire(&self) -> RatePermit<'_> {
        let slot = {
            let mut next = self.lock();
            let now = Instant::now();
            let slot = match *next {
                Some(reserved) if reserved > now => reserved,
                _ => now,
            };
            *next = Some(slot + self.interval);
            slot
        };
        let now = Instant::now();
        if slot > now {
            thread::sleep(slot - now);
        }
        RatePermit { gate: self }
    }

    fn release(&self) {
        let mut next = self.lock();
        let earliest = Instant::now() + self.interval;
        if next.is_none_or(|reserved| reserved < earliest) {
            *next = Some(earliest);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Instant>> {
        self.next_slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
