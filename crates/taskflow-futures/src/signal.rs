//! Wake-up signal for waiters blocked across a rebind.

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::error::WaitError;

/// Condition variable paired with a monotonically increasing generation
/// counter.
///
/// A single auto-reset event is not safe here: with two waiters racing, one
/// waiter consuming the event starves the other. Instead, every waiter
/// captures the current generation before blocking and sleeps until the
/// counter has moved past the captured value, so a wake can never be lost and
/// spurious wakes fall back into the wait.
#[derive(Debug, Default)]
pub struct RebindSignal {
    generation: Mutex<u64>,
    rebound: Condvar,
}

impl RebindSignal {
    /// Create a signal at generation zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current generation. Zero until the first advance.
    pub fn generation(&self) -> u64 {
        *self.generation.lock().unwrap()
    }

    /// Advance the generation and wake every waiter. Returns the new value.
    pub fn advance(&self) -> u64 {
        let mut generation = self.generation.lock().unwrap();
        *generation += 1;
        self.rebound.notify_all();
        *generation
    }

    /// Block until the generation moves past `seen`, bounded by `timeout`.
    ///
    /// Returns the generation observed on wake-up. Callers must capture
    /// `seen` *before* snapshotting the state they are waiting to change;
    /// an advance that lands in between then makes this return immediately.
    pub fn wait_past(&self, seen: u64, timeout: Option<Duration>) -> Result<u64, WaitError> {
        let mut generation = self.generation.lock().unwrap();
        match timeout {
            None => {
                while *generation == seen {
                    generation = self.rebound.wait(generation).unwrap();
                }
            }
            Some(limit) => {
                let deadline = Instant::now() + limit;
                while *generation == seen {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(WaitError::Timeout);
                    }
                    let (guard, _) = self
                        .rebound
                        .wait_timeout(generation, deadline - now)
                        .unwrap();
                    generation = guard;
                }
            }
        }
        Ok(*generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_generation_starts_at_zero_and_is_monotonic() {
        let signal = RebindSignal::new();
        assert_eq!(signal.generation(), 0);
        assert_eq!(signal.advance(), 1);
        assert_eq!(signal.advance(), 2);
        assert_eq!(signal.generation(), 2);
    }

    #[test]
    fn test_wait_past_returns_immediately_when_generation_moved() {
        let signal = RebindSignal::new();
        signal.advance();
        let observed = signal.wait_past(0, Some(Duration::from_millis(10))).unwrap();
        assert_eq!(observed, 1);
    }

    #[test]
    fn test_wait_past_times_out() {
        let signal = RebindSignal::new();
        let result = signal.wait_past(0, Some(Duration::from_millis(20)));
        assert_eq!(result, Err(WaitError::Timeout));
    }

    #[test]
    fn test_single_advance_wakes_all_waiters() {
        let signal = Arc::new(RebindSignal::new());
        let mut waiters = Vec::new();
        for _ in 0..2 {
            let signal = signal.clone();
            waiters.push(thread::spawn(move || {
                signal.wait_past(0, Some(Duration::from_secs(5)))
            }));
        }
        // Give both threads time to block before the single wake.
        thread::sleep(Duration::from_millis(50));
        signal.advance();
        for waiter in waiters {
            assert_eq!(waiter.join().unwrap(), Ok(1));
        }
    }
}
