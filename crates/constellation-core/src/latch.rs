//! Single-shot ready latch.
//!
//! Used by the shared link protocols to serialize peers that observe the
//! same cached position: the first caller resets the latch, recomputes, then
//! sets it; everyone else waits for the set.

use parking_lot::{Condvar, Mutex};

/// Manual-reset latch. `wait` blocks until the next `set`; once set it stays
/// open until the next `reset`. One `set` releases every waiter.
#[derive(Debug)]
pub struct ReadyLatch {
    set: Mutex<bool>,
    cond: Condvar,
}

impl ReadyLatch {
    pub fn new(initially_set: bool) -> Self {
        Self {
            set: Mutex::new(initially_set),
            cond: Condvar::new(),
        }
    }

    pub fn set(&self) {
        *self.set.lock() = true;
        self.cond.notify_all();
    }

    pub fn reset(&self) {
        *self.set.lock() = false;
    }

    pub fn wait(&self) {
        let mut is_set = self.set.lock();
        while !*is_set {
            self.cond.wait(&mut is_set);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn wait_returns_immediately_when_set() {
        let latch = ReadyLatch::new(true);
        latch.wait();
    }

    #[test]
    fn set_releases_multiple_waiters() {
        let latch = Arc::new(ReadyLatch::new(false));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let l = Arc::clone(&latch);
            handles.push(std::thread::spawn(move || l.wait()));
        }
        std::thread::sleep(Duration::from_millis(50));
        latch.set();
        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn reset_rearms_the_latch() {
        let latch = Arc::new(ReadyLatch::new(true));
        latch.wait();
        latch.reset();

        let l = Arc::clone(&latch);
        let waiter = std::thread::spawn(move || l.wait());
        std::thread::sleep(Duration::from_millis(50));
        assert!(!waiter.is_finished());
        latch.set();
        waiter.join().unwrap();
    }
}
