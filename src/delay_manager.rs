use std::time::Duration;
use std::thread;
use log::debug;

/// Fixed pause between records. No bursts, no token bucket.
#[derive(Debug, Clone, Copy)]
pub struct RateLimiter {
    delay: Duration,
}

impl RateLimiter {
    pub fn new(delay: Duration) -> Self {
        RateLimiter { delay }
    }

    pub fn pause(&self) {
        if self.delay.is_zero() {
            return;
        }
        debug!("Waiting {:?} (rate limit)", self.delay);
        thread::sleep(self.delay);
    }
}
