use std::time::{Duration, Instant};

/// Time source for sleep/settle intervals and deadline polling. The hardware
/// timing the workflow depends on (reboot settling, reconnect polling) goes
/// through this seam so tests can run without real delay.
pub trait Clock: Send + Sync {
    fn sleep(&self, duration: Duration);
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn now(&self) -> Instant {
        Instant::now()
    }
}
