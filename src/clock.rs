// Clock collaborator - the engine never reads wall time directly.

use chrono::{DateTime, Local};

use crate::models::TimeMillis;

/// Source of "now" for vote timestamps and local-day boundaries. Injected so
/// tests can pin the clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;

    fn now_millis(&self) -> TimeMillis {
        self.now().timestamp_millis()
    }
}

/// Production clock.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Settable clock for tests. Wrapped in a mutex so a shared `Arc<FixedClock>`
/// can be advanced mid-test.
#[derive(Debug)]
pub struct FixedClock {
    now: std::sync::Mutex<DateTime<Local>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Local>) -> Self {
        Self {
            now: std::sync::Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Local>) {
        *self.now.lock().expect("clock lock") = now;
    }

    pub fn advance(&self, delta: chrono::Duration) {
        let mut now = self.now.lock().expect("clock lock");
        *now = *now + delta;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock().expect("clock lock")
    }
}
