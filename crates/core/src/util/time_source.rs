//! Wall-clock abstraction so distribution timing can be driven by tests.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

/// Source of the current ledger time, in seconds since the Unix epoch.
pub trait TimeSource: Send + Sync + 'static {
    fn now_secs(&self) -> u64;
}

/// Reads the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_secs(&self) -> u64 {
        // A clock before the epoch reads as 0, which is never "due".
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Manually advanced clock shared between a test and the code under test.
#[derive(Debug, Clone, Default)]
pub struct SharedMockTimeSource {
    now: Arc<Mutex<u64>>,
}

impl SharedMockTimeSource {
    pub fn starting_at(secs: u64) -> Self {
        Self {
            now: Arc::new(Mutex::new(secs)),
        }
    }

    pub fn advance_time(&self, by: Duration) {
        let mut now = self.now.lock();
        *now = now.saturating_add(by.as_secs());
    }

    pub fn set_time(&self, secs: u64) {
        *self.now.lock() = secs;
    }
}

impl TimeSource for SharedMockTimeSource {
    fn now_secs(&self) -> u64 {
        *self.now.lock()
    }
}
