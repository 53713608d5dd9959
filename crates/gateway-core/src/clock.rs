//! Clock and id-generation seams (component A).
//!
//! Production wiring uses [`SystemClock`] and [`UuidGenerator`] directly;
//! tests inject a fake to get deterministic timestamps and ids without
//! threading a mock framework through every crate.

use std::time::{SystemTime, UNIX_EPOCH};

/// A source of current time, abstracted so tests can control it.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// A source of opaque identifiers.
pub trait IdGenerator: Send + Sync {
    /// Generate a new unique id.
    fn generate(&self) -> String;
}

/// The real UUID v4 generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::{Clock, IdGenerator};
    use std::sync::atomic::{AtomicU64, Ordering};

    /// A clock that only advances when told to.
    #[derive(Debug, Default)]
    pub struct FakeClock {
        millis: AtomicU64,
    }

    impl FakeClock {
        pub fn new(start_ms: u64) -> Self {
            Self {
                millis: AtomicU64::new(start_ms),
            }
        }

        pub fn advance(&self, ms: u64) {
            self.millis.fetch_add(ms, Ordering::SeqCst);
        }
    }

    impl Clock for FakeClock {
        fn now_ms(&self) -> u64 {
            self.millis.load(Ordering::SeqCst)
        }
    }

    /// An id generator that counts up, for deterministic test assertions.
    #[derive(Debug, Default)]
    pub struct SequentialIdGenerator {
        next: AtomicU64,
    }

    impl IdGenerator for SequentialIdGenerator {
        fn generate(&self) -> String {
            format!("id-{}", self.next.fetch_add(1, Ordering::SeqCst))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fakes::{FakeClock, SequentialIdGenerator};
    use super::*;

    #[test]
    fn test_fake_clock_advances() {
        let clock = FakeClock::new(1000);
        assert_eq!(clock.now_ms(), 1000);
        clock.advance(500);
        assert_eq!(clock.now_ms(), 1500);
    }

    #[test]
    fn test_sequential_id_generator() {
        let gen = SequentialIdGenerator::default();
        assert_eq!(gen.generate(), "id-0");
        assert_eq!(gen.generate(), "id-1");
    }

    #[test]
    fn test_system_clock_is_nonzero() {
        assert!(SystemClock.now_ms() > 0);
    }
}
