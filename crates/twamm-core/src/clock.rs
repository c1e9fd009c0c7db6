//! # Clock and Call Context
//!
//! Every mutating pair call runs inside a [`Context`] naming the caller and the
//! current block time. Drivers obtain the time from a [`Clock`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::errors::{TwammError, TwammResult};
use crate::types::AccountId;

/// Source of the current timestamp in seconds
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

/// Clock advanced explicitly by tests and scenario replays.
///
/// Clones share the same underlying time, which never moves backwards.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start)),
        }
    }

    /// Jump to `timestamp`, which may not be earlier than the current time
    pub fn set(&self, timestamp: u64) -> TwammResult<u64> {
        self.now
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| {
                (timestamp >= now).then_some(timestamp)
            })
            .map(|_| timestamp)
            .map_err(|now| TwammError::StaleOrOutOfRangeTimestamp {
                requested: timestamp,
                last: now,
            })
    }

    /// Move forward by `seconds` and return the new time
    pub fn advance(&self, seconds: u64) -> TwammResult<u64> {
        self.now
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| now.checked_add(seconds))
            .map_err(|_| TwammError::MathOverflow)?
            .checked_add(seconds)
            .ok_or(TwammError::MathOverflow)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Caller and block time of one pair call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    pub caller: AccountId,
    pub timestamp: u64,
}

impl Context {
    pub fn new(caller: impl Into<AccountId>, timestamp: u64) -> Self {
        Self {
            caller: caller.into(),
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new(100);
        let handle = clock.clone();
        assert_eq!(handle.advance(50), Ok(150));
        assert_eq!(clock.now(), 150);
        assert_eq!(clock.set(400), Ok(400));
        assert_eq!(handle.now(), 400);
        assert_eq!(handle.set(400), Ok(400));
    }

    #[test]
    fn test_manual_clock_never_moves_backwards() {
        let clock = ManualClock::new(100);
        assert_eq!(
            clock.set(7),
            Err(TwammError::StaleOrOutOfRangeTimestamp { requested: 7, last: 100 })
        );
        assert_eq!(clock.now(), 100);

        let end = ManualClock::new(u64::MAX - 1);
        assert_eq!(end.advance(2), Err(TwammError::MathOverflow));
        assert_eq!(end.now(), u64::MAX - 1);
        assert_eq!(end.advance(1), Ok(u64::MAX));
    }
}
