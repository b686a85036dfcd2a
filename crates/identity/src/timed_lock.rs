//! Mutual exclusion that expires on its own.
//!
//! Used for the single outstanding public-key request: if the response is
//! lost the lock lapses after the timeout and a new request may go out.
//! Each acquisition gets a fresh generation so a late release from an
//! expired holder cannot unlock a newer one.

use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockToken {
    generation: u64,
}

#[derive(Debug)]
struct LockState {
    holder: Option<(u64, Instant)>,
    next_generation: u64,
}

#[derive(Debug)]
pub struct TimedLock {
    name: &'static str,
    timeout: Duration,
    state: Mutex<LockState>,
}

impl TimedLock {
    pub fn new(name: &'static str, timeout: Duration) -> Self {
        Self {
            name,
            timeout,
            state: Mutex::new(LockState {
                holder: None,
                next_generation: 0,
            }),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut LockState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut state)
    }

    /// Take the lock unless a holder acquired it less than `timeout` ago.
    pub fn try_lock(&self) -> Option<LockToken> {
        let now = Instant::now();
        self.with_state(|state| {
            if let Some((generation, expires_at)) = state.holder {
                if now < expires_at {
                    return None;
                }
                tracing::warn!(lock = self.name, generation, "lock expired without release");
            }
            let generation = state.next_generation;
            state.next_generation += 1;
            state.holder = Some((generation, now + self.timeout));
            Some(LockToken { generation })
        })
    }

    /// Release the lock if `token` is still the current holder.
    pub fn unlock(&self, token: LockToken) -> bool {
        self.with_state(|state| match state.holder {
            Some((generation, _)) if generation == token.generation => {
                state.holder = None;
                true
            }
            _ => false,
        })
    }

    pub fn is_locked(&self) -> bool {
        let now = Instant::now();
        self.with_state(|state| matches!(state.holder, Some((_, expires_at)) if now < expires_at))
    }
}
