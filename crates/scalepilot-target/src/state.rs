//! Process-wide pool state.
//!
//! The pool is either `Idle` or `Active`. `Target::scale` holds an
//! [`ActiveGuard`] for its whole duration; `Target::status` reports
//! not-ready without touching the provider while one is held.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;

use crate::error::{TargetError, TargetResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolState {
    Idle,
    Active,
}

impl PoolState {
    fn from_u8(v: u8) -> Self {
        match v {
            ACTIVE => PoolState::Active,
            _ => PoolState::Idle,
        }
    }
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolState::Idle => f.write_str("idle"),
            PoolState::Active => f.write_str("active"),
        }
    }
}

const IDLE: u8 = 0;
const ACTIVE: u8 = 1;

/// Lock-free holder of the pool state.
#[derive(Debug, Default)]
pub struct StateGuard {
    state: AtomicU8,
}

impl StateGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> PoolState {
        PoolState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_active(&self) -> bool {
        self.get() == PoolState::Active
    }

    pub fn set_active(&self) {
        self.state.store(ACTIVE, Ordering::Release);
    }

    pub fn set_idle(&self) {
        self.state.store(IDLE, Ordering::Release);
    }

    /// Move from Idle to Active, returning a guard that restores Idle on drop.
    ///
    /// Fails with `ScaleInProgress` if the pool is already Active.
    pub fn enter(&self) -> TargetResult<ActiveGuard<'_>> {
        self.state
            .compare_exchange(IDLE, ACTIVE, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| TargetError::ScaleInProgress)?;
        Ok(ActiveGuard { owner: self })
    }
}

/// Keeps the pool Active while alive.
#[derive(Debug)]
pub struct ActiveGuard<'a> {
    owner: &'a StateGuard,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.owner.set_idle();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn starts_idle_and_follows_setters() {
        let guard = StateGuard::new();
        assert_eq!(guard.get(), PoolState::Idle);

        guard.set_active();
        assert_eq!(guard.get(), PoolState::Active);

        guard.set_idle();
        assert_eq!(guard.get(), PoolState::Idle);
    }

    #[test]
    fn enter_restores_idle_on_drop() {
        let guard = StateGuard::new();
        {
            let _active = guard.enter().unwrap();
            assert!(guard.is_active());
        }
        assert!(!guard.is_active());
    }

    #[test]
    fn enter_restores_idle_on_early_return() {
        fn failing(guard: &StateGuard) -> TargetResult<()> {
            let _active = guard.enter()?;
            Err(TargetError::NotConfigured)
        }

        let guard = StateGuard::new();
        assert!(failing(&guard).is_err());
        assert_eq!(guard.get(), PoolState::Idle);
    }

    #[test]
    fn second_enter_is_rejected() {
        let guard = StateGuard::new();
        let _active = guard.enter().unwrap();

        assert!(matches!(guard.enter(), Err(TargetError::ScaleInProgress)));
        assert!(guard.is_active());
    }

    #[test]
    fn concurrent_readers_see_only_two_states() {
        let guard = Arc::new(StateGuard::new());
        let writer = {
            let guard = Arc::clone(&guard);
            std::thread::spawn(move || {
                for i in 0..10_000 {
                    if i % 2 == 0 {
                        guard.set_active();
                    } else {
                        guard.set_idle();
                    }
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let guard = Arc::clone(&guard);
                std::thread::spawn(move || {
                    for _ in 0..10_000 {
                        let raw = guard.state.load(Ordering::Acquire);
                        assert!(raw == IDLE || raw == ACTIVE);
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
    }
}
