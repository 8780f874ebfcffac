//! Process-wide single-flight guard for the restart command.

use super::RestartError;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Where a restart currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RestartPhase {
    #[default]
    Idle,
    Stopping,
    Starting,
}

/// Snapshot of the guard. `initiating_user` is set exactly when the phase is
/// not [`RestartPhase::Idle`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestartState {
    pub phase: RestartPhase,
    pub initiating_user: Option<String>,
}

impl RestartState {
    pub fn in_progress(&self) -> bool {
        self.phase != RestartPhase::Idle
    }
}

/// Owns the [`RestartState`]. At most one [`RestartPermit`] exists at a time.
///
/// The lock is only held for the check-and-set, never across an await.
#[derive(Debug, Default)]
pub struct RestartGuard {
    state: Mutex<RestartState>,
}

impl RestartGuard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Atomically moves Idle to Stopping on behalf of `user`.
    ///
    /// Fails with the current holder's name when a restart is already
    /// running. The state is left untouched in that case.
    pub fn try_acquire(self: &Arc<Self>, user: &str) -> Result<RestartPermit, RestartError> {
        let mut state = self.lock();
        if state.in_progress() {
            return Err(RestartError::AlreadyInProgress {
                holder: state.initiating_user.clone().unwrap_or_default(),
            });
        }

        state.phase = RestartPhase::Stopping;
        state.initiating_user = Some(user.to_string());
        debug!("Restart guard acquired by [{}]", user);

        Ok(RestartPermit {
            guard: Arc::clone(self),
            user: user.to_string(),
        })
    }

    pub fn snapshot(&self) -> RestartState {
        self.lock().clone()
    }

    // A panic while holding the lock cannot leave the state half-written, so
    // a poisoned mutex is still usable.
    fn lock(&self) -> MutexGuard<'_, RestartState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Proof that the holder is the one running restart. Dropping it, on any
/// path including unwinding, returns the guard to Idle.
#[derive(Debug)]
pub struct RestartPermit {
    guard: Arc<RestartGuard>,
    user: String,
}

impl RestartPermit {
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Records that the stop finished and the start is under way.
    pub fn begin_start(&self) {
        self.guard.lock().phase = RestartPhase::Starting;
    }
}

impl Drop for RestartPermit {
    fn drop(&mut self) {
        let mut state = self.guard.lock();
        *state = RestartState::default();
        info!("Restart guard released by [{}]", self.user);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_reports_holder() {
        let guard = RestartGuard::new();
        let permit = guard.try_acquire("alice").unwrap();

        assert_eq!(
            guard.try_acquire("bob").unwrap_err(),
            RestartError::AlreadyInProgress {
                holder: "alice".to_string()
            }
        );
        assert_eq!(permit.user(), "alice");
        assert_eq!(guard.snapshot().initiating_user.as_deref(), Some("alice"));
    }

    #[test]
    fn test_phases_and_release() {
        let guard = RestartGuard::new();
        assert_eq!(guard.snapshot(), RestartState::default());

        let permit = guard.try_acquire("alice").unwrap();
        assert_eq!(guard.snapshot().phase, RestartPhase::Stopping);

        permit.begin_start();
        assert_eq!(guard.snapshot().phase, RestartPhase::Starting);
        assert!(guard.snapshot().in_progress());

        drop(permit);
        assert_eq!(guard.snapshot(), RestartState::default());
        assert!(guard.try_acquire("bob").is_ok());
    }

    #[test]
    fn test_released_when_holder_panics() {
        let guard = RestartGuard::new();
        let cloned = Arc::clone(&guard);

        let result = std::thread::spawn(move || {
            let _permit = cloned.try_acquire("alice").unwrap();
            panic!("lifecycle blew up");
        })
        .join();

        assert!(result.is_err());
        assert!(!guard.snapshot().in_progress());
        assert!(guard.try_acquire("bob").is_ok());
    }

    #[test]
    fn test_only_one_of_many_threads_acquires() {
        let guard = RestartGuard::new();
        let barrier = Arc::new(std::sync::Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let guard = Arc::clone(&guard);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    guard.try_acquire(&format!("user{i}")).ok()
                })
            })
            .collect();

        let permits: Vec<_> = handles
            .into_iter()
            .filter_map(|handle| handle.join().unwrap())
            .collect();

        assert_eq!(permits.len(), 1);
        assert_eq!(
            guard.snapshot().initiating_user.as_deref(),
            Some(permits[0].user())
        );
    }
}
