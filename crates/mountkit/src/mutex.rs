//! Per-path mutual exclusion.
//!
//! [`PathMutex`] gives at most one holder per path and grants waiters in
//! FIFO order. Ownership is handed to the next waiter through a channel, so
//! the waiter resumes on its own scheduling turn, never inside the
//! `unlock` call, and an immediate re-`lock` by the releasing task queues
//! behind it.

// Mutex.lock().unwrap() only panics on lock poisoning (prior panic
// while holding lock). This is intentional - corrupted state should not propagate.
#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use crate::error::{Errno, Error, Result};

#[derive(Default)]
struct LockEntry {
    waiters: VecDeque<oneshot::Sender<()>>,
}

/// Async mutex keyed by path.
///
/// A path with no entry in the table is unlocked. Cloning yields a handle
/// to the same table.
#[derive(Clone, Default)]
pub struct PathMutex {
    locks: Arc<Mutex<HashMap<String, LockEntry>>>,
}

impl std::fmt::Debug for PathMutex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let locks = self.locks.lock().unwrap();
        f.debug_struct("PathMutex")
            .field("held", &locks.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Queued `lock` call. If dropped after ownership was handed to it, the lock
/// is passed on.
struct Waiter<'a> {
    mutex: &'a PathMutex,
    path: &'a str,
    rx: Option<oneshot::Receiver<()>>,
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        if let Some(mut rx) = self.rx.take() {
            rx.close();
            if rx.try_recv().is_ok() {
                // Granted but never observed by the caller.
                let _ = self.mutex.unlock(self.path);
            }
        }
    }
}

impl PathMutex {
    /// Empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire `path`, waiting behind earlier callers.
    pub async fn lock(&self, path: &str) {
        let rx = {
            let mut locks = self.locks.lock().unwrap();
            match locks.get_mut(path) {
                None => {
                    locks.insert(path.to_string(), LockEntry::default());
                    return;
                }
                Some(entry) => {
                    let (tx, rx) = oneshot::channel();
                    entry.waiters.push_back(tx);
                    rx
                }
            }
        };

        let mut waiter = Waiter {
            mutex: self,
            path,
            rx: Some(rx),
        };
        if let Some(rx) = waiter.rx.as_mut() {
            // The sender lives in the table until it is used, so this only
            // resolves with a grant.
            let _ = rx.await;
        }
        waiter.rx = None;
    }

    /// Acquire `path` only if nobody holds it.
    pub fn try_lock(&self, path: &str) -> bool {
        let mut locks = self.locks.lock().unwrap();
        if locks.contains_key(path) {
            return false;
        }
        locks.insert(path.to_string(), LockEntry::default());
        true
    }

    /// Release `path`, handing it to the next waiter.
    ///
    /// Fails with `EPERM` if `path` is not locked.
    pub fn unlock(&self, path: &str) -> Result<()> {
        let mut locks = self.locks.lock().unwrap();
        let Some(entry) = locks.get_mut(path) else {
            return Err(Error::with(Errno::EPERM, path, "unlock"));
        };
        while let Some(next) = entry.waiters.pop_front() {
            if next.send(()).is_ok() {
                return Ok(());
            }
        }
        locks.remove(path);
        Ok(())
    }

    /// Whether `path` is currently held.
    pub fn is_locked(&self, path: &str) -> bool {
        self.locks.lock().unwrap().contains_key(path)
    }
}
