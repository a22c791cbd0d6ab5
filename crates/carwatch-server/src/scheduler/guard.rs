//! Process-wide mutual exclusion between scheduled jobs.
//!
//! A scrape writes while a dump reads the same tables, so at most one job
//! holds the guard at any instant. Jobs either skip when the guard is busy
//! or queue behind the holder; either way the guard is released when the
//! permit drops, including after an error or a panic inside the job.

use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use futures::FutureExt;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// What to do when another job holds the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardMode {
    /// Drop this firing.
    Skip,
    /// Wait for the holder to finish, then run.
    Wait,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobRun {
    Completed,
    Failed,
    Skipped { holder: Option<&'static str> },
}

#[derive(Debug, Clone, Default)]
pub struct JobGuard {
    lock: Arc<Mutex<()>>,
    holder: Arc<StdMutex<Option<&'static str>>>,
}

/// Proof of holding the guard. Dropping it releases the guard.
#[derive(Debug)]
pub struct GuardPermit {
    _lock: OwnedMutexGuard<()>,
    holder: Arc<StdMutex<Option<&'static str>>>,
}

impl Drop for GuardPermit {
    fn drop(&mut self) {
        *self.holder.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl JobGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the job currently holding the guard.
    #[must_use]
    pub fn holder(&self) -> Option<&'static str> {
        *self.holder.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn try_acquire(&self, name: &'static str) -> Option<GuardPermit> {
        let lock = Arc::clone(&self.lock).try_lock_owned().ok()?;
        Some(self.permit(lock, name))
    }

    pub async fn acquire(&self, name: &'static str) -> GuardPermit {
        let lock = Arc::clone(&self.lock).lock_owned().await;
        self.permit(lock, name)
    }

    fn permit(&self, lock: OwnedMutexGuard<()>, name: &'static str) -> GuardPermit {
        *self.holder.lock().unwrap_or_else(PoisonError::into_inner) = Some(name);
        GuardPermit {
            _lock: lock,
            holder: Arc::clone(&self.holder),
        }
    }

    /// Runs `job` under the guard and reports how it ended.
    ///
    /// Errors and panics are logged with the job name and never escape.
    pub async fn run<F, Fut, E>(&self, name: &'static str, mode: GuardMode, job: F) -> JobRun
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        let permit = match mode {
            GuardMode::Skip => {
                if let Some(permit) = self.try_acquire(name) {
                    permit
                } else {
                    let holder = self.holder();
                    tracing::info!(job = name, holder, "scheduler: guard busy; skipping run");
                    return JobRun::Skipped { holder };
                }
            }
            GuardMode::Wait => {
                if let Some(holder) = self.holder() {
                    tracing::info!(job = name, holder, "scheduler: guard busy; waiting");
                }
                self.acquire(name).await
            }
        };

        tracing::info!(job = name, "scheduler: job started");
        let outcome = AssertUnwindSafe(async { job().await }).catch_unwind().await;
        drop(permit);

        match outcome {
            Ok(Ok(())) => {
                tracing::info!(job = name, "scheduler: job finished");
                JobRun::Completed
            }
            Ok(Err(e)) => {
                tracing::error!(job = name, error = %e, "scheduler: job failed");
                JobRun::Failed
            }
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(ToString::to_string)
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                tracing::error!(job = name, panic = %message, "scheduler: job panicked");
                JobRun::Failed
            }
        }
    }
}
