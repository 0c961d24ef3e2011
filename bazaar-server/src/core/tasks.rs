//! Background task supervision
//!
//! Every long-running task the server spawns is registered here so shutdown
//! can cancel and await all of them in one place. Tasks are wrapped in
//! `catch_unwind` so a panicking task is logged instead of dying silently.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// What a background task does, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// One-shot startup work (integrity checks, catch-up scans)
    Warmup,
    /// Long-running consumer loop
    Worker,
    /// Interval-driven job
    Periodic,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskKind::Warmup => write!(f, "warmup"),
            TaskKind::Worker => write!(f, "worker"),
            TaskKind::Periodic => write!(f, "periodic"),
        }
    }
}

/// Registry of spawned background tasks plus the shared shutdown token.
pub struct BackgroundTasks {
    handles: Vec<(&'static str, TaskKind, JoinHandle<()>)>,
    shutdown: CancellationToken,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self {
            handles: Vec::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Token handed to tasks that need to observe shutdown.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Spawn a task and keep its handle. Panics inside the task are caught
    /// and logged with the task name.
    pub fn spawn<F>(&mut self, name: &'static str, kind: TaskKind, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            match AssertUnwindSafe(future).catch_unwind().await {
                Ok(()) => {
                    tracing::debug!("Background task '{}' ({}) finished", name, kind);
                }
                Err(panic) => {
                    let msg = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    tracing::error!("Background task '{}' ({}) panicked: {}", name, kind, msg);
                }
            }
        });
        self.handles.push((name, kind, handle));
    }

    /// Drop handles of tasks that already finished. Warmup tasks are expected
    /// to exit; anything else finishing early is logged.
    pub fn check_health(&mut self) {
        self.handles.retain(|(name, kind, handle)| {
            if handle.is_finished() {
                if *kind != TaskKind::Warmup {
                    tracing::warn!("Background task '{}' ({}) exited early", name, kind);
                }
                false
            } else {
                true
            }
        });
    }

    /// Cancel the shutdown token and wait for every task to stop.
    pub async fn shutdown(self) {
        tracing::info!("Stopping {} background task(s)", self.handles.len());
        self.shutdown.cancel();

        for (name, kind, handle) in self.handles {
            match tokio::time::timeout(std::time::Duration::from_secs(5), handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!("Background task '{}' ({}) join error: {}", name, kind, e);
                }
                Err(_) => {
                    tracing::warn!("Background task '{}' ({}) did not stop in time", name, kind);
                }
            }
        }
    }
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}
