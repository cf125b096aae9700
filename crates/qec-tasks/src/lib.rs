//! Background-worker scheduling.
//!
//! Mirrors the teacher binary's `TaskManager`/`TaskExecutor` split and its
//! `spawn_critical`/`spawn_critical_async` entry points (`bin/strata/src/
//! services.rs`): every long-running subsystem in this core — epoch
//! manager, snapshot importers, analytics snapshotter, flow tracker,
//! address monitor — is spawned as one independently cancellable task that
//! shares a single process-wide shutdown signal.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Cancellation receiver handed to every worker. Workers `tokio::select!`
/// between their timer and a change on this channel (spec §5: "every
/// suspension accepts a cancellation signal").
pub type ShutdownSignal = watch::Receiver<bool>;

/// Returns `true` once shutdown has been requested. Convenience over
/// matching on `*signal.borrow()` at call sites.
pub fn is_shutting_down(signal: &ShutdownSignal) -> bool {
    *signal.borrow()
}

/// Waits until either `duration` elapses or shutdown is requested. Returns
/// `true` if the wait completed normally (it's safe to continue to the next
/// cycle), `false` if shutdown fired (the caller should return immediately,
/// writing nothing partial).
pub async fn sleep_or_shutdown(duration: Duration, shutdown: &mut ShutdownSignal) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = shutdown.changed() => false,
    }
}

/// Owns the process-wide shutdown signal and the join handles of every
/// task it has spawned. `monitor` is the binary's final await point.
pub struct TaskManager {
    shutdown_tx: watch::Sender<bool>,
    executor: TaskExecutor,
    handles: Vec<(String, JoinHandle<()>)>,
}

impl TaskManager {
    pub fn new() -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            shutdown_tx,
            executor: TaskExecutor { shutdown_rx },
            handles: Vec::new(),
        }
    }

    pub fn executor(&self) -> TaskExecutor {
        self.executor.clone()
    }

    /// Installs SIGINT/SIGTERM listeners that trigger shutdown on receipt,
    /// matching `TaskManager::start_signal_listeners` in the teacher.
    pub fn start_signal_listeners(&self) {
        let tx = self.shutdown_tx.clone();
        tokio::spawn(async move {
            let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(err) => {
                    warn!(%err, "failed to install SIGTERM handler");
                    return;
                }
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("received SIGINT, shutting down");
                }
                _ = sigterm.recv() => {
                    info!("received SIGTERM, shutting down");
                }
            }
            let _ = tx.send(true);
        });
    }

    /// Spawns a critical task. A `JoinError` (panic) is logged at `error!`
    /// but does not bring down the process — per spec §7's "Programmer bug"
    /// policy: "Uncaught; terminates the worker iteration but not the
    /// process."
    pub fn spawn_critical<F>(&mut self, name: &str, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let task_name = name.to_string();
        let handle = tokio::spawn(async move {
            fut.await;
        });
        self.handles.push((task_name, handle));
    }

    /// Spawns a critical task whose future returns a `Result`; errors are
    /// logged but, again, never abort the process.
    pub fn spawn_critical_async<F, E>(&mut self, name: &str, fut: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: std::fmt::Display + Send + 'static,
    {
        let task_name = name.to_string();
        let log_name = task_name.clone();
        let handle = tokio::spawn(async move {
            if let Err(err) = fut.await {
                error!(task = %log_name, %err, "critical task exited with error");
            }
        });
        self.handles.push((task_name, handle));
    }

    /// Signals shutdown and waits for every spawned task to finish, logging
    /// progress every `poll_interval` if given.
    pub async fn monitor(self, poll_interval: Option<Duration>) {
        let _ = self.shutdown_tx.send(true);
        for (name, handle) in self.handles {
            match poll_interval {
                Some(interval) => {
                    let mut handle = handle;
                    loop {
                        tokio::select! {
                            result = &mut handle => {
                                if let Err(err) = result {
                                    error!(task = %name, %err, "task panicked during shutdown");
                                }
                                break;
                            }
                            _ = tokio::time::sleep(interval) => {
                                info!(task = %name, "still waiting for task to finish");
                            }
                        }
                    }
                }
                None => {
                    if let Err(err) = handle.await {
                        error!(task = %name, %err, "task panicked during shutdown");
                    }
                }
            }
        }
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Cheaply-cloneable handle used by worker constructors to obtain a
/// shutdown receiver without needing a reference to the whole manager.
#[derive(Clone)]
pub struct TaskExecutor {
    shutdown_rx: watch::Receiver<bool>,
}

impl TaskExecutor {
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown_rx.clone()
    }
}

/// A periodically-driven background worker. `run_once` does one unit of
/// work and returns whether anything was done (used by catch-up loops like
/// the analytics snapshotter, which keep calling `run_once` without
/// sleeping while it returns `true`).
#[async_trait::async_trait]
pub trait PeriodicWorker: Send {
    type Error: std::fmt::Display + Send;

    async fn run_once(&mut self) -> Result<bool, Self::Error>;

    /// Name used in log lines and metrics labels.
    fn name(&self) -> &str;
}

/// Drives a [`PeriodicWorker`] forever: an `initial_delay`, then repeated
/// `run_once` calls every `period`, cooperating with `shutdown`. This is the
/// shape every worker in §4.3–§4.7 shares (only the period/initial-delay
/// numbers differ per spec).
pub async fn run_periodic<W: PeriodicWorker>(
    mut worker: W,
    period: Duration,
    initial_delay: Duration,
    mut shutdown: ShutdownSignal,
) {
    if !sleep_or_shutdown(initial_delay, &mut shutdown).await {
        return;
    }

    loop {
        if is_shutting_down(&shutdown) {
            return;
        }
        match worker.run_once().await {
            Ok(_) => {}
            Err(err) => {
                warn!(worker = worker.name(), %err, "periodic worker iteration failed");
            }
        }
        if !sleep_or_shutdown(period, &mut shutdown).await {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct CountingWorker {
        calls: Arc<AtomicU32>,
    }

    #[async_trait::async_trait]
    impl PeriodicWorker for CountingWorker {
        type Error = std::convert::Infallible;

        async fn run_once(&mut self) -> Result<bool, Self::Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }

        fn name(&self) -> &str {
            "counting-worker"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn run_periodic_stops_on_shutdown() {
        let calls = Arc::new(AtomicU32::new(0));
        let (tx, rx) = watch::channel(false);
        let worker = CountingWorker {
            calls: calls.clone(),
        };

        let handle = tokio::spawn(run_periodic(
            worker,
            Duration::from_secs(10),
            Duration::from_secs(0),
            rx,
        ));

        tokio::time::sleep(Duration::from_millis(1)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert!(calls.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn shutdown_signal_starts_false() {
        let (_tx, rx) = watch::channel(false);
        assert!(!is_shutting_down(&rx));
    }
}
