//! Periodic refresh timer.
//!
//! Runs a rebuild callback on a fixed interval on its own task, and lets
//! callers detect a dead task and restart it without restarting the process.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::task::JoinHandle;
use tracing::warn;

/// The rebuild callback invoked on every tick.
pub type RefreshFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// A background task invoking a refresh callback at a fixed interval.
pub struct RefreshTimer {
    period: Duration,
    refresh: RefreshFn,
    handle: Mutex<JoinHandle<()>>,
}

impl RefreshTimer {
    /// Start the timer. The first invocation happens one period from now;
    /// the caller is expected to have refreshed already at startup.
    pub fn start(period: Duration, refresh: RefreshFn) -> Self {
        let handle = Mutex::new(Self::spawn(period, refresh.clone()));
        Self {
            period,
            refresh,
            handle,
        }
    }

    fn spawn(period: Duration, refresh: RefreshFn) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // first tick completes immediately
            loop {
                interval.tick().await;
                refresh().await;
            }
        })
    }

    /// Whether the timer task is still running.
    pub fn is_alive(&self) -> bool {
        !self.handle.lock().expect("timer lock poisoned").is_finished()
    }

    /// Restart the timer task if it has died. Returns whether a restart
    /// happened.
    pub fn restart_if_dead(&self) -> bool {
        let mut handle = self.handle.lock().expect("timer lock poisoned");
        if !handle.is_finished() {
            return false;
        }
        warn!("refresh timer task died, restarting");
        *handle = Self::spawn(self.period, self.refresh.clone());
        true
    }

    /// Stop the timer task.
    pub fn stop(&self) {
        self.handle.lock().expect("timer lock poisoned").abort();
    }
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
