//! Polling scheduler.
//!
//! One repeating timer drives the status poll. The loop holds its own
//! shutdown channel so the timer resource is released on every exit
//! path, and it exits by itself as soon as the lifecycle no longer wants
//! polling. A watchdog restarts the loop if it dies while the flow is
//! still believed running.

use crate::controller::FlowController;
use flowdeck_core::FlowGateway;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// An owned, cancellable background task.
///
/// Stopping is idempotent at the call site: handles live in a
/// `Mutex<Option<TaskLifecycle>>` and are consumed by `stop`.
pub(crate) struct TaskLifecycle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl TaskLifecycle {
    pub(crate) fn new(shutdown_tx: watch::Sender<bool>, task: JoinHandle<()>) -> Self {
        Self { shutdown_tx, task }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signals the loop to exit and waits for the task to wind down,
    /// aborting it if it is parked in a network round trip.
    pub(crate) async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        self.task.abort();
        let _ = self.task.await;
    }
}

/// Spawns the repeating status poll.
///
/// Ticks are skipped, never queued: if a poll is still in flight when the
/// next tick fires, that tick is dropped (`MissedTickBehavior::Skip` plus
/// the controller's own in-flight guard).
pub(crate) fn spawn_poll_loop<G: FlowGateway + 'static>(
    controller: Arc<FlowController<G>>,
    interval: Duration,
) -> TaskLifecycle {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(async move {
        let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::debug!(target: "poll", "poll loop started ({:?} interval)", interval);
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => break,
                _ = ticker.tick() => {
                    if !controller.lifecycle().await.should_poll() {
                        break;
                    }
                    controller.poll_once().await;
                }
            }
        }
        tracing::debug!(target: "poll", "poll loop exited");
    });
    TaskLifecycle::new(shutdown_tx, task)
}

/// Spawns the watchdog that revives a silently-dead poll loop.
pub(crate) fn spawn_watchdog<G: FlowGateway + 'static>(
    controller: Arc<FlowController<G>>,
    interval: Duration,
) -> TaskLifecycle {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(async move {
        let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => break,
                _ = ticker.tick() => {
                    controller.watchdog_check().await;
                }
            }
        }
    });
    TaskLifecycle::new(shutdown_tx, task)
}
