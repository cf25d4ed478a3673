//! Cancellation confirmation loop.
//!
//! After the kill signal is acknowledged, a dedicated higher-frequency
//! poll watches for the process to die. The loop ends on the first
//! response showing the flow stopped, or on the first transport failure,
//! which is treated as the backend being gone (best-effort confirmation,
//! flagged to the user as such).

use crate::controller::FlowController;
use crate::scheduler::TaskLifecycle;
use flowdeck_core::FlowGateway;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};

pub(crate) fn spawn_cancel_watch<G: FlowGateway + 'static>(
    controller: Arc<FlowController<G>>,
    interval: Duration,
) -> TaskLifecycle {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(async move {
        let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::debug!(target: "cancel", "cancellation watch started ({:?} interval)", interval);
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => break,
                _ = ticker.tick() => {
                    match controller.gateway().fetch_status().await {
                        Ok(status) if !status.is_running => {
                            controller.confirm_cancelled(None).await;
                            break;
                        }
                        Ok(_) => {
                            tracing::debug!(target: "cancel", "flow still running, will re-check");
                        }
                        Err(e) => {
                            tracing::warn!(target: "cancel", "status check failed during cancellation: {}", e);
                            controller
                                .confirm_cancelled(Some(e.to_string()))
                                .await;
                            break;
                        }
                    }
                }
            }
        }
        tracing::debug!(target: "cancel", "cancellation watch exited");
    });
    TaskLifecycle::new(shutdown_tx, task)
}
