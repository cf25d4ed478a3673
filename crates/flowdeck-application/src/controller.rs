//! The flow interaction controller.
//!
//! `FlowController` owns the authoritative local view of the remote
//! flow: lifecycle state, the open checkpoint (if any), and the mirrored
//! blackboard. Transitions are driven only by gateway responses and
//! local user actions. Consumers observe the controller through
//! immutable snapshots; nothing here knows about rendering.

use crate::cancellation::spawn_cancel_watch;
use crate::scheduler::{TaskLifecycle, spawn_poll_loop, spawn_watchdog};
use crate::snapshot::{ControllerNotification, ControllerSnapshot};
use flowdeck_core::app_state::StateRepository;
use flowdeck_core::error::{FlowdeckError, Result};
use flowdeck_core::flow::{
    APPROVE_FEEDBACK, Blackboard, Checkpoint, DEFAULT_FEEDBACK, FlowLifecycle, FlowStatus,
    InteractionMode, InteractionSnapshot,
};
use flowdeck_core::{FlowGateway, FlowdeckConfig};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::{Mutex, RwLock, broadcast, watch};

/// Clears the in-flight flag on every exit path, including task abort.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn normalize_feedback(feedback: &str) -> String {
    let trimmed = feedback.trim();
    if trimmed.is_empty() {
        DEFAULT_FEEDBACK.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Supervises one remote flow through the gateway.
///
/// # Concurrency
///
/// All state lives behind `RwLock`s and is mutated by exactly one
/// component. Polls are strictly sequential (in-flight guard); user
/// actions may race an in-flight poll, in which case the action wins:
/// each resume/cancel bumps an epoch counter and a poll whose starting
/// epoch no longer matches discards its result.
pub struct FlowController<G> {
    gateway: Arc<G>,
    state_repository: Arc<dyn StateRepository>,
    config: FlowdeckConfig,
    lifecycle: RwLock<FlowLifecycle>,
    checkpoint: RwLock<Option<Checkpoint>>,
    blackboard: RwLock<Blackboard>,
    interaction_mode: RwLock<InteractionMode>,
    status_message: RwLock<String>,
    /// `is_running` from the previous applied poll; the stopped edge is
    /// only meaningful after the flow was seen alive once.
    last_observed_running: RwLock<Option<bool>>,
    /// Checkpoint re-detection is suppressed until this deadline after a
    /// resume.
    cooldown_until: RwLock<Option<Instant>>,
    /// Bumped by every user action that invalidates in-flight polls.
    epoch: AtomicU64,
    poll_in_flight: AtomicBool,
    poll_task: Mutex<Option<TaskLifecycle>>,
    cancel_task: Mutex<Option<TaskLifecycle>>,
    watchdog_task: Mutex<Option<TaskLifecycle>>,
    snapshot_tx: watch::Sender<ControllerSnapshot>,
    notification_tx: broadcast::Sender<ControllerNotification>,
}

impl<G: FlowGateway + 'static> FlowController<G> {
    /// Creates a controller in the `Idle` state.
    pub fn new(
        gateway: Arc<G>,
        state_repository: Arc<dyn StateRepository>,
        config: FlowdeckConfig,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(ControllerSnapshot::default());
        let (notification_tx, _) = broadcast::channel(64);
        Self {
            gateway,
            state_repository,
            config,
            lifecycle: RwLock::new(FlowLifecycle::Idle),
            checkpoint: RwLock::new(None),
            blackboard: RwLock::new(Default::default()),
            interaction_mode: RwLock::new(InteractionMode::default()),
            status_message: RwLock::new(String::new()),
            last_observed_running: RwLock::new(None),
            cooldown_until: RwLock::new(None),
            epoch: AtomicU64::new(0),
            poll_in_flight: AtomicBool::new(false),
            poll_task: Mutex::new(None),
            cancel_task: Mutex::new(None),
            watchdog_task: Mutex::new(None),
            snapshot_tx,
            notification_tx,
        }
    }

    // ============================================================================
    // Observation
    // ============================================================================

    /// The current lifecycle state.
    pub async fn lifecycle(&self) -> FlowLifecycle {
        *self.lifecycle.read().await
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> ControllerSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Subscribes to snapshot updates.
    pub fn subscribe(&self) -> watch::Receiver<ControllerSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Subscribes to transient notifications.
    pub fn notifications(&self) -> broadcast::Receiver<ControllerNotification> {
        self.notification_tx.subscribe()
    }

    /// Restores the persisted interaction mode on startup.
    pub async fn restore_interaction_mode(&self) {
        let mode = self.state_repository.interaction_mode().await;
        *self.interaction_mode.write().await = mode;
        self.publish().await;
    }

    // ============================================================================
    // User actions
    // ============================================================================

    /// Starts a new flow for the given prompt.
    ///
    /// Legal only while no flow is live. The blackboard mirror from any
    /// previous run is cleared before polling begins.
    ///
    /// # Errors
    ///
    /// `Validation` on a blank prompt (nothing is sent),
    /// `InvalidTransition` when a flow is already live, or the gateway
    /// error when the start request fails. Failures are never retried
    /// automatically.
    pub async fn start(self: &Arc<Self>, prompt: &str) -> Result<()> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(FlowdeckError::validation("prompt must not be empty"));
        }
        let current = self.lifecycle().await;
        if !current.can_start() {
            return Err(FlowdeckError::invalid_transition("start", current.as_str()));
        }

        if let Err(e) = self.gateway.start_flow(prompt).await {
            self.notify(ControllerNotification::error(format!(
                "Failed to start flow: {}",
                e
            )));
            return Err(e);
        }

        tracing::info!(target: "lifecycle", "flow start accepted");
        self.blackboard.write().await.reset();
        *self.checkpoint.write().await = None;
        self.status_message.write().await.clear();
        *self.last_observed_running.write().await = None;
        *self.cooldown_until.write().await = None;
        self.set_lifecycle(FlowLifecycle::Starting).await;
        self.publish().await;
        self.ensure_polling().await;
        self.ensure_watchdog().await;
        Ok(())
    }

    /// Resumes a free-form checkpoint with the given feedback.
    ///
    /// Empty feedback is replaced by the default placeholder.
    pub async fn resume(self: &Arc<Self>, feedback: &str) -> Result<()> {
        let feedback = normalize_feedback(feedback);
        self.send_feedback(&feedback, "resume").await
    }

    /// Approves a review checkpoint, sending the literal approval token.
    pub async fn approve(self: &Arc<Self>) -> Result<()> {
        self.require_review_checkpoint("approve").await?;
        self.send_feedback(APPROVE_FEEDBACK, "approve").await
    }

    /// Rejects a review checkpoint with improvement notes.
    ///
    /// Empty feedback is replaced by the default placeholder.
    pub async fn improve(self: &Arc<Self>, feedback: &str) -> Result<()> {
        self.require_review_checkpoint("improve").await?;
        let feedback = normalize_feedback(feedback);
        self.send_feedback(&feedback, "improve").await
    }

    /// Requests cancellation of the running flow.
    ///
    /// On acknowledgement the dedicated confirmation watch takes over;
    /// the terminal transition to `Stopped` happens only on confirmed
    /// death. If the signal itself fails, the previous state is restored
    /// and normal polling resumes.
    pub async fn cancel(self: &Arc<Self>) -> Result<String> {
        let previous = self.lifecycle().await;
        if !previous.can_cancel() {
            return Err(FlowdeckError::invalid_transition("cancel", previous.as_str()));
        }

        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.set_lifecycle(FlowLifecycle::Cancelling).await;
        self.publish().await;
        self.stop_polling().await;

        match self.gateway.cancel_flow().await {
            Ok(message) => {
                tracing::info!(target: "cancel", "kill signal acknowledged: {}", message);
                let confirm_loop =
                    spawn_cancel_watch(Arc::clone(self), self.config.cancel_poll_interval());
                let old = self.cancel_task.lock().await.replace(confirm_loop);
                if let Some(old) = old {
                    old.stop().await;
                }
                self.notify(ControllerNotification::info(message.clone()));
                Ok(message)
            }
            Err(e) => {
                self.set_lifecycle(previous).await;
                self.publish().await;
                if previous.should_poll() {
                    self.ensure_polling().await;
                }
                self.notify(ControllerNotification::error(format!(
                    "Failed to cancel flow: {}",
                    e
                )));
                Err(e)
            }
        }
    }

    /// Switches the process-wide interaction mode and persists the
    /// selection.
    pub async fn set_interaction_mode(&self, mode: InteractionMode) -> Result<()> {
        self.gateway.set_interaction_mode(mode).await?;
        if let Err(e) = self.state_repository.set_interaction_mode(mode).await {
            tracing::warn!(target: "storage", "failed to persist interaction mode: {}", e);
        }
        *self.interaction_mode.write().await = mode;
        self.publish().await;
        Ok(())
    }

    /// Tears down every background task.
    pub async fn shutdown(&self) {
        self.stop_polling().await;
        if let Some(task) = self.cancel_task.lock().await.take() {
            task.stop().await;
        }
        if let Some(task) = self.watchdog_task.lock().await.take() {
            task.stop().await;
        }
    }

    // ============================================================================
    // Polling
    // ============================================================================

    /// Performs one status poll and applies the outcome.
    ///
    /// Invoked by the scheduler; at most one poll is in flight at a
    /// time, a tick arriving early is skipped rather than queued.
    pub async fn poll_once(&self) {
        if self
            .poll_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!(target: "poll", "previous poll still in flight, skipping tick");
            return;
        }
        let _guard = InFlight(&self.poll_in_flight);

        let epoch_at_start = self.epoch.load(Ordering::SeqCst);

        let status = match self.gateway.fetch_status().await {
            Ok(status) => status,
            Err(e) => {
                self.handle_poll_failure(e).await;
                return;
            }
        };
        let interaction = match self.gateway.fetch_interaction().await {
            Ok(interaction) => interaction,
            Err(e) => {
                self.handle_poll_failure(e).await;
                return;
            }
        };

        if self.epoch.load(Ordering::SeqCst) != epoch_at_start {
            tracing::debug!(target: "poll", "discarding stale poll result");
            return;
        }

        self.apply_poll(status, interaction).await;
    }

    async fn apply_poll(&self, status: FlowStatus, interaction: InteractionSnapshot) {
        // The mirror is replaced wholesale, never patched.
        *self.blackboard.write().await = interaction.blackboard;
        *self.interaction_mode.write().await = interaction.mode;
        *self.status_message.write().await = status.status_message.clone();

        let previous_running = {
            let mut last = self.last_observed_running.write().await;
            std::mem::replace(&mut *last, Some(status.is_running))
        };

        let current = self.lifecycle().await;
        if !current.should_poll() {
            self.publish().await;
            return;
        }

        if !status.is_running {
            if previous_running == Some(true) {
                // The flow died or finished; finished wins over any
                // waiting flag in the same response.
                tracing::info!(target: "lifecycle", "flow no longer running");
                *self.checkpoint.write().await = None;
                self.set_lifecycle(FlowLifecycle::Stopped).await;
                self.publish().await;
                self.notify(ControllerNotification::info("Flow finished"));
            } else {
                // Not seen alive yet; keep waiting for it to come up.
                self.publish().await;
            }
            return;
        }

        if status.is_effectively_waiting() {
            let checkpoint_open = self.checkpoint.read().await.is_some();
            if !checkpoint_open && !self.in_cooldown().await {
                let step = status.step_name.clone().unwrap_or_default();
                let checkpoint = Checkpoint::open(step);
                tracing::info!(
                    target: "lifecycle",
                    step = %checkpoint.step_name,
                    kind = ?checkpoint.kind,
                    "checkpoint opened"
                );
                let message = format!("Waiting for input: {}", checkpoint.step_name);
                *self.checkpoint.write().await = Some(checkpoint);
                self.set_lifecycle(FlowLifecycle::WaitingForInput).await;
                self.publish().await;
                self.notify(ControllerNotification::info(message));
                return;
            }
        }

        if current == FlowLifecycle::Starting {
            self.set_lifecycle(FlowLifecycle::Running).await;
        }
        self.publish().await;
    }

    async fn handle_poll_failure(&self, error: FlowdeckError) {
        let current = self.lifecycle().await;
        if error.is_transport() || !current.should_poll() {
            // Transient; the next scheduled tick is the only retry.
            tracing::warn!(target: "poll", "status poll failed: {}", error);
            self.notify(ControllerNotification::warning(format!(
                "Status poll failed: {}",
                error
            )));
            return;
        }
        // The backend answered but refused a plain status read while the
        // flow was believed running; supervision cannot continue.
        tracing::error!(target: "lifecycle", "unrecoverable gateway failure: {}", error);
        *self.checkpoint.write().await = None;
        self.set_lifecycle(FlowLifecycle::Failed).await;
        self.publish().await;
        self.notify(ControllerNotification::error(format!(
            "Flow supervision failed: {}",
            error
        )));
    }

    // ============================================================================
    // Internals
    // ============================================================================

    async fn send_feedback(self: &Arc<Self>, feedback: &str, action: &'static str) -> Result<()> {
        let current = self.lifecycle().await;
        if current != FlowLifecycle::WaitingForInput {
            return Err(FlowdeckError::invalid_transition(action, current.as_str()));
        }

        if let Err(e) = self.gateway.resume_flow(feedback).await {
            // The checkpoint stays open so the operator can retry.
            self.notify(ControllerNotification::error(format!(
                "Failed to resume flow: {}",
                e
            )));
            return Err(e);
        }

        tracing::info!(target: "lifecycle", action, "feedback accepted");
        self.epoch.fetch_add(1, Ordering::SeqCst);
        *self.checkpoint.write().await = None;
        *self.cooldown_until.write().await = Some(Instant::now() + self.config.resume_cooldown());
        *self.last_observed_running.write().await = Some(true);
        self.set_lifecycle(FlowLifecycle::Running).await;
        self.publish().await;
        self.ensure_polling().await;
        Ok(())
    }

    async fn require_review_checkpoint(&self, action: &'static str) -> Result<()> {
        let checkpoint = self.checkpoint.read().await;
        match checkpoint.as_ref() {
            Some(c) if c.requires_approve_reject() => Ok(()),
            Some(c) => Err(FlowdeckError::invalid_transition(
                action,
                format!("free-form step '{}'", c.step_name),
            )),
            None => Err(FlowdeckError::invalid_transition(action, "no open checkpoint")),
        }
    }

    async fn in_cooldown(&self) -> bool {
        match *self.cooldown_until.read().await {
            Some(deadline) => Instant::now() < deadline,
            None => false,
        }
    }

    async fn set_lifecycle(&self, next: FlowLifecycle) {
        let mut lifecycle = self.lifecycle.write().await;
        if *lifecycle != next {
            tracing::info!(target: "lifecycle", from = %*lifecycle, to = %next, "transition");
            *lifecycle = next;
        }
    }

    pub(crate) async fn ensure_polling(self: &Arc<Self>) {
        let mut guard = self.poll_task.lock().await;
        if let Some(task) = guard.as_ref() {
            if !task.is_finished() {
                return;
            }
        }
        *guard = Some(spawn_poll_loop(Arc::clone(self), self.config.poll_interval()));
    }

    async fn stop_polling(&self) {
        if let Some(task) = self.poll_task.lock().await.take() {
            task.stop().await;
        }
    }

    async fn ensure_watchdog(self: &Arc<Self>) {
        let mut guard = self.watchdog_task.lock().await;
        if let Some(task) = guard.as_ref() {
            if !task.is_finished() {
                return;
            }
        }
        *guard = Some(spawn_watchdog(Arc::clone(self), self.config.watchdog_interval()));
    }

    /// Restarts the poll loop if it died while the flow still needs it.
    pub(crate) async fn watchdog_check(self: &Arc<Self>) {
        if !self.lifecycle().await.should_poll() {
            return;
        }
        let needs_restart = {
            let guard = self.poll_task.lock().await;
            match guard.as_ref() {
                Some(task) => task.is_finished(),
                None => true,
            }
        };
        if needs_restart {
            tracing::warn!(target: "poll", "poll loop dead while flow is running; restarting");
            self.ensure_polling().await;
        }
    }

    pub(crate) fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    /// Records confirmed (or presumed) death of the flow after a
    /// cancellation request.
    pub(crate) async fn confirm_cancelled(&self, transport_failure: Option<String>) {
        *self.checkpoint.write().await = None;
        *self.last_observed_running.write().await = Some(false);
        self.set_lifecycle(FlowLifecycle::Stopped).await;
        self.publish().await;
        match transport_failure {
            None => {
                tracing::info!(target: "cancel", "cancellation confirmed");
                self.notify(ControllerNotification::info("Flow cancelled"));
            }
            Some(error) => {
                tracing::warn!(target: "cancel", "assuming flow stopped after failure: {}", error);
                self.notify(ControllerNotification::warning(format!(
                    "Flow presumed stopped, best-effort confirmation (status check failed: {})",
                    error
                )));
            }
        }
    }

    async fn publish(&self) {
        let snapshot = ControllerSnapshot {
            lifecycle: *self.lifecycle.read().await,
            checkpoint: self.checkpoint.read().await.clone(),
            interaction_mode: *self.interaction_mode.read().await,
            status_message: self.status_message.read().await.clone(),
            blackboard: Arc::new(self.blackboard.read().await.clone()),
        };
        self.snapshot_tx.send_replace(snapshot);
    }

    fn notify(&self, notification: ControllerNotification) {
        let _ = self.notification_tx.send(notification);
    }
}
