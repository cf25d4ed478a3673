//! Scheduler-driven supervision scenario.
//!
//! Unlike the unit tests, these run the real poll loop against a
//! scripted gateway and watch the controller move through its states on
//! its own timers.

use async_trait::async_trait;
use flowdeck_application::FlowController;
use flowdeck_core::error::Result;
use flowdeck_core::flow::{
    CheckpointKind, FlowLifecycle, FlowStatus, InteractionMode, InteractionSnapshot,
};
use flowdeck_core::{FlowGateway, FlowdeckConfig, StateRepository};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::sleep;

#[derive(Default)]
struct ScriptedGateway {
    statuses: Mutex<VecDeque<FlowStatus>>,
    last_status: Mutex<FlowStatus>,
    sent_feedback: Mutex<Vec<String>>,
    status_calls: AtomicUsize,
}

impl ScriptedGateway {
    fn push(&self, status: FlowStatus) {
        self.statuses.lock().unwrap().push_back(status);
    }

    fn status_call_count(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FlowGateway for ScriptedGateway {
    async fn start_flow(&self, _prompt: &str) -> Result<()> {
        Ok(())
    }

    async fn fetch_status(&self) -> Result<FlowStatus> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        match self.statuses.lock().unwrap().pop_front() {
            Some(status) => {
                *self.last_status.lock().unwrap() = status.clone();
                Ok(status)
            }
            None => Ok(self.last_status.lock().unwrap().clone()),
        }
    }

    async fn fetch_interaction(&self) -> Result<InteractionSnapshot> {
        Ok(InteractionSnapshot::default())
    }

    async fn resume_flow(&self, feedback: &str) -> Result<()> {
        self.sent_feedback.lock().unwrap().push(feedback.to_string());
        Ok(())
    }

    async fn cancel_flow(&self) -> Result<String> {
        Ok("Flow signaled to stop".to_string())
    }

    async fn set_interaction_mode(&self, _mode: InteractionMode) -> Result<()> {
        Ok(())
    }

    async fn send_chat_message(&self, _question: &str, _conversation_id: &str) -> Result<String> {
        Ok(String::new())
    }
}

#[derive(Default)]
struct MemoryStateRepository {
    mode: Mutex<InteractionMode>,
}

#[async_trait]
impl StateRepository for MemoryStateRepository {
    async fn interaction_mode(&self) -> InteractionMode {
        *self.mode.lock().unwrap()
    }

    async fn set_interaction_mode(&self, mode: InteractionMode) -> Result<()> {
        *self.mode.lock().unwrap() = mode;
        Ok(())
    }
}

fn running() -> FlowStatus {
    FlowStatus {
        is_running: true,
        ..FlowStatus::default()
    }
}

fn waiting(step: &str) -> FlowStatus {
    FlowStatus {
        is_running: true,
        is_waiting_for_input: true,
        step_name: Some(step.to_string()),
        ..FlowStatus::default()
    }
}

async fn wait_for_lifecycle(
    controller: &Arc<FlowController<ScriptedGateway>>,
    expected: FlowLifecycle,
) {
    for _ in 0..200 {
        if controller.lifecycle().await == expected {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "lifecycle never reached {expected}, still {}",
        controller.lifecycle().await
    );
}

#[tokio::test]
async fn test_supervised_flow_end_to_end() {
    let gateway = Arc::new(ScriptedGateway::default());
    let config = FlowdeckConfig {
        poll_interval_ms: 25,
        cancel_poll_interval_ms: 20,
        resume_cooldown_ms: 10_000,
        watchdog_interval_ms: 3_600_000,
        ..FlowdeckConfig::default()
    };
    let controller = Arc::new(FlowController::new(
        gateway.clone(),
        Arc::new(MemoryStateRepository::default()) as Arc<dyn StateRepository>,
        config,
    ));

    // Start: the scheduler begins polling on its own.
    gateway.push(running());
    controller.start("Deploy nginx").await.unwrap();
    assert_eq!(controller.lifecycle().await, FlowLifecycle::Starting);
    wait_for_lifecycle(&controller, FlowLifecycle::Running).await;

    // The flow blocks on a review step; polling suspends while waiting.
    gateway.push(waiting("initial_research"));
    wait_for_lifecycle(&controller, FlowLifecycle::WaitingForInput).await;
    let checkpoint = controller.snapshot().checkpoint.expect("open checkpoint");
    assert_eq!(checkpoint.kind, CheckpointKind::ApproveReject);

    let calls_while_waiting = gateway.status_call_count();
    sleep(Duration::from_millis(120)).await;
    assert_eq!(
        gateway.status_call_count(),
        calls_while_waiting,
        "polling must suspend while a checkpoint is open"
    );

    // Approval sends the literal token and polling resumes. The backend
    // still reports the answered checkpoint for a moment; the cool-down
    // keeps it from re-opening.
    controller.approve().await.unwrap();
    assert_eq!(
        gateway.sent_feedback.lock().unwrap().clone(),
        vec!["approve".to_string()]
    );
    assert_eq!(controller.lifecycle().await, FlowLifecycle::Running);
    gateway.push(running());

    for _ in 0..100 {
        if gateway.status_call_count() > calls_while_waiting {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    assert!(
        gateway.status_call_count() > calls_while_waiting,
        "polling must resume after approval"
    );
    assert!(controller.snapshot().checkpoint.is_none());

    // Cancellation: the dedicated watch confirms death and stops. The
    // stopped status is queued only after the kill signal so the normal
    // poll loop cannot swallow it first.
    controller.cancel().await.unwrap();
    gateway.push(FlowStatus::default());
    wait_for_lifecycle(&controller, FlowLifecycle::Stopped).await;

    let calls_after_stop = gateway.status_call_count();
    sleep(Duration::from_millis(150)).await;
    assert_eq!(
        gateway.status_call_count(),
        calls_after_stop,
        "all polling must stop once the flow is confirmed dead"
    );

    controller.shutdown().await;
}

#[tokio::test]
async fn test_flow_finishing_on_its_own_stops_supervision() {
    let gateway = Arc::new(ScriptedGateway::default());
    let config = FlowdeckConfig {
        poll_interval_ms: 20,
        watchdog_interval_ms: 3_600_000,
        ..FlowdeckConfig::default()
    };
    let controller = Arc::new(FlowController::new(
        gateway.clone(),
        Arc::new(MemoryStateRepository::default()) as Arc<dyn StateRepository>,
        config,
    ));

    gateway.push(running());
    controller.start("Deploy nginx").await.unwrap();
    wait_for_lifecycle(&controller, FlowLifecycle::Running).await;

    gateway.push(FlowStatus::default());
    wait_for_lifecycle(&controller, FlowLifecycle::Stopped).await;
    assert!(controller.snapshot().checkpoint.is_none());

    let calls_after_stop = gateway.status_call_count();
    sleep(Duration::from_millis(120)).await;
    assert_eq!(gateway.status_call_count(), calls_after_stop);

    controller.shutdown().await;
}
