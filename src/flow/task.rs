//! Flow task contract

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::browser::session::Browser;
use crate::{Error, Result};

/// One caller-supplied unit of automation work
///
/// Tasks are stateless from the scheduler's point of view. Every failure
/// the scheduler observes, the task's own error or a watchdog timeout,
/// is funneled through [`handle_exception`](FlowTask::handle_exception);
/// nothing is thrown past the scheduler's surface. Retry policy, if any,
/// belongs inside the task.
#[async_trait]
pub trait FlowTask: Send + Sync {
    /// Run the task against the shared browser session
    async fn execute(&self, browser: Arc<Browser>, ctx: TaskContext) -> Result<()>;

    /// Receive the failure that halted the flow at this task
    async fn handle_exception(&self, error: Error);
}

/// Per-step context handed to a running task
///
/// Carries the cooperative stop flag and the step deadline. The scheduler
/// can only *request* an early exit; a task blocked in a native call will
/// not be preempted.
#[derive(Debug, Clone)]
pub struct TaskContext {
    stop: Arc<AtomicBool>,
    flow_cancelled: Arc<AtomicBool>,
    deadline: tokio::time::Instant,
}

impl TaskContext {
    pub(crate) fn new(flow_cancelled: Arc<AtomicBool>, deadline: tokio::time::Instant) -> Self {
        Self {
            stop: Arc::new(AtomicBool::new(false)),
            flow_cancelled,
            deadline,
        }
    }

    /// Whether the scheduler has asked this task to wind down
    ///
    /// Set when the step times out or the whole flow is cancelled.
    /// Long-running tasks should check this between engine calls.
    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Relaxed) || self.flow_cancelled.load(Ordering::Relaxed)
    }

    /// The instant at which this step's watchdog fires
    pub fn deadline(&self) -> tokio::time::Instant {
        self.deadline
    }

    pub(crate) fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}
