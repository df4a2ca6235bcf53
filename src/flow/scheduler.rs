//! Flow scheduler
//!
//! Runs an ordered task list against one browser session. Each step gets a
//! dedicated worker task and an independent watchdog on the driver side:
//! the driver sleeps the pacing interval, then polls until the worker
//! finishes or the step deadline passes. A timed-out worker is asked to
//! stop cooperatively but never aborted, so its native calls may still be
//! in flight when the flow halts; callers who start another flow on the
//! same session accept that overlap.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::browser::session::Browser;
use crate::flow::task::{FlowTask, TaskContext};
use crate::Error;

/// Watchdog poll granularity
const WATCHDOG_POLL: Duration = Duration::from_millis(200);

/// Flow pacing and timeout settings
#[derive(Debug, Clone)]
pub struct FlowOptions {
    /// Pause between starting a task and watching it
    pub pacing: Duration,
    /// Per-task deadline, measured from the step start
    pub task_timeout: Duration,
}

impl Default for FlowOptions {
    fn default() -> Self {
        Self {
            pacing: Duration::from_secs(1),
            task_timeout: Duration::from_secs(10),
        }
    }
}

/// Terminal snapshot of a flow
#[derive(Debug, Clone, Default)]
pub struct FlowOutcome {
    /// Index of the last task that was started (0 when none ran)
    pub position: usize,
    /// Every task ran to completion
    pub completed: bool,
    /// The flow was cancelled before exhausting the list
    pub cancelled: bool,
    /// A task outlived its watchdog window
    pub timed_out: bool,
    /// A task failed (or panicked)
    pub failed: bool,
}

/// Handle to a running flow
#[derive(Debug, Clone)]
pub struct FlowHandle {
    cancelled: Arc<AtomicBool>,
}

impl FlowHandle {
    /// Request cooperative cancellation
    ///
    /// Observed at the top of each driver iteration: no further task will
    /// start, and the running task's context reports a stop request. A
    /// task blocked in a native call is not interrupted.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// An ordered list of tasks bound for one browser session
pub struct Flow {
    tasks: Vec<Arc<dyn FlowTask>>,
    options: FlowOptions,
}

impl Flow {
    /// Create a flow over the given tasks with default options
    pub fn new(tasks: Vec<Arc<dyn FlowTask>>) -> Self {
        Self {
            tasks,
            options: FlowOptions::default(),
        }
    }

    /// Override pacing/timeout settings
    pub fn with_options(mut self, options: FlowOptions) -> Self {
        self.options = options;
        self
    }

    /// Start the flow and return immediately
    ///
    /// The driver runs on its own task; callers learn of completion only
    /// through `on_complete`, which fires exactly once with the terminal
    /// [`FlowOutcome`]: list exhausted, cancelled, timed out, or failed.
    pub fn spawn<F>(self, browser: Arc<Browser>, on_complete: F) -> FlowHandle
    where
        F: FnOnce(FlowOutcome) + Send + 'static,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let handle = FlowHandle {
            cancelled: Arc::clone(&cancelled),
        };

        let Flow { tasks, options } = self;
        tokio::spawn(async move {
            let outcome = drive(tasks, options, browser, cancelled).await;
            info!(
                "flow finished: position={} completed={} cancelled={} timed_out={} failed={}",
                outcome.position,
                outcome.completed,
                outcome.cancelled,
                outcome.timed_out,
                outcome.failed
            );
            on_complete(outcome);
        });

        handle
    }
}

/// The driver loop: one watchdog window per task, in order
async fn drive(
    tasks: Vec<Arc<dyn FlowTask>>,
    options: FlowOptions,
    browser: Arc<Browser>,
    cancelled: Arc<AtomicBool>,
) -> FlowOutcome {
    let total = tasks.len();
    let mut outcome = FlowOutcome::default();

    for (position, task) in tasks.into_iter().enumerate() {
        if cancelled.load(Ordering::Relaxed) {
            debug!("flow cancelled before task {}", position);
            outcome.cancelled = true;
            return outcome;
        }

        outcome.position = position;
        let started = tokio::time::Instant::now();
        let ctx = TaskContext::new(Arc::clone(&cancelled), started + options.task_timeout);

        let errored = Arc::new(AtomicBool::new(false));
        let worker = {
            let task = Arc::clone(&task);
            let browser = Arc::clone(&browser);
            let ctx = ctx.clone();
            let errored = Arc::clone(&errored);
            tokio::spawn(async move {
                if let Err(e) = task.execute(browser, ctx).await {
                    errored.store(true, Ordering::Relaxed);
                    task.handle_exception(e).await;
                }
            })
        };

        tokio::time::sleep(options.pacing).await;

        loop {
            if worker.is_finished() {
                break;
            }
            if started.elapsed() >= options.task_timeout {
                warn!(
                    "task {} exceeded its {:?} window; abandoning worker",
                    position, options.task_timeout
                );
                outcome.timed_out = true;
                ctx.request_stop();
                // The worker is not aborted: it may keep running and its
                // native calls may overlap with whatever the caller does
                // next on this session.
                task.handle_exception(Error::timeout(format!(
                    "task {} did not finish within {:?}",
                    position, options.task_timeout
                )))
                .await;
                return outcome;
            }
            tokio::time::sleep(WATCHDOG_POLL).await;
        }

        if let Err(join_error) = worker.await {
            outcome.failed = true;
            task.handle_exception(Error::internal(format!(
                "task {} worker panicked: {}",
                position, join_error
            )))
            .await;
            return outcome;
        }

        if errored.load(Ordering::Relaxed) {
            debug!("task {} failed; flow halts", position);
            outcome.failed = true;
            return outcome;
        }
    }

    outcome.position = total.saturating_sub(1);
    outcome.completed = true;
    outcome
}
