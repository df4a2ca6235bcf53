//! Flow scheduler behavior: ordering, timeout watchdog, cancellation, and
//! the exactly-once completion callback.

mod common;

use async_trait::async_trait;
use common::sample_browser;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

use drover::{Browser, Error, Flow, FlowOptions, FlowOutcome, FlowTask, TaskContext};

/// Records execution order and received exceptions
struct Probe {
    label: &'static str,
    log: Arc<Mutex<Vec<String>>>,
    errors: Arc<Mutex<Vec<Error>>>,
}

impl Probe {
    fn new(label: &'static str, log: &Arc<Mutex<Vec<String>>>, errors: &Arc<Mutex<Vec<Error>>>) -> Arc<Self> {
        Arc::new(Self {
            label,
            log: Arc::clone(log),
            errors: Arc::clone(errors),
        })
    }
}

#[async_trait]
impl FlowTask for Probe {
    async fn execute(&self, _browser: Arc<Browser>, _ctx: TaskContext) -> drover::Result<()> {
        self.log.lock().unwrap().push(self.label.to_string());
        Ok(())
    }

    async fn handle_exception(&self, error: Error) {
        self.errors.lock().unwrap().push(error);
    }
}

/// Never finishes; notes whether the scheduler asked it to stop
struct Stuck {
    errors: Arc<Mutex<Vec<Error>>>,
    saw_stop_request: Arc<AtomicBool>,
}

#[async_trait]
impl FlowTask for Stuck {
    async fn execute(&self, _browser: Arc<Browser>, ctx: TaskContext) -> drover::Result<()> {
        loop {
            if ctx.stop_requested() {
                self.saw_stop_request.store(true, Ordering::Relaxed);
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    async fn handle_exception(&self, error: Error) {
        self.errors.lock().unwrap().push(error);
    }
}

/// Fails immediately with a navigation error
struct Failing {
    errors: Arc<Mutex<Vec<Error>>>,
}

#[async_trait]
impl FlowTask for Failing {
    async fn execute(&self, _browser: Arc<Browser>, _ctx: TaskContext) -> drover::Result<()> {
        Err(Error::navigation("target unreachable"))
    }

    async fn handle_exception(&self, error: Error) {
        self.errors.lock().unwrap().push(error);
    }
}

/// Signals when started, then sleeps
struct Slow {
    started: Arc<Notify>,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl FlowTask for Slow {
    async fn execute(&self, _browser: Arc<Browser>, _ctx: TaskContext) -> drover::Result<()> {
        self.log.lock().unwrap().push("slow".to_string());
        self.started.notify_one();
        tokio::time::sleep(Duration::from_millis(300)).await;
        Ok(())
    }

    async fn handle_exception(&self, _error: Error) {}
}

fn quick_options() -> FlowOptions {
    FlowOptions {
        pacing: Duration::from_millis(50),
        task_timeout: Duration::from_secs(5),
    }
}

async fn run_flow(
    tasks: Vec<Arc<dyn FlowTask>>,
    options: FlowOptions,
) -> (FlowOutcome, Arc<AtomicUsize>) {
    let (_engine, browser) = sample_browser().await;
    let callbacks = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = tokio::sync::oneshot::channel();

    let counter = Arc::clone(&callbacks);
    Flow::new(tasks)
        .with_options(options)
        .spawn(browser, move |outcome| {
            counter.fetch_add(1, Ordering::Relaxed);
            let _ = tx.send(outcome);
        });

    (rx.await.unwrap(), callbacks)
}

#[tokio::test(start_paused = true)]
async fn test_normal_flow_runs_all_tasks_in_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let errors = Arc::new(Mutex::new(Vec::new()));

    let tasks: Vec<Arc<dyn FlowTask>> = vec![
        Probe::new("t0", &log, &errors),
        Probe::new("t1", &log, &errors),
        Probe::new("t2", &log, &errors),
    ];

    let (outcome, callbacks) = run_flow(tasks, quick_options()).await;

    assert!(outcome.completed);
    assert!(!outcome.timed_out && !outcome.cancelled && !outcome.failed);
    assert_eq!(outcome.position, 2);
    assert_eq!(*log.lock().unwrap(), vec!["t0", "t1", "t2"]);
    assert!(errors.lock().unwrap().is_empty(), "no exception expected");
    assert_eq!(callbacks.load(Ordering::Relaxed), 1);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_fires_watchdog_and_halts() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let errors = Arc::new(Mutex::new(Vec::new()));
    let saw_stop = Arc::new(AtomicBool::new(false));

    let tasks: Vec<Arc<dyn FlowTask>> = vec![
        Arc::new(Stuck {
            errors: Arc::clone(&errors),
            saw_stop_request: Arc::clone(&saw_stop),
        }),
        Probe::new("never", &log, &errors),
    ];

    let options = FlowOptions {
        pacing: Duration::from_secs(1),
        task_timeout: Duration::from_secs(1),
    };

    let started = tokio::time::Instant::now();
    let (outcome, callbacks) = run_flow(tasks, options).await;
    let elapsed = started.elapsed();

    assert!(outcome.timed_out);
    assert!(!outcome.completed);
    assert_eq!(outcome.position, 0);
    assert_eq!(callbacks.load(Ordering::Relaxed), 1);

    // The watchdog window is the timeout plus at most one poll tick.
    assert!(elapsed >= Duration::from_secs(1), "fired early: {:?}", elapsed);
    assert!(
        elapsed < Duration::from_millis(1400),
        "fired late: {:?}",
        elapsed
    );

    let received = errors.lock().unwrap();
    assert_eq!(received.len(), 1);
    assert!(received[0].is_timeout(), "expected timeout, got {}", received[0]);

    // The task after the stuck one never starts.
    assert!(log.lock().unwrap().is_empty());

    // The abandoned worker eventually notices the stop request.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(saw_stop.load(Ordering::Relaxed));
}

#[tokio::test(start_paused = true)]
async fn test_failing_task_funnels_error_and_halts() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let errors = Arc::new(Mutex::new(Vec::new()));

    let tasks: Vec<Arc<dyn FlowTask>> = vec![
        Probe::new("t0", &log, &errors),
        Arc::new(Failing {
            errors: Arc::clone(&errors),
        }),
        Probe::new("t2", &log, &errors),
    ];

    let (outcome, callbacks) = run_flow(tasks, quick_options()).await;

    assert!(outcome.failed);
    assert!(!outcome.completed && !outcome.timed_out);
    assert_eq!(outcome.position, 1);
    assert_eq!(callbacks.load(Ordering::Relaxed), 1);

    assert_eq!(*log.lock().unwrap(), vec!["t0"]);
    let received = errors.lock().unwrap();
    assert_eq!(received.len(), 1);
    assert!(matches!(received[0], Error::Navigation(_)));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_before_next_task() {
    let (_engine, browser) = sample_browser().await;
    let log = Arc::new(Mutex::new(Vec::new()));
    let errors = Arc::new(Mutex::new(Vec::new()));
    let started = Arc::new(Notify::new());

    let tasks: Vec<Arc<dyn FlowTask>> = vec![
        Probe::new("t0", &log, &errors),
        Arc::new(Slow {
            started: Arc::clone(&started),
            log: Arc::clone(&log),
        }),
        Probe::new("t2", &log, &errors),
    ];

    let (tx, rx) = tokio::sync::oneshot::channel();
    let handle = Flow::new(tasks)
        .with_options(quick_options())
        .spawn(browser, move |outcome| {
            let _ = tx.send(outcome);
        });

    // Cancel while the second task is still running.
    started.notified().await;
    handle.cancel();
    assert!(handle.is_cancelled());

    let outcome = rx.await.unwrap();
    assert!(outcome.cancelled);
    assert!(!outcome.completed);
    assert_eq!(*log.lock().unwrap(), vec!["t0", "slow"]);
    assert!(errors.lock().unwrap().is_empty(), "cancellation is not an error");
}

#[tokio::test(start_paused = true)]
async fn test_pacing_delays_watchdog_not_worker() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let errors = Arc::new(Mutex::new(Vec::new()));

    let tasks: Vec<Arc<dyn FlowTask>> = vec![Probe::new("t0", &log, &errors)];

    let options = FlowOptions {
        pacing: Duration::from_secs(1),
        task_timeout: Duration::from_secs(10),
    };

    let started = tokio::time::Instant::now();
    let (outcome, _) = run_flow(tasks, options).await;

    // The worker itself ran immediately; the driver just waited out its
    // pacing interval before confirming completion.
    assert!(outcome.completed);
    assert!(started.elapsed() >= Duration::from_secs(1));
}
