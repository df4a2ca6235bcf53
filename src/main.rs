//! Drover demo binary
//!
//! Resolves an engine through the registry from environment configuration,
//! then runs a two-step flow against it: load a URL, report the page
//! title. Intended as a smoke harness, not a product surface.
//!
//! Environment variables:
//! - `DROVER_ENGINE`: "headless" or "remote"
//! - `DROVER_ENDPOINT`: attach to a running engine instead of launching
//! - `DROVER_DRIVER_DIR` / `DROVER_DRIVER_PATH`: vendor driver location
//! - `RUST_LOG`: log filtering

use anyhow::Context;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use drover::config::Config;
use drover::{
    Browser, Engine, EngineRegistry, Error, Flow, FlowOptions, FlowTask, LaunchSpec, TaskContext,
};

struct LoadPage {
    url: String,
}

#[async_trait]
impl FlowTask for LoadPage {
    async fn execute(&self, browser: Arc<Browser>, _ctx: TaskContext) -> drover::Result<()> {
        browser.load(&self.url).await;
        Ok(())
    }

    async fn handle_exception(&self, error: Error) {
        error!("Loading {} failed: {}", self.url, error);
    }
}

struct ReportTitle;

#[async_trait]
impl FlowTask for ReportTitle {
    async fn execute(&self, browser: Arc<Browser>, _ctx: TaskContext) -> drover::Result<()> {
        let title = browser.title().await.unwrap_or_default();
        let url = browser.current_url().await.unwrap_or_default();
        info!("{} :: {}", url, title);
        Ok(())
    }

    async fn handle_exception(&self, error: Error) {
        error!("Title report failed: {}", error);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing - respect RUST_LOG environment variable
    let log_level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|v| v.parse::<Level>().ok())
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    info!("Drover v{}", drover::VERSION);

    let config = Config::from_env().context("loading configuration")?;
    info!("Configuration loaded: engine={}", config.engine);

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://example.com".to_string());

    let mut spec = LaunchSpec::new().headless(config.headless);
    if let Some(endpoint) = config.endpoint.clone() {
        spec = spec.endpoint(endpoint);
    }
    if let Some(dir) = config.driver_dir.clone() {
        spec = spec.driver_dir(dir);
    }
    if let Some(path) = config.driver_path.clone() {
        spec = spec.driver_path(path);
    }

    let registry = EngineRegistry::with_builtins();
    let engine: Arc<dyn Engine> = registry
        .launch(&config.engine, spec)
        .await
        .context("launching engine")?;

    let browser = Arc::new(Browser::new(engine).await);
    info!("Browser session {} ready", browser.id());

    let tasks: Vec<Arc<dyn FlowTask>> = vec![
        Arc::new(LoadPage { url }),
        Arc::new(ReportTitle),
    ];

    let options = FlowOptions {
        pacing: Duration::from_millis(config.flow_pacing_ms),
        task_timeout: Duration::from_secs(config.task_timeout_secs),
    };

    let (tx, rx) = tokio::sync::oneshot::channel();
    Flow::new(tasks)
        .with_options(options)
        .spawn(Arc::clone(&browser), move |outcome| {
            let _ = tx.send(outcome);
        });

    let outcome = rx.await.context("awaiting flow completion")?;
    if !outcome.completed {
        error!(
            "Flow halted at task {}: timed_out={} failed={}",
            outcome.position, outcome.timed_out, outcome.failed
        );
    }

    browser.close().await;
    info!("Session closed");
    Ok(())
}
