use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::process::{ProcessConfig, ProcessMetrics, ProcessStatus};
use crate::tracker::ApiCallTracker;

/// One scheduled cycle. Resolves to the number of API calls the cycle
/// actually made, which feeds the process's sliding budget.
pub type TaskFuture = Pin<Box<dyn Future<Output = Result<u32>> + Send>>;

type TaskFn = Arc<dyn Fn() -> TaskFuture + Send + Sync>;

struct Registration {
    config: ProcessConfig,
    task: TaskFn,
    metrics: Arc<Mutex<ProcessMetrics>>,
    tracker: Arc<Mutex<ApiCallTracker>>,
    running: Arc<AtomicBool>,
}

/// Runs registered processes on independent cadences, each with its own
/// per-minute API-call budget and per-cycle timeout.
///
/// A failing or overrunning cycle only affects its own process; the next
/// cycle starts `interval` after the previous one started, less the time
/// the cycle itself consumed.
pub struct ProcessScheduler {
    registrations: Vec<Registration>,
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl Default for ProcessScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessScheduler {
    #[must_use]
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self { registrations: Vec::new(), shutdown_tx, handles: Vec::new() }
    }

    /// Registers a process. Has no effect on already-started processes;
    /// call before `start_all`.
    pub fn register<F, Fut>(&mut self, config: ProcessConfig, task: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<u32>> + Send + 'static,
    {
        let task: TaskFn = Arc::new(move || Box::pin(task()) as TaskFuture);
        self.registrations.push(Registration {
            config,
            task,
            metrics: Arc::new(Mutex::new(ProcessMetrics::default())),
            tracker: Arc::new(Mutex::new(ApiCallTracker::new())),
            running: Arc::new(AtomicBool::new(false)),
        });
    }

    /// Spawns one loop per enabled process.
    pub fn start_all(&mut self) {
        for registration in &self.registrations {
            if !registration.config.enabled {
                tracing::info!(process = %registration.config.name, "Process disabled, not starting");
                continue;
            }
            let config = registration.config.clone();
            let task = Arc::clone(&registration.task);
            let metrics = Arc::clone(&registration.metrics);
            let tracker = Arc::clone(&registration.tracker);
            let running = Arc::clone(&registration.running);
            let shutdown_rx = self.shutdown_tx.subscribe();
            self.handles.push(tokio::spawn(run_loop(
                config,
                task,
                metrics,
                tracker,
                running,
                shutdown_rx,
            )));
        }
    }

    /// Snapshot of every registered process.
    pub async fn status(&self) -> Vec<ProcessStatus> {
        let now = Instant::now();
        let mut statuses = Vec::with_capacity(self.registrations.len());
        for registration in &self.registrations {
            statuses.push(ProcessStatus {
                name: registration.config.name.clone(),
                enabled: registration.config.enabled,
                running: registration.running.load(Ordering::SeqCst),
                priority: registration.config.priority,
                api_calls_last_minute: registration.tracker.lock().await.used_in_window(now),
                metrics: registration.metrics.lock().await.clone(),
            });
        }
        statuses
    }

    /// Signals every loop to stop and waits for them to finish. In-flight
    /// cycles run to completion first.
    pub async fn shutdown(&mut self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Process task panicked");
            }
        }
        tracing::info!("Scheduler stopped");
    }
}

async fn run_loop(
    config: ProcessConfig,
    task: TaskFn,
    metrics: Arc<Mutex<ProcessMetrics>>,
    tracker: Arc<Mutex<ApiCallTracker>>,
    running: Arc<AtomicBool>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    running.store(true, Ordering::SeqCst);
    tracing::info!(process = %config.name, interval = ?config.interval, "Process started");

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let now = Instant::now();
        let over_budget = tracker.lock().await.would_exceed(
            now,
            config.estimated_api_cost,
            config.max_api_calls_per_minute,
        );
        if over_budget {
            tracing::debug!(
                process = %config.name,
                budget = config.max_api_calls_per_minute,
                "API budget exhausted, skipping cycle"
            );
            metrics.lock().await.skipped_budget_cycles += 1;
            if wait_or_shutdown(&mut shutdown_rx, config.interval).await {
                break;
            }
            continue;
        }

        let started = Instant::now();
        let outcome = tokio::time::timeout(config.timeout, (task)()).await;
        let duration = started.elapsed();

        match outcome {
            Ok(Ok(api_calls)) => {
                tracker.lock().await.record(started, api_calls);
                metrics.lock().await.record_success(started, duration);
            }
            Ok(Err(e)) => {
                tracker.lock().await.record(started, config.estimated_api_cost);
                tracing::error!(process = %config.name, error = %e, "Cycle failed");
                metrics
                    .lock()
                    .await
                    .record_failure(started, duration, e.to_string());
            }
            Err(_) => {
                tracker.lock().await.record(started, config.estimated_api_cost);
                tracing::error!(process = %config.name, timeout = ?config.timeout, "Cycle timed out");
                metrics.lock().await.record_failure(
                    started,
                    duration,
                    format!("timed out after {:?}", config.timeout),
                );
            }
        }

        if duration > config.interval {
            tracing::warn!(
                process = %config.name,
                ?duration,
                interval = ?config.interval,
                "Cycle overran its interval"
            );
        }

        let sleep_for = config.interval.saturating_sub(duration);
        if wait_or_shutdown(&mut shutdown_rx, sleep_for).await {
            break;
        }
    }

    running.store(false, Ordering::SeqCst);
    tracing::info!(process = %config.name, "Process stopped");
}

/// Sleeps for `duration`, returning early with `true` on shutdown.
async fn wait_or_shutdown(shutdown_rx: &mut watch::Receiver<bool>, duration: Duration) -> bool {
    tokio::select! {
        () = tokio::time::sleep(duration) => false,
        _ = shutdown_rx.changed() => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn budget_skips_cycles_instead_of_bursting() {
        let counter = Arc::new(AtomicU32::new(0));
        let mut scheduler = ProcessScheduler::new();

        let task_counter = Arc::clone(&counter);
        scheduler.register(
            ProcessConfig::new("budgeted", Duration::from_secs(1)).with_api_budget(3, 10),
            move || {
                let counter = Arc::clone(&task_counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(3)
                }
            },
        );

        scheduler.start_all();
        tokio::time::sleep(Duration::from_millis(5500)).await;
        scheduler.shutdown().await;

        // Three cycles consume 9 of 10 budgeted calls; the rest of the
        // minute is skipped.
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        let status = &scheduler.status().await[0];
        assert_eq!(status.metrics.total_runs, 3);
        assert!(status.metrics.skipped_budget_cycles >= 2);
        assert_eq!(status.api_calls_last_minute, 9);
        assert!(!status.running);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_process_keeps_cycling_and_never_blocks_others() {
        let healthy_runs = Arc::new(AtomicU32::new(0));
        let mut scheduler = ProcessScheduler::new();

        scheduler.register(
            ProcessConfig::new("flaky", Duration::from_secs(1)),
            || async { Err(anyhow!("store unavailable")) },
        );
        let task_runs = Arc::clone(&healthy_runs);
        scheduler.register(
            ProcessConfig::new("healthy", Duration::from_secs(1)),
            move || {
                let runs = Arc::clone(&task_runs);
                async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok(1)
                }
            },
        );

        scheduler.start_all();
        tokio::time::sleep(Duration::from_millis(3500)).await;
        scheduler.shutdown().await;

        let status = scheduler.status().await;
        let flaky = status.iter().find(|s| s.name == "flaky").unwrap();
        assert!(flaky.metrics.total_runs >= 3);
        assert_eq!(flaky.metrics.total_failures, flaky.metrics.total_runs);
        assert!(flaky.metrics.consecutive_failures >= 3);
        assert_eq!(
            flaky.metrics.last_error.as_deref(),
            Some("store unavailable")
        );
        assert!(healthy_runs.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn overrunning_cycle_is_cut_off_and_counted_as_failure() {
        let mut scheduler = ProcessScheduler::new();
        scheduler.register(
            ProcessConfig::new("slow", Duration::from_secs(1))
                .with_timeout(Duration::from_secs(1)),
            || async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(1)
            },
        );

        scheduler.start_all();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        scheduler.shutdown().await;

        let status = &scheduler.status().await[0];
        assert!(status.metrics.total_failures >= 1);
        assert!(status
            .metrics
            .last_error
            .as_deref()
            .unwrap()
            .contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_process_never_runs() {
        let counter = Arc::new(AtomicU32::new(0));
        let mut scheduler = ProcessScheduler::new();

        let mut config = ProcessConfig::new("disabled", Duration::from_secs(1));
        config.enabled = false;
        let task_counter = Arc::clone(&counter);
        scheduler.register(config, move || {
            let counter = Arc::clone(&task_counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(1)
            }
        });

        scheduler.start_all();
        tokio::time::sleep(Duration::from_secs(3)).await;
        scheduler.shutdown().await;

        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
