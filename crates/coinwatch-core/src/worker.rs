use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::{OverlapPolicy, WatchConfig};
use crate::delivery::{Delivery, OutcomeSender};
use crate::error::{AppError, FailureStage};
use crate::models::CycleOutcome;
use crate::scrape::ScrapeService;
use crate::traits::{Extractor, Fetcher};

/// Events emitted by the watcher for monitoring/logging.
#[derive(Debug, Clone)]
pub enum WatcherEvent<'a> {
    Started {
        worker_id: &'a str,
        url: &'a str,
        interval: Duration,
    },
    Triggered {
        cycle: u64,
    },
    TriggerSkipped {
        cycle: u64,
    },
    CycleCompleted {
        cycle: u64,
        records: usize,
    },
    CycleFailed {
        cycle: u64,
        stage: FailureStage,
        error: &'a str,
    },
    ConsumerGone {
        cycle: u64,
    },
    ShuttingDown {
        worker_id: &'a str,
        in_flight: usize,
    },
    Stopped {
        worker_id: &'a str,
    },
}

/// Trait for receiving watcher events (decoupled logging).
pub trait WorkerReporter: Send + Sync {
    fn report(&self, event: WatcherEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingWorkerReporter;

impl WorkerReporter for TracingWorkerReporter {
    fn report(&self, event: WatcherEvent<'_>) {
        match event {
            WatcherEvent::Started {
                worker_id,
                url,
                interval,
            } => {
                tracing::info!(
                    %worker_id,
                    %url,
                    interval_ms = interval.as_millis() as u64,
                    "Watcher started"
                );
            }
            WatcherEvent::Triggered { cycle } => {
                tracing::debug!(%cycle, "Cycle triggered");
            }
            WatcherEvent::TriggerSkipped { cycle } => {
                tracing::debug!(%cycle, "Previous cycle still running, trigger skipped");
            }
            WatcherEvent::CycleCompleted { cycle, records } => {
                tracing::info!(%cycle, %records, "Cycle completed");
            }
            WatcherEvent::CycleFailed {
                cycle,
                stage,
                error,
            } => {
                tracing::warn!(%cycle, %stage, %error, "Cycle failed");
            }
            WatcherEvent::ConsumerGone { cycle } => {
                tracing::debug!(%cycle, "Outcome discarded, no consumer");
            }
            WatcherEvent::ShuttingDown {
                worker_id,
                in_flight,
            } => {
                tracing::info!(%worker_id, %in_flight, "Watcher shutting down");
            }
            WatcherEvent::Stopped { worker_id } => {
                tracing::info!(%worker_id, "Watcher stopped");
            }
        }
    }
}

/// Observable lifecycle state of a running watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Idle,
    Running,
    Stopped,
}

#[derive(Debug, Default)]
struct Activity {
    triggered: AtomicU64,
    in_flight: AtomicUsize,
}

/// Decrements the in-flight count when a cycle task ends, even on panic.
struct InFlight(Arc<Activity>);

impl InFlight {
    fn enter(activity: &Arc<Activity>) -> Self {
        activity.in_flight.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(activity))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Periodically scrapes one URL and hands every outcome to a consumer.
///
/// The first cycle fires as soon as the watcher starts; later cycles fire
/// every `interval` measured from the previous trigger, regardless of
/// whether earlier cycles have finished (see [`OverlapPolicy`]).
pub struct Watcher<F, E>
where
    F: Fetcher,
    E: Extractor,
{
    service: ScrapeService<F, E>,
    config: WatchConfig,
    activity: Arc<Activity>,
}

impl<F, E> Watcher<F, E>
where
    F: Fetcher,
    E: Extractor,
{
    /// Build a watcher. Fails with [`AppError::ConfigError`] on a zero interval.
    ///
    /// The URL is not checked here: a malformed URL fails each cycle at the
    /// fetch stage instead.
    pub fn new(fetcher: F, extractor: E, config: WatchConfig) -> Result<Self, AppError> {
        config.validate_interval()?;
        Ok(Self {
            service: ScrapeService::new(fetcher, extractor),
            config,
            activity: Arc::new(Activity::default()),
        })
    }

    /// Run a single cycle inline and return its outcome.
    pub async fn run_once(&self) -> CycleOutcome {
        CycleOutcome::from_result(self.service.scrape(&self.config.url).await)
    }

    /// Start the watcher on a background task, logging through `tracing`.
    pub fn spawn(self, sender: OutcomeSender) -> WatcherHandle {
        self.spawn_with_reporter(sender, Arc::new(TracingWorkerReporter))
    }

    pub fn spawn_with_reporter<WR>(self, sender: OutcomeSender, reporter: Arc<WR>) -> WatcherHandle
    where
        WR: WorkerReporter + 'static,
    {
        let cancel = CancellationToken::new();
        let activity = Arc::clone(&self.activity);
        let worker_id = self.config.worker_id.clone();
        let token = cancel.clone();
        let task = tokio::spawn(async move { self.run(token, sender, reporter).await });

        WatcherHandle {
            cancel,
            task: Some(task),
            activity,
            worker_id,
        }
    }

    /// Run the trigger loop until cancellation, then wait for in-flight cycles.
    pub async fn run<WR>(
        &self,
        cancel_token: CancellationToken,
        sender: OutcomeSender,
        reporter: Arc<WR>,
    ) where
        WR: WorkerReporter + 'static,
    {
        reporter.report(WatcherEvent::Started {
            worker_id: &self.config.worker_id,
            url: &self.config.url,
            interval: self.config.interval,
        });

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut cycles = JoinSet::new();

        loop {
            tokio::select! {
                biased;
                () = cancel_token.cancelled() => break,
                _ = ticker.tick() => {
                    let cycle = self.activity.triggered.fetch_add(1, Ordering::SeqCst) + 1;

                    if self.config.overlap == OverlapPolicy::Skip
                        && self.activity.in_flight.load(Ordering::SeqCst) > 0
                    {
                        reporter.report(WatcherEvent::TriggerSkipped { cycle });
                        continue;
                    }

                    reporter.report(WatcherEvent::Triggered { cycle });
                    let guard = InFlight::enter(&self.activity);
                    cycles.spawn(run_cycle(
                        self.service.clone(),
                        self.config.url.clone(),
                        cycle,
                        sender.clone(),
                        Arc::clone(&reporter),
                        guard,
                    ));
                }
                Some(joined) = cycles.join_next(), if !cycles.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!(error = %e, "Cycle task aborted");
                    }
                }
            }
        }

        reporter.report(WatcherEvent::ShuttingDown {
            worker_id: &self.config.worker_id,
            in_flight: cycles.len(),
        });

        while let Some(joined) = cycles.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Cycle task aborted");
            }
        }

        reporter.report(WatcherEvent::Stopped {
            worker_id: &self.config.worker_id,
        });
    }
}

async fn run_cycle<F, E, WR>(
    service: ScrapeService<F, E>,
    url: String,
    cycle: u64,
    sender: OutcomeSender,
    reporter: Arc<WR>,
    _guard: InFlight,
) where
    F: Fetcher,
    E: Extractor,
    WR: WorkerReporter,
{
    let outcome = CycleOutcome::from_result(service.scrape(&url).await);

    match &outcome {
        CycleOutcome::Data(records) => reporter.report(WatcherEvent::CycleCompleted {
            cycle,
            records: records.len(),
        }),
        CycleOutcome::Failed { stage, message } => reporter.report(WatcherEvent::CycleFailed {
            cycle,
            stage: *stage,
            error: message,
        }),
    }

    let delivered = sender.deliver(Delivery {
        cycle,
        completed_at: Utc::now(),
        outcome,
    });
    if !delivered {
        reporter.report(WatcherEvent::ConsumerGone { cycle });
    }
}

/// Handle to a spawned watcher.
///
/// Dropping the handle cancels future triggers without waiting; call
/// [`stop`](Self::stop) to also join in-flight cycles.
pub struct WatcherHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    activity: Arc<Activity>,
    worker_id: String,
}

impl WatcherHandle {
    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn state(&self) -> WatcherState {
        if self.cancel.is_cancelled() {
            WatcherState::Stopped
        } else if self.activity.in_flight.load(Ordering::SeqCst) > 0 {
            WatcherState::Running
        } else {
            WatcherState::Idle
        }
    }

    /// Number of triggers fired so far, including skipped ones.
    pub fn cycles_triggered(&self) -> u64 {
        self.activity.triggered.load(Ordering::SeqCst)
    }

    pub fn cycles_in_flight(&self) -> usize {
        self.activity.in_flight.load(Ordering::SeqCst)
    }

    /// Cancel future triggers and wait for in-flight cycles to deliver.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!(worker_id = %self.worker_id, error = %e, "Watcher task aborted");
            }
        }
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
