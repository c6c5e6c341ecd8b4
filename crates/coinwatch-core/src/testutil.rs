//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::delivery::Consumer;
use crate::error::AppError;
use crate::models::RecordList;
use crate::traits::{Extractor, Fetcher};
use crate::worker::{WatcherEvent, WorkerReporter};

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Mock fetcher that returns configurable responses.
#[derive(Clone)]
pub struct MockFetcher {
    /// Queue of responses. Each call pops the first element.
    /// Once empty, every call returns `fallback`.
    responses: Arc<Mutex<Vec<Result<String, AppError>>>>,
    fallback: String,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

impl MockFetcher {
    /// Fetcher that returns `html` on every call.
    pub fn new(html: &str) -> Self {
        Self::build(Vec::new(), html)
    }

    /// Fetcher whose first call fails with `error`.
    pub fn with_error(error: AppError) -> Self {
        Self::build(vec![Err(error)], "<html><body>default</body></html>")
    }

    pub fn with_responses(responses: Vec<Result<String, AppError>>) -> Self {
        Self::build(responses, "<html><body>default</body></html>")
    }

    /// Sleep for `delay` inside every fetch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn build(responses: Vec<Result<String, AppError>>, fallback: &str) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            fallback: fallback.to_string(),
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
            active: Arc::new(AtomicUsize::new(0)),
            max_active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of fetches started so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of fetches observed running at once.
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, _url: &str) -> Result<String, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let response = {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok(self.fallback.clone())
            } else {
                responses.remove(0)
            }
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        response
    }
}

// ---------------------------------------------------------------------------
// MockExtractor
// ---------------------------------------------------------------------------

/// Mock extractor that returns configurable records and remembers its input.
#[derive(Clone)]
pub struct MockExtractor {
    responses: Arc<Mutex<Vec<Result<RecordList, AppError>>>>,
    fallback: RecordList,
    pub documents: Arc<Mutex<Vec<String>>>,
}

impl MockExtractor {
    /// Extractor that returns `records` on every call.
    pub fn new(records: RecordList) -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            fallback: records,
            documents: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Extractor whose first call fails with `error`.
    pub fn with_error(error: AppError) -> Self {
        Self {
            responses: Arc::new(Mutex::new(vec![Err(error)])),
            fallback: Vec::new(),
            documents: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Extractor for MockExtractor {
    fn extract(&self, document: &str) -> Result<RecordList, AppError> {
        self.documents.lock().unwrap().push(document.to_string());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(self.fallback.clone())
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingConsumer
// ---------------------------------------------------------------------------

/// Consumer that records every callback as `(cycle, payload)`.
#[derive(Debug, Default)]
pub struct RecordingConsumer {
    pub data: Vec<(u64, RecordList)>,
    pub errors: Vec<(u64, String)>,
}

impl Consumer for RecordingConsumer {
    fn on_data(&mut self, cycle: u64, records: RecordList) {
        self.data.push((cycle, records));
    }

    fn on_error(&mut self, cycle: u64, message: &str) {
        self.errors.push((cycle, message.to_string()));
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Mock watcher reporter that records event labels.
#[derive(Default)]
pub struct MockReporter {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WorkerReporter for MockReporter {
    fn report(&self, event: WatcherEvent<'_>) {
        let label = match &event {
            WatcherEvent::Started { .. } => "Started",
            WatcherEvent::Triggered { .. } => "Triggered",
            WatcherEvent::TriggerSkipped { .. } => "TriggerSkipped",
            WatcherEvent::CycleCompleted { .. } => "CycleCompleted",
            WatcherEvent::CycleFailed { .. } => "CycleFailed",
            WatcherEvent::ConsumerGone { .. } => "ConsumerGone",
            WatcherEvent::ShuttingDown { .. } => "ShuttingDown",
            WatcherEvent::Stopped { .. } => "Stopped",
        };
        self.events.lock().unwrap().push(label.to_string());
    }
}
