pub mod config;
pub mod delivery;
pub mod error;
pub mod models;
pub mod scrape;
pub mod traits;
pub mod worker;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use config::{OverlapPolicy, PatternSet, WatchConfig};
pub use delivery::{Consumer, Delivery, OutcomeReceiver, OutcomeSender};
pub use error::{AppError, FailureStage};
pub use models::{CycleOutcome, Record, RecordList, fingerprint};
pub use traits::{Extractor, Fetcher};
pub use worker::{Watcher, WatcherHandle, WatcherState};
