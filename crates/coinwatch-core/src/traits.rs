use std::future::Future;

use crate::error::AppError;
use crate::models::RecordList;

/// Fetches the raw document body from a URL.
pub trait Fetcher: Send + Sync + Clone + 'static {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Turns a raw document into listing records.
///
/// Implementations are CPU-bound and must be deterministic: the same
/// document always yields the same records in the same order.
pub trait Extractor: Send + Sync + Clone + 'static {
    fn extract(&self, document: &str) -> Result<RecordList, AppError>;
}
