use crate::error::AppError;
use crate::models::RecordList;
use crate::traits::{Extractor, Fetcher};

/// Runs one pass of the pipeline: fetch → extract.
///
/// Generic over the fetcher and extractor so the worker can be driven
/// without real HTTP in tests.
#[derive(Clone)]
pub struct ScrapeService<F, E>
where
    F: Fetcher,
    E: Extractor,
{
    fetcher: F,
    extractor: E,
}

impl<F, E> ScrapeService<F, E>
where
    F: Fetcher,
    E: Extractor,
{
    pub fn new(fetcher: F, extractor: E) -> Self {
        Self { fetcher, extractor }
    }

    /// Fetch `url` and extract its records.
    ///
    /// A fetch failure short-circuits before extraction runs.
    pub async fn scrape(&self, url: &str) -> Result<RecordList, AppError> {
        tracing::debug!("Fetching {}", url);
        let document = self.fetcher.fetch(url).await?;
        tracing::debug!("Fetched {} bytes", document.len());

        let records = self.extractor.extract(&document)?;
        tracing::debug!(records = records.len(), "Extraction complete");

        Ok(records)
    }
}
