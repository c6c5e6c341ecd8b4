use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{AppError, FailureStage};

/// One listing row as it appears in the source document.
///
/// Fields are kept verbatim (currency symbols, separators, suffixes);
/// numeric interpretation is left to the consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub name: String,
    pub price: String,
    pub market_cap: String,
}

impl Record {
    pub fn new(
        name: impl Into<String>,
        price: impl Into<String>,
        market_cap: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            price: price.into(),
            market_cap: market_cap.into(),
        }
    }
}

/// Records in document scan order.
pub type RecordList = Vec<Record>;

/// Result of one scheduled cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Data(RecordList),
    Failed {
        stage: FailureStage,
        message: String,
    },
}

impl CycleOutcome {
    /// Fold a pipeline result into an outcome at the cycle boundary.
    pub fn from_result(result: Result<RecordList, AppError>) -> Self {
        match result {
            Ok(records) => CycleOutcome::Data(records),
            Err(e) => CycleOutcome::Failed {
                stage: e.stage(),
                message: format!("{} failed: {e}", e.stage()),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CycleOutcome::Data(_))
    }
}

/// Stable digest of a record list, for change detection on the consumer side.
pub fn fingerprint(records: &[Record]) -> String {
    let mut hasher = Sha256::new();
    for record in records {
        for field in [&record.name, &record.price, &record.market_cap] {
            hasher.update(field.as_bytes());
            hasher.update([0u8]);
        }
        hasher.update([0xffu8]);
    }
    format!("{:x}", hasher.finalize())
}
