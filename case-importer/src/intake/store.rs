//! Persistence boundary for staged batches

use async_trait::async_trait;

use super::types::Batch;

/// Rejection reported by a [`CaseRepository`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceError {
    /// 0-indexed source row of the record that failed, when known
    pub row: Option<u32>,
    pub message: String,
}

impl std::fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.row {
            Some(row) => write!(f, "row {}: {}", row + 1, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for PersistenceError {}

/// Durable store for cases
///
/// `save_batch` is all-or-nothing: either every record is committed and a
/// case id is returned for each (in batch order), or nothing is.
#[async_trait]
pub trait CaseRepository: Send + Sync {
    async fn save_batch(&self, batch: &Batch) -> Result<Vec<String>, PersistenceError>;
}
