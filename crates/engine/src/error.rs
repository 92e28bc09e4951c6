use fieldstock_core::{Category, ValidationError};
use fieldstock_storage::StorageError;
use thiserror::Error;

/// Hard failures at the inventory boundary. Schema violations and duplicate
/// sites are not errors; they come back as outcomes.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("{0} records carry no quantity")]
    NotStock(Category),

    #[error("stored document does not match its schema: {0}")]
    CorruptDocument(#[from] ValidationError),
}
