use thiserror::Error;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed identifier or unrecognised status value.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Zero documents matched: the target is missing or not in the required status.
    #[error("No matching car: {0}")]
    NotMatched(String),

    #[error("Blob '{id}' not found")]
    BlobNotFound { id: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl InventoryError {
    /// True for failures of the backing stores, as opposed to caller or precondition errors.
    pub fn is_storage(&self) -> bool {
        matches!(self, InventoryError::Storage(_) | InventoryError::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, InventoryError>;
