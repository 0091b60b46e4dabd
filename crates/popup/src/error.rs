use smartnotes_capability::CapabilityError;
use smartnotes_storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum PopupError {
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Nothing to save: run an action first")]
    NothingToSave,

    #[error("Failed to create data directory: {0}")]
    DataDir(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PopupError>;
