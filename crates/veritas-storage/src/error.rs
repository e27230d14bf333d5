use veritas_core::VeritasError;

/// Errors raised by conversation store backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt conversation log {path}: {message}")]
    Corrupt { path: String, message: String },
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<StorageError> for VeritasError {
    fn from(err: StorageError) -> Self {
        VeritasError::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
