use thiserror::Error;

/// Top-level error type for the Veritas system.
///
/// Subsystem crates define their own error enums and implement
/// `From<SubsystemError> for VeritasError` so that `?` works across crate
/// boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VeritasError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Web search error: {0}")]
    WebSearch(String),

    #[error("Orchestration error: {0}")]
    Orchestration(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },
}

impl From<toml::de::Error> for VeritasError {
    fn from(err: toml::de::Error) -> Self {
        VeritasError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for VeritasError {
    fn from(err: toml::ser::Error) -> Self {
        VeritasError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for VeritasError {
    fn from(err: serde_json::Error) -> Self {
        VeritasError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Veritas operations.
pub type Result<T> = std::result::Result<T, VeritasError>;
