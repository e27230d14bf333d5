use thiserror::Error;
use veritas_rag::RagError;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} returned {status}: {message}")]
    Status {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("Failed to decode {service} response: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },

    #[error("{0} returned no content")]
    EmptyResponse(&'static str),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

impl LlmError {
    pub fn decode(service: &'static str, message: impl ToString) -> Self {
        Self::Decode {
            service,
            message: message.to_string(),
        }
    }

    pub fn into_model(self) -> RagError {
        RagError::Model(self.to_string())
    }

    pub fn into_retrieval(self) -> RagError {
        RagError::Retrieval(self.to_string())
    }

    pub fn into_web_search(self) -> RagError {
        RagError::WebSearch(self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;
