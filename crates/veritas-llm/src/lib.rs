//! HTTP adapters for the Veritas collaborators: an OpenAI-compatible chat
//! model, Tavily web search, and a remote document retriever.

pub mod error;
pub mod http;
pub mod openai;
pub mod retriever;
pub mod sse;
pub mod tavily;

pub use error::LlmError;
pub use openai::OpenAiChatModel;
pub use retriever::HttpRetriever;
pub use tavily::TavilySearch;
