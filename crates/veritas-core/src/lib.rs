//! Shared foundation for Veritas: configuration, the top-level error type,
//! and the domain types exchanged between the engine, storage, and API.

pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::VeritasConfig;
pub use error::{Result, VeritasError};
pub use events::{EventKind, StreamEvent};
pub use types::*;
