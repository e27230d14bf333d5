//! HTTP surface for Veritas: ask questions, read history, manage sessions.

pub mod auth;
pub mod cleanup;
pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod sessions;
pub mod state;

pub use cleanup::CleanupTask;
pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use sessions::SessionRegistry;
pub use state::AppState;
