use async_trait::async_trait;
use veritas_core::Turn;

use crate::error::Result;

/// Per-user conversation log.
///
/// A record holds the user's full ordered turn list and is replaced
/// wholesale on every save. Loading a user with no record yields an empty
/// list, never an error.
///
/// Concurrent saves for the same user are not serialised: the last writer
/// wins.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Load the ordered turn list for `user_id`.
    async fn load(&self, user_id: &str) -> Result<Vec<Turn>>;

    /// Overwrite the turn list for `user_id`.
    async fn save(&self, user_id: &str, turns: &[Turn]) -> Result<()>;
}
