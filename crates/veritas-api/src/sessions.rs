//! Expiring per-user session tokens.
//!
//! The admin token issues a session for a user id; chat requests carry the
//! session token and are answered on behalf of that user. Expired entries
//! stop resolving immediately and are purged by the cleanup task.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::generate_token;

/// An issued session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub token: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// In-memory session table keyed by token.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Session>>,
    ttl: chrono::Duration,
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Issue a fresh session for `user_id`.
    pub fn issue(&self, user_id: &str) -> Session {
        self.issue_at(user_id, Utc::now())
    }

    pub fn issue_at(&self, user_id: &str, now: DateTime<Utc>) -> Session {
        let session = Session {
            token: generate_token(),
            user_id: user_id.to_string(),
            created_at: now,
            expires_at: now.checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        };
        self.lock().insert(session.token.clone(), session.clone());
        tracing::debug!(user_id, expires_at = %session.expires_at, "Session issued");
        session
    }

    /// User id behind a live token.
    pub fn resolve(&self, token: &str) -> Option<String> {
        self.resolve_at(token, Utc::now())
    }

    pub fn resolve_at(&self, token: &str, now: DateTime<Utc>) -> Option<String> {
        self.lock()
            .get(token)
            .filter(|s| !s.is_expired_at(now))
            .map(|s| s.user_id.clone())
    }

    pub fn revoke(&self, token: &str) -> bool {
        self.lock().remove(token).is_some()
    }

    /// Drop every expired session. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    pub fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired_at(now));
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_resolve() {
        let registry = SessionRegistry::new(Duration::from_secs(60));
        let session = registry.issue("alice");
        assert_eq!(session.token.len(), 32);
        assert_eq!(registry.resolve(&session.token).as_deref(), Some("alice"));
        assert_eq!(registry.resolve("unknown"), None);
    }

    #[test]
    fn test_expired_session_does_not_resolve() {
        let registry = SessionRegistry::new(Duration::from_secs(60));
        let now = Utc::now();
        let session = registry.issue_at("bob", now);
        let later = now + chrono::Duration::seconds(61);
        assert_eq!(registry.resolve_at(&session.token, later), None);
        // Still stored until purged.
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_purge_removes_only_expired() {
        let registry = SessionRegistry::new(Duration::from_secs(60));
        let now = Utc::now();
        registry.issue_at("old", now - chrono::Duration::seconds(120));
        let fresh = registry.issue_at("new", now);

        assert_eq!(registry.purge_expired_at(now), 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.resolve_at(&fresh.token, now).as_deref(), Some("new"));
    }

    #[test]
    fn test_revoke() {
        let registry = SessionRegistry::new(Duration::from_secs(60));
        let session = registry.issue("carol");
        assert!(registry.revoke(&session.token));
        assert!(!registry.revoke(&session.token));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_zero_ttl_expires_immediately() {
        let registry = SessionRegistry::new(Duration::ZERO);
        let session = registry.issue("dave");
        assert_eq!(registry.resolve(&session.token), None);
    }
}
