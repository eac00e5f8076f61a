use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use uuid::Uuid;

/// Identity reported by the identity provider at sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub uid: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

struct Session {
    identity: UserIdentity,
    last_seen: Instant,
}

/// Active sessions keyed by their opaque token.
///
/// A session expires once it has been idle for longer than the configured
/// time-to-live; every successful [`SessionRegistry::resolve`] refreshes it.
pub struct SessionRegistry {
    sessions: DashMap<String, Session>,
    ttl: Duration,
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    /// Register `identity` and hand back a fresh token for it.
    pub fn open(&self, identity: UserIdentity) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.sessions.insert(
            token.clone(),
            Session {
                identity,
                last_seen: Instant::now(),
            },
        );
        token
    }

    /// Revoke `token`, returning the identity it belonged to.
    pub fn close(&self, token: &str) -> Option<UserIdentity> {
        self.sessions
            .remove(token)
            .map(|(_, session)| session.identity)
    }

    pub fn resolve(&self, token: &str) -> Option<UserIdentity> {
        let now = Instant::now();
        // Must not hold a shard guard from `get_mut` while removing.
        self.sessions
            .remove_if(token, |_, session| self.is_expired(session, now));

        let mut session = self.sessions.get_mut(token)?;
        session.last_seen = now;
        Some(session.identity.clone())
    }

    /// Drop idle sessions, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| !self.is_expired(session, now));
        before.saturating_sub(self.sessions.len())
    }

    fn is_expired(&self, session: &Session, now: Instant) -> bool {
        now.duration_since(session.last_seen) > self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    fn identity(uid: &str) -> UserIdentity {
        UserIdentity {
            uid: uid.into(),
            display_name: None,
            photo_url: None,
        }
    }

    #[test]
    fn tokens_resolve_until_closed() {
        let registry = SessionRegistry::new(TTL);
        let token = registry.open(identity("alice"));
        assert_eq!(registry.resolve(&token).map(|i| i.uid), Some("alice".into()));

        assert!(registry.close(&token).is_some());
        assert!(registry.resolve(&token).is_none());
        assert!(registry.close(&token).is_none());
    }

    #[test]
    fn each_sign_in_gets_its_own_token() {
        let registry = SessionRegistry::new(TTL);
        let first = registry.open(identity("alice"));
        let second = registry.open(identity("alice"));
        assert_ne!(first, second);
        assert!(registry.resolve(&first).is_some());
        assert!(registry.resolve(&second).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn activity_keeps_a_session_alive_and_idleness_ends_it() {
        let registry = SessionRegistry::new(TTL);
        let token = registry.open(identity("alice"));

        tokio::time::advance(Duration::from_secs(50)).await;
        assert!(registry.resolve(&token).is_some());
        tokio::time::advance(Duration::from_secs(50)).await;
        assert!(registry.resolve(&token).is_some());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(registry.resolve(&token).is_none());
        // The expired entry is gone, not just hidden.
        assert!(registry.close(&token).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn purge_removes_only_idle_sessions() {
        let registry = SessionRegistry::new(TTL);
        let idle = registry.open(identity("idle"));
        tokio::time::advance(Duration::from_secs(40)).await;
        let fresh = registry.open(identity("fresh"));
        tokio::time::advance(Duration::from_secs(30)).await;

        assert_eq!(registry.purge_expired(), 1);
        assert!(registry.resolve(&idle).is_none());
        assert!(registry.resolve(&fresh).is_some());
        assert_eq!(registry.purge_expired(), 0);
    }
}
