//! In-memory presence registry.
//!
//! Maps a user identity to at most one live gateway connection. The registry
//! is process-local and non-persistent: after a restart every user appears
//! offline until their client reconnects.
//!
//! Concurrent registrations for the same user resolve last-write-wins; a
//! disconnect for a superseded connection must not clear the newer entry,
//! which is why [`PresenceRegistry::unregister`] takes the connection id and
//! only removes a matching mapping.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parley_shared::types::{ConnectionId, UserId};
use tokio::sync::RwLock;
use tracing::debug;

/// A live connection entry. Owned exclusively by the registry.
#[derive(Debug, Clone)]
pub struct ConnectionRecord {
    pub user_id: UserId,
    pub connection_id: ConnectionId,
    pub connected_at: DateTime<Utc>,
}

/// Single-owner registry of live connections, one entry per user.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    entries: RwLock<HashMap<UserId, ConnectionRecord>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or overwrite) the live connection for a user.
    pub async fn register(&self, user_id: UserId, connection_id: ConnectionId) {
        let record = ConnectionRecord {
            user_id: user_id.clone(),
            connection_id,
            connected_at: Utc::now(),
        };

        let previous = self.entries.write().await.insert(user_id.clone(), record);
        if let Some(previous) = previous {
            debug!(
                user = %user_id,
                superseded = %previous.connection_id,
                connection = %connection_id,
                "superseded existing connection"
            );
        } else {
            debug!(user = %user_id, connection = %connection_id, "user online");
        }
    }

    /// Remove the mapping owned by `connection_id`, if it is still current.
    ///
    /// Returns the freed user id, or `None` when the connection was stale
    /// (already superseded by a newer registration) or never registered.
    pub async fn unregister(&self, connection_id: ConnectionId) -> Option<UserId> {
        let mut entries = self.entries.write().await;

        let user_id = entries
            .iter()
            .find(|(_, record)| record.connection_id == connection_id)
            .map(|(_, record)| record.user_id.clone())?;

        let record = entries.remove(&user_id)?;
        debug!(
            user = %user_id,
            connection = %connection_id,
            connected_at = %record.connected_at,
            "user offline"
        );
        Some(user_id)
    }

    /// Connection currently serving a user, if any.
    pub async fn lookup(&self, user_id: &UserId) -> Option<ConnectionId> {
        self.entries
            .read()
            .await
            .get(user_id)
            .map(|record| record.connection_id)
    }

    /// Ids of all currently reachable users, sorted for stable output.
    pub async fn online_user_ids(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self.entries.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_and_lookup() {
        let registry = PresenceRegistry::new();
        let user = UserId::new("a1");
        let conn = ConnectionId::new();

        registry.register(user.clone(), conn).await;
        assert_eq!(registry.lookup(&user).await, Some(conn));
        assert_eq!(registry.online_user_ids().await, vec![user]);
    }

    #[tokio::test]
    async fn last_registration_wins() {
        let registry = PresenceRegistry::new();
        let user = UserId::new("a1");
        let c1 = ConnectionId::new();
        let c2 = ConnectionId::new();

        registry.register(user.clone(), c1).await;
        registry.register(user.clone(), c2).await;
        assert_eq!(registry.lookup(&user).await, Some(c2));

        // A disconnect for the superseded connection is a no-op.
        assert_eq!(registry.unregister(c1).await, None);
        assert_eq!(registry.lookup(&user).await, Some(c2));

        // The current connection's disconnect clears the mapping.
        assert_eq!(registry.unregister(c2).await, Some(user.clone()));
        assert_eq!(registry.lookup(&user).await, None);
    }

    #[tokio::test]
    async fn online_ids_are_sorted() {
        let registry = PresenceRegistry::new();
        registry.register(UserId::new("b1"), ConnectionId::new()).await;
        registry.register(UserId::new("a1"), ConnectionId::new()).await;

        assert_eq!(
            registry.online_user_ids().await,
            vec![UserId::new("a1"), UserId::new("b1")]
        );
    }

    #[tokio::test]
    async fn unregister_unknown_connection_is_a_noop() {
        let registry = PresenceRegistry::new();
        assert_eq!(registry.unregister(ConnectionId::new()).await, None);
    }
}
