//! Event relay: fans server events out to live gateway connections.
//!
//! The relay is an explicit publish operation over a broadcast bus. Every
//! gateway connection subscribes once and filters the stream down to the
//! envelopes addressed to it, so relay logic stays a pure function of
//! (event, audience) rather than iteration over sockets.
//!
//! All pushes are fire-and-forget: nothing is acknowledged, retried, or
//! queued. A targeted push for an offline user is dropped silently (the
//! recipient reconciles via the HTTP API after reconnecting), and a lagging
//! subscriber loses the oldest envelopes first.

use parley_shared::protocol::ServerEvent;
use parley_shared::types::{ConnectionId, UserId};
use tokio::sync::broadcast;
use tracing::debug;

use crate::presence::PresenceRegistry;

/// Buffered envelopes per subscriber before the oldest are dropped.
const BUS_CAPACITY: usize = 256;

/// Who an envelope is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// Every live connection, registered or not.
    All,
    /// Exactly one connection, resolved through the presence registry at
    /// publish time so a superseded connection never receives it.
    One {
        user_id: UserId,
        connection_id: ConnectionId,
    },
}

/// A published event together with its audience.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub audience: Audience,
    pub event: ServerEvent,
}

impl Envelope {
    /// Whether a given connection should deliver this envelope.
    pub fn is_addressed_to(&self, connection_id: ConnectionId) -> bool {
        match &self.audience {
            Audience::All => true,
            Audience::One {
                connection_id: target,
                ..
            } => *target == connection_id,
        }
    }
}

pub struct EventRelay {
    bus: broadcast::Sender<Envelope>,
}

impl EventRelay {
    pub fn new() -> Self {
        let (bus, _) = broadcast::channel(BUS_CAPACITY);
        Self { bus }
    }

    /// Subscribe a gateway connection to the envelope stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.bus.subscribe()
    }

    /// Publish an envelope. A send error only means no connection is
    /// currently subscribed, which is not a failure for fire-and-forget
    /// delivery.
    pub fn publish(&self, audience: Audience, event: ServerEvent) {
        let _ = self.bus.send(Envelope { audience, event });
    }

    /// Push an event to a single user's live connection, if one exists.
    ///
    /// Returns `true` when an envelope was published. An offline peer is not
    /// an error: the initiating action already succeeded and was persisted.
    pub async fn push_to_user(
        &self,
        registry: &PresenceRegistry,
        user_id: &UserId,
        event: ServerEvent,
    ) -> bool {
        match registry.lookup(user_id).await {
            Some(connection_id) => {
                self.publish(
                    Audience::One {
                        user_id: user_id.clone(),
                        connection_id,
                    },
                    event,
                );
                true
            }
            None => {
                debug!(user = %user_id, "peer offline, dropping push");
                false
            }
        }
    }

    /// Broadcast an event to every live connection.
    pub fn broadcast(&self, event: ServerEvent) {
        self.publish(Audience::All, event);
    }
}

impl Default for EventRelay {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_shared::protocol::OnlineUsersPayload;

    fn online_event(ids: &[&str]) -> ServerEvent {
        ServerEvent::OnlineUsersChanged(OnlineUsersPayload {
            ids: ids.iter().map(|id| UserId::new(*id)).collect(),
        })
    }

    #[tokio::test]
    async fn broadcast_reaches_every_subscriber() {
        let relay = EventRelay::new();
        let mut rx1 = relay.subscribe();
        let mut rx2 = relay.subscribe();

        relay.broadcast(online_event(&["a1"]));

        for rx in [&mut rx1, &mut rx2] {
            let envelope = rx.recv().await.unwrap();
            assert_eq!(envelope.audience, Audience::All);
            assert!(envelope.is_addressed_to(ConnectionId::new()));
        }
    }

    #[tokio::test]
    async fn targeted_push_resolves_the_current_connection() {
        let relay = EventRelay::new();
        let registry = PresenceRegistry::new();
        let user = UserId::new("b1");
        let conn = ConnectionId::new();
        registry.register(user.clone(), conn).await;

        let mut rx = relay.subscribe();
        let pushed = relay
            .push_to_user(&registry, &user, online_event(&[]))
            .await;
        assert!(pushed);

        let envelope = rx.recv().await.unwrap();
        assert!(envelope.is_addressed_to(conn));
        assert!(!envelope.is_addressed_to(ConnectionId::new()));
    }

    #[tokio::test]
    async fn push_to_offline_user_publishes_nothing() {
        let relay = EventRelay::new();
        let registry = PresenceRegistry::new();
        let mut rx = relay.subscribe();

        let pushed = relay
            .push_to_user(&registry, &UserId::new("ghost"), online_event(&[]))
            .await;
        assert!(!pushed);
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn publish_without_subscribers_does_not_panic() {
        let relay = EventRelay::new();
        relay.broadcast(online_event(&["a1"]));
    }
}
