//! Chat service: request lifecycle, message submission, and connection
//! bookkeeping.
//!
//! All transition guards run before anything is written; persistence is
//! awaited before the corresponding relay push is issued, so a delivered
//! event always describes durably committed state. A failed write aborts the
//! action with nothing committed and nothing relayed.

use std::sync::Arc;

use chrono::Utc;
use parley_shared::protocol::{ChatRequestEvent, MessagePayload, OnlineUsersPayload, ServerEvent};
use parley_shared::types::{
    AttachmentKind, ConnectionId, MessageId, PairStatus, RequestId, RequestStatus, UserId,
};
use parley_store::{ChatRequest, Database, Message, StoreError, User};
use tokio::sync::Mutex;
use tracing::info;

use crate::error::ServerError;
use crate::media::MediaHost;
use crate::presence::PresenceRegistry;
use crate::relay::EventRelay;

/// Raw attachment bytes as submitted by a client, before the media host
/// turns them into a durable URL.
pub struct AttachmentUpload {
    pub data: Vec<u8>,
    pub kind: AttachmentKind,
    pub name: Option<String>,
}

/// A message as submitted, before persistence.
pub struct MessageDraft {
    pub text: Option<String>,
    pub attachment: Option<AttachmentUpload>,
}

pub struct ChatService {
    store: Mutex<Database>,
    presence: PresenceRegistry,
    relay: EventRelay,
    media: Arc<dyn MediaHost>,
}

impl ChatService {
    pub fn new(store: Database, media: Arc<dyn MediaHost>) -> Self {
        Self {
            store: Mutex::new(store),
            presence: PresenceRegistry::new(),
            relay: EventRelay::new(),
            media,
        }
    }

    pub fn relay(&self) -> &EventRelay {
        &self.relay
    }

    // ------------------------------------------------------------------
    // Connection bookkeeping
    // ------------------------------------------------------------------

    /// Register a live connection for a user and broadcast the new online
    /// set to every connection.
    pub async fn register_connection(&self, user_id: UserId, connection_id: ConnectionId) {
        self.presence.register(user_id, connection_id).await;
        self.broadcast_online_users().await;
    }

    /// Drop a connection's registration. The online-set broadcast only fires
    /// when a mapping was actually removed; a stale disconnect racing a
    /// newer reconnect changes nothing.
    pub async fn unregister_connection(&self, connection_id: ConnectionId) {
        if self.presence.unregister(connection_id).await.is_some() {
            self.broadcast_online_users().await;
        }
    }

    async fn broadcast_online_users(&self) {
        let ids = self.presence.online_user_ids().await;
        self.relay
            .broadcast(ServerEvent::OnlineUsersChanged(OnlineUsersPayload { ids }));
    }

    // ------------------------------------------------------------------
    // Chat request lifecycle
    // ------------------------------------------------------------------

    /// Create a `pending` request for the ordered (sender, receiver) pair
    /// and notify the receiver if they are online.
    pub async fn send_request(
        &self,
        sender: UserId,
        receiver: UserId,
    ) -> Result<ChatRequest, ServerError> {
        let request = {
            let store = self.store.lock().await;
            if store.find_pending(&sender, &receiver)?.is_some() {
                return Err(ServerError::DuplicateRequest);
            }
            let request = ChatRequest::new(sender.clone(), receiver.clone());
            store.insert_request(&request)?;
            request
        };

        info!(request = %request.id, sender = %sender, receiver = %receiver, "chat request sent");

        self.relay
            .push_to_user(
                &self.presence,
                &receiver,
                ServerEvent::NewChatRequest(request_event(&request)),
            )
            .await;

        Ok(request)
    }

    /// Accept a `pending` request and notify the original sender.
    pub async fn accept_request(&self, request_id: RequestId) -> Result<ChatRequest, ServerError> {
        let updated = self.transition(request_id, RequestStatus::Accepted).await?;

        info!(request = %updated.id, sender = %updated.sender_id, "chat request accepted");

        self.relay
            .push_to_user(
                &self.presence,
                &updated.sender_id,
                ServerEvent::ChatRequestAccepted(request_event(&updated)),
            )
            .await;

        Ok(updated)
    }

    /// Reject a `pending` request and notify the original sender.
    pub async fn reject_request(&self, request_id: RequestId) -> Result<ChatRequest, ServerError> {
        let updated = self.transition(request_id, RequestStatus::Rejected).await?;

        info!(request = %updated.id, sender = %updated.sender_id, "chat request rejected");

        self.relay
            .push_to_user(
                &self.presence,
                &updated.sender_id,
                ServerEvent::ChatRequestRejected(request_event(&updated)),
            )
            .await;

        Ok(updated)
    }

    /// Guarded pending -> terminal transition. Accepting or rejecting a
    /// missing or non-pending record fails before anything is written.
    async fn transition(
        &self,
        request_id: RequestId,
        to: RequestStatus,
    ) -> Result<ChatRequest, ServerError> {
        let store = self.store.lock().await;

        let request = match store.get_request(request_id) {
            Ok(request) => request,
            Err(StoreError::NotFound) => return Err(ServerError::RequestNotFound),
            Err(e) => return Err(e.into()),
        };
        if request.status != RequestStatus::Pending {
            return Err(ServerError::RequestNotFound);
        }

        Ok(store.update_request_status(request_id, to, Utc::now())?)
    }

    /// Pending requests addressed to a user, newest first.
    pub async fn pending_requests(&self, receiver: &UserId) -> Result<Vec<ChatRequest>, ServerError> {
        Ok(self.store.lock().await.pending_for_receiver(receiver)?)
    }

    /// Derived consent state for a pair, from the most recent request
    /// between them in either direction.
    pub async fn pair_status(&self, a: &UserId, b: &UserId) -> Result<PairStatus, ServerError> {
        let latest = self.store.lock().await.latest_between(a, b)?;
        Ok(latest.map(|r| r.status.into()).unwrap_or_default())
    }

    /// User records with an accepted request involving the given user.
    /// Peers without a stored user record are skipped.
    pub async fn accepted_peers(&self, user: &UserId) -> Result<Vec<User>, ServerError> {
        let store = self.store.lock().await;
        let mut peers = Vec::new();
        for id in store.accepted_peer_ids(user)? {
            match store.get_user(&id) {
                Ok(peer) => peers.push(peer),
                Err(StoreError::NotFound) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(peers)
    }

    // ------------------------------------------------------------------
    // Users and messages
    // ------------------------------------------------------------------

    /// The user directory, minus the viewer.
    pub async fn list_users(&self, viewer: &UserId) -> Result<Vec<User>, ServerError> {
        Ok(self.store.lock().await.list_users_except(viewer)?)
    }

    /// Full transcript between two users, oldest first.
    pub async fn transcript(&self, a: &UserId, b: &UserId) -> Result<Vec<Message>, ServerError> {
        Ok(self.store.lock().await.messages_between(a, b)?)
    }

    /// Persist and relay a message.
    ///
    /// Authorization is enforced here, not in the relay: the latest request
    /// between the pair must be `accepted`, otherwise nothing is stored.
    pub async fn submit_message(
        &self,
        sender: UserId,
        receiver: UserId,
        draft: MessageDraft,
    ) -> Result<Message, ServerError> {
        let has_text = draft.text.as_deref().is_some_and(|t| !t.trim().is_empty());
        if !has_text && draft.attachment.is_none() {
            return Err(ServerError::BadRequest(
                "message must contain text or an attachment".to_string(),
            ));
        }

        if self.pair_status(&sender, &receiver).await? != PairStatus::Accepted {
            return Err(ServerError::ChatNotAccepted);
        }

        let (attachment_url, attachment_kind, attachment_name) = match draft.attachment {
            Some(upload) => {
                let url = self.media.store(&upload.data, upload.kind).await?;
                (Some(url), Some(upload.kind), upload.name)
            }
            None => (None, None, None),
        };

        let message = Message {
            id: MessageId::new(),
            sender_id: sender.clone(),
            receiver_id: receiver.clone(),
            text: draft.text,
            attachment_url,
            attachment_kind,
            attachment_name,
            created_at: Utc::now(),
        };
        self.store.lock().await.insert_message(&message)?;

        self.relay
            .push_to_user(
                &self.presence,
                &receiver,
                ServerEvent::NewMessage(message_payload(&message)),
            )
            .await;

        Ok(message)
    }
}

// ---------------------------------------------------------------------------
// Wire payload conversion
// ---------------------------------------------------------------------------

fn request_event(request: &ChatRequest) -> ChatRequestEvent {
    ChatRequestEvent {
        request_id: request.id,
        sender_id: request.sender_id.clone(),
        receiver_id: request.receiver_id.clone(),
        status: request.status,
        created_at: request.created_at,
        updated_at: request.updated_at,
    }
}

fn message_payload(message: &Message) -> MessagePayload {
    MessagePayload {
        message_id: message.id,
        sender_id: message.sender_id.clone(),
        receiver_id: message.receiver_id.clone(),
        text: message.text.clone(),
        attachment_url: message.attachment_url.clone(),
        attachment_kind: message.attachment_kind,
        attachment_name: message.attachment_name.clone(),
        created_at: message.created_at,
    }
}
