//! Wire protocol events pushed from the server to live gateway connections.
//!
//! Events are JSON text frames tagged by event name; the tag strings are the
//! contract the client subscribes to. Delivery is fire-and-forget: a client
//! that was offline at push time reconciles by querying the HTTP API after
//! reconnecting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AttachmentKind, MessageId, RequestId, RequestStatus, UserId};

/// All events the server pushes over a gateway connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// A chat request was created and addressed to the receiving user.
    #[serde(rename = "newChatRequest")]
    NewChatRequest(ChatRequestEvent),

    /// A pending request was accepted; addressed to the original sender.
    #[serde(rename = "chatRequestAccepted")]
    ChatRequestAccepted(ChatRequestEvent),

    /// A pending request was rejected; addressed to the original sender.
    #[serde(rename = "chatRequestRejected")]
    ChatRequestRejected(ChatRequestEvent),

    /// A message was persisted; addressed to the receiving user.
    #[serde(rename = "newMessage")]
    NewMessage(MessagePayload),

    /// The set of online users changed; broadcast to every connection.
    #[serde(rename = "onlineUsersChanged")]
    OnlineUsersChanged(OnlineUsersPayload),
}

/// Snapshot of a chat request record as carried on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequestEvent {
    pub request_id: RequestId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Full message record as carried on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub message_id: MessageId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_kind: Option<AttachmentKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OnlineUsersPayload {
    pub ids: Vec<UserId>,
}

impl ServerEvent {
    /// Serialize to the JSON text frame sent over the gateway.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize a received text frame.
    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }
}
