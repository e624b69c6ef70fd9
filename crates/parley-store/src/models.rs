//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be returned
//! directly from the HTTP layer.

use chrono::{DateTime, Utc};
use parley_shared::types::{AttachmentKind, MessageId, RequestId, RequestStatus, UserId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A known user identity.  The primary key is the opaque id issued by the
/// auth collaborator; this core never creates identities of its own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// Opaque identity shared with the auth and presence layers.
    pub id: UserId,
    /// Human-readable display name.
    pub username: String,
    /// Optional URL of the user's avatar image.
    pub avatar_url: Option<String>,
    /// When this user record was first created.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Chat request
// ---------------------------------------------------------------------------

/// A consent record gating whether two users may exchange messages.
///
/// Created as `pending`, transitions exactly once to `accepted` or
/// `rejected`, and is immutable thereafter.  A rejected pair retries by
/// creating a fresh record; the old one stays for history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRequest {
    /// Unique request identifier.
    pub id: RequestId,
    /// The user who initiated the request.
    pub sender_id: UserId,
    /// The user the request is addressed to.
    pub receiver_id: UserId,
    /// Lifecycle state.
    pub status: RequestStatus,
    /// When the request was created.
    pub created_at: DateTime<Utc>,
    /// When the request last changed state.
    pub updated_at: DateTime<Utc>,
}

impl ChatRequest {
    /// Build a fresh `pending` request for an ordered (sender, receiver) pair.
    pub fn new(sender_id: UserId, receiver_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            id: RequestId::new(),
            sender_id,
            receiver_id,
            status: RequestStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A single direct message. Text and attachment are both optional, but at
/// least one must be present (enforced at the submission boundary).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Unique message identifier.
    pub id: MessageId,
    /// The sending user.
    pub sender_id: UserId,
    /// The receiving user.
    pub receiver_id: UserId,
    /// Plain text body, if any.
    pub text: Option<String>,
    /// Durable retrieval URL returned by the media host, if any.
    pub attachment_url: Option<String>,
    /// Declared kind of the attachment.
    pub attachment_kind: Option<AttachmentKind>,
    /// Original file name of the attachment.
    pub attachment_name: Option<String>,
    /// When the message was persisted.
    pub created_at: DateTime<Utc>,
}
