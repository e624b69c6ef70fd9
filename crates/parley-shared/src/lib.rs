//! # parley-shared
//!
//! Types shared between the Parley server and client crates: opaque
//! identifiers, chat-request status enums, and the wire protocol events
//! pushed over the session gateway.

pub mod protocol;
pub mod types;

pub use protocol::ServerEvent;
pub use types::{
    AttachmentKind, ConnectionId, MessageId, PairStatus, RequestId, RequestStatus, UserId,
};
